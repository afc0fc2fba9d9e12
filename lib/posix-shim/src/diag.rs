// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The diagnostic console and the shutdown latch.
//!
//! Everything the shim prints goes through a [`Diag`]. Once [`Diag::terminate`]
//! has run, the latch is set and the console goes quiet for good, so the exit
//! banner is always the last thing in a captured log. Trace entries keep
//! flowing into the ring buffers after that point.

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use ringbuf::{ringbuf, ringbuf_entry};
use spin::Mutex;

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Exit(u8),
    ExitIgnored(u8),
    LineDropped,
    BannerDeferred,
}

ringbuf!(Trace, 8, Trace::None);

/// The console and the shutdown latch.
///
/// Nothing here ever waits for the console. On a preemptive kernel the
/// context holding it may be a lower-priority task that won't run again until
/// the caller yields, so a line that finds the console busy is dropped (and
/// traced). The exit banner can't be dropped: if the console is busy when
/// [`Diag::terminate`] runs, the banner is left pending and written by
/// whichever context lets go of the console next.
pub struct Diag<C> {
    console: Mutex<C>,
    latched: AtomicBool,
    banner_pending: AtomicBool,
    exit_code: AtomicU8,
}

impl<C: Write> Diag<C> {
    pub const fn new(console: C) -> Self {
        Self {
            console: Mutex::new(console),
            latched: AtomicBool::new(false),
            banner_pending: AtomicBool::new(false),
            exit_code: AtomicU8::new(0),
        }
    }

    /// Writes to the console unless the latch is set or another context is
    /// mid-write.
    pub fn logf(&self, args: fmt::Arguments<'_>) {
        if self.latched.load(Ordering::SeqCst) {
            return;
        }
        match self.console.try_lock() {
            Some(mut console) => {
                // Checked again with the console held, so that nothing lands
                // behind the banner.
                if !self.latched.load(Ordering::SeqCst) {
                    // A console that can't be written has nowhere to report
                    // that.
                    let _ = console.write_fmt(args);
                }
            }
            None => {
                ringbuf_entry!(Trace::LineDropped);
            }
        }
        self.flush_banner();
    }

    /// Sets the latch and arranges for the exit banner to be printed. Only
    /// the first call does anything; it returns `true`, later calls return
    /// `false`.
    ///
    /// The banner is written before this returns unless another context is
    /// in the middle of a line, in which case that context writes it.
    pub fn terminate(&self, code: u8) -> bool {
        if self.latched.swap(true, Ordering::SeqCst) {
            ringbuf_entry!(Trace::ExitIgnored(code));
            return false;
        }
        ringbuf_entry!(Trace::Exit(code));
        self.exit_code.store(code, Ordering::SeqCst);
        self.banner_pending.store(true, Ordering::SeqCst);
        self.flush_banner();
        true
    }

    pub fn is_latched(&self) -> bool {
        self.latched.load(Ordering::SeqCst)
    }

    /// Writes a pending banner if the console is free. Every context that
    /// releases the console comes through here afterwards, so a banner left
    /// pending by `terminate` is picked up by the last holder.
    fn flush_banner(&self) {
        if !self.banner_pending.load(Ordering::SeqCst) {
            return;
        }
        let Some(mut console) = self.console.try_lock() else {
            ringbuf_entry!(Trace::BannerDeferred);
            return;
        };
        if self.banner_pending.swap(false, Ordering::SeqCst) {
            let code = self.exit_code.load(Ordering::SeqCst);
            let _ =
                write!(console, "EXIT: exiting FETT with code <{code:x}>\r\n");
            let _ = console.write_str("\r\n>>>End of Fett<<<\r\n");
        }
    }
}

/// Logs one console line, adding the `\r\n` the serial console wants.
macro_rules! log_line {
    ($diag:expr, $($arg:tt)*) => {
        $diag.logf(format_args!("{}\r\n", format_args!($($arg)*)))
    };
}
pub(crate) use log_line;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosted::CaptureConsole;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn logs_until_latched() {
        let con = CaptureConsole::default();
        let diag = Diag::new(con.clone());

        log_line!(diag, "(Error)~  something {}", 3);
        assert_eq!(con.contents(), "(Error)~  something 3\r\n");

        assert!(diag.terminate(1));
        assert!(diag.is_latched());
        let after_exit = con.contents();

        log_line!(diag, "Warning: nobody hears this");
        assert_eq!(con.contents(), after_exit);
    }

    #[test]
    fn banner_exactly_once() {
        let con = CaptureConsole::default();
        let diag = Diag::new(con.clone());

        assert!(diag.terminate(0x2a));
        for code in 0..10 {
            assert!(!diag.terminate(code));
        }

        assert_eq!(
            con.contents(),
            "EXIT: exiting FETT with code <2a>\r\n\r\n>>>End of Fett<<<\r\n"
        );
        assert_eq!(con.contents().matches(">>>End of Fett<<<").count(), 1);
    }

    #[test]
    fn banner_is_last_line() {
        let con = CaptureConsole::default();
        let diag = Diag::new(con.clone());

        log_line!(diag, "before");
        diag.terminate(2);
        log_line!(diag, "after");

        assert!(con.contents().starts_with("before\r\n"));
        assert!(con.contents().ends_with(">>>End of Fett<<<\r\n"));
    }

    /// A console whose first write parks until the test lets it go, so a
    /// test can hold the console from another thread.
    struct GatedConsole {
        out: CaptureConsole,
        entered: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
        gated: bool,
    }

    impl Write for GatedConsole {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            if core::mem::take(&mut self.gated) {
                let _ = self.entered.send(());
                let _ = self.release.recv();
            }
            self.out.write_str(s)
        }
    }

    fn gated() -> (
        Diag<GatedConsole>,
        CaptureConsole,
        mpsc::Receiver<()>,
        mpsc::Sender<()>,
    ) {
        let out = CaptureConsole::default();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let diag = Diag::new(GatedConsole {
            out: out.clone(),
            entered: entered_tx,
            release: release_rx,
            gated: true,
        });
        (diag, out, entered_rx, release_tx)
    }

    #[test]
    fn busy_console_drops_the_line_without_waiting() {
        let (diag, out, entered, release) = gated();
        let diag = &diag;

        thread::scope(|s| {
            let holder = s.spawn(move || log_line!(diag, "first"));
            entered.recv().unwrap();

            let (done_tx, done_rx) = mpsc::channel();
            s.spawn(move || {
                log_line!(diag, "second");
                done_tx.send(()).unwrap();
            });
            let waited = done_rx.recv_timeout(Duration::from_secs(5));

            release.send(()).unwrap();
            holder.join().unwrap();
            assert!(waited.is_ok(), "logf waited for a busy console");
        });

        assert_eq!(out.contents(), "first\r\n");
    }

    #[test]
    fn banner_follows_the_line_in_progress() {
        let (diag, out, entered, release) = gated();
        let diag = &diag;

        thread::scope(|s| {
            let holder = s.spawn(move || log_line!(diag, "mid-write"));
            entered.recv().unwrap();

            // The console is held; terminate must still return at once.
            assert!(diag.terminate(3));
            assert!(!diag.terminate(4));
            log_line!(diag, "too late");

            release.send(()).unwrap();
            holder.join().unwrap();
        });

        assert_eq!(
            out.contents(),
            "mid-write\r\nEXIT: exiting FETT with code <3>\r\n\r\n>>>End of Fett<<<\r\n"
        );
    }
}
