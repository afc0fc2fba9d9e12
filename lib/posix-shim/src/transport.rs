// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Byte transport between one sending context and one receiving context.
//!
//! The channel underneath is created on the first send and then lives as long
//! as the [`Transport`] does. If the kernel can't create it, that send fails
//! and the next one tries again. Sends and receives never wait.
//!
//! [`Transport::split`] hands out one [`Sender`] and one [`Receiver`]; neither
//! can be cloned, which is how the single-writer/single-reader assumption is
//! kept.

use core::fmt::Write;
use ringbuf::{ringbuf, ringbuf_entry};
use spin::Once;

use crate::diag::{log_line, Diag};
use crate::error::TransportError;
use crate::platform::{ByteChannel, Platform};

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Created(usize),
    CreateFailed(usize),
    Sent(usize),
    ShortWrite { sent: usize, wanted: usize },
    NotOpen,
    Received(usize),
}

ringbuf!(Trace, 32, Trace::None);

pub struct Transport<Ch> {
    capacity: usize,
    channel: Once<Ch>,
}

impl<Ch: ByteChannel> Transport<Ch> {
    /// Makes a transport whose channel, once created, holds `capacity` bytes.
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channel: Once::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Has a send managed to create the channel yet?
    pub fn is_open(&self) -> bool {
        self.channel.is_completed()
    }

    /// Sends all of `data` or reports why not. Creates the channel first if
    /// no earlier send has.
    pub fn send<P, C>(
        &self,
        platform: &P,
        diag: &Diag<C>,
        data: &[u8],
    ) -> Result<(), TransportError>
    where
        P: Platform<Channel = Ch>,
        C: Write,
    {
        let created = self.channel.try_call_once(|| {
            match platform.create_channel(self.capacity) {
                Some(ch) => {
                    ringbuf_entry!(Trace::Created(self.capacity));
                    Ok(ch)
                }
                None => Err(TransportError::CreateFailed),
            }
        });
        let channel = match created {
            Ok(ch) => ch,
            Err(e) => {
                ringbuf_entry!(Trace::CreateFailed(self.capacity));
                log_line!(
                    diag,
                    "(Error)~  send: Create the message channel ({} bytes).",
                    self.capacity
                );
                return Err(e);
            }
        };

        let sent = channel.send(data);
        if sent != data.len() {
            ringbuf_entry!(Trace::ShortWrite {
                sent,
                wanted: data.len()
            });
            log_line!(
                diag,
                "(Error)~  send: Send to the message channel. [ret={sent}]"
            );
            return Err(TransportError::ShortWrite {
                sent,
                wanted: data.len(),
            });
        }

        ringbuf_entry!(Trace::Sent(sent));
        Ok(())
    }

    /// Copies whatever is waiting, up to `buf.len()` bytes, into `buf`.
    ///
    /// `Ok(0)` means the channel exists and is empty; `Err(NotOpen)` means
    /// nothing has been sent yet.
    pub fn receive<C: Write>(
        &self,
        diag: &Diag<C>,
        buf: &mut [u8],
    ) -> Result<usize, TransportError> {
        let Some(channel) = self.channel.get() else {
            ringbuf_entry!(Trace::NotOpen);
            log_line!(diag, "(Error)~  receive: Message channel to receive from.");
            return Err(TransportError::NotOpen);
        };

        let n = channel.receive(buf);
        if n != 0 {
            ringbuf_entry!(Trace::Received(n));
        }
        Ok(n)
    }

    /// Divides the transport into its two ends. Holding `&mut self` for as
    /// long as they live means nothing else can send or receive meanwhile.
    pub fn split<'a, P, C>(
        &'a mut self,
        platform: &'a P,
        diag: &'a Diag<C>,
    ) -> (Sender<'a, P, C>, Receiver<'a, Ch, C>)
    where
        P: Platform<Channel = Ch>,
        C: Write,
    {
        let transport: &'a Self = self;
        (
            Sender {
                transport,
                platform,
                diag,
            },
            Receiver { transport, diag },
        )
    }
}

/// The sending end. There is only ever one.
pub struct Sender<'a, P: Platform, C> {
    transport: &'a Transport<P::Channel>,
    platform: &'a P,
    diag: &'a Diag<C>,
}

impl<P: Platform, C: Write> Sender<'_, P, C> {
    pub fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.transport.send(self.platform, self.diag, data)
    }
}

/// The receiving end. There is only ever one.
pub struct Receiver<'a, Ch, C> {
    transport: &'a Transport<Ch>,
    diag: &'a Diag<C>,
}

impl<Ch: ByteChannel, C: Write> Receiver<'_, Ch, C> {
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.transport.receive(self.diag, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosted::{CaptureConsole, HostChannel, HostPlatform};
    use proptest::prelude::*;

    fn fixture(
        capacity: usize,
    ) -> (HostPlatform, CaptureConsole, Diag<CaptureConsole>, Transport<HostChannel>)
    {
        let con = CaptureConsole::default();
        let diag = Diag::new(con.clone());
        (HostPlatform::new(), con, diag, Transport::new(capacity))
    }

    #[test]
    fn receive_before_any_send() {
        let (_, con, diag, t) = fixture(16);
        let mut buf = [0; 8];
        assert_eq!(t.receive(&diag, &mut buf), Err(TransportError::NotOpen));
        assert!(con.contents().starts_with("(Error)~"));
        assert!(!t.is_open());
    }

    #[test]
    fn empty_channel_is_not_an_error() {
        let (platform, con, diag, t) = fixture(16);
        t.send(&platform, &diag, b"hi").unwrap();
        let mut buf = [0; 8];
        assert_eq!(t.receive(&diag, &mut buf), Ok(2));
        assert_eq!(t.receive(&diag, &mut buf), Ok(0));
        assert_eq!(con.contents(), "");
    }

    #[test]
    fn created_once_on_first_send() {
        let (platform, _, diag, t) = fixture(16);
        assert!(!t.is_open());
        t.send(&platform, &diag, b"a").unwrap();
        t.send(&platform, &diag, b"b").unwrap();
        assert!(t.is_open());
        assert_eq!(platform.channels_created(), 1);
    }

    #[test]
    fn failed_creation_is_retried() {
        let (platform, con, diag, t) = fixture(16);
        platform.fail_next_channel();

        assert_eq!(
            t.send(&platform, &diag, b"lost"),
            Err(TransportError::CreateFailed)
        );
        assert!(!t.is_open());
        assert!(con.contents().starts_with("(Error)~"));

        t.send(&platform, &diag, b"kept").unwrap();
        let mut buf = [0; 8];
        assert_eq!(t.receive(&diag, &mut buf), Ok(4));
        assert_eq!(&buf[..4], b"kept");
    }

    #[test]
    fn overflow_keeps_what_was_there() {
        let (platform, con, diag, t) = fixture(8);
        t.send(&platform, &diag, b"12345").unwrap();
        assert_eq!(
            t.send(&platform, &diag, b"6789"),
            Err(TransportError::ShortWrite { sent: 0, wanted: 4 })
        );
        assert!(con.contents().contains("[ret=0]"));

        let mut buf = [0; 16];
        assert_eq!(t.receive(&diag, &mut buf), Ok(5));
        assert_eq!(&buf[..5], b"12345");
    }

    #[test]
    fn split_ends_talk() {
        let (platform, _, diag, mut t) = fixture(32);
        let (mut tx, mut rx) = t.split(&platform, &diag);
        tx.send(b"ping").unwrap();
        let mut buf = [0; 4];
        assert_eq!(rx.receive(&mut buf), Ok(4));
        assert_eq!(&buf, b"ping");
    }

    proptest! {
        #[test]
        fn fifo_without_loss(
            chunks in prop::collection::vec(
                prop::collection::vec(any::<u8>(), 0..24),
                0..16,
            ),
            read_size in 1usize..40,
        ) {
            let (platform, _, diag, t) = fixture(64);
            let mut sent = vec![];
            let mut got = vec![];
            let mut buf = vec![0; read_size];

            for chunk in &chunks {
                if t.send(&platform, &diag, chunk).is_ok() {
                    sent.extend_from_slice(chunk);
                }
                let n = t.receive(&diag, &mut buf[..]).unwrap();
                got.extend_from_slice(&buf[..n]);
            }
            loop {
                let n = t.receive(&diag, &mut buf[..]).unwrap_or(0);
                if n == 0 {
                    break;
                }
                got.extend_from_slice(&buf[..n]);
            }

            prop_assert_eq!(got, sent);
        }
    }
}
