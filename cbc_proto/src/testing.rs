// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Test-only helpers shared by this crate's own tests and by
//! `ioc_mediator`'s integration tests: a socketpair-backed `Endpoint` that
//! stands in for a native cdev or the virtual UART, and a couple of frame
//! builders for constructing well-known link frames without hand-encoding
//! bytes at every call site. Modeled on `rpc_protocol`'s own `pipe` module.

use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};

use crate::link::Framer;
use crate::service::{ServiceFrame, ServiceItem, SignalFrame};
use crate::tables::ChannelSelector;

/// One end of a socketpair, readable and writable like a real character
/// device fd.
pub struct Endpoint {
    fd: std::os::fd::OwnedFd,
}

/// Returns a connected pair of endpoints, standing in for the two ends of
/// a native cdev or the virtual UART in tests.
pub fn pipe() -> std::io::Result<(Endpoint, Endpoint)> {
    let (a, b) = socketpair(
        AddressFamily::Unix,
        SockType::Stream,
        None,
        SockFlag::empty(),
    )?;
    Ok((Endpoint { fd: a }, Endpoint { fd: b }))
}

impl std::io::Read for Endpoint {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(nix::unistd::read(&self.fd, buf)?)
    }
}

impl std::io::Write for Endpoint {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(nix::unistd::write(&self.fd, buf)?)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl std::os::fd::AsFd for Endpoint {
    fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        use std::os::fd::AsFd as _;
        self.fd.as_fd()
    }
}

impl std::os::fd::AsRawFd for Endpoint {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        use std::os::fd::AsRawFd as _;
        self.fd.as_raw_fd()
    }
}

/// Encodes a single-signal service frame as a complete link frame bound
/// for `channel`. Used throughout both crates' tests to build fixtures
/// without repeating `Framer::encode_link` boilerplate.
pub fn encode_single_signal_link_frame(channel: ChannelSelector, id: u16, value: &[u8]) -> Vec<u8> {
    let service = ServiceFrame {
        items: vec![ServiceItem::Signal(SignalFrame {
            id,
            value: value.to_vec(),
        })],
    };
    let mut out = Vec::new();
    Framer::encode_link(channel, &service.encode(), &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn pipe_endpoints_exchange_bytes() {
        let (mut a, mut b) = pipe().unwrap();
        a.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn single_signal_frame_builder_decodes_back() {
        let bytes =
            encode_single_signal_link_frame(ChannelSelector::Signal, 22, &[0x01, 0x02]);
        let (channel, service) = Framer::decode_link(&bytes).unwrap();
        assert_eq!(channel, ChannelSelector::Signal);
        assert_eq!(service.items.len(), 1);
    }
}
