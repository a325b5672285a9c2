// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The CBC link frame: the outer, on-the-wire envelope that carries one
//! service frame between the mediator and the guest over the virtual
//! UART. Grounded on `original_source/hw/platform/ioc.c`'s
//! `cbc_copy_to_ring` / `cbc_unpack_link` / `ioc_build_request` contract
//! (spec §4.3) and on `rpc_protocol`'s record-mark framing
//! (`stream_record_mark` / `update_record_mark`) for the "read a length
//! prefix, validate, then slice the payload out" shape.

use crate::ring::RingBuffer;
use crate::tables::ChannelSelector;
use crate::{Error, ServiceFrame};
use log::trace;

/// Start-of-frame delimiter.
const SOF: u8 = 0x5A;
/// End-of-frame delimiter.
const EOF: u8 = 0xA5;

/// Bytes of link-frame header preceding the service payload: SOF (1) +
/// channel selector (1) + big-endian payload length (2). This is the
/// "service payload offset within a request buffer" the spec calls a
/// compile-time constant (§6).
pub const CBC_SRV_POS: usize = 4;

/// Largest service payload this implementation will frame.
pub const CBC_MAX_SERVICE_SIZE: usize = 512;

/// Largest complete link frame: header + payload + checksum (1) + EOF (1).
pub const CBC_MAX_LINK_SIZE: usize = CBC_SRV_POS + CBC_MAX_SERVICE_SIZE + 2;

/// Outcome of inspecting the bytes currently sitting at the ring's head.
#[derive(Debug, PartialEq, Eq)]
pub enum LinkDecodeOutcome {
    /// Not enough bytes buffered yet to know whether a frame is complete.
    Incomplete,
    /// A complete, well-formed link frame sits at the head. `link_len` is
    /// the total frame length (header through EOF inclusive); `srv_len` is
    /// the enclosed service payload length.
    Frame { link_len: usize, srv_len: usize },
    /// The byte at the head cannot start a valid frame (bad delimiter,
    /// bad length, or bad checksum). The caller should skip one byte and
    /// try again, per spec §4.3 / §7.
    Malformed,
}

/// Stateless helpers over a `RingBuffer`; all state lives in the ring
/// itself, matching the spec's description of the framer as a pure
/// function of ring contents.
pub struct Framer;

impl Framer {
    /// Appends `bytes` to `ring`. Returns `Ok(true)` when a complete link
    /// frame is now present at the head (mirrors `cbc_copy_to_ring`'s
    /// "full_link_frame?" return), `Ok(false)` otherwise, or `Err` if the
    /// ring has no room.
    pub fn copy_to_ring(ring: &mut RingBuffer, bytes: &[u8]) -> Result<bool, Error> {
        if !ring.push_slice(bytes) {
            return Err(Error::RingFull);
        }
        Ok(matches!(
            Self::peek(ring),
            LinkDecodeOutcome::Frame { .. }
        ))
    }

    /// Inspects the bytes at the ring's head without consuming anything.
    pub fn peek(ring: &RingBuffer) -> LinkDecodeOutcome {
        if ring.len() < CBC_SRV_POS {
            return LinkDecodeOutcome::Incomplete;
        }

        if ring.peek(0) != SOF {
            return LinkDecodeOutcome::Malformed;
        }
        if ChannelSelector::try_from(ring.peek(1)).is_err() {
            return LinkDecodeOutcome::Malformed;
        }

        let srv_len = u16::from_be_bytes([ring.peek(2), ring.peek(3)]) as usize;
        if srv_len > CBC_MAX_SERVICE_SIZE {
            return LinkDecodeOutcome::Malformed;
        }

        let link_len = CBC_SRV_POS + srv_len + 2;
        if ring.len() < link_len {
            return LinkDecodeOutcome::Incomplete;
        }

        if ring.peek(link_len - 1) != EOF {
            return LinkDecodeOutcome::Malformed;
        }

        let expected_checksum = ring.peek(link_len - 2);
        let mut sum: u8 = 0;
        for i in 1..(link_len - 2) {
            sum = sum.wrapping_add(ring.peek(i));
        }
        if sum != expected_checksum {
            return LinkDecodeOutcome::Malformed;
        }

        LinkDecodeOutcome::Frame { link_len, srv_len }
    }

    /// Copies `link_len` bytes starting at the ring's head into `out` and
    /// advances the head past them. `out` must be at least `link_len`
    /// long. Mirrors the copy loop in `ioc_build_request`.
    pub fn take_link_frame(ring: &mut RingBuffer, out: &mut [u8], link_len: usize) {
        let copied = ring.peek_slice(&mut out[..link_len]);
        debug_assert_eq!(copied, link_len);
        ring.advance(link_len);
    }

    /// Advances the ring head past a single malformed byte, matching
    /// `cbc_unpack_link`'s "frame is malformed, advance the ring head past
    /// the bad byte" behavior (spec §4.3 / §7).
    pub fn skip_malformed_byte(ring: &mut RingBuffer) {
        trace!("skipping malformed byte at ring head");
        ring.advance(1);
    }

    /// Parses a complete link frame's bytes (as produced by
    /// `take_link_frame`) into its target channel and decoded service
    /// frame. Callers are expected to have already validated the frame via
    /// `peek`, so structural errors here indicate a logic bug rather than
    /// a wire problem.
    pub fn decode_link(buf: &[u8]) -> Result<(ChannelSelector, ServiceFrame), Error> {
        if buf.len() < CBC_SRV_POS + 2 {
            return Err(Error::MalformedFrame);
        }
        let channel = ChannelSelector::try_from(buf[1])?;
        let srv_len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        let payload_end = CBC_SRV_POS + srv_len;
        if buf.len() < payload_end + 2 {
            return Err(Error::MalformedFrame);
        }
        let service = ServiceFrame::decode(&buf[CBC_SRV_POS..payload_end])?;
        Ok((channel, service))
    }

    /// Encodes `service_bytes` (an already-`ServiceFrame::encode`d
    /// payload) as a complete link frame bound for `channel`, appending it
    /// to `out`.
    pub fn encode_link(channel: ChannelSelector, service_bytes: &[u8], out: &mut Vec<u8>) {
        let start = out.len();
        out.push(SOF);
        out.push(channel as u8);
        out.extend_from_slice(&(service_bytes.len() as u16).to_be_bytes());
        out.extend_from_slice(service_bytes);

        let mut sum: u8 = 0;
        for &b in &out[start + 1..] {
            sum = sum.wrapping_add(b);
        }
        out.push(sum);
        out.push(EOF);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ServiceItem, SignalFrame};

    fn sample_frame_bytes(channel: ChannelSelector) -> Vec<u8> {
        let service = ServiceFrame {
            items: vec![ServiceItem::Signal(SignalFrame {
                id: 22,
                value: vec![0x12, 0x34],
            })],
        };
        let mut out = Vec::new();
        Framer::encode_link(channel, &service.encode(), &mut out);
        out
    }

    #[test]
    fn full_roundtrip_through_ring() {
        let mut ring = RingBuffer::new();
        let frame_bytes = sample_frame_bytes(ChannelSelector::Lifecycle);

        for &b in &frame_bytes {
            let complete = Framer::copy_to_ring(&mut ring, &[b]).unwrap();
            assert_eq!(complete, ring.len() == frame_bytes.len());
        }

        let LinkDecodeOutcome::Frame { link_len, srv_len } = Framer::peek(&ring) else {
            panic!("expected a complete frame");
        };
        assert_eq!(link_len, frame_bytes.len());

        let mut buf = vec![0u8; link_len];
        Framer::take_link_frame(&mut ring, &mut buf, link_len);
        assert!(ring.is_empty());

        let (channel, service) = Framer::decode_link(&buf).unwrap();
        assert_eq!(channel, ChannelSelector::Lifecycle);
        assert_eq!(srv_len, service.encode().len());
        assert_eq!(service.items.len(), 1);
    }

    #[test]
    fn bad_checksum_is_malformed_and_skippable() {
        let mut ring = RingBuffer::new();
        let mut frame_bytes = sample_frame_bytes(ChannelSelector::Signal);
        let checksum_pos = frame_bytes.len() - 2;
        frame_bytes[checksum_pos] ^= 0xFF;

        ring.push_slice(&frame_bytes);
        assert_eq!(Framer::peek(&ring), LinkDecodeOutcome::Malformed);
        Framer::skip_malformed_byte(&mut ring);
        assert_eq!(ring.len(), frame_bytes.len() - 1);
    }

    #[test]
    fn partial_frame_is_incomplete() {
        let mut ring = RingBuffer::new();
        let frame_bytes = sample_frame_bytes(ChannelSelector::Raw0);
        ring.push_slice(&frame_bytes[..frame_bytes.len() - 1]);
        assert_eq!(Framer::peek(&ring), LinkDecodeOutcome::Incomplete);
    }
}
