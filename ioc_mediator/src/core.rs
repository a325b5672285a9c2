// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The core task: one level-triggered epoll loop that fans every open
//! channel's readability into either the tx queue (native reads) or the
//! rx queue (virtual-UART bytes, via the ring buffer and link framer).
//! Grounded on `original_source/hw/platform/ioc.c`'s `ioc_core_thread` /
//! `ioc_dispatch` / `ioc_process_rx` / `ioc_process_tx`.
//!
//! Uses raw `libc` epoll calls rather than `nix::sys::epoll`'s owning
//! `Epoll` wrapper, because shutdown (§4.5) deliberately closes the
//! multiplexer fd out from under the blocked `epoll_wait` call on another
//! thread to interrupt it -- an ownership pattern an RAII wrapper shared
//! between threads can't express without `unsafe` of its own. Keeping the
//! fd a plain `RawFd` owned by `IocMediator` and closed exactly once at
//! shutdown matches the original's "int epfd" field precisely.

use std::os::fd::RawFd;

use log::{trace, warn};

use cbc_proto::tables::ChannelSelector;
use cbc_proto::{Framer, LinkDecodeOutcome, RingBuffer, CBC_MAX_SERVICE_SIZE, CBC_SRV_POS};

use crate::channel::ChannelTable;
use crate::error::Error;
use crate::queue::{Position, Queue};
use crate::request::RequestKind;

/// Upper bound on events drained from a single `epoll_wait` call. Channel
/// count is always small (≤ 23 with the `dummy` feature), so this is
/// generous headroom rather than a tight fit.
const MAX_EVENTS: usize = 32;

/// Creates a fresh epoll instance and registers every currently-open
/// channel for read readiness, matching `ioc_core_thread`'s setup loop
/// (run once, before the `epoll_wait` loop starts).
pub fn create_and_register(channels: &ChannelTable) -> Result<RawFd, Error> {
    let epfd = checked(unsafe { libc::epoll_create1(0) })?;

    for (selector, channel) in channels.iter_open() {
        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: selector as u8 as u64,
        };
        let rc = unsafe {
            libc::epoll_ctl(epfd, libc::EPOLL_CTL_ADD, channel.raw_fd(), &mut event)
        };
        if let Err(e) = checked(rc) {
            warn!("ioc epoll ctl for {selector:?} failed: {e}");
        }
    }

    #[cfg(feature = "dummy")]
    for (index, dummy) in channels.iter_dummy() {
        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: DUMMY_TAG | index as u64,
        };
        let rc = unsafe {
            libc::epoll_ctl(epfd, libc::EPOLL_CTL_ADD, dummy.channel.raw_fd(), &mut event)
        };
        if let Err(e) = checked(rc) {
            warn!("ioc epoll ctl for dummy channel {index} failed: {e}");
        }
    }

    Ok(epfd)
}

/// High bit of an epoll event's `u64` tag, marking the low bits as a
/// `dummy` feature channel index rather than a `ChannelSelector` byte.
#[cfg(feature = "dummy")]
const DUMMY_TAG: u64 = 1 << 63;

/// Runs the `epoll_wait` loop until a non-spurious failure (including the
/// fd being closed out from under it by shutdown) terminates it. Never
/// returns `Err`: per spec §4.5/§7, any multiplexer failure besides EINTR
/// simply ends the core task, it is not propagated.
pub fn run(epfd: RawFd, channels: &ChannelTable, free_q: &Queue, rx_q: &Queue, tx_q: &Queue) {
    let mut ring = RingBuffer::new();
    let mut events = [libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS];

    loop {
        let n = unsafe {
            libc::epoll_wait(epfd, events.as_mut_ptr(), MAX_EVENTS as i32, -1)
        };

        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            trace!("ioc epoll wait error, exiting core task: {err}");
            return;
        }

        for event in &events[..n as usize] {
            #[cfg(feature = "dummy")]
            if event.u64 & DUMMY_TAG != 0 {
                let index = (event.u64 & !DUMMY_TAG) as usize;
                if let Some(dummy) = channels.dummy_channel(index) {
                    process_native_readable(dummy.remapped, &dummy.channel, free_q, tx_q);
                }
                continue;
            }

            let Ok(selector) = ChannelSelector::try_from(event.u64 as u8) else {
                warn!("ioc core task got an event for an unknown channel id {}", event.u64);
                continue;
            };
            let Some(channel) = channels.get(selector) else {
                continue;
            };

            if selector == ChannelSelector::VirtualUart {
                process_virtual_uart_readable(channel, &mut ring, free_q, rx_q);
            } else {
                process_native_readable(selector, channel, free_q, tx_q);
            }
        }
    }
}

/// Virtual-UART readiness: reads a single byte (spec §4.5's "deliberate
/// simplicity choice"), feeds it to the ring, and drains any complete (or
/// malformed) link frames now sitting at the ring head.
fn process_virtual_uart_readable(
    channel: &crate::channel::Channel,
    ring: &mut RingBuffer,
    free_q: &Queue,
    rx_q: &Queue,
) {
    let mut byte = [0u8; 1];
    let n = match channel.recv(&mut byte) {
        Ok(n) => n,
        Err(e) => {
            trace!("ioc virtual uart read error: {e}");
            return;
        }
    };
    if n == 0 {
        return;
    }

    if let Err(e) = Framer::copy_to_ring(ring, &byte) {
        warn!("ioc ring buffer full, dropping byte: {e}");
        return;
    }

    drain_ring(ring, free_q, rx_q);
}

/// Repeatedly inspects the ring head, emitting a request per complete
/// frame and skipping one byte per malformed frame, until the ring has
/// too few buffered bytes to decide either way. Mirrors `cbc_unpack_link`
/// called in a loop (the original calls it once per byte, which is
/// equivalent since a single byte can complete at most one frame, but
/// looping here keeps the invariant correct if a future batching mode --
/// noted as acceptable in spec §4.5 -- feeds multiple bytes at once).
fn drain_ring(ring: &mut RingBuffer, free_q: &Queue, rx_q: &Queue) {
    loop {
        match Framer::peek(ring) {
            LinkDecodeOutcome::Incomplete => return,
            LinkDecodeOutcome::Malformed => {
                warn!("ioc malformed link frame, skipping one byte");
                Framer::skip_malformed_byte(ring);
            }
            LinkDecodeOutcome::Frame { link_len, srv_len } => {
                match free_q.try_dequeue() {
                    Some(mut req) => {
                        req.reset();
                        Framer::take_link_frame(ring, &mut req.buf, link_len);
                        req.link_len = link_len;
                        req.srv_len = srv_len;
                        req.kind = RequestKind::Raw;
                        rx_q.enqueue(req, Position::Tail);
                    }
                    None => {
                        warn!("ioc free queue is full, dropping frame");
                        ring.advance(link_len);
                    }
                }
            }
        }
    }
}

/// Native-channel readiness: reads up to one full service frame's worth
/// of bytes straight into a free request's service-payload offset and
/// forwards it to the tx queue. Mirrors `ioc_process_tx`.
fn process_native_readable(
    selector: ChannelSelector,
    channel: &crate::channel::Channel,
    free_q: &Queue,
    tx_q: &Queue,
) {
    let Some(mut req) = free_q.try_dequeue() else {
        warn!("ioc free queue is full, dropping native read from {selector:?}");
        return;
    };
    req.reset();

    let count = match channel.recv(&mut req.buf[CBC_SRV_POS..CBC_SRV_POS + CBC_MAX_SERVICE_SIZE]) {
        Ok(n) => n,
        Err(e) => {
            trace!("ioc channel {selector:?} recv error: {e}");
            free_q.enqueue(req, Position::Tail);
            return;
        }
    };
    if count == 0 {
        free_q.enqueue(req, Position::Tail);
        return;
    }

    req.srv_len = count;
    req.link_len = 0;
    req.kind = RequestKind::FramedProtocol;
    req.channel = selector;
    tx_q.enqueue(req, Position::Tail);
}

fn checked(rc: i32) -> Result<RawFd, Error> {
    if rc < 0 {
        Err(std::io::Error::last_os_error().into())
    } else {
        Ok(rc)
    }
}
