// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The `Request`: the unit of work that flows between the free/rx/tx
//! queues. Grounded on `struct cbc_request` and the `IOC_MAX_REQUESTS`
//! preallocated pool in `original_source/hw/platform/ioc.c`'s
//! `ioc_init`/`ioc_build_request`.

use cbc_proto::tables::ChannelSelector;
use cbc_proto::CBC_MAX_LINK_SIZE;

/// How a request's buffer should be interpreted by the worker that
/// eventually drains it. `FramedProtocol` is stamped on a raw service
/// payload read straight from a native cdev: it still awaits the tx
/// handler's protocol (link-frame) packing, matching the original's
/// `CBC_REQ_T_PROT` tag on that same path. `Raw` is a complete link frame
/// already copied byte-for-byte out of the virtual-UART ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    FramedProtocol,
    Raw,
}

/// One slot of the preallocated request pool.
///
/// `hopped` guards the loopback-diagnostic two-hop path (spec §4.5): a
/// request that has already been routed once to the "opposite" queue is
/// marked so it cannot be routed a second time, which would otherwise let
/// a malformed handler bounce a request between queues forever instead of
/// eventually returning it to the free queue.
pub struct Request {
    pub buf: Vec<u8>,
    pub link_len: usize,
    pub srv_len: usize,
    pub channel: ChannelSelector,
    pub kind: RequestKind,
    pub hopped: bool,
}

impl Request {
    fn blank() -> Self {
        Self {
            buf: vec![0u8; CBC_MAX_LINK_SIZE],
            link_len: 0,
            srv_len: 0,
            channel: ChannelSelector::VirtualUart,
            kind: RequestKind::Raw,
            hopped: false,
        }
    }

    pub fn reset(&mut self) {
        self.link_len = 0;
        self.srv_len = 0;
        self.kind = RequestKind::Raw;
        self.hopped = false;
    }

    pub fn service_payload(&self) -> &[u8] {
        &self.buf[cbc_proto::CBC_SRV_POS..cbc_proto::CBC_SRV_POS + self.srv_len]
    }
}

/// The original's `IOC_MAX_REQUESTS`: how many in-flight requests the
/// mediator can buffer across all three queues at once.
pub const POOL_SIZE: usize = 64;

/// Builds the initial, fully-populated free queue contents. Ownership of
/// every `Request` moves between the three `Queue`s for the mediator's
/// lifetime; none is ever allocated or dropped after this point, which is
/// what gives the "no double free / bounded pool" testable properties
/// their Rust-native proof: there is exactly one `Vec<Request>` of length
/// `POOL_SIZE` and the type system, not a manual refcount, ensures each
/// `Request` lives in exactly one queue at a time.
pub fn new_pool() -> Vec<Request> {
    (0..POOL_SIZE).map(|_| Request::blank()).collect()
}
