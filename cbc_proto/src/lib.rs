// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Codec for the carrier-board communication (CBC) link protocol used
//! between the IOC mediator and the guest-facing virtual UART.
//!
//! This crate owns everything the spec calls the "external contract
//! surface": the ring buffer that accumulates virtual-UART bytes, the
//! link-frame encoder/decoder, the service-frame signal/group layer, and
//! the per-direction configuration and whitelist tables. It knows nothing
//! about threads, queues, or native device nodes -- those live in
//! `ioc_mediator`.

pub mod link;
pub mod ring;
pub mod service;
pub mod tables;
pub mod testing;
pub mod whitelist;

use std::fmt;

pub use link::{Framer, LinkDecodeOutcome, CBC_MAX_LINK_SIZE, CBC_MAX_SERVICE_SIZE, CBC_SRV_POS};
pub use ring::RingBuffer;
pub use service::{GroupFrame, ServiceFrame, ServiceItem, SignalFrame};
pub use tables::{ChannelSelector, CbcDirectionTables};
pub use whitelist::{DirectionConfig, Whitelist};

/// Errors that can arise while framing or filtering CBC traffic.
#[derive(Debug)]
pub enum Error {
    /// The ring buffer does not have room for any more bytes. This should
    /// never happen in practice because the ring is sized to the largest
    /// possible link frame and bytes are drained as frames complete, but a
    /// caller that never reads the ring could in principle fill it.
    RingFull,

    /// A link frame was syntactically malformed (bad delimiter, checksum
    /// mismatch, or a length that overruns the declared maximum). The
    /// caller should skip one byte and keep scanning.
    MalformedFrame,

    /// A service frame item referenced an unknown channel selector.
    UnknownChannel(u8),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RingFull => write!(f, "ring buffer is full"),
            Self::MalformedFrame => write!(f, "malformed CBC link frame"),
            Self::UnknownChannel(c) => write!(f, "unknown CBC channel selector {c}"),
        }
    }
}
