// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

use cbc_proto::tables::ChannelSelector;

/// Errors that can arise while starting, running, or tearing down the
/// mediator. Mirrors `rpc_protocol::Error`'s shape: one enum, a `Display`
/// impl that's useful in a log line, and `From` conversions at the I/O
/// boundary so `?` works end to end.
#[derive(Debug)]
pub enum Error {
    /// The running kernel/board does not expose the early-signal sentinel
    /// device, so CBC is not present on this platform.
    PlatformUnsupported,

    /// `ioc_parse`'s boot-reason field was zero or absent. The original
    /// treats a zero boot reason as "do not start".
    MissingBootReason,

    /// The init string's virtual UART path would not fit in the
    /// original's 32-byte buffer. The C implementation silently
    /// truncates with `snprintf`; this implementation refuses instead
    /// (see DESIGN.md).
    VirtualUartPathTooLong { len: usize, max: usize },

    /// A channel the mediator cannot run without failed to open.
    CriticalChannelUnavailable(ChannelSelector),

    /// The OS refused to spawn one of the three worker threads.
    ThreadSpawnFailed(std::io::Error),

    /// I/O failure opening, reading, or writing a channel.
    Io(std::io::Error),

    /// A CBC framing/whitelist error surfaced from `cbc_proto`.
    Proto(cbc_proto::Error),

    /// `deinit` (or drop) was asked to tear down a mediator that was
    /// already torn down.
    AlreadyClosed,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Proto(e) => Some(e),
            Self::ThreadSpawnFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlatformUnsupported => {
                write!(f, "current platform does not support the IOC mediator")
            }
            Self::MissingBootReason => write!(f, "ioc mediator requires a non-zero boot reason"),
            Self::VirtualUartPathTooLong { len, max } => write!(
                f,
                "virtual UART path is {len} bytes, longer than the {max}-byte limit"
            ),
            Self::CriticalChannelUnavailable(c) => {
                write!(f, "critical channel {c:?} failed to open")
            }
            Self::ThreadSpawnFailed(e) => write!(f, "failed to spawn worker thread: {e}"),
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::Proto(e) => write!(f, "cbc protocol error: {e}"),
            Self::AlreadyClosed => write!(f, "ioc mediator is already shut down"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<cbc_proto::Error> for Error {
    fn from(e: cbc_proto::Error) -> Self {
        Self::Proto(e)
    }
}

impl From<nix::Error> for Error {
    fn from(e: nix::Error) -> Self {
        Self::Io(std::io::Error::from(e))
    }
}
