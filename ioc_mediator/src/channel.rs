// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Native CBC cdevs and the virtual UART, opened and addressed through
//! the shared `ChannelSelector` index space. Grounded on
//! `original_source/hw/platform/ioc.c`'s `ioc_open_native_ch` /
//! `ioc_open_virtual_uart` / `ioc_ch_recv` / `ioc_ch_xmit` / `ioc_ch_tbl`.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};

use log::warn;
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::sys::termios::{self, SetArg};
use nix::unistd::{self, symlinkat};

use cbc_proto::tables::ChannelSelector;

use crate::error::Error;

/// Whether the channel at this index is opened at all. Matches the
/// `IOC_CH_ON`/`IOC_CH_OFF` column of `ioc_ch_tbl`: platform management,
/// the early-signal sentinel, diagnostic, DLT, and LinDA are compiled in
/// but left closed by default.
fn enabled_by_default(selector: ChannelSelector) -> bool {
    !matches!(
        selector,
        ChannelSelector::Pmt
            | ChannelSelector::EarlySignal
            | ChannelSelector::Diagnostic
            | ChannelSelector::Dlt
            | ChannelSelector::Linda
    )
}

/// Whether a channel must open successfully for the mediator to start at
/// all, matching `ioc_ch_init`'s special-case check on `IOC_NATIVE_LFCC`
/// and `IOC_VIRTUAL_UART`.
fn is_critical(selector: ChannelSelector) -> bool {
    matches!(selector, ChannelSelector::Lifecycle | ChannelSelector::VirtualUart)
}

/// Default device node path for a native channel. Real board images fix
/// these under `/dev`; the names mirror the original's `ioc_ch_tbl`
/// comments.
fn default_native_path(selector: ChannelSelector) -> Option<PathBuf> {
    let name = match selector {
        ChannelSelector::Pmt => "cbc-platform-mgt",
        ChannelSelector::Lifecycle => "cbc-lifecycle",
        ChannelSelector::Signal => "cbc-signals",
        ChannelSelector::EarlySignal => "cbc-early-signal",
        ChannelSelector::Diagnostic => "cbc-diagnosis",
        ChannelSelector::Dlt => "cbc-dlt",
        ChannelSelector::Linda => "cbc-linda",
        ChannelSelector::Raw0 => "cbc-oem-raw0",
        ChannelSelector::Raw1 => "cbc-oem-raw1",
        ChannelSelector::Raw2 => "cbc-oem-raw2",
        ChannelSelector::Raw3 => "cbc-oem-raw3",
        ChannelSelector::Raw4 => "cbc-oem-raw4",
        ChannelSelector::Raw5 => "cbc-oem-raw5",
        ChannelSelector::Raw6 => "cbc-oem-raw6",
        ChannelSelector::Raw7 => "cbc-oem-raw7",
        ChannelSelector::Raw8 => "cbc-oem-raw8",
        ChannelSelector::Raw9 => "cbc-oem-raw9",
        ChannelSelector::Raw10 => "cbc-oem-raw10",
        ChannelSelector::Raw11 => "cbc-oem-raw11",
        ChannelSelector::VirtualUart => return None,
    };
    Some(PathBuf::from("/dev").join(name))
}

/// One open channel: either a native cdev fd, or the PTY master end of the
/// virtual UART.
pub struct Channel {
    fd: OwnedFd,
}

impl Channel {
    fn open_native(path: &Path) -> Result<Self, Error> {
        let fd = open(path, OFlag::O_RDWR | OFlag::O_NOCTTY | OFlag::O_NONBLOCK, Mode::empty())?;
        Ok(Self { fd })
    }

    /// Opens the PTY master for the virtual UART and publishes its slave
    /// side at `guest_path`, matching `ioc_open_virtual_uart`: grant/unlock
    /// the pty, symlink the slave name to the well-known guest-facing
    /// path, put the line into raw mode, and set `CLOCAL` so the mediator
    /// isn't disconnected if nothing has opened the slave yet.
    fn open_virtual_uart(guest_path: &Path) -> Result<Self, Error> {
        use nix::pty::{grantpt, unlockpt, PtyMaster};
        use std::os::fd::AsFd;

        let master: PtyMaster = nix::pty::posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY | OFlag::O_NONBLOCK)?;
        grantpt(&master)?;
        unlockpt(&master)?;
        let slave_name = nix::pty::ptsname_r(&master)?;

        match std::fs::remove_file(guest_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        symlinkat(slave_name.as_str(), None, guest_path)?;

        if let Err(e) = nix::sys::stat::fchmodat(
            None,
            guest_path,
            Mode::from_bits_truncate(0o660),
            nix::sys::stat::FchmodatFlags::FollowSymlink,
        ) {
            let _ = std::fs::remove_file(guest_path);
            return Err(e.into());
        }

        let mut attr = termios::tcgetattr(master.as_fd())?;
        termios::cfmakeraw(&mut attr);
        attr.control_flags.insert(termios::ControlFlags::CLOCAL);
        termios::tcsetattr(master.as_fd(), SetArg::TCSANOW, &attr)?;

        Ok(Self {
            fd: master.into(),
        })
    }

    /// Reads whatever is available right now. Non-blocking; `EAGAIN`
    /// surfaces as `Ok(0)` rather than an error, matching the original's
    /// comment that level-triggered epoll makes `EAGAIN` harmless to
    /// ignore.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize, Error> {
        match unistd::read(&self.fd, buf) {
            Ok(n) => Ok(n),
            Err(nix::Error::EAGAIN) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes all of `buf`, looping past short writes like
    /// `ioc_ch_xmit`.
    pub fn xmit(&self, buf: &[u8]) -> Result<usize, Error> {
        let mut count = 0;
        while count < buf.len() {
            match unistd::write(&self.fd, &buf[count..]) {
                Ok(n) => count += n,
                Err(nix::Error::EAGAIN) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(count)
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Opens a PTY master with nothing symlinked to the slave side: a
    /// loopback debug channel a developer attaches to directly via the
    /// logged slave path. Grounded on the `IOC_DUMMY` channels
    /// `ioc_ch_init` opens under `#ifdef IOC_DUMMY`.
    #[cfg(feature = "dummy")]
    fn open_dummy() -> Result<Self, Error> {
        use nix::pty::{grantpt, posix_openpt, ptsname_r, unlockpt, PtyMaster};
        use std::os::fd::AsFd;

        let master: PtyMaster =
            nix::pty::posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY | OFlag::O_NONBLOCK)?;
        grantpt(&master)?;
        unlockpt(&master)?;
        let slave_name = ptsname_r(&master)?;
        log::info!("ioc dummy channel pty slave node at {slave_name}");

        let mut attr = termios::tcgetattr(master.as_fd())?;
        termios::cfmakeraw(&mut attr);
        attr.control_flags.insert(termios::ControlFlags::CLOCAL);
        termios::tcsetattr(master.as_fd(), SetArg::TCSANOW, &attr)?;

        Ok(Self { fd: master.into() })
    }
}

/// A dummy debug channel (see the `dummy` Cargo feature): an independent
/// PTY loopback whose traffic is re-labelled to `remapped` on receipt, per
/// spec §9's "treat each dummy channel independently, no fall-through".
#[cfg(feature = "dummy")]
pub struct DummyChannel {
    pub channel: Channel,
    pub remapped: ChannelSelector,
}

#[cfg(feature = "dummy")]
fn open_dummy_channels() -> Result<Vec<DummyChannel>, Error> {
    // Matches `ioc_process_tx`'s `#ifdef IOC_DUMMY` remap of dummy channel
    // ids to LFCC / SIGNAL / RAW11.
    let remaps = [
        ChannelSelector::Lifecycle,
        ChannelSelector::Signal,
        ChannelSelector::Raw11,
    ];
    let mut out = Vec::with_capacity(remaps.len());
    for remapped in remaps {
        out.push(DummyChannel {
            channel: Channel::open_dummy()?,
            remapped,
        });
    }
    Ok(out)
}

/// The fixed-size set of every logical channel, open or not. Indexing is
/// the single source of truth shared with the link-frame channel byte, so
/// there is no separate lookup table to keep in sync.
pub struct ChannelTable {
    channels: [Option<Channel>; cbc_proto::tables::CHANNEL_COUNT],
    pub virtual_uart_guest_path: PathBuf,
    #[cfg(feature = "dummy")]
    dummy_channels: Vec<DummyChannel>,
}

impl ChannelTable {
    /// Opens every enabled channel, returning an error if a critical one
    /// fails. Mirrors `ioc_ch_init`'s loop, including its "skip channels
    /// marked off" behavior.
    pub fn open_all(virtual_uart_guest_path: &Path) -> Result<Self, Error> {
        let mut channels: [Option<Channel>; cbc_proto::tables::CHANNEL_COUNT] =
            std::array::from_fn(|_| None);

        for selector in ChannelSelector::ALL {
            if !enabled_by_default(selector) {
                continue;
            }

            let opened = if selector == ChannelSelector::VirtualUart {
                Channel::open_virtual_uart(virtual_uart_guest_path)
            } else {
                let path = default_native_path(selector).expect("native channel has a path");
                Channel::open_native(&path)
            };

            match opened {
                Ok(channel) => channels[selector.index()] = Some(channel),
                Err(e) if is_critical(selector) => {
                    warn!("ioc critical channel {selector:?} failed to open: {e}");
                    return Err(Error::CriticalChannelUnavailable(selector));
                }
                Err(e) => {
                    warn!("ioc channel {selector:?} failed to open, disabling it: {e}");
                    continue;
                }
            }
        }

        Ok(Self {
            channels,
            virtual_uart_guest_path: virtual_uart_guest_path.to_path_buf(),
            #[cfg(feature = "dummy")]
            dummy_channels: open_dummy_channels()?,
        })
    }

    pub fn get(&self, selector: ChannelSelector) -> Option<&Channel> {
        self.channels[selector.index()].as_ref()
    }

    pub fn iter_open(&self) -> impl Iterator<Item = (ChannelSelector, &Channel)> {
        ChannelSelector::ALL
            .into_iter()
            .filter_map(move |s| self.channels[s.index()].as_ref().map(|c| (s, c)))
    }

    #[cfg(feature = "dummy")]
    pub fn iter_dummy(&self) -> impl Iterator<Item = (usize, &DummyChannel)> {
        self.dummy_channels.iter().enumerate()
    }

    #[cfg(feature = "dummy")]
    pub fn dummy_channel(&self, index: usize) -> Option<&DummyChannel> {
        self.dummy_channels.get(index)
    }
}

impl Drop for ChannelTable {
    /// Closes every open fd (via `OwnedFd`'s own `Drop`) and removes the
    /// guest-facing symlink `ioc_ch_deinit` never bothered to clean up.
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.virtual_uart_guest_path);
    }
}
