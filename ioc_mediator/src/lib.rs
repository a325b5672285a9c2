// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The IOC mediator: a three-thread engine bridging a guest-facing
//! virtual UART to the native CBC character devices of the host it runs
//! on. Grounded on `original_source/hw/platform/ioc.c`'s `ioc_init` /
//! `ioc_kill_workers` / `ioc_deinit` startup-shutdown sequence, restyled
//! after `rpc_protocol::server`'s connection-loop shape and
//! `server::ring`'s event-loop/completion-dispatch pattern.

pub mod channel;
pub mod config;
mod core;
pub mod error;
pub mod packet;
pub mod platform;
pub mod queue;
pub mod request;
mod workers;

use std::os::fd::RawFd;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::info;

use cbc_proto::tables::{rx_tables, tx_tables};
use cbc_proto::DirectionConfig;

use crate::channel::ChannelTable;
use crate::error::Error;
use crate::queue::Queue;

/// A running mediator: every channel fd, the three request queues, the
/// two directions' whitelist configuration, and the three worker
/// threads. Obtained only from `init`, which means a value of this type
/// can only exist if startup fully succeeded -- there is no "half
/// initialized" state to guard against at the type level.
///
/// Shutdown happens either via an explicit `deinit(self)` call or, if the
/// handle is dropped without one (an early return, a panic, a `let _ =`),
/// via `Drop`. Both paths run the same teardown, guarded by `closing` so
/// it only ever runs once.
pub struct IocMediator {
    channels: Arc<ChannelTable>,
    free_q: Arc<Queue>,
    rx_q: Arc<Queue>,
    tx_q: Arc<Queue>,
    closing: Arc<AtomicBool>,
    epfd: RawFd,
    core_handle: Option<JoinHandle<()>>,
    rx_handle: Option<JoinHandle<()>>,
    tx_handle: Option<JoinHandle<()>>,
}

impl IocMediator {
    /// Starts the mediator from a device-model-supplied init string
    /// (`"<virtual-uart-path>,<boot-reason>"`). Mirrors `ioc_init`'s
    /// order: platform-support check, init-string parse, channel table,
    /// request pool and queues, whitelist tables, then the rx/tx workers
    /// and finally the core task (started last so the workers are always
    /// ready to drain whatever the core task hands them).
    pub fn init(opts: &str) -> Result<Self, Error> {
        let sentinel = platform::early_signal_sentinel_path();
        if !platform::is_supported(&sentinel) {
            return Err(Error::PlatformUnsupported);
        }

        let params = config::parse_init_string(opts)?;
        info!(
            "ioc mediator starting, virtual uart at {}, boot reason {:#x}",
            params.virtual_uart_path, params.boot_reason
        );

        let channels = Arc::new(ChannelTable::open_all(Path::new(&params.virtual_uart_path))?);

        let free_q = Arc::new(Queue::non_blocking());
        free_q.seed(request::new_pool());
        let rx_q = Arc::new(Queue::blocking());
        let tx_q = Arc::new(Queue::blocking());

        // Boot reason is stamped once here, at worker start, and borrowed
        // by each handler call for the life of the worker -- never
        // re-read per packet (spec §9 item 3).
        let boot_reason = params.boot_reason;
        let rx_cfg = Arc::new(DirectionConfig::new(rx_tables()));
        let tx_cfg = Arc::new(DirectionConfig::new(tx_tables()));

        let closing = Arc::new(AtomicBool::new(false));

        // Thread creation failure is fatal-at-init (spec §7) and must tear
        // down, in reverse, whatever already started -- never panic, since
        // a panicking init would leave already-spawned worker threads
        // running with no `IocMediator` handle left to join them.
        let rx_handle = {
            let rx_q = rx_q.clone();
            let tx_q = tx_q.clone();
            let free_q = free_q.clone();
            let channels = channels.clone();
            let cfg = rx_cfg.clone();
            let closing_for_thread = closing.clone();
            std::thread::Builder::new()
                .name("ioc-rx".into())
                .spawn(move || {
                    workers::rx_worker(&rx_q, &tx_q, &free_q, &channels, &cfg, boot_reason, &closing_for_thread);
                })
                .map_err(Error::ThreadSpawnFailed)?
        };

        let tx_handle = {
            let rx_q_for_thread = rx_q.clone();
            let tx_q_for_thread = tx_q.clone();
            let free_q = free_q.clone();
            let channels = channels.clone();
            let cfg = tx_cfg.clone();
            let closing_for_thread = closing.clone();
            match std::thread::Builder::new().name("ioc-tx".into()).spawn(move || {
                workers::tx_worker(&rx_q_for_thread, &tx_q_for_thread, &free_q, &channels, &cfg, boot_reason, &closing_for_thread);
            }) {
                Ok(h) => h,
                Err(e) => {
                    closing.store(true, Ordering::SeqCst);
                    rx_q.notify_all();
                    let _ = rx_handle.join();
                    return Err(Error::ThreadSpawnFailed(e));
                }
            }
        };

        let epfd = match core::create_and_register(&channels) {
            Ok(fd) => fd,
            Err(e) => {
                closing.store(true, Ordering::SeqCst);
                tx_q.notify_all();
                let _ = tx_handle.join();
                rx_q.notify_all();
                let _ = rx_handle.join();
                return Err(e);
            }
        };

        let core_handle = {
            let channels = channels.clone();
            let free_q = free_q.clone();
            let rx_q_for_core = rx_q.clone();
            let tx_q_for_core = tx_q.clone();
            match std::thread::Builder::new().name("ioc-core".into()).spawn(move || {
                core::run(epfd, &channels, &free_q, &rx_q_for_core, &tx_q_for_core);
            }) {
                Ok(h) => h,
                Err(e) => {
                    closing.store(true, Ordering::SeqCst);
                    unsafe {
                        libc::close(epfd);
                    }
                    tx_q.notify_all();
                    let _ = tx_handle.join();
                    rx_q.notify_all();
                    let _ = rx_handle.join();
                    return Err(Error::ThreadSpawnFailed(e));
                }
            }
        };

        Ok(Self {
            channels,
            free_q,
            rx_q,
            tx_q,
            closing,
            epfd,
            core_handle: Some(core_handle),
            rx_handle: Some(rx_handle),
            tx_handle: Some(tx_handle),
        })
    }

    /// Tears the mediator down in the order `ioc_kill_workers` /
    /// `ioc_deinit` use: flip `closing`, close the epoll fd to interrupt
    /// the core task's blocked `epoll_wait`, join it, then wake and join
    /// each worker in turn. Calling this twice, or dropping the handle
    /// afterward, is harmless -- `teardown` only runs the sequence once.
    pub fn deinit(mut self) {
        self.teardown();
    }

    /// The shared teardown `deinit` and `Drop::drop` both call. Guarded by
    /// `closing`'s atomic swap rather than a separate flag: the first
    /// caller to observe `false` is the one that actually joins the
    /// threads and closes the epoll fd, so an explicit `deinit` followed
    /// by the subsequent `Drop::drop` (or two paths racing on a
    /// `Drop`-only teardown) never double-close the fd or double-join a
    /// handle.
    fn teardown(&mut self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        unsafe {
            libc::close(self.epfd);
        }
        if let Some(h) = self.core_handle.take() {
            let _ = h.join();
        }

        self.rx_q.notify_all();
        if let Some(h) = self.rx_handle.take() {
            let _ = h.join();
        }

        self.tx_q.notify_all();
        if let Some(h) = self.tx_handle.take() {
            let _ = h.join();
        }

        // `self.channels` drops once this value itself drops (its `Arc`
        // refcount is now back down to one, since both workers and the
        // core task have exited and released their clones), closing
        // every channel fd and removing the virtual UART's guest-facing
        // symlink.
        info!("ioc mediator stopped");
    }
}

impl Drop for IocMediator {
    /// Catches the handle being dropped without an explicit `deinit`
    /// call -- a panic, an early return, a `let _ = init(...)?` -- so the
    /// §4.5 shutdown guarantees hold regardless of how the value meets
    /// its end, not only on the happy path.
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_rejects_an_unsupported_platform() {
        // The sentinel path is a fixed, well-known device node; on any
        // machine running this test suite it will not exist.
        let result = IocMediator::init("/tmp/whatever,1");
        assert!(matches!(result, Err(Error::PlatformUnsupported)));
    }
}
