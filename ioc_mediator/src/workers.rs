// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The rx and tx worker thread bodies. Grounded on
//! `original_source/hw/platform/ioc.c`'s `ioc_rx_thread` / `ioc_tx_thread`:
//! block on the direction's queue, run the handler, then either hand the
//! result to a device write or reroute it to the opposite queue's head.

use std::sync::atomic::AtomicBool;

use log::warn;

use cbc_proto::DirectionConfig;

use crate::channel::ChannelTable;
use crate::packet::{self, NextQueue};
use crate::queue::{Position, Queue};

/// Drains `rx_q` until closed: decode-and-filter guest-origin traffic,
/// then write the result to the native channel the link frame named.
/// Matches `ioc_rx_thread`'s loop body (`cbc_rx_handler` + dispatch).
pub fn rx_worker(
    rx_q: &Queue,
    tx_q: &Queue,
    free_q: &Queue,
    channels: &ChannelTable,
    cfg: &DirectionConfig,
    boot_reason: u32,
    closing: &AtomicBool,
) {
    while let Some(mut req) = rx_q.dequeue_blocking(closing) {
        match packet::rx_handler(&mut req, cfg, boot_reason) {
            NextQueue::Free => {
                if let Some(channel) = channels.get(req.channel) {
                    if let Err(e) = channel.xmit(req.service_payload()) {
                        warn!("ioc rx worker failed to write {:?}: {e}", req.channel);
                    }
                } else {
                    warn!("ioc rx worker has no open channel for {:?}", req.channel);
                }
                free_q.enqueue(req, Position::Tail);
            }
            NextQueue::Tx => tx_q.enqueue(req, Position::Head),
            NextQueue::Rx => rx_q.enqueue(req, Position::Head),
        }
    }
}

/// Drains `tx_q` until closed: decode-and-filter native-origin traffic,
/// re-encode as a link frame, then write it to the virtual UART. Matches
/// `ioc_tx_thread`'s loop body (`cbc_tx_handler` + dispatch).
pub fn tx_worker(
    rx_q: &Queue,
    tx_q: &Queue,
    free_q: &Queue,
    channels: &ChannelTable,
    cfg: &DirectionConfig,
    boot_reason: u32,
    closing: &AtomicBool,
) {
    while let Some(mut req) = tx_q.dequeue_blocking(closing) {
        match packet::tx_handler(&mut req, cfg, boot_reason) {
            NextQueue::Free => {
                let destination = packet::tx_destination();
                if let Some(channel) = channels.get(destination) {
                    if let Err(e) = channel.xmit(&req.buf[..req.link_len]) {
                        warn!("ioc tx worker failed to write the virtual uart: {e}");
                    }
                } else {
                    warn!("ioc tx worker has no open virtual uart channel");
                }
                free_q.enqueue(req, Position::Tail);
            }
            NextQueue::Rx => rx_q.enqueue(req, Position::Head),
            NextQueue::Tx => tx_q.enqueue(req, Position::Head),
        }
    }
}
