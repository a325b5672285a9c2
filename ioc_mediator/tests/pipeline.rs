// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! End-to-end exercise of the queue/handler pipeline without real device
//! nodes: seeds the free pool, drives requests through `rx_handler` /
//! `tx_handler` the way the rx/tx workers would, and checks the
//! conservation invariant spec §4.3 calls out -- every request started in
//! the free pool is, at any point in time, in exactly one of the three
//! queues.

use cbc_proto::tables::{ids, rx_tables, tx_tables, ChannelSelector};
use cbc_proto::{DirectionConfig, Framer, GroupFrame, ServiceFrame, ServiceItem, SignalFrame};
use ioc_mediator::packet::{rx_handler, tx_handler, NextQueue, GRP_ID_LOOPBACK_DIAGNOSTIC};
use ioc_mediator::queue::{Position, Queue};
use ioc_mediator::request::{new_pool, RequestKind, POOL_SIZE};

fn total_requests(queues: &[&Queue]) -> usize {
    queues.iter().map(|q| q.len()).sum()
}

#[test]
fn pool_size_is_conserved_as_requests_move_between_queues() {
    let free_q = Queue::non_blocking();
    let rx_q = Queue::non_blocking();
    let tx_q = Queue::non_blocking();

    free_q.seed(new_pool());
    assert_eq!(total_requests(&[&free_q, &rx_q, &tx_q]), POOL_SIZE);

    // Move one request into "rx" as if the core task had just built a
    // link frame for it.
    let mut req = free_q.try_dequeue().unwrap();
    let service = ServiceFrame {
        items: vec![ServiceItem::Signal(SignalFrame {
            id: ids::SIG_ID_ATEMP,
            value: vec![0, 1],
        })],
    };
    let mut link = Vec::new();
    Framer::encode_link(ChannelSelector::Lifecycle, &service.encode(), &mut link);
    req.buf[..link.len()].copy_from_slice(&link);
    req.link_len = link.len();
    req.kind = RequestKind::Raw;
    rx_q.enqueue(req, Position::Tail);

    assert_eq!(total_requests(&[&free_q, &rx_q, &tx_q]), POOL_SIZE);

    // rx worker runs the handler and returns the request to free.
    let rx_cfg = DirectionConfig::new(tx_tables());
    let mut req = rx_q.try_dequeue().unwrap();
    let next = rx_handler(&mut req, &rx_cfg, 1);
    assert_eq!(next, NextQueue::Free);
    free_q.enqueue(req, Position::Tail);

    assert_eq!(total_requests(&[&free_q, &rx_q, &tx_q]), POOL_SIZE);
    assert_eq!(free_q.len(), POOL_SIZE);
}

#[test]
fn loopback_diagnostic_round_trips_through_both_handlers_via_the_queues() {
    let free_q = Queue::non_blocking();
    let rx_q = Queue::non_blocking();
    let tx_q = Queue::non_blocking();
    free_q.seed(new_pool());

    let mut req = free_q.try_dequeue().unwrap();
    let service = ServiceFrame {
        items: vec![ServiceItem::Group(GroupFrame {
            id: GRP_ID_LOOPBACK_DIAGNOSTIC,
            signals: vec![SignalFrame {
                id: 4242,
                value: vec![9],
            }],
        })],
    };
    let mut link = Vec::new();
    Framer::encode_link(ChannelSelector::Diagnostic, &service.encode(), &mut link);
    req.buf[..link.len()].copy_from_slice(&link);
    req.link_len = link.len();
    req.kind = RequestKind::Raw;
    rx_q.enqueue(req, Position::Tail);

    let rx_cfg = DirectionConfig::new(rx_tables());
    let mut req = rx_q.try_dequeue().unwrap();
    let next = rx_handler(&mut req, &rx_cfg, 7);
    assert_eq!(next, NextQueue::Tx);
    tx_q.enqueue(req, Position::Head);

    assert_eq!(total_requests(&[&free_q, &rx_q, &tx_q]), POOL_SIZE);

    let tx_cfg = DirectionConfig::new(tx_tables());
    let mut req = tx_q.try_dequeue().unwrap();
    let next = tx_handler(&mut req, &tx_cfg, 7);
    assert_eq!(next, NextQueue::Free);

    let (channel, decoded) = Framer::decode_link(&req.buf[..req.link_len]).unwrap();
    assert_eq!(channel, ChannelSelector::Diagnostic);
    assert_eq!(decoded.items.len(), 1);
    free_q.enqueue(req, Position::Tail);

    assert_eq!(total_requests(&[&free_q, &rx_q, &tx_q]), POOL_SIZE);
    assert_eq!(free_q.len(), POOL_SIZE);
}

#[test]
fn non_whitelisted_traffic_is_silently_dropped_and_its_request_freed() {
    let free_q = Queue::non_blocking();
    let rx_q = Queue::non_blocking();

    free_q.seed(new_pool());
    let mut req = free_q.try_dequeue().unwrap();
    let service = ServiceFrame {
        items: vec![ServiceItem::Signal(SignalFrame {
            id: ids::SIG_ID_VSWA, // not in the tx whitelist
            value: vec![1],
        })],
    };
    let mut link = Vec::new();
    Framer::encode_link(ChannelSelector::Lifecycle, &service.encode(), &mut link);
    req.buf[..link.len()].copy_from_slice(&link);
    req.link_len = link.len();
    req.kind = RequestKind::Raw;
    rx_q.enqueue(req, Position::Tail);

    let cfg = DirectionConfig::new(tx_tables());
    let mut req = rx_q.try_dequeue().unwrap();
    let next = rx_handler(&mut req, &cfg, 1);
    assert_eq!(next, NextQueue::Free);
    assert_eq!(req.srv_len, 0, "dropped signal leaves an empty service payload");
    free_q.enqueue(req, Position::Tail);

    assert_eq!(free_q.len(), POOL_SIZE);
}
