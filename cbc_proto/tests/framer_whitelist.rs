// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! End-to-end coverage of the framer and whitelist working together: bytes
//! written on one socketpair endpoint, accumulated through a `RingBuffer`,
//! recognized as a link frame, decoded, and filtered by a direction's
//! whitelist -- the same pipeline `ioc_mediator`'s workers run per byte of
//! virtual-UART traffic.

use std::io::{Read, Write};

use cbc_proto::tables::{ids, tx_tables};
use cbc_proto::{DirectionConfig, Framer, LinkDecodeOutcome, RingBuffer};
use cbc_proto::testing::{encode_single_signal_link_frame, pipe};
use cbc_proto::tables::ChannelSelector;

#[test]
fn bytes_from_a_pipe_accumulate_into_a_decodable_frame() {
    let (mut tx, mut rx) = pipe().unwrap();
    let frame_bytes =
        encode_single_signal_link_frame(ChannelSelector::Signal, ids::SIG_ID_ATEMP, &[0, 42]);
    tx.write_all(&frame_bytes).unwrap();

    let mut ring = RingBuffer::new();
    let mut scratch = [0u8; 64];
    loop {
        let n = rx.read(&mut scratch).unwrap();
        assert!(n > 0);
        Framer::copy_to_ring(&mut ring, &scratch[..n]).unwrap();
        if matches!(Framer::peek(&ring), LinkDecodeOutcome::Frame { .. }) {
            break;
        }
    }

    let LinkDecodeOutcome::Frame { link_len, .. } = Framer::peek(&ring) else {
        panic!("expected a complete frame");
    };
    let mut buf = vec![0u8; link_len];
    Framer::take_link_frame(&mut ring, &mut buf, link_len);

    let (channel, service) = Framer::decode_link(&buf).unwrap();
    assert_eq!(channel, ChannelSelector::Signal);

    let cfg = DirectionConfig::new(tx_tables());
    let filtered = cfg.filter(&service);
    assert_eq!(filtered.items.len(), 1, "SIG_ID_ATEMP is individually whitelisted");
}

#[test]
fn whitelist_is_a_strict_subset_of_the_signal_table() {
    // Testable property from the spec: every whitelisted signal/group id
    // must also appear in that direction's signal/group table. A dangling
    // whitelist entry would admit traffic for a signal the platform never
    // declared active.
    let tx = tx_tables();
    for id in &tx.wlist_signals {
        assert!(
            tx.signal_table.iter().any(|s| s.id == *id),
            "tx whitelist references unknown signal id {id}"
        );
    }
    for id in &tx.wlist_groups {
        assert!(
            tx.group_table.iter().any(|g| g.id == *id),
            "tx whitelist references unknown group id {id}"
        );
    }
}
