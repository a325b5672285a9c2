// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The CBC service frame: the payload a link frame carries, expressed as
//! a sequence of signal and group items. The bit-level wire format of the
//! real CBC protocol is out of scope (spec §1); this is this
//! implementation's own concrete, testable encoding of "signals and
//! groups of signals", built only detailed enough to let the whitelist
//! filter and the end-to-end scenarios in spec §8 operate on real bytes.

use crate::Error;

const TAG_SIGNAL: u8 = 0;
const TAG_GROUP: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalFrame {
    pub id: u16,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFrame {
    pub id: u16,
    pub signals: Vec<SignalFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceItem {
    Signal(SignalFrame),
    Group(GroupFrame),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceFrame {
    pub items: Vec<ServiceItem>,
}

impl ServiceFrame {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for item in &self.items {
            match item {
                ServiceItem::Signal(s) => {
                    out.push(TAG_SIGNAL);
                    encode_signal(s, &mut out);
                }
                ServiceItem::Group(g) => {
                    out.push(TAG_GROUP);
                    out.extend_from_slice(&g.id.to_be_bytes());
                    out.push(g.signals.len() as u8);
                    for s in &g.signals {
                        encode_signal(s, &mut out);
                    }
                }
            }
        }
        out
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, Error> {
        let mut items = Vec::new();
        while !buf.is_empty() {
            let tag = take_u8(&mut buf)?;
            match tag {
                TAG_SIGNAL => items.push(ServiceItem::Signal(decode_signal(&mut buf)?)),
                TAG_GROUP => {
                    let id = take_u16(&mut buf)?;
                    let count = take_u8(&mut buf)? as usize;
                    let mut signals = Vec::with_capacity(count);
                    for _ in 0..count {
                        signals.push(decode_signal(&mut buf)?);
                    }
                    items.push(ServiceItem::Group(GroupFrame { id, signals }));
                }
                _ => return Err(Error::MalformedFrame),
            }
        }
        Ok(ServiceFrame { items })
    }
}

fn encode_signal(s: &SignalFrame, out: &mut Vec<u8>) {
    out.extend_from_slice(&s.id.to_be_bytes());
    out.push(s.value.len() as u8);
    out.extend_from_slice(&s.value);
}

fn decode_signal(buf: &mut &[u8]) -> Result<SignalFrame, Error> {
    let id = take_u16(buf)?;
    let len = take_u8(buf)? as usize;
    if buf.len() < len {
        return Err(Error::MalformedFrame);
    }
    let value = buf[..len].to_vec();
    *buf = &buf[len..];
    Ok(SignalFrame { id, value })
}

fn take_u8(buf: &mut &[u8]) -> Result<u8, Error> {
    let (first, rest) = buf.split_first().ok_or(Error::MalformedFrame)?;
    *buf = rest;
    Ok(*first)
}

fn take_u16(buf: &mut &[u8]) -> Result<u16, Error> {
    if buf.len() < 2 {
        return Err(Error::MalformedFrame);
    }
    let v = u16::from_be_bytes([buf[0], buf[1]]);
    *buf = &buf[2..];
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip_mixed_items() {
        let frame = ServiceFrame {
            items: vec![
                ServiceItem::Signal(SignalFrame {
                    id: 42,
                    value: vec![1, 2],
                }),
                ServiceItem::Group(GroupFrame {
                    id: 7,
                    signals: vec![SignalFrame {
                        id: 43,
                        value: vec![9],
                    }],
                }),
            ],
        };
        let bytes = frame.encode();
        let decoded = ServiceFrame::decode(&bytes).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn truncated_signal_is_malformed() {
        // tag + id but no length byte
        let bytes = [TAG_SIGNAL, 0, 1];
        assert!(ServiceFrame::decode(&bytes).is_err());
    }
}
