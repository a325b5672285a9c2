// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The free/rx/tx intrusive queues, reworked as an owning
//! `Mutex<VecDeque<Request>>` plus an optional `Condvar`. Grounded on
//! `original_source/hw/platform/ioc.c`'s `cbc_request_enqueue` /
//! `cbc_request_dequeue` and the `SIMPLEQ_*` free-queue buffer pattern.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::request::Request;

/// Where a request should land in a queue. The original always appends
/// (`to_head = false`) except for the single-hop reroute from rx thread
/// to the tx queue head (and the symmetric tx-to-rx case), which jumps the
/// line ahead of anything already waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Head,
    Tail,
}

/// A queue of in-flight requests. The free queue is polled without
/// blocking (the core thread must never stall waiting for a free slot);
/// the rx/tx queues block their worker thread until work arrives or the
/// mediator is closing, so only they carry a `Condvar`.
pub struct Queue {
    inner: Mutex<VecDeque<Request>>,
    cond: Option<Condvar>,
}

impl Queue {
    /// A blocking queue: `dequeue_blocking` parks its caller until an item
    /// arrives or the queue is closed.
    pub fn blocking() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            cond: Some(Condvar::new()),
        }
    }

    /// A non-blocking queue (the free queue): `try_dequeue` never waits.
    pub fn non_blocking() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            cond: None,
        }
    }

    pub fn seed(&self, items: impl IntoIterator<Item = Request>) {
        let mut guard = self.inner.lock().unwrap();
        guard.extend(items);
    }

    pub fn enqueue(&self, req: Request, pos: Position) {
        let mut guard = self.inner.lock().unwrap();
        match pos {
            Position::Head => guard.push_front(req),
            Position::Tail => guard.push_back(req),
        }
        if let Some(cond) = &self.cond {
            cond.notify_one();
        }
    }

    /// Non-blocking pop from the head. Used by the core thread against the
    /// free queue, matching `cbc_request_dequeue(CBC_QUEUE_T_FREE)`.
    pub fn try_dequeue(&self) -> Option<Request> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Blocks until an item is available or `closing` flips true, in which
    /// case it returns `None` so the worker can exit its loop. Mirrors the
    /// `pthread_cond_wait` loop in `ioc_rx_thread`/`ioc_tx_thread`.
    pub fn dequeue_blocking(&self, closing: &std::sync::atomic::AtomicBool) -> Option<Request> {
        use std::sync::atomic::Ordering;

        let cond = self.cond.as_ref().expect("dequeue_blocking on a non-blocking queue");
        let mut guard = self.inner.lock().unwrap();
        loop {
            if let Some(req) = guard.pop_front() {
                return Some(req);
            }
            if closing.load(Ordering::SeqCst) {
                return None;
            }
            guard = cond.wait(guard).unwrap();
        }
    }

    /// Wakes a thread parked in `dequeue_blocking` so it can observe
    /// `closing` and exit, even with nothing queued.
    pub fn notify_all(&self) {
        if let Some(cond) = &self.cond {
            cond.notify_all();
        }
    }

    /// Current queue depth. Used by tests to check the pool-conservation
    /// invariant; not consulted by the core task or workers themselves.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
