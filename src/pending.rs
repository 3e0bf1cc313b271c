//! Tracking of deferred expression evaluations.
//!
//! When the server answers an expression check with `waiting` it hands out
//! a label; the poller keeps asking `chkpending.txt` about all open labels
//! with an exponentially growing delay until every one of them has
//! resolved. A freshly added label aborts any armed timer and polls right
//! away.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use futures::stream::{AbortHandle, Abortable};
use wasm_bindgen_futures::spawn_local;

use crate::{
    protocol::{self, ResultKind},
    request::{self, Endpoint},
    session::Session,
    timeout::timeout,
};

/// The set of labels whose result is not yet known.
///
/// Resolved labels leave a zeroed slot behind which the next insertion
/// reuses, so labels keep a stable position for the lifetime of the page.
pub(crate) struct PendingSet {
    labels: Vec<u32>,
}

impl PendingSet {
    pub(crate) fn new() -> Self {
        Self { labels: Vec::new() }
    }

    pub(crate) fn insert(&mut self, label: u32) {
        match self.labels.iter_mut().find(|slot| **slot == 0) {
            Some(slot) => *slot = label,
            None => self.labels.push(label),
        }
    }

    /// Removes `label`; returns whether it was present.
    pub(crate) fn resolve(&mut self, label: u32) -> bool {
        if label == 0 {
            return false;
        }
        let mut found = false;
        for slot in &mut self.labels {
            if *slot == label {
                *slot = 0;
                found = true;
            }
        }
        found
    }

    pub(crate) fn has_open(&self) -> bool {
        self.labels.iter().any(|slot| *slot != 0)
    }

    /// The comma-joined label list sent to `chkpending.txt`; empty when
    /// there is nothing to ask about.
    pub(crate) fn request_list(&self) -> String {
        let mut list = String::new();
        for slot in &self.labels {
            if *slot != 0 {
                if !list.is_empty() {
                    list.push(',');
                }
                list.push_str(&slot.to_string());
            }
        }
        list
    }
}

/// Delay between successive polls, in seconds: 1, 2, 4, 8, 16, 30, 60,
/// 60, ... New work resets it so the first retry is immediate.
pub(crate) struct Backoff {
    delay: u32,
}

impl Backoff {
    pub(crate) fn new() -> Self {
        Self { delay: 0 }
    }

    pub(crate) fn reset(&mut self) {
        self.delay = 0;
    }

    pub(crate) fn next(&mut self) -> u32 {
        self.delay += self.delay;
        if self.delay >= 60 {
            self.delay = 60;
        } else if self.delay > 30 {
            self.delay = 30;
        } else if self.delay < 1 {
            self.delay = 1;
        }
        self.delay
    }
}

/// Drives the pending polls on the page's event loop.
///
/// At most one `chkpending.txt` request is in flight at a time; transport
/// failures are treated like a poll that resolved nothing, so polling
/// self-heals and never surfaces an error.
pub(crate) struct PendingPoller {
    session: Session,
    labels: RefCell<PendingSet>,
    backoff: RefCell<Backoff>,
    request_in_flight: Cell<bool>,
    armed_timer: RefCell<Option<AbortHandle>>,
    on_result: Box<dyn Fn(u32, ResultKind)>,
}

impl PendingPoller {
    pub(crate) fn new(session: Session, on_result: impl Fn(u32, ResultKind) + 'static) -> Rc<Self> {
        Rc::new(Self {
            session,
            labels: RefCell::new(PendingSet::new()),
            backoff: RefCell::new(Backoff::new()),
            request_in_flight: Cell::new(false),
            armed_timer: RefCell::new(None),
            on_result: Box::new(on_result),
        })
    }

    /// Registers a freshly deferred evaluation: the backoff restarts and
    /// any armed (not yet fired) timer is cancelled in favor of an
    /// immediate poll.
    pub(crate) fn add_label(self: &Rc<Self>, label: u32) {
        if let Some(timer) = self.armed_timer.borrow_mut().take() {
            timer.abort();
        }
        self.backoff.borrow_mut().reset();
        self.labels.borrow_mut().insert(label);
        self.poll();
    }

    /// Adopts labels already known at page load (rows still marked
    /// waiting) and arms the first poll without issuing one right away.
    pub(crate) fn seed(self: &Rc<Self>, labels: impl IntoIterator<Item = u32>) {
        for label in labels {
            self.labels.borrow_mut().insert(label);
        }
        self.schedule_next();
    }

    /// Issues one poll for all open labels. A no-op while a request is
    /// already in flight or when nothing is pending.
    pub(crate) fn poll(self: &Rc<Self>) {
        if self.request_in_flight.get() {
            return;
        }
        let what = self.labels.borrow().request_list();
        if what.is_empty() {
            return;
        }
        self.request_in_flight.set(true);
        let poller = self.clone();
        spawn_local(async move {
            if let Ok(body) =
                request::get_text(&poller.session, Endpoint::CheckPending, &[("what", &what)])
                    .await
            {
                for (label, result) in protocol::parse_pending(&body) {
                    if let Some(kind) = result {
                        poller.resolve(label, kind);
                    }
                }
            }
            poller.request_in_flight.set(false);
            poller.schedule_next();
        });
    }

    fn resolve(&self, label: u32, kind: ResultKind) {
        if self.labels.borrow_mut().resolve(label) {
            (self.on_result)(label, kind);
        }
    }

    fn schedule_next(self: &Rc<Self>) {
        if !self.labels.borrow().has_open() {
            return;
        }
        let delay_seconds = self.backoff.borrow_mut().next();
        let (handle, registration) = AbortHandle::new_pair();
        *self.armed_timer.borrow_mut() = Some(handle);
        let poller = self.clone();
        spawn_local(async move {
            let timer = Abortable::new(timeout((delay_seconds * 1000) as i32), registration);
            if timer.await.is_ok() {
                poller.poll();
            }
        });
    }
}

#[cfg(test)]
mod test {
    use super::{Backoff, PendingSet};

    #[test]
    fn backoff_follows_the_clamped_doubling_sequence() {
        let mut backoff = Backoff::new();
        let delays: Vec<u32> = (0..9).map(|_| backoff.next()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 60, 60, 60]);
    }

    #[test]
    fn backoff_reset_restarts_the_sequence() {
        let mut backoff = Backoff::new();
        for _ in 0..5 {
            backoff.next();
        }
        backoff.reset();
        assert_eq!(backoff.next(), 1);
        assert_eq!(backoff.next(), 2);
    }

    #[test]
    fn insert_reuses_spent_slots() {
        let mut set = PendingSet::new();
        set.insert(3);
        set.insert(7);
        set.insert(12);
        assert!(set.resolve(7));
        set.insert(20);
        // 20 took over 7's slot instead of growing the vector.
        assert_eq!(set.request_list(), "3,20,12");
    }

    #[test]
    fn resolved_labels_never_reappear() {
        let mut set = PendingSet::new();
        set.insert(3);
        set.insert(7);
        set.insert(12);
        assert!(set.resolve(3));
        assert!(set.resolve(12));
        assert_eq!(set.request_list(), "7");
        assert!(!set.resolve(3));
    }

    #[test]
    fn empty_set_builds_no_request() {
        let mut set = PendingSet::new();
        assert_eq!(set.request_list(), "");
        assert!(!set.has_open());
        set.insert(5);
        assert!(set.has_open());
        set.resolve(5);
        assert_eq!(set.request_list(), "");
        assert!(!set.has_open());
    }

    #[test]
    fn resolving_the_zero_slot_is_a_no_op() {
        let mut set = PendingSet::new();
        set.insert(5);
        set.resolve(5);
        assert!(!set.resolve(0));
        assert_eq!(set.request_list(), "");
    }
}
