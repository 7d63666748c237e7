// src/readers/signal.rs

//! One-shot signals built on [`crossbeam_channel`] disconnection.
//!
//! * [`OnceSignal`] fires at most once; waiters that start waiting after it
//!   fired still see it.
//! * [`CancelToken`] is a cloneable cancellation flag with a `OnceSignal`
//!   for blocking waiters, and child tokens that are cancelled with their
//!   parent.
//!
//! A fired signal is a disconnected channel: every
//! [`Receiver::recv`] returns immediately so a fired signal may be
//! used as an arm of [`crossbeam_channel::select!`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use ::crossbeam_channel::{Receiver, Sender};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OnceSignal
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A signal that fires once.
///
/// Nothing is ever sent on the channel; firing drops the only `Sender`.
#[derive(Debug)]
pub struct OnceSignal {
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

impl Default for OnceSignal {
    fn default() -> Self {
        OnceSignal::new()
    }
}

impl OnceSignal {
    pub fn new() -> OnceSignal {
        let (sender, receiver) = ::crossbeam_channel::bounded::<()>(0);

        OnceSignal {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /// Fire the signal. Returns `true` if this call fired it, `false` if it
    /// had already fired.
    pub fn fire(&self) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let fired = sender.is_some();
        drop(sender);
        defñ!("fired {}", fired);

        fired
    }

    pub fn is_fired(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// A receiver whose `recv` returns `Err(RecvError)` once fired.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }

    /// Block until fired.
    pub fn wait(&self) {
        // only disconnection ends this; nothing is ever sent
        while self.receiver.recv().is_ok() {}
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CancelToken
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    signal: OnceSignal,
    /// tokens to cancel with this one; entries whose token was dropped are
    /// pruned by the next registration
    children: Mutex<Vec<Weak<CancelInner>>>,
}

/// Cooperative cancellation shared by a caller and the scanners it created.
///
/// Clones share the same state. [`child`] tokens are cancelled when their
/// parent is, never the reverse. A parent does not keep its children alive.
///
/// [`child`]: CancelToken::child
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Cancel this token and every live child. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        defñ!();
        self.inner.signal.fire();
        let children: Vec<Weak<CancelInner>> = std::mem::take(
            &mut *self
                .inner
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for child in children.iter() {
            if let Some(inner) = child.upgrade() {
                CancelToken { inner }.cancel();
            }
        }
    }

    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// A receiver that disconnects when this token is cancelled.
    /// For use in [`crossbeam_channel::select!`].
    pub fn receiver(&self) -> &Receiver<()> {
        self.inner.signal.receiver()
    }

    /// A new token cancelled when `self` is cancelled. A child of an already
    /// cancelled token starts cancelled.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        {
            let mut children = self
                .inner
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !self.is_cancelled() {
                children.retain(|child| child.strong_count() > 0);
                children.push(Arc::downgrade(&child.inner));
                return child;
            }
        }
        child.cancel();

        child
    }

    /// Count of registered children, including dropped ones not yet
    /// pruned.
    #[cfg(test)]
    pub(crate) fn children_len(&self) -> usize {
        self.inner
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
