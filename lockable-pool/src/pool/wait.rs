use std::fmt::{self, Debug, Formatter};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, MutexGuard};

use super::error::PoolError;
use super::lock::LockToken;

/// Implemented by pool internals so that an `Interrupt` can wake every
/// waiter without knowing the pool's type parameters.
pub(crate) trait WakeAll: Send + Sync {
    fn wake_all(&self);
}

/// A cancellation handle for blocking pool calls.
///
/// Obtained from `LockablePool::interrupt_handle` and attached to a call with
/// `Wait::interrupt`. Interrupting wakes every waiter of the issuing pool;
/// calls carrying this handle then return `PoolError::Interrupted`. The flag
/// remains set until `reset` is called.
#[derive(Clone)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
    target: Weak<dyn WakeAll>,
}

impl Interrupt {
    pub(crate) fn new(target: Weak<dyn WakeAll>) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            target,
        }
    }

    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
        if let Some(target) = self.target.upgrade() {
            target.wake_all();
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub(crate) fn is_issued_by(&self, target: *const ()) -> bool {
        Weak::as_ptr(&self.target) as *const () == target
    }
}

impl Debug for Interrupt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupt")
            .field("is_interrupted", &self.is_interrupted())
            .finish()
    }
}

/// Options for a blocking pool call: an overall timeout, an interrupt
/// handle, and the lock token held by the caller (if any).
#[derive(Clone, Copy, Debug, Default)]
pub struct Wait<'a> {
    timeout: Option<Duration>,
    interrupt: Option<&'a Interrupt>,
    holding: Option<&'a LockToken>,
}

impl<'a> Wait<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total time spent suspended by the call.
    pub fn timeout(mut self, val: Duration) -> Self {
        self.timeout.replace(val);
        self
    }

    /// Attach an interrupt handle. The handle must have been issued by the
    /// pool receiving the call, otherwise the call fails with
    /// `PoolError::ForeignInterrupt` before waiting.
    pub fn interrupt(mut self, interrupt: &'a Interrupt) -> Self {
        self.interrupt.replace(interrupt);
        self
    }

    /// Present the caller's lock token, allowing it to borrow while it holds
    /// the pool lock.
    pub fn holding(mut self, token: &'a LockToken) -> Self {
        self.holding.replace(token);
        self
    }

    pub(crate) fn holder_id(&self) -> Option<u64> {
        self.holding.map(LockToken::id)
    }

    /// Start the wait budget of a call made on the pool identified by `target`.
    pub(crate) fn begin(&self, target: *const ()) -> Result<Budget<'a>, PoolError> {
        if let Some(interrupt) = self.interrupt {
            if !interrupt.is_issued_by(target) {
                return Err(PoolError::ForeignInterrupt);
            }
        }
        Ok(Budget {
            // a timeout too large to represent is treated as no timeout
            deadline: self
                .timeout
                .and_then(|dur| Instant::now().checked_add(dur)),
            interrupt: self.interrupt,
        })
    }
}

/// The remaining wait budget of a single call, shared across every
/// suspension the call performs.
#[derive(Debug)]
pub(crate) struct Budget<'a> {
    deadline: Option<Instant>,
    interrupt: Option<&'a Interrupt>,
}

impl Budget<'_> {
    pub fn check_interrupt(&self) -> Result<(), PoolError> {
        match self.interrupt {
            Some(interrupt) if interrupt.is_interrupted() => Err(PoolError::Interrupted),
            _ => Ok(()),
        }
    }

    /// Suspend on `cond` until notified or until the deadline passes. Fails
    /// without waiting once interrupted or once the deadline has passed.
    pub fn suspend<S>(&self, cond: &Condvar, guard: &mut MutexGuard<'_, S>) -> Result<(), PoolError> {
        self.check_interrupt()?;
        match self.deadline {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    return Err(PoolError::Timeout);
                }
                cond.wait_until(guard, deadline);
            }
            None => cond.wait(guard),
        }
        Ok(())
    }
}
