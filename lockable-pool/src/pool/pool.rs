use std::fmt::{self, Debug, Formatter};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Weak,
};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::config::PoolConfig;
use super::error::{ConfigError, PoolError};
use super::lock::{LockToken, PoolLock};
use super::wait::{Budget, Interrupt, Wait, WakeAll};
use crate::resource::{Borrow, Managed};

struct PoolState<T, P> {
    instance: Option<Arc<T>>,
    lock_owner: Option<u64>,
    pill: Option<P>,
    registered: Vec<Arc<T>>,
    // bumped by every register, so waiters can tell instances apart
    generation: u64,
    // number of unregister calls waiting for the instance to drain
    retiring: u32,
}

impl<T, P> PoolState<T, P> {
    fn is_instance(&self, handle: &Arc<T>) -> bool {
        self.instance
            .as_ref()
            .map_or(false, |inst| Arc::ptr_eq(inst, handle))
    }

    fn is_retiring(&self, handle: &Arc<T>, generation: u64) -> bool {
        self.generation == generation && self.is_instance(handle)
    }

    fn is_registered(&self, handle: &Arc<T>) -> bool {
        self.registered.iter().any(|reg| Arc::ptr_eq(reg, handle))
    }

    fn is_locked_by_other(&self, holder: Option<u64>) -> bool {
        self.lock_owner.is_some() && self.lock_owner != holder
    }
}

type StateGuard<'a, T, P> = MutexGuard<'a, PoolState<T, P>>;

pub(crate) struct Shared<T, P> {
    state: Mutex<PoolState<T, P>>,
    // only written while `state` is held
    borrow_count: AtomicU32,
    // signaled when an instance is registered or a borrow is returned
    item_available: Condvar,
    // signaled when the pool lock is released
    not_locked: Condvar,
    // signaled when the borrow count reaches zero
    drained: Condvar,
    drain_timeout: Option<Duration>,
    max_borrows: u32,
    name: Option<String>,
}

impl<T, P> Shared<T, P> {
    fn borrows(&self) -> u32 {
        self.borrow_count.load(Ordering::Acquire)
    }

    fn set_borrows(&self, count: u32) {
        self.borrow_count.store(count, Ordering::Release)
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("pool")
    }

    /// Wait with the pool lock held until no borrows are outstanding.
    fn await_quiescence(
        &self,
        budget: &Budget<'_>,
        state: &mut StateGuard<'_, T, P>,
    ) -> Result<(), PoolError> {
        while self.borrows() > 0 {
            budget.suspend(&self.drained, state)?;
            if state.pill.is_some() {
                return Err(PoolError::Poisoned);
            }
        }
        Ok(())
    }

    fn free_lock(&self, state: &mut PoolState<T, P>) {
        state.lock_owner = None;
        self.not_locked.notify_all();
        // borrowers woken by a release while the lock was held went back to
        // waiting on `not_locked`, so no waiter on `item_available` may have
        // been told about the spare capacity
        if self.borrows() < self.max_borrows {
            self.item_available.notify_all();
        }
    }
}

impl<T: Send + Sync, P: Send> WakeAll for Shared<T, P> {
    fn wake_all(&self) {
        let _state = self.state.lock();
        self.item_available.notify_all();
        self.not_locked.notify_all();
        self.drained.notify_all();
    }
}

/// A pool lending shared borrows of a single registered instance.
///
/// At most `max_borrows` borrows of the instance may be outstanding at once.
/// The pool may be exclusively locked, which holds off new borrowers and
/// waits for outstanding borrows to be returned. Once a pill is inserted, it
/// is handed out to every borrower in place of the instance.
pub struct LockablePool<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    shared: Arc<Shared<T, P>>,
}

impl<T, P> LockablePool<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    /// Create a pool lending up to `max_borrows` concurrent borrows.
    pub fn new(max_borrows: u32) -> Result<Self, ConfigError> {
        PoolConfig::new(max_borrows).build()
    }

    pub(crate) fn from_config(
        max_borrows: u32,
        drain_timeout: Option<Duration>,
        name: Option<String>,
    ) -> Self {
        let state = PoolState {
            instance: None,
            lock_owner: None,
            pill: None,
            registered: Vec::new(),
            generation: 0,
            retiring: 0,
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                borrow_count: AtomicU32::new(0),
                item_available: Condvar::new(),
                not_locked: Condvar::new(),
                drained: Condvar::new(),
                drain_timeout,
                max_borrows,
                name,
            }),
        }
    }

    /// Register the instance to be lent by the pool.
    pub fn register(&self, instance: Arc<T>) -> Result<(), PoolError> {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        if state.instance.is_some() {
            return Err(PoolError::PoolFull);
        }
        state.registered.push(instance.clone());
        state.instance.replace(instance);
        state.generation += 1;
        state.retiring = 0;
        shared.set_borrows(0);
        shared.item_available.notify_all();
        tracing::debug!(pool = shared.label(), "Registered pool instance");
        Ok(())
    }

    /// Unregister the active instance, waiting for every outstanding borrow
    /// of it to be returned. Waits no longer than the configured drain
    /// timeout, if any.
    pub fn unregister(&self, instance: &Arc<T>) -> Result<(), PoolError> {
        let wait = match self.shared.drain_timeout {
            Some(timeout) => Wait::new().timeout(timeout),
            None => Wait::new(),
        };
        self.unregister_with(instance, wait)
    }

    pub fn unregister_timeout(&self, instance: &Arc<T>, timeout: Duration) -> Result<(), PoolError> {
        self.unregister_with(instance, Wait::new().timeout(timeout))
    }

    /// Unregister the active instance. New borrows are held off while the
    /// outstanding ones drain; if the wait fails the instance remains
    /// registered, and borrowing resumes unless another unregister is still
    /// draining it.
    pub fn unregister_with(&self, instance: &Arc<T>, wait: Wait<'_>) -> Result<(), PoolError> {
        let budget = wait.begin(self.id())?;
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        if !state.is_instance(instance) {
            return Err(PoolError::NotRegistered);
        }
        let generation = state.generation;
        state.retiring += 1;
        while shared.borrows() > 0 {
            if let Err(err) = budget.suspend(&shared.drained, &mut state) {
                if state.is_retiring(instance, generation) {
                    state.retiring -= 1;
                    // borrowing resumes only once no other unregister is draining
                    if state.retiring == 0 {
                        shared.item_available.notify_all();
                    }
                }
                tracing::debug!(pool = shared.label(), %err, "Pool instance failed to drain");
                return Err(err);
            }
            if !state.is_retiring(instance, generation) {
                // unregistered by another caller
                return Err(PoolError::NotRegistered);
            }
        }
        state.instance = None;
        state.retiring = 0;
        state.registered.retain(|reg| !Arc::ptr_eq(reg, instance));
        tracing::debug!(pool = shared.label(), "Unregistered pool instance");
        Ok(())
    }

    /// Unregister whichever instance is active, if any.
    pub fn clear(&self) -> Result<(), PoolError> {
        let instance = self.shared.state.lock().instance.clone();
        match instance {
            Some(instance) => match self.unregister(&instance) {
                Err(PoolError::NotRegistered) => Ok(()),
                result => result,
            },
            None => Ok(()),
        }
    }

    /// Borrow the instance, blocking until one is available. Returns the
    /// pill instead once one has been inserted.
    pub fn borrow_item(&self) -> Borrow<Arc<T>, P> {
        // note: cannot fail without a timeout or interrupt
        self.borrow_item_with(Wait::new()).unwrap()
    }

    pub fn borrow_item_timeout(&self, timeout: Duration) -> Result<Borrow<Arc<T>, P>, PoolError> {
        self.borrow_item_with(Wait::new().timeout(timeout))
    }

    pub fn borrow_item_with(&self, wait: Wait<'_>) -> Result<Borrow<Arc<T>, P>, PoolError> {
        let budget = wait.begin(self.id())?;
        let holder = wait.holder_id();
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        loop {
            if let Some(pill) = state.pill.as_ref() {
                return Ok(Borrow::Poisoned(pill.clone()));
            }
            if state.is_locked_by_other(holder) {
                budget.suspend(&shared.not_locked, &mut state)?;
                continue;
            }
            let count = shared.borrows();
            if state.retiring == 0 && count < shared.max_borrows {
                if let Some(instance) = state.instance.clone() {
                    shared.set_borrows(count + 1);
                    tracing::trace!(pool = shared.label(), count = count + 1, "Borrowing, count increased");
                    return Ok(Borrow::Borrowed(instance));
                }
            }
            // no instance, instance retiring, or max borrow count reached
            budget.suspend(&shared.item_available, &mut state)?;
        }
    }

    /// Borrow the instance as a guard which releases it when dropped.
    pub fn checkout(&self) -> Borrow<Managed<T, P>, P> {
        self.borrow_item().map(|inst| Managed::new(inst, self.clone()))
    }

    pub fn checkout_timeout(&self, timeout: Duration) -> Result<Borrow<Managed<T, P>, P>, PoolError> {
        self.checkout_with(Wait::new().timeout(timeout))
    }

    pub fn checkout_with(&self, wait: Wait<'_>) -> Result<Borrow<Managed<T, P>, P>, PoolError> {
        self.borrow_item_with(wait)
            .map(|item| item.map(|inst| Managed::new(inst, self.clone())))
    }

    /// Return a borrowed item to the pool. Releasing the pill does nothing.
    pub fn release_item(&self, item: Borrow<Arc<T>, P>) -> Result<(), PoolError> {
        match item {
            Borrow::Borrowed(handle) => self.release_handle(&handle),
            Borrow::Poisoned(_) => Ok(()),
        }
    }

    pub(crate) fn release_handle(&self, handle: &Arc<T>) -> Result<(), PoolError> {
        let shared = &*self.shared;
        let state = shared.state.lock();
        if !state.is_registered(handle) {
            return Err(PoolError::NotRegistered);
        }
        let count = shared.borrows();
        if count == 0 {
            return Err(PoolError::NotBorrowed);
        }
        shared.set_borrows(count - 1);
        tracing::trace!(pool = shared.label(), count = count - 1, "Released, count decreased");
        if state.lock_owner.is_some() {
            // waiters held off by the lock would swallow a single wakeup
            // meant for a borrower presenting the lock token
            shared.item_available.notify_all();
        } else {
            shared.item_available.notify_one();
        }
        if count == 1 {
            shared.drained.notify_all();
        }
        Ok(())
    }

    /// Insert a pill which is handed to all current and future borrowers.
    /// Only the first pill is kept; returns `false` if one was already set.
    pub fn insert_pill(&self, pill: P) -> bool {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        if state.pill.is_some() {
            return false;
        }
        state.pill.replace(pill);
        shared.item_available.notify_all();
        shared.not_locked.notify_all();
        shared.drained.notify_all();
        tracing::info!(pool = shared.label(), "Inserted pill into pool");
        true
    }

    pub fn is_poisoned(&self) -> bool {
        self.shared.state.lock().pill.is_some()
    }

    pub fn pill(&self) -> Option<P> {
        self.shared.state.lock().pill.clone()
    }

    /// Acquire the pool lock, blocking until it is free and until every
    /// outstanding borrow has been returned. Borrowers are held off until
    /// the returned token is passed to `unlock`.
    pub fn lock(&self) -> Result<LockToken, PoolError> {
        self.lock_with(Wait::new())
    }

    pub fn lock_timeout(&self, timeout: Duration) -> Result<LockToken, PoolError> {
        self.lock_with(Wait::new().timeout(timeout))
    }

    /// Acquire the pool lock. The lock is not reentrant: a holder calling
    /// this again waits for its own lock to be released.
    pub fn lock_with(&self, wait: Wait<'_>) -> Result<LockToken, PoolError> {
        let budget = wait.begin(self.id())?;
        let token = LockToken::next();
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        loop {
            if state.pill.is_some() {
                return Err(PoolError::Poisoned);
            }
            if state.lock_owner.is_none() {
                state.lock_owner.replace(token.id());
                break;
            }
            budget.suspend(&shared.not_locked, &mut state)?;
        }
        if let Err(err) = shared.await_quiescence(&budget, &mut state) {
            shared.free_lock(&mut state);
            tracing::debug!(pool = shared.label(), %err, "Pool lock abandoned");
            return Err(err);
        }
        tracing::debug!(pool = shared.label(), ?token, "Pool locked");
        Ok(token)
    }

    /// Acquire the pool lock as a guard which unlocks when dropped.
    pub fn lock_guard(&self) -> Result<PoolLock<T, P>, PoolError> {
        self.lock_guard_with(Wait::new())
    }

    pub fn lock_guard_timeout(&self, timeout: Duration) -> Result<PoolLock<T, P>, PoolError> {
        self.lock_guard_with(Wait::new().timeout(timeout))
    }

    pub fn lock_guard_with(&self, wait: Wait<'_>) -> Result<PoolLock<T, P>, PoolError> {
        let token = self.lock_with(wait)?;
        Ok(PoolLock::new(self.clone(), token))
    }

    pub fn unlock(&self, token: LockToken) -> Result<(), PoolError> {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        if state.lock_owner != Some(token.id()) {
            tracing::warn!(
                pool = shared.label(),
                ?token,
                owner = ?state.lock_owner,
                "Unlock requested by a caller not holding the pool lock"
            );
            return Err(PoolError::NotLockOwner);
        }
        shared.free_lock(&mut state);
        tracing::debug!(pool = shared.label(), ?token, "Pool unlocked");
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.shared.state.lock().lock_owner.is_some()
    }

    /// Create a handle which can interrupt blocking calls on this pool.
    pub fn interrupt_handle(&self) -> Interrupt {
        let target: Weak<dyn WakeAll> = Arc::downgrade(&self.shared) as Weak<dyn WakeAll>;
        Interrupt::new(target)
    }

    fn id(&self) -> *const () {
        Arc::as_ptr(&self.shared) as *const ()
    }

    /// The number of borrows currently available.
    pub fn size(&self) -> u32 {
        let state = self.shared.state.lock();
        if state.instance.is_some() {
            self.shared.max_borrows - self.shared.borrows()
        } else {
            0
        }
    }

    /// The number of instances which may still be registered.
    pub fn remaining_capacity(&self) -> u32 {
        if self.shared.state.lock().instance.is_some() {
            0
        } else {
            1
        }
    }

    pub fn registered_elements(&self) -> Vec<Arc<T>> {
        self.shared.state.lock().registered.clone()
    }

    /// The number of outstanding borrows. Read without the pool mutex, so
    /// only suitable for reporting.
    pub fn borrow_count(&self) -> u32 {
        self.shared.borrows()
    }

    pub fn max_borrows(&self) -> u32 {
        self.shared.max_borrows
    }

    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }
}

impl<T, P> Clone for LockablePool<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, P> Debug for LockablePool<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockablePool")
            .field("name", &self.shared.name)
            .field("max_borrows", &self.shared.max_borrows)
            .field("borrow_count", &self.borrow_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(max_borrows: u32) -> LockablePool<u32, &'static str> {
        LockablePool::new(max_borrows).unwrap()
    }

    #[test]
    fn state_identity_is_by_handle() {
        let pool = pool(1);
        let inst = Arc::new(7);
        pool.register(inst.clone()).unwrap();
        let equal = Arc::new(7);
        assert_eq!(
            pool.release_item(Borrow::Borrowed(equal)),
            Err(PoolError::NotRegistered)
        );
        assert_eq!(
            pool.release_item(Borrow::Borrowed(inst)),
            Err(PoolError::NotBorrowed)
        );
    }

    #[test]
    fn failed_lock_leaves_pool_unlocked() {
        let pool = pool(1);
        let inst = Arc::new(1);
        pool.register(inst).unwrap();
        let item = pool.borrow_item();
        assert_eq!(
            pool.lock_timeout(Duration::from_millis(20)).unwrap_err(),
            PoolError::Timeout
        );
        assert!(!pool.is_locked());
        pool.release_item(item).unwrap();
        let token = pool.lock().unwrap();
        assert!(pool.is_locked());
        pool.unlock(token).unwrap();
    }

    #[test]
    fn register_resets_state() {
        let pool = pool(2);
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.remaining_capacity(), 1);
        let inst = Arc::new(3);
        pool.register(inst.clone()).unwrap();
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.remaining_capacity(), 0);
        assert_eq!(pool.registered_elements().len(), 1);
        pool.unregister(&inst).unwrap();
        assert!(pool.registered_elements().is_empty());
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.borrow_count(), 0);
    }
}
