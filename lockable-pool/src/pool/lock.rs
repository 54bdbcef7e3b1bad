use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::PoolError;
use super::pool::LockablePool;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Proof of ownership of a pool lock, returned by a successful lock
/// acquisition and consumed by `LockablePool::unlock`.
///
/// Token ids are unique across all pools in the process.
#[derive(PartialEq, Eq)]
#[must_use = "the pool stays locked until the token is passed to unlock"]
pub struct LockToken {
    id: u64,
}

impl LockToken {
    pub(crate) fn next() -> Self {
        Self {
            id: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Debug for LockToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "LockToken({})", self.id)
    }
}

/// A held pool lock which is released when dropped.
pub struct PoolLock<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    pool: LockablePool<T, P>,
    token: Option<LockToken>,
}

impl<T, P> PoolLock<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    pub(crate) fn new(pool: LockablePool<T, P>, token: LockToken) -> Self {
        Self {
            pool,
            token: Some(token),
        }
    }

    /// The token to present to `Wait::holding` while the lock is held.
    pub fn token(lock_self: &Self) -> &LockToken {
        // note: only empty after unlock consumes the guard
        lock_self.token.as_ref().unwrap()
    }

    pub fn unlock(mut lock_self: Self) -> Result<(), PoolError> {
        match lock_self.token.take() {
            Some(token) => lock_self.pool.unlock(token),
            None => Ok(()),
        }
    }
}

impl<T, P> std::ops::Deref for PoolLock<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    type Target = LockablePool<T, P>;
    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}

impl<T, P> Debug for PoolLock<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolLock")
            .field("token", &self.token)
            .finish()
    }
}

impl<T, P> Drop for PoolLock<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Err(err) = self.pool.unlock(token) {
                tracing::warn!(pool = ?self.pool.name(), %err, "Failed to release pool lock");
            }
        }
    }
}
