use std::fmt::{self, Debug, Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;

use crate::pool::LockablePool;

/// A borrowed pool instance which is released back to the pool when dropped.
pub struct Managed<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    pool: LockablePool<T, P>,
    value: Option<Arc<T>>,
}

impl<T, P> Managed<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    pub(crate) fn new(value: Arc<T>, pool: LockablePool<T, P>) -> Self {
        Self {
            pool,
            value: Some(value),
        }
    }

    /// Access the shared handle of the borrowed instance.
    pub fn handle(mng_self: &Self) -> &Arc<T> {
        // note: only empty after drop
        mng_self.value.as_ref().unwrap()
    }

    pub fn pool(mng_self: &Self) -> &LockablePool<T, P> {
        &mng_self.pool
    }
}

impl<T, P> Debug for Managed<T, P>
where
    T: Debug + Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.debug_struct("Managed")
                .field("value", &self.deref())
                .field("pool", &self.pool)
                .finish()
        } else {
            Debug::fmt(self.deref(), f)
        }
    }
}

impl<T, P> Display for Managed<T, P>
where
    T: Display + Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self.deref(), f)
    }
}

impl<T, P> Deref for Managed<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        Managed::handle(self)
    }
}

impl<T, P> Drop for Managed<T, P>
where
    T: Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            if let Err(err) = self.pool.release_handle(&value) {
                tracing::warn!(pool = ?self.pool.name(), %err, "Failed to release managed instance");
            }
        }
    }
}
