//! A pool lending shared borrows of a single managed instance.
//!
//! A `LockablePool` holds at most one registered instance and lends it to up
//! to `max_borrows` concurrent borrowers. An administrative caller may take
//! the pool lock, which holds off new borrowers and waits for outstanding
//! borrows to drain, typically in order to replace the instance:
//!
//! ```
//! use std::sync::Arc;
//! use lockable_pool::{Borrow, LockablePool};
//!
//! let pool = LockablePool::<String, ()>::new(2).unwrap();
//! let first = Arc::new("first".to_string());
//! pool.register(first.clone()).unwrap();
//!
//! let item = pool.borrow_item();
//! assert_eq!(item.as_borrowed().map(|s| s.as_str()), Some("first"));
//! pool.release_item(item).unwrap();
//!
//! let token = pool.lock().unwrap();
//! pool.unregister(&first).unwrap();
//! pool.register(Arc::new("second".to_string())).unwrap();
//! pool.unlock(token).unwrap();
//!
//! pool.insert_pill(());
//! assert_eq!(pool.borrow_item(), Borrow::Poisoned(()));
//! ```
//!
//! A pill inserted with `insert_pill` is delivered to every current and
//! future borrower in place of the instance, and causes lock attempts to
//! fail.

mod pool;
pub use self::pool::{
    ConfigError, Interrupt, LockToken, LockablePool, PoolConfig, PoolError, PoolLock, Wait,
};

mod resource;
pub use self::resource::{Borrow, Managed};
