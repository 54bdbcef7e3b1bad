use thiserror::Error;

/// An error returned by a pool operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// An instance is already registered with the pool
    #[error("Unable to register additional instance, pool full")]
    PoolFull,
    /// The item is not registered with the pool
    #[error("The item is not registered with the pool")]
    NotRegistered,
    /// The item was released more times than it was borrowed
    #[error("The item being released has no outstanding borrows")]
    NotBorrowed,
    /// The lock token does not hold the pool lock
    #[error("Unlock requested by a caller not holding the pool lock")]
    NotLockOwner,
    /// The request timed out
    #[error("Timeout limit reached before the request could be granted")]
    Timeout,
    /// A pill has been inserted into the pool
    #[error("Lock can't be granted because a pill has been inserted")]
    Poisoned,
    /// The wait was interrupted
    #[error("The wait was interrupted")]
    Interrupted,
    /// The interrupt handle was issued by a different pool
    #[error("The interrupt handle was issued by another pool")]
    ForeignInterrupt,
}

/// A configuration error.
#[derive(Debug, Error)]
#[error("Config error: {0}")]
pub struct ConfigError(pub String);
