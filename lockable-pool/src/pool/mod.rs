mod config;
pub use config::PoolConfig;

mod error;
pub use error::{ConfigError, PoolError};

mod lock;
pub use lock::{LockToken, PoolLock};

mod pool;
pub use pool::LockablePool;

mod wait;
pub use wait::{Interrupt, Wait};
