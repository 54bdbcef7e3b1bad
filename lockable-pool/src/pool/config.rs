use std::time::Duration;

use super::error::ConfigError;
use super::pool::LockablePool;

/// Builder for a `LockablePool` instance.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    drain_timeout: Option<Duration>,
    max_borrows: u32,
    name: Option<String>,
}

impl PoolConfig {
    pub fn new(max_borrows: u32) -> Self {
        Self {
            drain_timeout: None,
            max_borrows,
            name: None,
        }
    }

    /// Bound the wait performed by `unregister` and `clear` for outstanding
    /// borrows to be returned. A zero duration waits indefinitely.
    pub fn drain_timeout(mut self, val: Duration) -> Self {
        if val.as_micros() > 0 {
            self.drain_timeout.replace(val);
        } else {
            self.drain_timeout.take();
        }
        self
    }

    pub fn max_borrows(mut self, val: u32) -> Self {
        self.max_borrows = val;
        self
    }

    /// Attach a name to the pool, included in its log events.
    pub fn name<N: Into<String>>(mut self, val: N) -> Self {
        self.name.replace(val.into());
        self
    }

    pub fn build<T, P>(self) -> Result<LockablePool<T, P>, ConfigError>
    where
        T: Send + Sync + 'static,
        P: Clone + Send + 'static,
    {
        if self.max_borrows == 0 {
            return Err(ConfigError("max_borrows must be at least 1".to_owned()));
        }
        Ok(LockablePool::from_config(
            self.max_borrows,
            self.drain_timeout,
            self.name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_zero_borrows() {
        let err = PoolConfig::new(0).build::<u32, ()>().unwrap_err();
        assert_eq!(err.to_string(), "Config error: max_borrows must be at least 1");
    }

    #[test]
    fn config_zero_timeout_clears() {
        let config = PoolConfig::new(1)
            .drain_timeout(Duration::from_secs(1))
            .drain_timeout(Duration::from_secs(0));
        assert!(config.drain_timeout.is_none());
    }

    #[test]
    fn config_builds_named() {
        let pool = PoolConfig::new(2)
            .max_borrows(4)
            .name("primary")
            .build::<u32, ()>()
            .unwrap();
        assert_eq!(pool.max_borrows(), 4);
        assert_eq!(pool.name(), Some("primary"));
    }
}
