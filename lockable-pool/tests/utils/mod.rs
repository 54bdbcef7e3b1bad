use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

pub struct AtomicCounter {
    count: AtomicUsize,
}

#[allow(unused)]
impl AtomicCounter {
    pub fn new(val: usize) -> Self {
        Self {
            count: AtomicUsize::new(val),
        }
    }

    pub fn increment(&self) -> usize {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn decrement(&self) -> usize {
        self.count.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn value(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Spin until `check` passes, panicking if it takes longer than a few seconds.
#[allow(unused)]
pub fn spin_until<F: Fn() -> bool>(check: F) {
    let expire = Instant::now() + Duration::from_secs(5);
    while !check() {
        if Instant::now() > expire {
            panic!("Condition not reached in time");
        }
        thread::yield_now();
    }
}

/// Give blocked threads a chance to run (and fail the test, if they were
/// not supposed to be released).
#[allow(unused)]
pub fn settle() {
    thread::sleep(Duration::from_millis(50));
}
