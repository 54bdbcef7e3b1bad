use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lockable_pool::{Borrow, PoolConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Interpreter {
    generation: usize,
}

#[derive(Clone, Debug)]
enum Pill {
    Shutdown,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let pool = PoolConfig::new(4)
        .name("interpreters")
        .drain_timeout(Duration::from_secs(5))
        .build::<Interpreter, Pill>()
        .unwrap();
    pool.register(Arc::new(Interpreter { generation: 0 }))
        .unwrap();

    let workers: Vec<_> = (0..6)
        .map(|id| {
            let pool = pool.clone();
            thread::spawn(move || loop {
                match pool.checkout() {
                    Borrow::Borrowed(interp) => {
                        println!("worker {} using generation {}", id, interp.generation);
                        thread::sleep(Duration::from_millis(20));
                    }
                    Borrow::Poisoned(pill) => {
                        println!("worker {} stopping: {:?}", id, pill);
                        break;
                    }
                }
            })
        })
        .collect();

    for generation in 1..=3 {
        thread::sleep(Duration::from_millis(100));
        // replace the instance once no worker is using it
        let lock = pool.lock_guard().unwrap();
        if let Some(current) = lock.registered_elements().pop() {
            lock.unregister(&current).unwrap();
        }
        lock.register(Arc::new(Interpreter { generation }))
            .unwrap();
    }

    pool.insert_pill(Pill::Shutdown);
    for worker in workers {
        worker.join().unwrap();
    }
    pool.clear().unwrap();
}
