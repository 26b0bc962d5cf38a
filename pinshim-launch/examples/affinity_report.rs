//! Spawns a handful of threads and reports the CPU each one runs on.
//!
//! ```text
//! cargo build --release --workspace --examples
//! target/release/pinshim-launch -c 0-3 -- target/release/examples/affinity_report 6
//! ```

use std::thread;
use std::time::{Duration, Instant};

fn main() {
    let count: usize = std::env::args()
        .nth(1)
        .and_then(|n| n.parse().ok())
        .unwrap_or(4);

    println!("main thread on CPU {}", unsafe { libc::sched_getcpu() });

    let handles: Vec<_> = (0..count)
        .map(|i| {
            thread::spawn(move || {
                // Spin briefly so the scheduler has applied the new mask.
                let deadline = Instant::now() + Duration::from_millis(50);
                while Instant::now() < deadline {
                    std::hint::spin_loop();
                }
                (i, unsafe { libc::sched_getcpu() })
            })
        })
        .collect();

    for handle in handles {
        let (i, cpu) = handle.join().expect("worker panicked");
        println!("worker {} on CPU {}", i, cpu);
    }
}
