//! A bounded pool of scoped worker threads running independent units of work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use tracing::debug;

use crate::HiveResult;

/// Run every unit on at most `parallelism` threads and return their results in completion order.
///
/// If any unit fails, the first error received is returned and the other results are discarded.
/// Workers stop picking up new units once a unit failed; units already running finish.
pub(crate) fn run_timed<T, U>(activity: &str, units: Vec<U>, parallelism: usize) -> HiveResult<Vec<T>>
where
    T: Send,
    U: FnOnce() -> HiveResult<T> + Send,
{
    if units.is_empty() {
        return Ok(vec![]);
    }
    let start = Instant::now();
    let unit_count = units.len();
    let workers = parallelism.clamp(1, unit_count);
    let failed = AtomicBool::new(false);

    // result_[t/r]x carry finished results back, unit_[t/r]x hand out the units to the workers
    let (result_tx, result_rx) = mpsc::channel();
    let (mut unit_tx, unit_rx) = spmc::channel();

    let outcome = thread::scope(|s| {
        for _ in 0..workers {
            let unit_rx: spmc::Receiver<U> = unit_rx.clone();
            let result_tx = result_tx.clone();
            let failed = &failed;
            s.spawn(move || {
                while let Ok(unit) = unit_rx.recv() {
                    if failed.load(Ordering::Acquire) {
                        break;
                    }
                    let result = unit();
                    if result.is_err() {
                        failed.store(true, Ordering::Release);
                    }
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        // every worker has its own sender now, so result_rx ends once the last worker is done
        drop(result_tx);

        for unit in units {
            if unit_tx.send(unit).is_err() {
                break;
            }
        }
        drop(unit_tx);

        let mut results = Vec::with_capacity(unit_count);
        let mut first_error = None;
        for result in result_rx.iter() {
            match result {
                Ok(value) => results.push(value),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(results),
        }
    });

    debug!(
        "{activity}: {unit_count} units on {workers} threads took {} ms",
        start.elapsed().as_millis()
    );
    outcome
}
