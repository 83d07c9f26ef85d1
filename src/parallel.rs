//! Bounded worker pool for per-file scan tasks.
//!
//! Jobs fan out over a crossbeam channel to scoped threads; results
//! carry their input sequence number and are re-sorted after the pool
//! drains, so output order never depends on completion order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Run `work` over every path, at most `workers` files in flight.
///
/// Each task produces an immutable result; there is no shared mutable
/// state beyond the stop flag. When `fail_fast` is set and `abort`
/// returns true for some result, remaining queued jobs are dropped;
/// results already produced are still returned.
pub fn map_files<T, W, A>(
    paths: &[PathBuf],
    workers: usize,
    fail_fast: bool,
    work: W,
    abort: A,
) -> Vec<T>
where
    T: Send,
    W: Fn(&Path) -> T + Sync,
    A: Fn(&T) -> bool + Sync,
{
    if workers <= 1 || paths.len() <= 1 {
        return map_sequentially(paths, fail_fast, &work, &abort);
    }

    let stop = AtomicBool::new(false);
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, &PathBuf)>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, T)>();

    for job in paths.iter().enumerate() {
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let stop = &stop;
            let work = &work;
            let abort = &abort;
            scope.spawn(move || {
                while let Ok((seq, path)) = job_rx.recv() {
                    if fail_fast && stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let item = work(path);
                    if fail_fast && abort(&item) {
                        stop.store(true, Ordering::Relaxed);
                    }
                    let _ = result_tx.send((seq, item));
                }
            });
        }
    });
    drop(result_tx);

    let mut items: Vec<(usize, T)> = result_rx.try_iter().collect();
    items.sort_by_key(|(seq, _)| *seq);
    return items.into_iter().map(|(_, item)| item).collect();
}

/// Single-threaded fallback for one worker or one file.
fn map_sequentially<T, W, A>(paths: &[PathBuf], fail_fast: bool, work: &W, abort: &A) -> Vec<T>
where
    W: Fn(&Path) -> T,
    A: Fn(&T) -> bool,
{
    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        let item = work(path);
        let stop = fail_fast && abort(&item);
        items.push(item);
        if stop {
            break;
        }
    }
    return items;
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn results_keep_input_order_regardless_of_completion_order() {
        let paths: Vec<PathBuf> = (0..64).map(|i| PathBuf::from(format!("f{i:02}"))).collect();
        let names = map_files(
            &paths,
            8,
            false,
            |p| p.display().to_string(),
            |_| false,
        );
        let expected: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn fail_fast_stops_dispatching_sequentially() {
        let paths: Vec<PathBuf> = (0..10).map(|i| PathBuf::from(format!("f{i}"))).collect();
        let names = map_files(
            &paths,
            1,
            true,
            |p| p.display().to_string(),
            |name| name == "f3",
        );
        assert_eq!(names.len(), 4);
    }
}
