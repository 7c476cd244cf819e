use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;

/// A bounded pool of worker threads applying a function to every element of an input list.
///
/// Results come back in input order no matter which worker finished first. Workers are
/// scoped to a single call, so the mapped function may borrow from the caller.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    n_workers: usize,
}

impl WorkerPool {
    /// Create a pool with `n_workers` threads (at least one)
    pub fn new(n_workers: usize) -> Self {
        Self {
            n_workers: n_workers.max(1),
        }
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    /// Map an infallible function over `inputs`
    pub fn map<T, R, F>(&self, inputs: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        match self.try_map(inputs, |input| Ok::<R, Infallible>(f(input))) {
            Ok(results) => results,
            Err(never) => match never {},
        }
    }

    /// Map a fallible function over `inputs`, failing if any application fails
    pub fn try_map<T, R, E, F>(&self, inputs: &[T], f: F) -> Result<Vec<R>, E>
    where
        T: Sync,
        R: Send,
        E: Send,
        F: Fn(&T) -> Result<R, E> + Sync,
    {
        self.try_map_with_progress(inputs, f, |_, _| ())
    }

    /// Map a fallible function over `inputs`, calling `progress(done, total)` on the calling
    /// thread each time an input completes.
    ///
    /// Once an application fails no worker picks up new inputs. The returned error is the one
    /// of the lowest failing input index.
    pub fn try_map_with_progress<T, R, E, F, P>(
        &self,
        inputs: &[T],
        f: F,
        mut progress: P,
    ) -> Result<Vec<R>, E>
    where
        T: Sync,
        R: Send,
        E: Send,
        F: Fn(&T) -> Result<R, E> + Sync,
        P: FnMut(usize, usize),
    {
        let total = inputs.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        let n_workers = self.n_workers.min(total);
        let next_index = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
        let mut first_error: Option<(usize, E)> = None;

        std::thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<(usize, Result<R, E>)>();
            for _ in 0..n_workers {
                let tx = tx.clone();
                let (next_index, failed, f) = (&next_index, &failed, &f);
                scope.spawn(move || loop {
                    if failed.load(Ordering::Acquire) {
                        break;
                    }
                    let idx = next_index.fetch_add(1, Ordering::AcqRel);
                    if idx >= total {
                        break;
                    }
                    let result = f(&inputs[idx]);
                    if result.is_err() {
                        failed.store(true, Ordering::Release);
                    }
                    if tx.send((idx, result)).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            let mut done = 0;
            for (idx, result) in rx {
                match result {
                    Ok(value) => {
                        slots[idx] = Some(value);
                        done += 1;
                        progress(done, total);
                    }
                    Err(e) => {
                        if first_error.as_ref().map_or(true, |(first, _)| idx < *first) {
                            first_error = Some((idx, e));
                        }
                    }
                }
            }
        });

        if let Some((_, e)) = first_error {
            return Err(e);
        }
        Ok(slots.into_iter().flatten().collect())
    }
}
