use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use mc_bench::{bench_info, Timeit};
use mc_loader::TensorFile;
use mc_mat::{ComputeBackend, Mat};
use mc_pool::ThreadPool;

use crate::compare::{first_mismatch, max_abs_diff};
use crate::error::{Result, VerifyError};

/// One `A<id>`/`B<id>`/`C<id>` reference case: two factors and the expected
/// product computed by the reference generator.
pub struct Triplet {
    pub id: u64,
    pub lhs: Mat<i64>,
    pub rhs: Mat<i64>,
    pub expected: Mat<i64>,
}

/// Result of checking one backend against the expected product.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub backend: String,
    pub passed: bool,
    pub duration: Duration,
}

/// Extract all reference triplets from a tensor file.
///
/// Tensor names follow the `A0`/`B0`/`C0` convention of the reference
/// generator; names outside it are skipped. A triplet missing one of its
/// three members is an error.
pub fn reference_triplets(file: &TensorFile) -> Result<Vec<Triplet>> {
    #[derive(Default)]
    struct Partial {
        lhs: Option<Mat<i64>>,
        rhs: Option<Mat<i64>>,
        expected: Option<Mat<i64>>,
    }

    let mut partials: BTreeMap<u64, Partial> = BTreeMap::new();

    let names: Vec<String> = file.names().map(str::to_string).collect();
    for name in names {
        let (kind, id_str) = match name.chars().next() {
            Some('A') | Some('B') | Some('C') => name.split_at(1),
            _ => {
                log::debug!("skipping tensor with unexpected name: {}", name);
                continue;
            }
        };
        let id = match id_str.parse::<u64>() {
            Ok(id) => id,
            Err(_) => {
                log::debug!("skipping tensor with unexpected name: {}", name);
                continue;
            }
        };

        let slot = partials.entry(id).or_default();
        match kind {
            "A" => slot.lhs = Some(file.load_i64(&name)?),
            "B" => slot.rhs = Some(file.load_i64(&name)?),
            _ => slot.expected = Some(file.load_i64(&name)?),
        }
    }

    let mut triplets = Vec::with_capacity(partials.len());
    for (id, partial) in partials {
        match (partial.lhs, partial.rhs, partial.expected) {
            (Some(lhs), Some(rhs), Some(expected)) => triplets.push(Triplet {
                id,
                lhs,
                rhs,
                expected,
            }),
            _ => return Err(VerifyError::IncompleteTriplet(id)),
        }
    }
    Ok(triplets)
}

/// Run every backend's multiply on one integer input pair and compare the
/// result element-wise against `expected`.
///
/// Each backend call is timed into the process-wide bench sink. A backend
/// failure or a mismatch marks that backend failed; nothing is retried.
pub fn verify_multiply(
    backends: &[&dyn ComputeBackend],
    lhs: &Mat<i64>,
    rhs: &Mat<i64>,
    expected: &Mat<i64>,
) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(backends.len());

    for backend in backends {
        let clock = Timeit::start();
        let result = backend.multiply(lhs.view().into(), rhs.view().into());
        let duration = clock.stop();
        bench_info().add(format!("{}.multiply", backend.name()), duration);

        let passed = match result {
            Ok(out) => match out.as_i64() {
                Some(out) => first_mismatch(out.view(), expected.view()).is_none(),
                None => false,
            },
            Err(err) => {
                log::debug!("{} multiply failed: {}", backend.name(), err);
                false
            }
        };

        outcomes.push(Outcome {
            backend: backend.name().to_string(),
            passed,
            duration,
        });
    }

    outcomes
}

/// Float variant of [`verify_multiply`]: passes when the largest element
/// difference stays within `tolerance`.
pub fn verify_multiply_f32(
    backends: &[&dyn ComputeBackend],
    lhs: &Mat<f32>,
    rhs: &Mat<f32>,
    expected: &Mat<f32>,
    tolerance: f32,
) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(backends.len());

    for backend in backends {
        let clock = Timeit::start();
        let result = backend.multiply(lhs.view().into(), rhs.view().into());
        let duration = clock.stop();
        bench_info().add(format!("{}.multiply", backend.name()), duration);

        let passed = match result {
            Ok(out) => match out.as_f32() {
                Some(out) => max_abs_diff(out.view(), expected.view()) <= tolerance,
                None => false,
            },
            Err(err) => {
                log::debug!("{} multiply failed: {}", backend.name(), err);
                false
            }
        };

        outcomes.push(Outcome {
            backend: backend.name().to_string(),
            passed,
            duration,
        });
    }

    outcomes
}

/// Fan independent jobs across the pool with the "every Nth job starting at
/// my id" partition, then block until the round drains.
///
/// With zero workers the jobs run inline on the calling thread, degrading
/// to synchronous execution.
pub fn run_striped(pool: &ThreadPool, jobs: Vec<Box<dyn Fn() + Send + Sync>>) {
    let n = pool.num_workers();
    if n == 0 {
        for job in &jobs {
            job();
        }
        return;
    }

    let jobs = Arc::new(jobs);
    pool.schedule(move |worker_id| {
        let mut index = worker_id;
        while index < jobs.len() {
            (jobs[index])();
            index += n;
        }
    });
    pool.sync();
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_mat::{multiply_naive, CpuBackend};

    #[test]
    fn test_verify_multiply_passes_on_reference() {
        let lhs = Mat::<i64>::random(8, 8);
        let rhs = Mat::<i64>::random(8, 8);
        let expected = multiply_naive(lhs.view(), rhs.view());

        let cpu = CpuBackend::new();
        let outcomes = verify_multiply(&[&cpu], &lhs, &rhs, &expected);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].backend, "cpu");
        assert!(outcomes[0].passed);
    }

    #[test]
    fn test_verify_multiply_flags_wrong_expectation() {
        let lhs = Mat::<i64>::random(4, 4);
        let rhs = Mat::<i64>::random(4, 4);
        let mut wrong = multiply_naive(lhs.view(), rhs.view());
        wrong.set(0, 0, wrong.get(0, 0) + 1);

        let cpu = CpuBackend::new();
        let outcomes = verify_multiply(&[&cpu], &lhs, &rhs, &wrong);
        assert!(!outcomes[0].passed);
    }

    #[test]
    fn test_run_striped_inline_with_no_workers() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let pool = ThreadPool::new();
        let counter = Arc::new(AtomicU32::new(0));

        let jobs: Vec<Box<dyn Fn() + Send + Sync>> = (0..10)
            .map(|_| {
                let c = Arc::clone(&counter);
                Box::new(move || {
                    c.fetch_add(1, Ordering::Relaxed);
                }) as Box<dyn Fn() + Send + Sync>
            })
            .collect();

        run_striped(&pool, jobs);
        assert_eq!(counter.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn test_run_striped_across_workers() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let mut pool = ThreadPool::new();
        pool.resize(4);
        let counter = Arc::new(AtomicU32::new(0));

        let jobs: Vec<Box<dyn Fn() + Send + Sync>> = (0..57)
            .map(|_| {
                let c = Arc::clone(&counter);
                Box::new(move || {
                    c.fetch_add(1, Ordering::Relaxed);
                }) as Box<dyn Fn() + Send + Sync>
            })
            .collect();

        run_striped(&pool, jobs);
        assert_eq!(counter.load(Ordering::Relaxed), 57);
    }
}
