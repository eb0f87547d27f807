//! End-to-end check: reference triplets loaded from a tensor file, verified
//! on every backend, fanned across the thread pool.

use std::io::Write;
use std::sync::{Arc, Mutex};

use mc_loader::TensorFile;
use mc_mat::{
    multiply_naive, AnyMat, AnyView, ComputeBackend, CpuBackend, Mat, MatError,
};
use mc_pool::ThreadPool;
use mc_verify::{reference_triplets, run_striped, verify_multiply};

/// Serialize matrices into the container format the loader expects, with
/// `A<id>`/`B<id>`/`C<id>` naming and I32 payloads.
fn write_triplet_file(
    dir: &tempfile::TempDir,
    triplets: &[(u64, &Mat<i64>, &Mat<i64>, &Mat<i64>)],
) -> std::path::PathBuf {
    let mut header = serde_json::Map::new();
    let mut data = Vec::new();

    let mut push_tensor = |name: String, m: &Mat<i64>| {
        let begin = data.len();
        for y in 0..m.height() {
            for x in 0..m.width() {
                data.extend((m.get(x, y) as i32).to_le_bytes());
            }
        }
        header.insert(
            name,
            serde_json::json!({
                "dtype": "I32",
                "shape": [m.height(), m.width()],
                "data_offsets": [begin, data.len()],
            }),
        );
    };

    for &(id, a, b, c) in triplets {
        push_tensor(format!("A{}", id), a);
        push_tensor(format!("B{}", id), b);
        push_tensor(format!("C{}", id), c);
    }

    let path = dir.path().join("triplets.safetensors");
    let header_bytes = serde_json::to_vec(&serde_json::Value::Object(header)).unwrap();
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&(header_bytes.len() as u64).to_le_bytes())
        .unwrap();
    file.write_all(&header_bytes).unwrap();
    file.write_all(&data).unwrap();
    path
}

fn small_random(width: usize, height: usize, seed: &mut u64) -> Mat<i64> {
    let mut m = Mat::new(width, height);
    for y in 0..height {
        for x in 0..width {
            *seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            m.set(x, y, (*seed >> 33) as i64 % 50);
        }
    }
    m
}

/// A backend that always reports a resource failure.
#[derive(Debug)]
struct BrokenBackend;

impl ComputeBackend for BrokenBackend {
    fn name(&self) -> &str {
        "broken"
    }

    fn multiply(&self, _lhs: AnyView<'_>, _rhs: AnyView<'_>) -> mc_mat::Result<AnyMat> {
        Err(MatError::CudaKernel(-1))
    }
}

#[test]
fn triplets_verify_on_cpu_and_flag_broken_backend() {
    let mut seed = 42u64;
    let dir = tempfile::tempdir().unwrap();

    let a0 = small_random(8, 8, &mut seed);
    let b0 = small_random(8, 8, &mut seed);
    let c0 = multiply_naive(a0.view(), b0.view());
    let a1 = small_random(4, 4, &mut seed);
    let b1 = small_random(4, 4, &mut seed);
    let c1 = multiply_naive(a1.view(), b1.view());

    let path = write_triplet_file(&dir, &[(0, &a0, &b0, &c0), (1, &a1, &b1, &c1)]);

    let file = TensorFile::open(&path).unwrap();
    let triplets = reference_triplets(&file).unwrap();
    assert_eq!(triplets.len(), 2);
    assert_eq!(triplets[0].id, 0);
    assert_eq!(triplets[0].lhs.width(), 8);

    let cpu = CpuBackend::new();
    let broken = BrokenBackend;
    for triplet in &triplets {
        let outcomes = verify_multiply(
            &[&cpu, &broken],
            &triplet.lhs,
            &triplet.rhs,
            &triplet.expected,
        );
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].passed, "cpu must match the reference");
        assert!(!outcomes[1].passed, "broken backend must be flagged");
    }
}

#[test]
fn verification_jobs_fan_across_the_pool() {
    let mut seed = 7u64;
    let dir = tempfile::tempdir().unwrap();

    let mut refs = Vec::new();
    for _ in 0..6 {
        let a = small_random(8, 8, &mut seed);
        let b = small_random(8, 8, &mut seed);
        let c = multiply_naive(a.view(), b.view());
        refs.push((a, b, c));
    }
    let triplet_args: Vec<(u64, &Mat<i64>, &Mat<i64>, &Mat<i64>)> = refs
        .iter()
        .enumerate()
        .map(|(i, (a, b, c))| (i as u64, a, b, c))
        .collect();
    let path = write_triplet_file(&dir, &triplet_args);

    for workers in [0usize, 4] {
        let file = TensorFile::open(&path).unwrap();
        let triplets = reference_triplets(&file).unwrap();

        let mut pool = ThreadPool::new();
        pool.resize(workers);

        let passed: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let jobs = triplets
            .into_iter()
            .map(|triplet| {
                let passed = Arc::clone(&passed);
                Box::new(move || {
                    let cpu = CpuBackend::new();
                    let outcomes =
                        verify_multiply(&[&cpu], &triplet.lhs, &triplet.rhs, &triplet.expected);
                    if outcomes.iter().all(|o| o.passed) {
                        passed.lock().unwrap().push(triplet.id);
                    }
                }) as Box<dyn Fn() + Send + Sync>
            })
            .collect();

        run_striped(&pool, jobs);

        let mut passed = passed.lock().unwrap().clone();
        passed.sort_unstable();
        assert_eq!(passed, vec![0, 1, 2, 3, 4, 5]);
    }
}
