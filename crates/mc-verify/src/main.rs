use std::path::Path;
use std::sync::{Arc, Mutex};

use mc_bench::bench_info;
use mc_loader::TensorFile;
use mc_mat::{ComputeBackend, CpuBackend};
use mc_pool::{ThreadPool, MAX_WORKERS};
use mc_verify::{reference_triplets, run_striped, verify_multiply, Outcome};

fn main() {
    // Argument parsing stays out of the core; the single optional argument
    // is the reference file path.
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "testdata/matmul.safetensors".to_string());

    if let Err(err) = run(Path::new(&path)) {
        eprintln!("verification failed: {}", err);
        std::process::exit(1);
    }
}

fn backends() -> Vec<Box<dyn ComputeBackend>> {
    let mut backends: Vec<Box<dyn ComputeBackend>> = Vec::new();
    backends.push(Box::new(CpuBackend::new()));

    #[cfg(feature = "opencl")]
    {
        match std::fs::read_to_string("kernels/matmul.cl") {
            Ok(source) => match mc_mat::ClContext::new(&source) {
                Ok(ctx) => backends.push(Box::new(mc_mat::ClBackend::new(ctx))),
                Err(err) => log::warn!("opencl backend unavailable: {}", err),
            },
            Err(err) => log::warn!("opencl kernel source unavailable: {}", err),
        }
    }

    #[cfg(feature = "cuda")]
    {
        backends.push(Box::new(mc_mat::CudaBackend::new(
            mc_mat::CudaRunner::linked(),
            mc_mat::KernelVariant::Plain,
        )));
    }

    backends
}

fn run(path: &Path) -> mc_verify::Result<()> {
    let file = TensorFile::open(path)?;
    let triplets = reference_triplets(&file)?;
    println!("{}: {} reference cases", path.display(), triplets.len());

    let backends = Arc::new(backends());
    let outcomes: Arc<Mutex<Vec<(u64, Outcome)>>> = Arc::new(Mutex::new(Vec::new()));

    let workers = std::thread::available_parallelism()
        .map(|n| n.get().min(MAX_WORKERS))
        .unwrap_or(1);
    let mut pool = ThreadPool::new();
    pool.resize(workers);

    let jobs = triplets
        .into_iter()
        .map(|triplet| {
            let backends = Arc::clone(&backends);
            let outcomes = Arc::clone(&outcomes);
            Box::new(move || {
                let refs: Vec<&dyn ComputeBackend> =
                    backends.iter().map(|b| b.as_ref()).collect();
                let results =
                    verify_multiply(&refs, &triplet.lhs, &triplet.rhs, &triplet.expected);
                let mut outcomes = outcomes.lock().unwrap();
                outcomes.extend(results.into_iter().map(|o| (triplet.id, o)));
            }) as Box<dyn Fn() + Send + Sync>
        })
        .collect();

    run_striped(&pool, jobs);

    let mut failed = 0usize;
    for (id, outcome) in outcomes.lock().unwrap().iter() {
        if !outcome.passed {
            failed += 1;
        }
        println!(
            "case {} on {}: {} ({} us)",
            id,
            outcome.backend,
            if outcome.passed { "ok" } else { "MISMATCH" },
            outcome.duration.as_micros()
        );
    }

    for entry in bench_info().drain() {
        println!("bench {}: {} ns", entry.label, entry.duration.as_nanos());
    }

    if failed > 0 {
        eprintln!("{} backend checks failed", failed);
        std::process::exit(1);
    }
    Ok(())
}
