//! `mc-verify` - Backend verification and benchmark harness.
//!
//! Computes the same product on every available backend, compares against a
//! reference result loaded from a tensor file, and fans independent cases
//! across the thread pool. Timing samples land in the `mc-bench` sink for an
//! external reporter to drain.

pub mod compare;
pub mod error;
pub mod harness;

pub use compare::{first_mismatch, max_abs_diff};
pub use error::{Result, VerifyError};
pub use harness::{reference_triplets, run_striped, verify_multiply, verify_multiply_f32, Outcome, Triplet};
