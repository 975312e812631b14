//! Shared test utilities for the weather feed workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Feed payload fixtures for every known response shape
//! - Bulk location generators
//! - A local mock feed server
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{MockFeed, MockResponse, region_forecast_payload};
//! ```

pub mod fixtures;
pub mod generators;
pub mod server;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use server::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(20.0001_f64, 20.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(21.0_f64, 20.0_f64, 0.001_f64);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
