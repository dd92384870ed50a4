//! Scanner Execution Subsystem
//!
//! Builds the scanner command line from a [`crate::request::ScanRequest`] and
//! runs it as a child process.
//!
//! # Security
//!
//! - The scanner is executed directly, never through a shell
//! - Registry credentials travel in the environment, never in argv
//! - The scanner's stdout is captured, not echoed, so large reports stay out of
//!   the pipeline log

mod executor;

pub use executor::{
    build_args, registry_env, ExecutorConfig, ScanExecutor, ScanOutcome, REGISTRY_PASSWORD_ENV,
    REGISTRY_USERNAME_ENV, UPDATE_CHECK_ENV,
};
