//! Pre-upgrade backup library exports for testing.
//!
//! The binary is a thin CLI over these modules; integration tests in
//! `tests/` drive them against sandboxed directories.

pub mod archive;
pub mod backup;
pub mod catalog;
pub mod commands;
pub mod common;
pub mod config;
pub mod copier;
pub mod diagnostics;
pub mod identity;
pub mod preflight;
pub mod process;
pub mod runlog;
