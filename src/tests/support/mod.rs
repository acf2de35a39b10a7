// Shared helpers for the integration suite.

pub mod harness;

pub use harness::*;
