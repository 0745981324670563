pub mod orchestrator_tests;

// Re-export test utilities
mod test_utils;
pub use test_utils::*;
