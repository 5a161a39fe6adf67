//! Integration tests for bulk update orchestration.

pub mod processing;
pub mod property_tests;
