//! Aggregated integration test suite.

mod charts_tests;
mod exchange_tests;
mod matching_tests;
mod pricing_tests;
