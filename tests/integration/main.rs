//! Integration tests for Site-Mirror
//!
//! These tests run complete mirror passes against wiremock servers and
//! inspect the files left on disk.

mod common;
mod mirror_tests;
mod rewrite_tests;
