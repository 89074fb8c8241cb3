//! Reliability helpers.

pub mod retry;
