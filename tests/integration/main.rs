//! Integration tests.

mod helpers;
mod pipeline_test;
mod session_test;
