#![allow(dead_code)]

pub mod mocks;
pub mod models;

/// Routes `log` output through the test harness.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
