pub mod controller;
pub mod log_viewer;
pub mod normalizer;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
