//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a subsystem against the
//! mock adapters in `mock_hw`. All tests run on the host with no radio stack
//! or serial hardware.

mod dispatch_tests;
mod harness;
mod scheduler_tests;
