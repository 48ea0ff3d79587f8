//! Test suites for the shared bus.
