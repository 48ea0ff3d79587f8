//! Test suites for the emulator daemon.

mod bootstrap_behaviour;
mod support;
