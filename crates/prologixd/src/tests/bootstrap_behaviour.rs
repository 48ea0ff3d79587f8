//! Behavioural tests for the bootstrap sequence.

use std::cell::RefCell;
use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::OrthoError;
use prologix_config::{BusKind, Config};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, bootstrap_with,
};

use super::support::{
    HealthEvent, RecordingBusProvider, RecordingHealthReporter, loopback_config, strip_quotes,
};

/// Loader that fails on a malformed command-line flag.
struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("prologixd"),
            OsString::from("--read-timeout-ms"),
            OsString::from("soon"),
        ])
    }
}

struct BootstrapWorld {
    config: Option<Config>,
    reporter: Arc<RecordingHealthReporter>,
    provider: RecordingBusProvider,
    outcome: Option<Result<Daemon, BootstrapError>>,
}

impl BootstrapWorld {
    fn new() -> Self {
        Self {
            config: None,
            reporter: Arc::new(RecordingHealthReporter::default()),
            provider: RecordingBusProvider::default(),
            outcome: None,
        }
    }

    fn config_mut(&mut self) -> &mut Config {
        self.config.as_mut().expect("configuration given")
    }

    fn outcome(&self) -> &Result<Daemon, BootstrapError> {
        self.outcome.as_ref().expect("bootstrap ran")
    }
}

#[fixture]
fn world() -> RefCell<BootstrapWorld> {
    RefCell::new(BootstrapWorld::new())
}

#[given("a loopback configuration")]
fn given_loopback_config(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().config = Some(loopback_config());
}

#[given("a configuration that fails to load")]
fn given_failing_config(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().config = None;
}

#[given("a read timeout of {millis} ms")]
fn given_read_timeout(world: &RefCell<BootstrapWorld>, millis: u32) {
    world.borrow_mut().config_mut().read_timeout_ms = millis;
}

#[given("a bus that refuses to start")]
fn given_failing_bus(world: &RefCell<BootstrapWorld>) {
    world.borrow().provider.fail_with("controller unplugged");
}

#[when("the emulator bootstrap runs")]
fn when_bootstrap_runs(world: &RefCell<BootstrapWorld>) {
    let mut world = world.borrow_mut();
    let loader: Box<dyn ConfigLoader> = match world.config.clone() {
        Some(config) => Box::new(StaticConfigLoader::new(config)),
        None => Box::new(FailingConfigLoader),
    };
    let outcome = bootstrap_with(&*loader, world.reporter.clone(), &world.provider);
    world.outcome = Some(outcome);
}

#[then("bootstrap succeeds")]
fn then_bootstrap_succeeds(world: &RefCell<BootstrapWorld>) {
    let world = world.borrow();
    let daemon = world.outcome().as_ref().expect("bootstrap succeeded");
    assert_eq!(daemon.bus().interface(), "GPIB0");
    assert_eq!(daemon.bus().backend_name(), "simulated");
}

#[then("bootstrap fails")]
fn then_bootstrap_fails(world: &RefCell<BootstrapWorld>) {
    assert!(
        world.borrow().outcome().is_err(),
        "bootstrap succeeded unexpectedly"
    );
}

#[then("the bus was started once as simulated")]
fn then_bus_started(world: &RefCell<BootstrapWorld>) {
    assert_eq!(
        world.borrow().provider.recorded_starts(),
        vec![BusKind::Simulated]
    );
}

#[then("no bus was started")]
fn then_no_bus_started(world: &RefCell<BootstrapWorld>) {
    let starts = world.borrow().provider.recorded_starts();
    assert!(starts.is_empty(), "expected no bus starts, got {starts:?}");
}

#[then("the reporter recorded the bus ready on {interface}")]
fn then_bus_ready(world: &RefCell<BootstrapWorld>, interface: String) {
    let expected = HealthEvent::BusReady {
        kind: BusKind::Simulated,
        interface: strip_quotes(&interface).to_owned(),
    };
    let events = world.borrow().reporter.events();
    assert!(events.contains(&expected), "missing {expected:?} in {events:?}");
}

#[then("the reporter recorded bootstrap success")]
fn then_reporter_success(world: &RefCell<BootstrapWorld>) {
    let events = world.borrow().reporter.events();
    assert_eq!(events.first(), Some(&HealthEvent::BootstrapStarting));
    assert_eq!(events.last(), Some(&HealthEvent::BootstrapSucceeded));
}

#[then("the reporter recorded bootstrap failure")]
fn then_reporter_failure(world: &RefCell<BootstrapWorld>) {
    let events = world.borrow().reporter.events();
    let failed = events
        .iter()
        .any(|event| matches!(event, HealthEvent::BootstrapFailed(_)));
    assert!(failed, "bootstrap failure event missing: {events:?}");
    assert!(!events.contains(&HealthEvent::BootstrapSucceeded));
}

#[then("the reporter recorded a bus failure")]
fn then_reporter_bus_failure(world: &RefCell<BootstrapWorld>) {
    let expected = HealthEvent::BusFailed {
        kind: BusKind::Simulated,
        message: "controller unplugged".to_owned(),
    };
    let events = world.borrow().reporter.events();
    assert!(events.contains(&expected), "missing {expected:?} in {events:?}");
}

#[scenario(path = "tests/features/emulator_bootstrap.feature")]
fn emulator_bootstrap(#[from(world)] world: RefCell<BootstrapWorld>) {
    drop(world);
}
