//! The static Prologix command table.

use std::str::FromStr;
use std::time::Duration;

use gpib_bus::{GpibAddress, ReadTermination};
use prologix_config::{MAX_READ_TIMEOUT_MS, MIN_READ_TIMEOUT_MS};

use super::client::{ClientConnection, Eos};
use super::errors::DispatchError;

/// Reply to `++ver`.
pub(crate) const VERSION: &str = concat!(
    "Prologix GPIB-ETHERNET emulator version ",
    env!("CARGO_PKG_VERSION")
);

/// What a command sends back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reply {
    /// Setters answer nothing.
    Silent,
    /// A single text line.
    Line(String),
    /// Several text lines.
    Lines(Vec<String>),
    /// Raw instrument bytes, written verbatim.
    Data(Vec<u8>),
}

type CommandFn = fn(&mut ClientConnection, &[&str]) -> Result<Reply, DispatchError>;

/// One entry of the command table.
pub(crate) struct CommandEntry {
    pub(crate) name: &'static str,
    pub(crate) usage: &'static str,
    pub(crate) help: &'static str,
    run: CommandFn,
}

impl CommandEntry {
    const fn new(name: &'static str, usage: &'static str, help: &'static str, run: CommandFn) -> Self {
        Self {
            name,
            usage,
            help,
            run,
        }
    }
}

pub(crate) static COMMANDS: &[CommandEntry] = &[
    CommandEntry::new("addr", "addr [pad [sad]]", "Set or query the GPIB address", addr),
    CommandEntry::new("auto", "auto [0|1]", "Read after writing a query", auto),
    CommandEntry::new("clr", "clr", "Send Selected Device Clear", clr),
    CommandEntry::new("eoi", "eoi [0|1]", "Assert EOI with the last byte written", eoi),
    CommandEntry::new("eos", "eos [0|1|2|3]", "Terminator: 0 CR+LF, 1 CR, 2 LF, 3 none", eos),
    CommandEntry::new("eot_enable", "eot_enable [0|1]", "Append eot_char when EOI is seen", eot_enable),
    CommandEntry::new("eot_char", "eot_char [0-255]", "Character appended by eot_enable", eot_char),
    CommandEntry::new("help", "help", "List commands", help),
    CommandEntry::new("ifc", "ifc", "Pulse Interface Clear", ifc),
    CommandEntry::new("llo", "llo", "Local lockout on the addressed instrument", llo),
    CommandEntry::new("loc", "loc", "Return the addressed instrument to local", loc),
    CommandEntry::new("lon", "lon [0|1]", "Listen-only (device mode only)", lon),
    CommandEntry::new("mode", "mode [0|1]", "Operating mode; only controller (1) is emulated", mode),
    CommandEntry::new("read", "read [eoi|char]", "Read until timeout, EOI or a character", read),
    CommandEntry::new("read_tmo_ms", "read_tmo_ms [1-3000]", "Read timeout in milliseconds", read_tmo_ms),
    CommandEntry::new("rst", "rst", "Reset this connection's settings", rst),
    CommandEntry::new("savecfg", "savecfg [0|1]", "Accepted for compatibility", savecfg),
    CommandEntry::new("spoll", "spoll [pad [sad]]", "Serial poll and reply the status byte", spoll),
    CommandEntry::new("srq", "srq", "Reply 1 when SRQ is asserted", srq),
    CommandEntry::new("status", "status [byte]", "Status byte (device mode only)", status),
    CommandEntry::new("trg", "trg [pad [sad] ...]", "Group Execute Trigger", trg),
    CommandEntry::new("ver", "ver", "Reply the emulator version", ver),
];

/// Finds a command by name, ignoring case.
pub(crate) fn lookup(name: &str) -> Option<&'static CommandEntry> {
    COMMANDS
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
}

/// Runs the `++` command `text` (without the prefix) for `client`.
pub(crate) fn execute(client: &mut ClientConnection, text: &str) -> Result<Reply, DispatchError> {
    let mut tokens = text.split_whitespace();
    let name = tokens.next().unwrap_or_default();
    let args: Vec<&str> = tokens.collect();
    let entry = lookup(name).ok_or_else(|| DispatchError::unknown_command(name.to_ascii_lowercase()))?;
    (entry.run)(client, &args)
}

fn no_args(command: &'static str, args: &[&str]) -> Result<(), DispatchError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(DispatchError::invalid_argument(command, "takes no arguments"))
    }
}

fn single_arg<'a>(command: &'static str, args: &[&'a str]) -> Result<Option<&'a str>, DispatchError> {
    match args {
        [] => Ok(None),
        [value] => Ok(Some(*value)),
        _ => Err(DispatchError::invalid_argument(command, "expected one argument")),
    }
}

fn parse_in_range<T>(
    command: &'static str,
    value: &str,
    min: T,
    max: T,
) -> Result<T, DispatchError>
where
    T: FromStr + PartialOrd + std::fmt::Display + Copy,
{
    value
        .parse::<T>()
        .ok()
        .filter(|parsed| *parsed >= min && *parsed <= max)
        .ok_or_else(|| {
            DispatchError::invalid_argument(command, format!("'{value}' is outside {min}-{max}"))
        })
}

/// Handles the `[0|1]` query-or-set shape shared by several commands.
fn flag(
    command: &'static str,
    args: &[&str],
    current: bool,
    apply: impl FnOnce(bool),
) -> Result<Reply, DispatchError> {
    match single_arg(command, args)? {
        None => Ok(Reply::Line(u8::from(current).to_string())),
        Some(value) => {
            apply(parse_in_range::<u8>(command, value, 0, 1)? == 1);
            Ok(Reply::Silent)
        }
    }
}

fn address_arg(command: &'static str, args: &[&str]) -> Result<Option<GpibAddress>, DispatchError> {
    if args.is_empty() {
        return Ok(None);
    }
    GpibAddress::parse_args(args)
        .map(Some)
        .map_err(|error| DispatchError::invalid_argument(command, error.to_string()))
}

fn addr(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    match address_arg("addr", args)? {
        Some(address) => {
            client.select(address)?;
            Ok(Reply::Silent)
        }
        None => client
            .address()
            .map(|address| Reply::Line(address.to_string()))
            .ok_or(DispatchError::NotAddressed),
    }
}

fn auto(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    let current = client.settings.auto_read;
    flag("auto", args, current, |value| client.settings.auto_read = value)
}

fn clr(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    no_args("clr", args)?;
    client.clear()?;
    Ok(Reply::Silent)
}

fn eoi(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    let current = client.settings.eoi;
    flag("eoi", args, current, |value| client.settings.eoi = value)
}

fn eos(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    match single_arg("eos", args)? {
        None => Ok(Reply::Line(client.settings.eos.code().to_string())),
        Some(value) => {
            let code = parse_in_range::<u8>("eos", value, 0, 3)?;
            client.settings.eos = Eos::from_code(code)
                .ok_or_else(|| DispatchError::invalid_argument("eos", "expected 0-3"))?;
            Ok(Reply::Silent)
        }
    }
}

fn eot_enable(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    let current = client.settings.eot_enable;
    flag("eot_enable", args, current, |value| {
        client.settings.eot_enable = value;
    })
}

fn eot_char(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    match single_arg("eot_char", args)? {
        None => Ok(Reply::Line(client.settings.eot_char.to_string())),
        Some(value) => {
            client.settings.eot_char = parse_in_range::<u8>("eot_char", value, 0, u8::MAX)?;
            Ok(Reply::Silent)
        }
    }
}

fn help(_client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    no_args("help", args)?;
    Ok(Reply::Lines(
        COMMANDS
            .iter()
            .map(|entry| format!("++{:<22}{}", entry.usage, entry.help))
            .collect(),
    ))
}

fn ifc(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    no_args("ifc", args)?;
    client.bus().interface_clear()?;
    Ok(Reply::Silent)
}

fn llo(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    no_args("llo", args)?;
    client.local_lockout()?;
    Ok(Reply::Silent)
}

fn loc(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    no_args("loc", args)?;
    client.go_to_local()?;
    Ok(Reply::Silent)
}

fn lon(_client: &mut ClientConnection, _args: &[&str]) -> Result<Reply, DispatchError> {
    Err(DispatchError::DeviceModeOnly { command: "lon" })
}

fn status(_client: &mut ClientConnection, _args: &[&str]) -> Result<Reply, DispatchError> {
    Err(DispatchError::DeviceModeOnly { command: "status" })
}

fn mode(_client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    match single_arg("mode", args)? {
        None => Ok(Reply::Line("1".to_owned())),
        Some(value) => match parse_in_range::<u8>("mode", value, 0, 1)? {
            1 => Ok(Reply::Silent),
            _ => Err(DispatchError::invalid_argument(
                "mode",
                "device mode is not supported",
            )),
        },
    }
}

fn read(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    let termination = match single_arg("read", args)? {
        None => ReadTermination::Timeout,
        Some(value) if value.eq_ignore_ascii_case("eoi") => ReadTermination::Eoi,
        Some(value) => ReadTermination::Char(parse_in_range::<u8>("read", value, 0, u8::MAX)?),
    };
    Ok(Reply::Data(client.read(termination)?))
}

fn read_tmo_ms(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    match single_arg("read_tmo_ms", args)? {
        None => Ok(Reply::Line(
            client.settings.read_timeout.as_millis().to_string(),
        )),
        Some(value) => {
            let millis = parse_in_range::<u32>(
                "read_tmo_ms",
                value,
                MIN_READ_TIMEOUT_MS,
                MAX_READ_TIMEOUT_MS,
            )?;
            client.settings.read_timeout = Duration::from_millis(u64::from(millis));
            Ok(Reply::Silent)
        }
    }
}

fn rst(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    no_args("rst", args)?;
    client.reset();
    Ok(Reply::Silent)
}

fn savecfg(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    let current = client.settings.savecfg;
    flag("savecfg", args, current, |value| client.settings.savecfg = value)
}

fn spoll(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    let target = address_arg("spoll", args)?;
    let status = client.serial_poll(target)?;
    Ok(Reply::Line(status.to_string()))
}

fn srq(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    no_args("srq", args)?;
    let asserted = client.bus().service_request()?;
    Ok(Reply::Line(u8::from(asserted).to_string()))
}

fn trg(client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    let targets = GpibAddress::parse_list(args)
        .map_err(|error| DispatchError::invalid_argument("trg", error.to_string()))?;
    client.trigger(&targets)?;
    Ok(Reply::Silent)
}

fn ver(_client: &mut ClientConnection, args: &[&str]) -> Result<Reply, DispatchError> {
    no_args("ver", args)?;
    Ok(Reply::Line(VERSION.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use gpib_bus::{GpibBus, RQS_BIT, RemoteState, SimulatedBackend};
    use rstest::{fixture, rstest};

    use crate::dispatch::ClientDefaults;

    #[fixture]
    fn client() -> ClientConnection {
        let meter = GpibAddress::primary(23).expect("address");
        let backend = SimulatedBackend::new().with_instrument(meter, "HP3458A");
        let bus = Arc::new(GpibBus::new("GPIB0", Box::new(backend)));
        ClientConnection::new(
            bus,
            ClientDefaults {
                read_timeout: Duration::from_millis(50),
                address: None,
            },
        )
    }

    /// A client on a two-instrument bench, with a handle for inspecting it.
    struct Rig {
        bench: SimulatedBackend,
        client: ClientConnection,
    }

    impl Rig {
        fn run(&mut self, command: &str) -> Reply {
            execute(&mut self.client, command).unwrap_or_else(|error| panic!("{command}: {error}"))
        }
    }

    fn pad(value: u8) -> GpibAddress {
        GpibAddress::primary(value).expect("address")
    }

    #[fixture]
    fn rig() -> Rig {
        let bench = SimulatedBackend::new()
            .with_instrument(pad(22), "HEWLETT-PACKARD,53131A,0,4806")
            .with_instrument(pad(23), "HP3458A");
        let bus = Arc::new(GpibBus::new("GPIB0", Box::new(bench.clone())));
        let client = ClientConnection::new(
            bus,
            ClientDefaults {
                read_timeout: Duration::from_millis(50),
                address: None,
            },
        );
        Rig { bench, client }
    }

    fn line(reply: Reply) -> String {
        match reply {
            Reply::Line(text) => text,
            other => panic!("expected a line, got {other:?}"),
        }
    }

    #[rstest]
    #[case("ADDR")]
    #[case("Ver")]
    #[case("eot_enable")]
    fn lookup_ignores_case(#[case] name: &str) {
        assert!(lookup(name).is_some());
    }

    #[rstest]
    fn unknown_commands_are_named_in_the_error(mut client: ClientConnection) {
        let error = execute(&mut client, "bogus 1").expect_err("unknown");
        assert_eq!(error.to_string(), "Unknown command '++bogus'");
    }

    #[rstest]
    fn setters_are_silent_and_getters_reply(mut client: ClientConnection) {
        assert_eq!(execute(&mut client, "auto 1").expect("set"), Reply::Silent);
        assert_eq!(line(execute(&mut client, "auto").expect("get")), "1");
        assert_eq!(execute(&mut client, "eos 2").expect("set"), Reply::Silent);
        assert_eq!(line(execute(&mut client, "eos").expect("get")), "2");
        assert_eq!(execute(&mut client, "read_tmo_ms 750").expect("set"), Reply::Silent);
        assert_eq!(line(execute(&mut client, "read_tmo_ms").expect("get")), "750");
    }

    #[rstest]
    #[case("auto 2")]
    #[case("eos 4")]
    #[case("read_tmo_ms 0")]
    #[case("read_tmo_ms 3001")]
    #[case("eot_char 256")]
    #[case("addr 31")]
    #[case("ver now")]
    fn rejects_out_of_range_arguments(mut client: ClientConnection, #[case] command: &str) {
        let error = execute(&mut client, command).expect_err("invalid");
        assert!(matches!(error, DispatchError::InvalidArgument { .. }), "{error}");
    }

    #[rstest]
    fn addr_query_requires_an_address(mut client: ClientConnection) {
        let error = execute(&mut client, "addr").expect_err("unaddressed");
        assert!(matches!(error, DispatchError::NotAddressed));
        execute(&mut client, "addr 23").expect("select");
        assert_eq!(line(execute(&mut client, "addr").expect("query")), "23");
    }

    #[rstest]
    fn addressing_an_empty_slot_fails(mut client: ClientConnection) {
        let error = execute(&mut client, "addr 5").expect_err("no device");
        assert!(matches!(error, DispatchError::Bus(_)));
        assert_eq!(client.address(), None);
    }

    #[rstest]
    fn read_collects_pending_response(mut client: ClientConnection) {
        execute(&mut client, "addr 23").expect("select");
        client.send_data(b"ID?").expect("write");
        assert_eq!(
            execute(&mut client, "read eoi").expect("read"),
            Reply::Data(b"HP3458A\n".to_vec())
        );
    }

    #[rstest]
    fn device_mode_commands_are_refused(mut client: ClientConnection) {
        for command in ["lon 1", "status 64"] {
            let error = execute(&mut client, command).expect_err("device mode");
            assert!(matches!(error, DispatchError::DeviceModeOnly { .. }));
        }
        assert!(execute(&mut client, "mode 0").is_err());
        assert_eq!(line(execute(&mut client, "mode").expect("mode")), "1");
    }

    #[rstest]
    fn help_lists_every_command(mut client: ClientConnection) {
        let Reply::Lines(lines) = execute(&mut client, "help").expect("help") else {
            panic!("help should reply with lines");
        };
        assert_eq!(lines.len(), COMMANDS.len());
        assert!(lines.iter().any(|line| line.starts_with("++read_tmo_ms")));
    }

    #[rstest]
    fn ver_reports_emulator_version(mut client: ClientConnection) {
        let version = line(execute(&mut client, "ver").expect("ver"));
        assert!(version.starts_with("Prologix GPIB-ETHERNET"));
    }

    #[rstest]
    #[case("read")]
    #[case("read eoi")]
    #[case("clr")]
    #[case("llo")]
    #[case("loc")]
    #[case("spoll")]
    #[case("trg")]
    fn instrument_commands_need_an_address(mut rig: Rig, #[case] command: &str) {
        let error = execute(&mut rig.client, command).expect_err("unaddressed");
        assert!(matches!(error, DispatchError::NotAddressed), "{command}: {error}");
        assert_eq!(error.to_string(), "No GPIB device addressed");
    }

    #[rstest]
    fn trg_triggers_listed_or_addressed_instruments(mut rig: Rig) {
        assert_eq!(rig.run("trg 22 23"), Reply::Silent);
        rig.run("addr 23");
        assert_eq!(rig.run("trg"), Reply::Silent);
        assert_eq!(rig.bench.trigger_count(pad(22)), 1);
        assert_eq!(rig.bench.trigger_count(pad(23)), 2);
    }

    #[rstest]
    fn ifc_pulses_interface_clear(mut rig: Rig) {
        assert_eq!(rig.run("ifc"), Reply::Silent);
        assert_eq!(rig.bench.interface_clear_count(), 1);
    }

    #[rstest]
    fn clr_drops_pending_output_and_status(mut rig: Rig) {
        rig.run("addr 23");
        rig.bench.set_status_byte(pad(23), RQS_BIT);
        rig.client.send_data(b"ID?").expect("query written");
        assert_eq!(rig.run("clr"), Reply::Silent);
        let error = execute(&mut rig.client, "read eoi").expect_err("output cleared");
        assert!(matches!(error, DispatchError::Bus(_)), "{error}");
        assert_eq!(line(rig.run("spoll")), "0");
    }

    #[rstest]
    fn spoll_and_srq_report_service_requests(mut rig: Rig) {
        assert_eq!(line(rig.run("srq")), "0");
        rig.bench.set_status_byte(pad(22), RQS_BIT | 0x01);
        assert_eq!(line(rig.run("srq")), "1");
        assert_eq!(line(rig.run("spoll 22")), "65");
        assert_eq!(line(rig.run("srq")), "0");
        assert_eq!(rig.client.address(), None);
    }

    #[rstest]
    fn llo_and_loc_switch_front_panel(mut rig: Rig) {
        rig.run("addr 22");
        assert_eq!(rig.run("llo"), Reply::Silent);
        assert_eq!(rig.bench.remote_state(pad(22)), Some(RemoteState::Lockout));
        assert_eq!(rig.run("loc"), Reply::Silent);
        assert_eq!(rig.bench.remote_state(pad(22)), Some(RemoteState::Local));
    }

    #[rstest]
    fn rst_restores_settings_and_releases_session(mut rig: Rig) {
        rig.run("addr 23");
        rig.run("auto 1");
        rig.run("eos 3");
        assert!(rig.bench.is_open(pad(23)));

        assert_eq!(rig.run("rst"), Reply::Silent);
        assert_eq!(rig.client.address(), None);
        assert!(!rig.bench.is_open(pad(23)));
        assert_eq!(line(rig.run("auto")), "0");
        assert_eq!(line(rig.run("eos")), "0");
    }
}
