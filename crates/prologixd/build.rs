//! Build script: render the prologixd man page for packaging.

use std::{env, fs, io, path::Path, path::PathBuf};
use time::{OffsetDateTime, format_description::well_known::Iso8601};

const FALLBACK_DATE: &str = "1970-01-01";

fn manual_date() -> String {
    let Ok(raw) = env::var("SOURCE_DATE_EPOCH") else {
        return FALLBACK_DATE.into();
    };
    let formatted = raw
        .parse::<i64>()
        .ok()
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
        .and_then(|moment| moment.format(&Iso8601::DATE).ok());
    formatted.unwrap_or_else(|| {
        println!(
            "cargo:warning=Ignoring SOURCE_DATE_EPOCH '{raw}'; using {FALLBACK_DATE} for the \
             manual date"
        );
        FALLBACK_DATE.into()
    })
}

/// `OUT_DIR` is `{target}/{profile}/build/{crate}-{hash}/out`; walk back to
/// `{target}`.
fn target_root() -> Option<PathBuf> {
    let out_dir = PathBuf::from(env::var_os("OUT_DIR")?);
    out_dir.ancestors().nth(4).map(Path::to_path_buf)
}

fn install(page: &[u8], dir: &Path, name: &str) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let staged = dir.join(format!("{name}.tmp"));
    fs::write(&staged, page)?;
    fs::rename(&staged, dir.join(name))
}

fn render(binary: &str, version: &str) -> String {
    let title = binary.to_uppercase();
    let date = manual_date();
    format!(
        ".TH \"{title}\" \"1\" \"{date}\" \"{binary} {version}\" \"Prologix Emulator\"\n\
.SH NAME\n\
{binary} \\- Prologix GPIB-Ethernet controller emulator\n\
.SH SYNOPSIS\n\
.B {binary}\n\
[\\fB\\-\\-listen\\fR \\fIENDPOINT\\fR] [\\fB\\-\\-bus\\fR \\fIsimulated|prologix\\fR]\n\
.SH DESCRIPTION\n\
{binary} accepts TCP connections on port 1234 and speaks the Prologix\n\
GPIB-Ethernet command set, relaying instrument traffic over one shared GPIB\n\
bus. Settings are read from defaults, a TOML file, PROLOGIX_* environment\n\
variables and command-line flags, in increasing order of precedence.\n"
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    for variable in ["CARGO_PKG_VERSION", "CARGO_BIN_NAME", "SOURCE_DATE_EPOCH", "TARGET", "PROFILE"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    let binary = env::var("CARGO_BIN_NAME").unwrap_or_else(|_| "prologixd".into());
    let version = env::var("CARGO_PKG_VERSION")
        .map_err(|_| "CARGO_PKG_VERSION must be set by Cargo to render the manual page")?;
    let page = render(&binary, &version);
    let name = format!("{binary}.1");

    let target = env::var("TARGET").unwrap_or_else(|_| "unknown-target".into());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown-profile".into());
    let packaged = target_root()
        .unwrap_or_else(|| PathBuf::from("target"))
        .join(format!("generated-man/{target}/{profile}"));
    install(page.as_bytes(), &packaged, &name)?;

    if let Some(out_dir) = env::var_os("OUT_DIR")
        && let Err(error) = install(page.as_bytes(), Path::new(&out_dir), &name)
    {
        println!("cargo:warning=Failed to stage manual page in OUT_DIR: {error}");
    }
    Ok(())
}
