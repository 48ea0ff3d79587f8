//! Output format of the emulator's diagnostic log.
//!
//! The log goes to stderr. Clients on the Prologix port never see it.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How `prologixd` renders log events, selected with `--log-format` or
/// `PROLOGIX_LOG_FORMAT`.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with fields flattened, for a service
    /// manager's journal.
    #[default]
    Json,
    /// Terse single-line events for watching a bench session in a terminal.
    Compact,
}

/// Rejected `--log-format` value.
pub type LogFormatParseError = strum::ParseError;
