use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Backend driving the GPIB bus.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BusKind {
    /// In-memory bench of simulated instruments.
    #[default]
    Simulated,
    /// Forward traffic to an upstream Prologix GPIB-Ethernet controller.
    Prologix,
}

/// Simulated instrument declared as `PAD[:SAD]=IDN`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentDirective {
    /// Primary address.
    pub primary: u8,
    /// Optional secondary address in Prologix numbering (96–126).
    pub secondary: Option<u8>,
    /// Identification string returned for `*IDN?`.
    pub identity: String,
}

impl InstrumentDirective {
    /// Creates a new directive.
    #[must_use]
    pub fn new(primary: u8, secondary: Option<u8>, identity: impl Into<String>) -> Self {
        Self {
            primary,
            secondary,
            identity: identity.into(),
        }
    }
}

impl fmt::Display for InstrumentDirective {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.secondary {
            Some(secondary) => write!(
                formatter,
                "{}:{}={}",
                self.primary, secondary, self.identity
            ),
            None => write!(formatter, "{}={}", self.primary, self.identity),
        }
    }
}

impl FromStr for InstrumentDirective {
    type Err = InstrumentDirectiveParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (address, identity) = input
            .split_once('=')
            .ok_or_else(|| InstrumentDirectiveParseError::MissingIdentity(input.to_owned()))?;
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(InstrumentDirectiveParseError::MissingIdentity(
                input.to_owned(),
            ));
        }
        let (primary, secondary) = match address.split_once(':') {
            Some((primary, secondary)) => (primary, Some(secondary)),
            None => (address, None),
        };
        let primary = parse_address_part(primary)?;
        let secondary = secondary.map(parse_address_part).transpose()?;
        Ok(Self::new(primary, secondary, identity))
    }
}

impl TryFrom<String> for InstrumentDirective {
    type Error = InstrumentDirectiveParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InstrumentDirective> for String {
    fn from(directive: InstrumentDirective) -> Self {
        directive.to_string()
    }
}

fn parse_address_part(text: &str) -> Result<u8, InstrumentDirectiveParseError> {
    text.trim()
        .parse()
        .map_err(|_| InstrumentDirectiveParseError::InvalidAddress(text.trim().to_owned()))
}

/// Errors produced when parsing [`InstrumentDirective`] values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstrumentDirectiveParseError {
    /// The `=IDN` part was missing or empty.
    #[error("directive '{0}' is missing the identity after '='")]
    MissingIdentity(String),
    /// An address component was not a number.
    #[error("invalid instrument address '{0}'")]
    InvalidAddress(String),
}
