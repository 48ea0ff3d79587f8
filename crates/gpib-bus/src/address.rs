//! GPIB addressing in Prologix notation.
//!
//! Primary addresses run from 0 to 30. Secondary addresses use the Prologix
//! convention of 96–126 (`0x60 | sad`) everywhere, including resource names.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use thiserror::Error;

/// Valid primary addresses.
pub const PRIMARY_RANGE: RangeInclusive<u8> = 0..=30;

/// Valid secondary addresses in Prologix numbering.
pub const SECONDARY_RANGE: RangeInclusive<u8> = 96..=126;

/// A listener address on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpibAddress {
    pad: u8,
    sad: Option<u8>,
}

impl GpibAddress {
    /// Builds an address, validating both parts.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] when either part is out of range.
    pub fn new(pad: u8, sad: Option<u8>) -> Result<Self, AddressError> {
        if !PRIMARY_RANGE.contains(&pad) {
            return Err(AddressError::Primary {
                value: pad.to_string(),
            });
        }
        if let Some(secondary) = sad
            && !SECONDARY_RANGE.contains(&secondary)
        {
            return Err(AddressError::Secondary {
                value: secondary.to_string(),
            });
        }
        Ok(Self { pad, sad })
    }

    /// Builds a primary-only address.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Primary`] when `pad` exceeds 30.
    pub fn primary(pad: u8) -> Result<Self, AddressError> {
        Self::new(pad, None)
    }

    /// Primary address.
    #[must_use]
    pub fn pad(&self) -> u8 {
        self.pad
    }

    /// Secondary address in Prologix numbering.
    #[must_use]
    pub fn sad(&self) -> Option<u8> {
        self.sad
    }

    /// VISA-style resource name such as `GPIB0::5::INSTR`.
    #[must_use]
    pub fn resource_name(&self, interface: &str) -> String {
        match self.sad {
            Some(sad) => format!("{interface}::{}::{sad}::INSTR", self.pad),
            None => format!("{interface}::{}::INSTR", self.pad),
        }
    }

    /// Parses one address from whitespace-separated arguments.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] unless the tokens describe exactly one address.
    pub fn parse_args(tokens: &[&str]) -> Result<Self, AddressError> {
        let mut addresses = Self::parse_list(tokens)?.into_iter();
        match (addresses.next(), addresses.next()) {
            (Some(address), None) => Ok(address),
            (None, _) => Err(AddressError::Empty),
            (Some(_), Some(_)) => Err(AddressError::TooMany),
        }
    }

    /// Parses an address list as accepted by `++trg`.
    ///
    /// A value in the secondary range attaches to the primary address that
    /// precedes it.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] for non-numeric tokens, out-of-range values or
    /// a secondary address without a primary.
    pub fn parse_list(tokens: &[&str]) -> Result<Vec<Self>, AddressError> {
        let mut addresses: Vec<Self> = Vec::new();
        let mut open_primary = false;
        for token in tokens {
            let value: u8 = token.parse().map_err(|_| AddressError::NotANumber {
                value: (*token).to_owned(),
            })?;
            if SECONDARY_RANGE.contains(&value) {
                let last = addresses
                    .last_mut()
                    .filter(|_| open_primary)
                    .ok_or(AddressError::DanglingSecondary { value })?;
                last.sad = Some(value);
                open_primary = false;
            } else {
                addresses.push(Self::primary(value)?);
                open_primary = true;
            }
        }
        Ok(addresses)
    }
}

impl fmt::Display for GpibAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sad {
            Some(sad) => write!(formatter, "{} {sad}", self.pad),
            None => write!(formatter, "{}", self.pad),
        }
    }
}

impl FromStr for GpibAddress {
    type Err = AddressError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        Self::parse_args(&tokens)
    }
}

/// Errors produced while building or parsing a [`GpibAddress`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Primary address outside 0–30.
    #[error("primary address {value} is outside 0-30")]
    Primary { value: String },
    /// Secondary address outside 96–126.
    #[error("secondary address {value} is outside 96-126")]
    Secondary { value: String },
    /// Secondary address with no primary before it.
    #[error("secondary address {value} has no primary address")]
    DanglingSecondary { value: u8 },
    /// Token was not a decimal number.
    #[error("'{value}' is not a GPIB address")]
    NotANumber { value: String },
    /// No address given.
    #[error("no address given")]
    Empty,
    /// More than one address where one was expected.
    #[error("expected a single address")]
    TooMany,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["5"], 5, None)]
    #[case(&["0"], 0, None)]
    #[case(&["30", "126"], 30, Some(126))]
    #[case(&["9", "96"], 9, Some(96))]
    fn parses_single_addresses(#[case] tokens: &[&str], #[case] pad: u8, #[case] sad: Option<u8>) {
        let address = GpibAddress::parse_args(tokens).expect("address");
        assert_eq!(address.pad(), pad);
        assert_eq!(address.sad(), sad);
    }

    #[rstest]
    #[case(&["31"])]
    #[case(&["-1"])]
    #[case(&["abc"])]
    #[case(&["96"])]
    #[case(&["5", "6"])]
    #[case(&[])]
    fn rejects_invalid_single_addresses(#[case] tokens: &[&str]) {
        assert!(GpibAddress::parse_args(tokens).is_err());
    }

    #[test]
    fn parses_trigger_lists_with_secondaries() {
        let addresses = GpibAddress::parse_list(&["3", "4", "97", "12"]).expect("list");
        let rendered: Vec<String> = addresses.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["3", "4 97", "12"]);
    }

    #[test]
    fn rejects_double_secondary() {
        let error = GpibAddress::parse_list(&["4", "97", "98"]).expect_err("dangling");
        assert_eq!(error, AddressError::DanglingSecondary { value: 98 });
    }

    #[test]
    fn renders_visa_resource_names() {
        let primary = GpibAddress::primary(22).expect("address");
        let secondary = GpibAddress::new(5, Some(98)).expect("address");
        assert_eq!(primary.resource_name("GPIB0"), "GPIB0::22::INSTR");
        assert_eq!(secondary.resource_name("GPIB0"), "GPIB0::5::98::INSTR");
    }
}
