//! Symbolic identifiers exchanged with external providers.
//!
//! Two string-keyed lookup protocols cross the boundary:
//!
//! - Frame variables: `<IoSystemId>/<DeviceNumber>.<IoName>`, or the
//!   system-variable form `<IoSystemId>/<Name>` for registers that belong
//!   to the bus itself (e.g. `DeviceBus/DIAG_STATUS_REG`).
//! - Process-variable ports: `<ComponentId>/<ProgramInstance>.<PortName>`.
//!
//! Both types keep the original text and only record split positions, so
//! `Display` returns exactly what was parsed.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The `/` separating the scope from the rest is missing.
    #[error("{0:?}: missing '/' after the system or component id")]
    MissingScope(String),
    /// A component of the identifier is empty.
    #[error("{0:?}: empty {1}")]
    EmptyPart(String, &'static str),
    /// Device number does not fit 16 bits.
    #[error("{0:?}: device number out of range")]
    DeviceOutOfRange(String),
    /// Port names need an instance part before the port.
    #[error("{0:?}: expected <ComponentId>/<ProgramInstance>.<PortName>")]
    MissingInstance(String),
}

// ─── IoPointId ──────────────────────────────────────────────────────

/// Frame variable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IoPointId {
    raw: String,
    slash: usize,
    /// Byte index of the `.` that ends the device number, if any.
    dot: Option<usize>,
}

impl IoPointId {
    /// Build the device form `<system>/<device>.<name>`.
    pub fn device(system: &str, device: u16, name: &str) -> Result<Self, IdError> {
        format!("{system}/{device}.{name}").parse()
    }

    /// Build the system-variable form `<system>/<name>`.
    pub fn system_variable(system: &str, name: &str) -> Result<Self, IdError> {
        format!("{system}/{name}").parse()
    }

    /// The I/O system id (text before the first `/`).
    pub fn io_system(&self) -> &str {
        &self.raw[..self.slash]
    }

    /// Device number, for the device form.
    pub fn device_number(&self) -> Option<u16> {
        let dot = self.dot?;
        self.raw[self.slash + 1..dot].parse().ok()
    }

    /// The I/O name (the terminal component).
    pub fn io_name(&self) -> &str {
        match self.dot {
            Some(dot) => &self.raw[dot + 1..],
            None => &self.raw[self.slash + 1..],
        }
    }

    /// True for bus-level registers without a device number.
    pub fn is_system_variable(&self) -> bool {
        self.dot.is_none()
    }

    /// The identifier exactly as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for IoPointId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slash = s.find('/').ok_or_else(|| IdError::MissingScope(s.to_string()))?;
        if slash == 0 {
            return Err(IdError::EmptyPart(s.to_string(), "I/O system id"));
        }
        let rest = &s[slash + 1..];
        if rest.is_empty() {
            return Err(IdError::EmptyPart(s.to_string(), "I/O name"));
        }

        // `<digits>.<name>` is the device form; anything else is a system variable.
        let dot = rest.find('.').and_then(|i| {
            let digits = &rest[..i];
            (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(slash + 1 + i)
        });
        if let Some(dot) = dot {
            if dot + 1 == s.len() {
                return Err(IdError::EmptyPart(s.to_string(), "I/O name"));
            }
            if s[slash + 1..dot].parse::<u16>().is_err() {
                return Err(IdError::DeviceOutOfRange(s.to_string()));
            }
        }

        Ok(Self {
            raw: s.to_string(),
            slash,
            dot,
        })
    }
}

impl fmt::Display for IoPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for IoPointId {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl Serialize for IoPointId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for IoPointId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ─── PortName ───────────────────────────────────────────────────────

/// Fully qualified process-variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortName {
    raw: String,
    slash: usize,
    dot: usize,
}

impl PortName {
    /// Component id, e.g. `Plc.Eclr`.
    pub fn component(&self) -> &str {
        &self.raw[..self.slash]
    }

    /// Program instance, e.g. `MyProgramInst`.
    pub fn instance(&self) -> &str {
        &self.raw[self.slash + 1..self.dot]
    }

    /// Port, e.g. `VarA`. May itself contain dots (struct members).
    pub fn port(&self) -> &str {
        &self.raw[self.dot + 1..]
    }

    /// The name exactly as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for PortName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slash = s.find('/').ok_or_else(|| IdError::MissingScope(s.to_string()))?;
        if slash == 0 {
            return Err(IdError::EmptyPart(s.to_string(), "component id"));
        }
        let dot = s[slash + 1..]
            .find('.')
            .map(|i| slash + 1 + i)
            .ok_or_else(|| IdError::MissingInstance(s.to_string()))?;
        if dot == slash + 1 {
            return Err(IdError::EmptyPart(s.to_string(), "program instance"));
        }
        if dot + 1 == s.len() {
            return Err(IdError::EmptyPart(s.to_string(), "port name"));
        }
        Ok(Self {
            raw: s.to_string(),
            slash,
            dot,
        })
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for PortName {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl Serialize for PortName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for PortName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
