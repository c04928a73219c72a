//! Last-known module register values.
//!
//! The map is seeded by reading registers in command mode and refreshed
//! whenever a local AT response frame carries a register value. Outbound
//! frame constructors read the destination (DH/DL) and API mode (AP) from it.

use std::collections::BTreeMap;

use crate::error::*;
use crate::types::*;

/// Two-letter register names mapped to lowercase hex strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRegisters {
    values: BTreeMap<String, String>,
}

impl ModuleRegisters {
    /// Create an empty register map.
    pub fn new() -> Self {
        ModuleRegisters::default()
    }

    /// Get a register's hex value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Set a register's hex value (stored lowercase).
    pub fn set(&mut self, name: impl Into<String>, value: impl AsRef<str>) {
        self.values
            .insert(name.into(), value.as_ref().to_ascii_lowercase());
    }

    /// Store raw register bytes as lowercase hex.
    pub fn set_bytes(&mut self, name: impl Into<String>, value: &[u8]) {
        self.values.insert(name.into(), hex::encode(value));
    }

    /// Iterate over all known registers.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of known registers.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no registers are known.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse the AP register. Unknown or missing values fall back to the
    /// default escaped API mode.
    pub fn api_mode(&self) -> ApiMode {
        self.get("AP")
            .and_then(|v| u8::from_str_radix(v, 16).ok())
            .and_then(ApiMode::from_code)
            .unwrap_or_default()
    }

    /// Current destination from DH/DL.
    pub fn destination(&self) -> FrameResult<Address64> {
        Ok(Address64::new(self.word("DH")?, self.word("DL")?))
    }

    /// Point DH/DL at a new destination.
    pub fn set_destination(&mut self, destination: &Address64) {
        self.set("DH", destination.high.to_hex());
        self.set("DL", destination.low.to_hex());
    }

    /// Local module address from SH/SL, if both have been read.
    pub fn local_address(&self) -> Option<Address64> {
        Some(Address64::new(self.word("SH").ok()?, self.word("SL").ok()?))
    }

    fn word(&self, name: &str) -> FrameResult<AddressWord> {
        let value = self
            .get(name)
            .ok_or_else(|| FrameError::invalid("address", format!("register {} not known", name)))?;
        AddressWord::from_register(value)
    }
}

impl FromIterator<(String, String)> for ModuleRegisters {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut registers = ModuleRegisters::new();
        for (name, value) in iter {
            registers.set(name, value);
        }
        registers
    }
}
