//! ---
//! volture_section: "02-telemetry-simulation"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Battery snapshot, fault and parameter value types."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumCount, EnumIter, IntoStaticStr};

/// Monitored numeric parameter of a battery snapshot.
///
/// Variant order is the evaluation order used for alerts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumIter,
    EnumCount,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Parameter {
    Voltage,
    Current,
    Temperature,
    Soc,
    Soh,
}

/// Fault types reported by the pack, one bit each.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, IntoStaticStr, Display,
)]
#[repr(u8)]
pub enum FaultCode {
    #[strum(serialize = "Overvoltage")]
    Overvoltage = 0x01,
    #[strum(serialize = "Undervoltage")]
    Undervoltage = 0x02,
    #[strum(serialize = "Overcurrent")]
    Overcurrent = 0x04,
    #[strum(serialize = "Overtemperature")]
    Overtemperature = 0x08,
    #[strum(serialize = "Undertemperature")]
    Undertemperature = 0x10,
    #[strum(serialize = "SOC Low")]
    SocLow = 0x20,
    #[strum(serialize = "SOH Low")]
    SohLow = 0x40,
    #[strum(serialize = "Communication Error")]
    CommunicationError = 0x80,
}

impl FaultCode {
    /// Fault table in bit order.
    pub const ALL: [FaultCode; FaultCode::COUNT] = [
        FaultCode::Overvoltage,
        FaultCode::Undervoltage,
        FaultCode::Overcurrent,
        FaultCode::Overtemperature,
        FaultCode::Undertemperature,
        FaultCode::SocLow,
        FaultCode::SohLow,
        FaultCode::CommunicationError,
    ];

    pub fn bit(self) -> u8 {
        self as u8
    }

    pub fn description(self) -> &'static str {
        self.into()
    }

    /// Map a single-bit code back to its fault type.
    pub fn from_bit(bit: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.bit() == bit)
    }
}

/// A fault raised during one tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaultEvent {
    pub code: u8,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl FaultEvent {
    pub fn new(code: FaultCode, timestamp: DateTime<Utc>) -> Self {
        Self {
            code: code.bit(),
            description: code.description().to_owned(),
            timestamp,
        }
    }

    pub fn fault_code(&self) -> Option<FaultCode> {
        FaultCode::from_bit(self.code)
    }
}

/// Bit set of [`FaultCode`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FaultFlags(u8);

impl FaultFlags {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, code: FaultCode) {
        self.0 |= code.bit();
    }

    pub fn contains(self, code: FaultCode) -> bool {
        self.0 & code.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = FaultCode> {
        FaultCode::ALL
            .into_iter()
            .filter(move |code| self.contains(*code))
    }
}

impl FromIterator<FaultCode> for FaultFlags {
    fn from_iter<I: IntoIterator<Item = FaultCode>>(iter: I) -> Self {
        let mut flags = FaultFlags::empty();
        for code in iter {
            flags.insert(code);
        }
        flags
    }
}

/// One synthesized instantaneous battery reading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatterySnapshot {
    /// Pack voltage in volts.
    pub voltage: f64,
    /// Pack current in amps; negative while discharging.
    pub current: f64,
    /// Pack temperature in degrees Celsius.
    pub temperature: f64,
    /// State of charge, percent.
    pub soc: f64,
    /// State of health, percent.
    pub soh: f64,
    /// Faults active during this tick only.
    #[serde(default)]
    pub fault_flags: Vec<FaultEvent>,
    pub timestamp: DateTime<Utc>,
}

impl BatterySnapshot {
    pub const SEED_VOLTAGE: f64 = 48.5;
    pub const SEED_CURRENT: f64 = 0.0;
    pub const SEED_TEMPERATURE: f64 = 25.0;
    pub const SEED_SOC: f64 = 75.0;
    pub const SEED_SOH: f64 = 95.0;

    /// Process start state.
    pub fn seed(timestamp: DateTime<Utc>) -> Self {
        Self {
            voltage: Self::SEED_VOLTAGE,
            current: Self::SEED_CURRENT,
            temperature: Self::SEED_TEMPERATURE,
            soc: Self::SEED_SOC,
            soh: Self::SEED_SOH,
            fault_flags: Vec::new(),
            timestamp,
        }
    }

    pub fn value(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Voltage => self.voltage,
            Parameter::Current => self.current,
            Parameter::Temperature => self.temperature,
            Parameter::Soc => self.soc,
            Parameter::Soh => self.soh,
        }
    }

    pub(crate) fn value_mut(&mut self, parameter: Parameter) -> &mut f64 {
        match parameter {
            Parameter::Voltage => &mut self.voltage,
            Parameter::Current => &mut self.current,
            Parameter::Temperature => &mut self.temperature,
            Parameter::Soc => &mut self.soc,
            Parameter::Soh => &mut self.soh,
        }
    }

    pub fn faults(&self) -> FaultFlags {
        self.fault_flags
            .iter()
            .filter_map(FaultEvent::fault_code)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fault_table_matches_bit_layout() {
        let bits: Vec<u8> = FaultCode::ALL.iter().map(|code| code.bit()).collect();
        assert_eq!(bits, vec![0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80]);
        assert_eq!(FaultCode::SocLow.description(), "SOC Low");
        assert_eq!(FaultCode::CommunicationError.to_string(), "Communication Error");
        assert_eq!(FaultCode::from_bit(0x08), Some(FaultCode::Overtemperature));
        assert_eq!(FaultCode::from_bit(0x03), None);
    }

    #[test]
    fn fault_flags_combine_codes() {
        let flags: FaultFlags = [FaultCode::Overvoltage, FaultCode::SohLow]
            .into_iter()
            .collect();
        assert_eq!(flags.bits(), 0x41);
        assert!(flags.contains(FaultCode::SohLow));
        assert!(!flags.contains(FaultCode::Overcurrent));
        assert_eq!(
            flags.iter().collect::<Vec<_>>(),
            vec![FaultCode::Overvoltage, FaultCode::SohLow]
        );
    }

    #[test]
    fn snapshot_serialises_with_wire_names() {
        let timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut snapshot = BatterySnapshot::seed(timestamp);
        snapshot
            .fault_flags
            .push(FaultEvent::new(FaultCode::Overcurrent, timestamp));
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["voltage"], json!(48.5));
        assert_eq!(value["soh"], json!(95.0));
        assert_eq!(value["fault_flags"][0]["code"], json!(4));
        assert_eq!(value["fault_flags"][0]["description"], json!("Overcurrent"));
        assert_eq!(snapshot.faults().bits(), 0x04);
    }

    #[test]
    fn parameter_names_are_lowercase() {
        assert_eq!(Parameter::Soc.as_ref(), "soc");
        assert_eq!(
            serde_json::to_value(Parameter::Temperature).unwrap(),
            json!("temperature")
        );
    }
}
