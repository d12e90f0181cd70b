//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Threshold table and alert evaluation."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use volture_sim::{BatterySnapshot, Parameter};

/// Inclusive `[min, max]` band for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub min: f64,
    pub max: f64,
}

impl ThresholdRule {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn check(&self, value: f64) -> Option<Breach> {
        if value < self.min {
            Some(Breach::BelowMinimum)
        } else if value > self.max {
            Some(Breach::AboveMaximum)
        } else {
            None
        }
    }
}

/// Alert thresholds. Tighter than the generator's clamp ranges in places, so a
/// plausible reading can still raise a warning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    pub voltage: ThresholdRule,
    pub current: ThresholdRule,
    pub temperature: ThresholdRule,
    pub soc: ThresholdRule,
    pub soh: ThresholdRule,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            voltage: ThresholdRule::new(42.0, 54.0),
            current: ThresholdRule::new(-20.0, 20.0),
            temperature: ThresholdRule::new(0.0, 45.0),
            soc: ThresholdRule::new(20.0, 100.0),
            soh: ThresholdRule::new(80.0, 100.0),
        }
    }
}

impl ThresholdTable {
    pub fn rule(&self, parameter: Parameter) -> ThresholdRule {
        match parameter {
            Parameter::Voltage => self.voltage,
            Parameter::Current => self.current,
            Parameter::Temperature => self.temperature,
            Parameter::Soc => self.soc,
            Parameter::Soh => self.soh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Breach {
    BelowMinimum,
    AboveMaximum,
}

/// A breached threshold. Derived from a snapshot on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub parameter: Parameter,
    pub value: f64,
    /// The bound that was crossed.
    pub threshold: f64,
    pub breach: Breach,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    fn new(
        parameter: Parameter,
        value: f64,
        rule: ThresholdRule,
        breach: Breach,
        at: DateTime<Utc>,
    ) -> Self {
        let name = parameter.as_ref().to_uppercase();
        let (threshold, message) = match breach {
            Breach::BelowMinimum => (rule.min, format!("{name} below minimum threshold")),
            Breach::AboveMaximum => (rule.max, format!("{name} above maximum threshold")),
        };
        Self {
            kind: AlertKind::Warning,
            parameter,
            value,
            threshold,
            breach,
            message,
            timestamp: at,
        }
    }
}

/// Compare each monitored parameter against its rule, in voltage, current,
/// temperature, soc, soh order. At most one alert per parameter; alerts carry the
/// snapshot's timestamp.
pub fn evaluate(snapshot: &BatterySnapshot, thresholds: &ThresholdTable) -> Vec<Alert> {
    Parameter::iter()
        .filter_map(|parameter| {
            let rule = thresholds.rule(parameter);
            let value = snapshot.value(parameter);
            rule.check(value)
                .map(|breach| Alert::new(parameter, value, rule, breach, snapshot.timestamp))
        })
        .collect()
}
