use crate::engine::ConsumptionRecord;
use chrono::Datelike;
use log::debug;
use serde::{Deserialize, Serialize};

/// Latest consumption must exceed the same-month average by this factor.
pub const WARNING_THRESHOLD: f64 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Water,
    Electricity,
    Heating,
}

impl WarningKind {
    pub const ALL: [WarningKind; 3] = [
        WarningKind::Water,
        WarningKind::Electricity,
        WarningKind::Heating,
    ];

    /// The compared quantity. PV is never checked.
    pub fn value_of(self, record: &ConsumptionRecord) -> f64 {
        match self {
            WarningKind::Water => record.total_water,
            WarningKind::Electricity => record.electricity_light,
            WarningKind::Heating => record.total_heating,
        }
    }

    fn message_prefix(self) -> &'static str {
        match self {
            WarningKind::Water => "Wasserverbrauch",
            WarningKind::Electricity => "Stromverbrauch",
            WarningKind::Heating => "Heizungsverbrauch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub message: String,
    /// Percent above the average, unrounded
    pub percentage: f64,
    pub current_value: f64,
    pub average_value: f64,
}

/// Compares `latest` against the average of every other record in `history`
/// from the same calendar month, in any year.
pub fn detect_warnings(latest: &ConsumptionRecord, history: &[ConsumptionRecord]) -> Vec<Warning> {
    let month = latest.date.month();
    let same_month: Vec<&ConsumptionRecord> = history
        .iter()
        .filter(|r| r.date.month() == month && r.id != latest.id)
        .collect();

    if same_month.is_empty() {
        debug!("No same-month history for {}, skipping anomaly check", latest.month);
        return Vec::new();
    }

    let count = same_month.len() as f64;
    let mut warnings = Vec::new();

    for kind in WarningKind::ALL {
        let average = same_month.iter().map(|r| kind.value_of(r)).sum::<f64>() / count;
        let current = kind.value_of(latest);

        if average > 0.0 && current > average * WARNING_THRESHOLD {
            let percentage = (current - average) / average * 100.0;
            warnings.push(Warning {
                kind,
                message: format!("{} {:.0}% über Durchschnitt", kind.message_prefix(), percentage),
                percentage,
                current_value: current,
                average_value: average,
            });
        }
    }

    warnings
}
