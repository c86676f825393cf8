use crate::engine::ConsumptionRecord;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

pub const MONTH_NAMES: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPvSelfConsumption {
    pub month: String,
    pub pv_self_consumption: f64,
}

/// Data behind the yearly photovoltaic self-consumption report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvYearlyReport {
    pub year: i32,
    /// Always twelve entries, January first
    pub months: Vec<MonthlyPvSelfConsumption>,
    pub total_self_consumption: f64,
}

impl PvYearlyReport {
    /// Builds the report for `year`. Each month takes the first record dated
    /// in it; months without a record count as zero.
    pub fn build(records: &[ConsumptionRecord], year: i32) -> Self {
        let year_records: Vec<&ConsumptionRecord> =
            records.iter().filter(|r| r.year == year).collect();

        let months: Vec<MonthlyPvSelfConsumption> = MONTH_NAMES
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let value = year_records
                    .iter()
                    .find(|r| r.date.month0() as usize == idx)
                    .map(|r| r.pv_self_consumption)
                    .unwrap_or(0.0);
                MonthlyPvSelfConsumption {
                    month: name.to_string(),
                    pv_self_consumption: value,
                }
            })
            .collect();

        let total_self_consumption: f64 = months.iter().map(|m| m.pv_self_consumption).sum();

        Self {
            year,
            months,
            total_self_consumption,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Years with at least one record, newest first.
pub fn available_years(records: &[ConsumptionRecord]) -> Vec<i32> {
    let mut years: Vec<i32> = records.iter().map(|r| r.year).collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();
    years
}
