//! # Meter History
//!
//! A library for turning sparse, irregularly dated cumulative household meter
//! readings into per-period consumption, yearly totals and anomaly warnings.
//!
//! ## Core Concepts
//!
//! - **Cumulative Readings**: Snapshots of seven counters (cold/garden water, electricity,
//!   heating HT/NT, PV yield and feed-in) taken whenever the user reads the meters
//! - **Meter Replacements**: Physical meter swaps that restart a counter; consumption is
//!   spliced across them
//! - **Consumption Records**: Per-period deltas between consecutive readings, never negative
//! - **Yearly Totals**: Consumption summed per calendar year
//! - **Warnings**: The latest period compared against the same calendar month in other years
//!
//! Everything derived is recomputed from the stored readings and replacements on
//! every call; nothing is cached.
//!
//! ## Example
//!
//! ```rust,ignore
//! use meter_history::*;
//! use chrono::NaiveDate;
//!
//! let mut store = InMemoryStore::new();
//! store.add_reading(
//!     MeterReading::new("", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
//!         .with_value(MeterType::ColdWater, 100.0),
//! )?;
//! store.add_reading(
//!     MeterReading::new("", NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
//!         .with_value(MeterType::ColdWater, 30.0),
//! )?;
//! store.add_replacement(MeterReplacement {
//!     id: String::new(),
//!     date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
//!     meter_type: MeterType::ColdWater,
//!     old_final_reading: 120.0,
//!     new_initial_reading: 0.0,
//!     notes: None,
//! })?;
//!
//! let dashboard = MeterDashboard::new(store);
//! let snapshot = dashboard.snapshot()?;
//! assert_eq!(snapshot.consumption[1].cold_water, 50.0);
//! ```

pub mod anomaly;
pub mod engine;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod report;
pub mod schema;
pub mod store;
pub mod utils;
pub mod yearly;

pub use anomaly::{detect_warnings, Warning, WarningKind, WARNING_THRESHOLD};
pub use engine::{derive_consumption, ConsumptionEngine, ConsumptionRecord};
pub use error::{MeterError, Result};
pub use export::{export_csv, sample_csv};
pub use ingestion::{merge_import, parse_csv, CsvParseResult, ImportOutcome};
pub use report::{available_years, PvYearlyReport};
pub use schema::*;
pub use store::{InMemoryStore, MeterStore};
pub use utils::*;
pub use yearly::{aggregate_yearly, YearlyConsumption};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything the dashboard shows, derived from one consistent store snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub consumption: Vec<ConsumptionRecord>,
    pub yearly: Vec<YearlyConsumption>,
    pub warnings: Vec<Warning>,
    /// Most recent reading, used as form defaults
    pub latest_reading: Option<MeterReading>,
    pub meter_numbers: BTreeMap<MeterType, String>,
}

/// Orchestrates the store and the derivation pipeline.
pub struct MeterDashboard<S: MeterStore> {
    store: S,
}

impl<S: MeterStore> MeterDashboard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn consumption(&self) -> Result<Vec<ConsumptionRecord>> {
        let data = self.store.snapshot()?;
        Ok(derive_consumption(&data.readings, &data.replacements))
    }

    pub fn snapshot(&self) -> Result<DashboardSnapshot> {
        let data = self.store.snapshot()?;
        debug!(
            "Recomputing dashboard from {} readings and {} replacements",
            data.readings.len(),
            data.replacements.len()
        );

        let consumption = derive_consumption(&data.readings, &data.replacements);
        let yearly = aggregate_yearly(&consumption);
        let warnings = latest_warnings(&consumption);
        let latest_reading = data.readings.last().cloned();

        Ok(DashboardSnapshot {
            consumption,
            yearly,
            warnings,
            latest_reading,
            meter_numbers: data.meter_numbers,
        })
    }

    pub fn pv_report(&self, year: i32) -> Result<PvYearlyReport> {
        Ok(PvYearlyReport::build(&self.consumption()?, year))
    }

    pub fn export_csv(&self) -> Result<String> {
        let data = self.store.snapshot()?;
        export_csv(&data.readings, &data.replacements)
    }

    /// Parses `content` and, if parsing succeeded, applies it to the store.
    /// The parse result is returned either way so callers can show its
    /// errors and warnings. A successful parse only holds non-negative values
    /// and distinct replacements, so applying it is accepted by the store.
    pub fn import_csv(&mut self, content: &str, mode: ImportMode) -> Result<(CsvParseResult, ImportOutcome)> {
        let parsed = parse_csv(content);
        let existing = self.store.snapshot()?;
        let outcome = merge_import(&existing, &parsed, mode);

        if parsed.success {
            self.store.replace_all(outcome.data.clone())?;
            info!(
                "Imported CSV in {:?} mode: {} readings, {} replacements added",
                mode, outcome.added_readings, outcome.added_replacements
            );
        }

        Ok((parsed, outcome))
    }
}

/// Warnings for the newest record; needs at least two records.
fn latest_warnings(consumption: &[ConsumptionRecord]) -> Vec<Warning> {
    match consumption {
        [.., latest] if consumption.len() >= 2 => detect_warnings(latest, consumption),
        _ => Vec::new(),
    }
}
