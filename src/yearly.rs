use crate::engine::ConsumptionRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyConsumption {
    pub year: i32,
    pub total_water: f64,
    pub total_electricity: f64,
    pub total_heating: f64,
    pub total_pv_yield: f64,
    pub total_pv_self_consumption: f64,
}

/// Sums consumption records per calendar year, ascending by year.
pub fn aggregate_yearly(records: &[ConsumptionRecord]) -> Vec<YearlyConsumption> {
    let mut years: BTreeMap<i32, YearlyConsumption> = BTreeMap::new();

    for record in records {
        let entry = years.entry(record.year).or_insert_with(|| YearlyConsumption {
            year: record.year,
            ..Default::default()
        });

        entry.total_water += record.total_water;
        entry.total_electricity += record.electricity_light;
        entry.total_heating += record.total_heating;
        entry.total_pv_yield += record.pv_yield;
        entry.total_pv_self_consumption += record.pv_self_consumption;
    }

    years.into_values().collect()
}
