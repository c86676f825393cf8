use crate::schema::{MeterReading, MeterReplacement, MeterType};
use crate::utils::month_label;
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Consumption in the period ending at one reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionRecord {
    /// Id of the reading that closes the period
    pub id: String,
    pub date: NaiveDate,
    /// Display label, e.g. "Jan. 2024"
    pub month: String,
    pub year: i32,
    pub cold_water: f64,
    pub garden_water: f64,
    pub total_water: f64,
    pub electricity_light: f64,
    #[serde(rename = "heatingHT")]
    pub heating_ht: f64,
    #[serde(rename = "heatingNT")]
    pub heating_nt: f64,
    pub total_heating: f64,
    pub pv_yield: f64,
    pub pv_feed_in: f64,
    /// Yield minus feed-in. Negative values point at bad data but are kept.
    pub pv_self_consumption: f64,
}

impl ConsumptionRecord {
    pub fn value_of(&self, meter_type: MeterType) -> f64 {
        match meter_type {
            MeterType::ColdWater => self.cold_water,
            MeterType::GardenWater => self.garden_water,
            MeterType::ElectricityLight => self.electricity_light,
            MeterType::HeatingHt => self.heating_ht,
            MeterType::HeatingNt => self.heating_nt,
            MeterType::PvYield => self.pv_yield,
            MeterType::PvFeedIn => self.pv_feed_in,
        }
    }

    fn from_deltas(reading: &MeterReading, delta: impl Fn(MeterType) -> f64) -> Self {
        let cold_water = delta(MeterType::ColdWater);
        let garden_water = delta(MeterType::GardenWater);
        let electricity_light = delta(MeterType::ElectricityLight);
        let heating_ht = delta(MeterType::HeatingHt);
        let heating_nt = delta(MeterType::HeatingNt);
        let pv_yield = delta(MeterType::PvYield);
        let pv_feed_in = delta(MeterType::PvFeedIn);

        Self {
            id: reading.id.clone(),
            date: reading.date,
            month: month_label(reading.date),
            year: reading.date.year(),
            cold_water,
            garden_water,
            total_water: cold_water + garden_water,
            electricity_light,
            heating_ht,
            heating_nt,
            total_heating: heating_ht + heating_nt,
            pv_yield,
            pv_feed_in,
            pv_self_consumption: pv_yield - pv_feed_in,
        }
    }
}

/// Derives per-period consumption from cumulative readings, splicing across
/// meter replacements.
pub struct ConsumptionEngine<'a> {
    replacements: &'a [MeterReplacement],
}

impl<'a> ConsumptionEngine<'a> {
    pub fn new(replacements: &'a [MeterReplacement]) -> Self {
        Self { replacements }
    }

    /// `readings` must already be sorted ascending by date; the engine does
    /// not reorder them.
    pub fn derive(&self, readings: &[MeterReading]) -> Vec<ConsumptionRecord> {
        if readings.windows(2).any(|w| w[0].date > w[1].date) {
            warn!("Readings handed to the consumption engine are not sorted by date");
        }

        let mut records = Vec::with_capacity(readings.len());
        let mut previous: Option<&MeterReading> = None;

        for current in readings {
            let record = match previous {
                None => Self::baseline(current),
                Some(prev) => ConsumptionRecord::from_deltas(current, |meter_type| {
                    self.period_consumption(prev, current, meter_type)
                }),
            };
            records.push(record);
            previous = Some(current);
        }

        debug!(
            "Derived {} consumption records using {} meter replacements",
            records.len(),
            self.replacements.len()
        );

        records
    }

    /// The first reading has no predecessor: differences are zero and PV
    /// counters are reported raw.
    fn baseline(reading: &MeterReading) -> ConsumptionRecord {
        ConsumptionRecord::from_deltas(reading, |meter_type| match meter_type {
            MeterType::PvYield | MeterType::PvFeedIn => meter_type.value_of(reading),
            _ => 0.0,
        })
    }

    /// Consumption of one quantity between two consecutive readings.
    pub fn period_consumption(
        &self,
        previous: &MeterReading,
        current: &MeterReading,
        meter_type: MeterType,
    ) -> f64 {
        let events = self.replacements_between(previous.date, current.date, meter_type);
        let end_value = meter_type.value_of(current);

        let mut baseline = meter_type.value_of(previous);
        let mut consumption = 0.0;

        for event in &events {
            consumption += (event.old_final_reading - baseline).max(0.0);
            baseline = event.new_initial_reading;
        }
        consumption += (end_value - baseline).max(0.0);

        if !events.is_empty() {
            debug!(
                "{} on {}: spliced {} replacement(s), consumption {}",
                meter_type.id(),
                current.date,
                events.len(),
                consumption
            );
        }

        consumption
    }

    /// Replacements of `meter_type` with `after < date <= until`, oldest first.
    fn replacements_between(
        &self,
        after: NaiveDate,
        until: NaiveDate,
        meter_type: MeterType,
    ) -> Vec<&'a MeterReplacement> {
        let mut events: Vec<&MeterReplacement> = self
            .replacements
            .iter()
            .filter(|r| r.meter_type == meter_type && r.date > after && r.date <= until)
            .collect();
        events.sort_by_key(|r| r.date);
        events
    }
}

pub fn derive_consumption(
    readings: &[MeterReading],
    replacements: &[MeterReplacement],
) -> Vec<ConsumptionRecord> {
    ConsumptionEngine::new(replacements).derive(readings)
}
