use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{MeterError, Result};
use crate::utils::normalize_header;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MeterType {
    #[schemars(description = "Cold (drinking) water meter, cubic metres")]
    ColdWater,

    #[schemars(description = "Separate garden water meter, cubic metres")]
    GardenWater,

    #[schemars(description = "Household electricity (light) meter, kWh")]
    ElectricityLight,

    #[schemars(description = "Heating electricity, high-tariff register, kWh")]
    HeatingHt,

    #[schemars(description = "Heating electricity, low-tariff register, kWh")]
    HeatingNt,

    #[schemars(description = "Photovoltaic yield counter, kWh")]
    PvYield,

    #[schemars(description = "Photovoltaic grid feed-in counter, kWh")]
    PvFeedIn,
}

impl MeterType {
    pub const ALL: [MeterType; 7] = [
        MeterType::ColdWater,
        MeterType::GardenWater,
        MeterType::ElectricityLight,
        MeterType::HeatingHt,
        MeterType::HeatingNt,
        MeterType::PvYield,
        MeterType::PvFeedIn,
    ];

    /// Stable identifier, identical to the serde representation.
    pub fn id(self) -> &'static str {
        match self {
            MeterType::ColdWater => "cold_water",
            MeterType::GardenWater => "garden_water",
            MeterType::ElectricityLight => "electricity_light",
            MeterType::HeatingHt => "heating_ht",
            MeterType::HeatingNt => "heating_nt",
            MeterType::PvYield => "pv_yield",
            MeterType::PvFeedIn => "pv_feed_in",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MeterType::ColdWater => "Kaltwasser",
            MeterType::GardenWater => "Gartenwasser",
            MeterType::ElectricityLight => "Strom Licht",
            MeterType::HeatingHt => "Heizung HT",
            MeterType::HeatingNt => "Heizung NT",
            MeterType::PvYield => "PV Ertrag",
            MeterType::PvFeedIn => "PV Einspeisung",
        }
    }

    /// Accepts either the id or the label, ignoring case and punctuation.
    pub fn parse(text: &str) -> Result<Self> {
        let wanted = normalize_header(text);
        if wanted.is_empty() {
            return Err(MeterError::UnknownMeterType(text.to_string()));
        }

        MeterType::ALL
            .into_iter()
            .find(|t| normalize_header(t.id()) == wanted || normalize_header(t.label()) == wanted)
            .ok_or_else(|| MeterError::UnknownMeterType(text.to_string()))
    }

    /// The cumulative counter this meter type drives on a reading.
    pub fn value_of(self, reading: &MeterReading) -> f64 {
        match self {
            MeterType::ColdWater => reading.cold_water,
            MeterType::GardenWater => reading.garden_water,
            MeterType::ElectricityLight => reading.electricity_light,
            MeterType::HeatingHt => reading.heating_ht,
            MeterType::HeatingNt => reading.heating_nt,
            MeterType::PvYield => reading.pv_yield,
            MeterType::PvFeedIn => reading.pv_feed_in,
        }
    }
}

impl std::fmt::Display for MeterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One cumulative snapshot of all seven counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeterReading {
    #[schemars(description = "Opaque stable identifier")]
    pub id: String,

    #[schemars(description = "Reading date in YYYY-MM-DD format")]
    pub date: NaiveDate,

    pub cold_water: f64,
    pub garden_water: f64,
    pub electricity_light: f64,

    #[serde(rename = "heatingHT")]
    pub heating_ht: f64,

    #[serde(rename = "heatingNT")]
    pub heating_nt: f64,

    pub pv_yield: f64,
    pub pv_feed_in: f64,
}

impl MeterReading {
    /// A reading with every counter at zero.
    pub fn new(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            date,
            cold_water: 0.0,
            garden_water: 0.0,
            electricity_light: 0.0,
            heating_ht: 0.0,
            heating_nt: 0.0,
            pv_yield: 0.0,
            pv_feed_in: 0.0,
        }
    }

    pub fn set_value(&mut self, meter_type: MeterType, value: f64) {
        let slot = match meter_type {
            MeterType::ColdWater => &mut self.cold_water,
            MeterType::GardenWater => &mut self.garden_water,
            MeterType::ElectricityLight => &mut self.electricity_light,
            MeterType::HeatingHt => &mut self.heating_ht,
            MeterType::HeatingNt => &mut self.heating_nt,
            MeterType::PvYield => &mut self.pv_yield,
            MeterType::PvFeedIn => &mut self.pv_feed_in,
        };
        *slot = value;
    }

    pub fn with_value(mut self, meter_type: MeterType, value: f64) -> Self {
        self.set_value(meter_type, value);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for meter_type in MeterType::ALL {
            let value = meter_type.value_of(self);
            if !(value >= 0.0) {
                return Err(MeterError::NegativeValue {
                    field: meter_type.id().to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// A physical meter swap for one tracked quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeterReplacement {
    pub id: String,

    #[schemars(description = "Swap date in YYYY-MM-DD format")]
    pub date: NaiveDate,

    pub meter_type: MeterType,

    #[schemars(description = "Last value shown by the retired meter")]
    pub old_final_reading: f64,

    #[schemars(description = "First value shown by the new meter, usually zero")]
    pub new_initial_reading: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl MeterReplacement {
    pub fn validate(&self) -> Result<()> {
        if !(self.old_final_reading >= 0.0) {
            return Err(MeterError::NegativeValue {
                field: "old_final_reading".to_string(),
                value: self.old_final_reading,
            });
        }
        if !(self.new_initial_reading >= 0.0) {
            return Err(MeterError::NegativeValue {
                field: "new_initial_reading".to_string(),
                value: self.new_initial_reading,
            });
        }
        Ok(())
    }
}

/// How parsed CSV records are applied to the existing data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    #[schemars(description = "Discard existing records and keep only the imported ones")]
    Replace,

    #[default]
    #[schemars(description = "Keep existing records and add imported ones whose date is not yet present")]
    Merge,
}

/// Everything the store persists: readings, replacement events and the
/// serial numbers printed on the installed meters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeterDataSet {
    #[serde(default)]
    pub readings: Vec<MeterReading>,

    #[serde(default)]
    pub replacements: Vec<MeterReplacement>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schemars(description = "Serial number per meter type; meters without one are absent")]
    pub meter_numbers: BTreeMap<MeterType, String>,
}

impl MeterDataSet {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(MeterDataSet)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Readings sorted ascending by date. Sorting is stable, so readings on
    /// the same date keep their insertion order.
    pub fn sorted_readings(&self) -> Vec<MeterReading> {
        let mut readings = self.readings.clone();
        readings.sort_by_key(|r| r.date);
        readings
    }

    pub fn sorted_replacements(&self) -> Vec<MeterReplacement> {
        let mut replacements = self.replacements.clone();
        replacements.sort_by_key(|r| r.date);
        replacements
    }

    pub fn meter_number(&self, meter_type: MeterType) -> Option<&str> {
        self.meter_numbers.get(&meter_type).map(String::as_str)
    }

    /// Blank or missing numbers clear the entry.
    pub fn set_meter_number(&mut self, meter_type: MeterType, number: Option<&str>) {
        match number.map(str::trim).filter(|n| !n.is_empty()) {
            Some(number) => {
                self.meter_numbers.insert(meter_type, number.to_string());
            }
            None => {
                self.meter_numbers.remove(&meter_type);
            }
        }
    }
}
