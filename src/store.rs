use crate::error::{MeterError, Result};
use crate::schema::{MeterDataSet, MeterReading, MeterReplacement, MeterType};
use crate::utils::generate_id;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Record store for readings and replacement events.
///
/// The consumption engine never talks to a store; the dashboard fetches an
/// ordered snapshot and hands plain slices to it.
pub trait MeterStore {
    /// All readings, ascending by date.
    fn readings(&self) -> Result<Vec<MeterReading>>;

    /// All replacements, ascending by date.
    fn replacements(&self) -> Result<Vec<MeterReplacement>>;

    /// Stores a reading and returns its id. An empty id is replaced by a
    /// generated one.
    fn add_reading(&mut self, reading: MeterReading) -> Result<String>;

    fn update_reading(&mut self, id: &str, reading: MeterReading) -> Result<()>;

    fn delete_reading(&mut self, id: &str) -> Result<()>;

    fn add_replacement(&mut self, replacement: MeterReplacement) -> Result<String>;

    fn update_replacement(&mut self, id: &str, replacement: MeterReplacement) -> Result<()>;

    fn delete_replacement(&mut self, id: &str) -> Result<()>;

    fn meter_numbers(&self) -> Result<BTreeMap<MeterType, String>>;

    /// `None` or a blank number clears the entry.
    fn set_meter_number(&mut self, meter_type: MeterType, number: Option<&str>) -> Result<()>;

    /// Swaps the whole content, e.g. after an import.
    fn replace_all(&mut self, data: MeterDataSet) -> Result<()>;

    fn snapshot(&self) -> Result<MeterDataSet> {
        Ok(MeterDataSet {
            readings: self.readings()?,
            replacements: self.replacements()?,
            meter_numbers: self.meter_numbers()?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    data: MeterDataSet,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: MeterDataSet) -> Result<Self> {
        let mut store = Self::new();
        store.replace_all(data)?;
        Ok(store)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let data = MeterDataSet::from_json(&json)?;
        info!(
            "Loaded {} readings and {} replacements from {}",
            data.readings.len(),
            data.replacements.len(),
            path.display()
        );
        Self::from_data(data)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.data.to_json()?)?;
        debug!("Saved meter data to {}", path.display());
        Ok(())
    }

    fn check_replacement(&self, replacement: &MeterReplacement, own_id: Option<&str>) -> Result<()> {
        replacement.validate()?;
        check_overlap(&self.data.replacements, replacement, own_id)
    }
}

/// Two replacements of the same meter may not share an effective date.
fn check_overlap(
    existing: &[MeterReplacement],
    replacement: &MeterReplacement,
    own_id: Option<&str>,
) -> Result<()> {
    let clash = existing.iter().any(|r| {
        Some(r.id.as_str()) != own_id
            && r.meter_type == replacement.meter_type
            && r.date == replacement.date
    });

    if clash {
        return Err(MeterError::OverlappingReplacement {
            meter_type: replacement.meter_type.id().to_string(),
            date: replacement.date,
        });
    }
    Ok(())
}

fn ensure_id(id: &mut String) {
    if id.trim().is_empty() {
        *id = generate_id();
    }
}

impl MeterStore for InMemoryStore {
    fn readings(&self) -> Result<Vec<MeterReading>> {
        Ok(self.data.sorted_readings())
    }

    fn replacements(&self) -> Result<Vec<MeterReplacement>> {
        Ok(self.data.sorted_replacements())
    }

    fn add_reading(&mut self, mut reading: MeterReading) -> Result<String> {
        reading.validate()?;
        ensure_id(&mut reading.id);
        let id = reading.id.clone();
        self.data.readings.push(reading);
        Ok(id)
    }

    fn update_reading(&mut self, id: &str, mut reading: MeterReading) -> Result<()> {
        reading.validate()?;
        let slot = self
            .data
            .readings
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| MeterError::NotFound(id.to_string()))?;
        reading.id = id.to_string();
        *slot = reading;
        Ok(())
    }

    fn delete_reading(&mut self, id: &str) -> Result<()> {
        let before = self.data.readings.len();
        self.data.readings.retain(|r| r.id != id);
        if self.data.readings.len() == before {
            return Err(MeterError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn add_replacement(&mut self, mut replacement: MeterReplacement) -> Result<String> {
        self.check_replacement(&replacement, None)?;
        ensure_id(&mut replacement.id);
        let id = replacement.id.clone();
        self.data.replacements.push(replacement);
        Ok(id)
    }

    fn update_replacement(&mut self, id: &str, mut replacement: MeterReplacement) -> Result<()> {
        self.check_replacement(&replacement, Some(id))?;
        let slot = self
            .data
            .replacements
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| MeterError::NotFound(id.to_string()))?;
        replacement.id = id.to_string();
        *slot = replacement;
        Ok(())
    }

    fn delete_replacement(&mut self, id: &str) -> Result<()> {
        let before = self.data.replacements.len();
        self.data.replacements.retain(|r| r.id != id);
        if self.data.replacements.len() == before {
            return Err(MeterError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn meter_numbers(&self) -> Result<BTreeMap<MeterType, String>> {
        Ok(self.data.meter_numbers.clone())
    }

    fn set_meter_number(&mut self, meter_type: MeterType, number: Option<&str>) -> Result<()> {
        self.data.set_meter_number(meter_type, number);
        debug!("Meter number for {} set to {:?}", meter_type.id(), number);
        Ok(())
    }

    fn replace_all(&mut self, mut data: MeterDataSet) -> Result<()> {
        for reading in &mut data.readings {
            reading.validate()?;
            ensure_id(&mut reading.id);
        }

        let mut accepted: Vec<MeterReplacement> = Vec::with_capacity(data.replacements.len());
        for mut replacement in data.replacements {
            replacement.validate()?;
            check_overlap(&accepted, &replacement, None)?;
            ensure_id(&mut replacement.id);
            accepted.push(replacement);
        }

        self.data = MeterDataSet {
            readings: data.readings,
            replacements: accepted,
            meter_numbers: data.meter_numbers,
        };
        Ok(())
    }
}
