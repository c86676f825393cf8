use crate::schema::{ImportMode, MeterDataSet, MeterReading, MeterReplacement, MeterType};
use crate::utils::{generate_id, normalize_header, parse_date, parse_decimal_or_zero};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const DATE_ALIASES: &[&str] = &["datum", "date", "monat", "month"];
const ROW_TYPE_ALIASES: &[&str] = &["typ", "type", "rowtype", "eintrag"];
const METER_ALIASES: &[&str] = &["zaehler", "metertype", "meter"];
const OLD_READING_ALIASES: &[&str] = &["alterstand", "altstand", "oldfinalreading", "oldfinal"];
const NEW_READING_ALIASES: &[&str] = &["neuerstand", "neustand", "newinitialreading", "newinitial"];
const NOTES_ALIASES: &[&str] = &["notiz", "notes", "bemerkung"];

fn value_aliases(meter_type: MeterType) -> &'static [&'static str] {
    match meter_type {
        MeterType::ColdWater => &["kaltwasser", "cold_water", "coldwater", "wasser"],
        MeterType::GardenWater => &["gartenwasser", "garden_water", "gardenwater"],
        MeterType::ElectricityLight => &["strom_licht", "strom", "electricity", "electricitylight", "licht"],
        MeterType::HeatingHt => &["heizung_ht", "heizunght", "heating_ht", "heatinght", "ht"],
        MeterType::HeatingNt => &["heizung_nt", "heizungnt", "heating_nt", "heatingnt", "nt"],
        MeterType::PvYield => &["pv_ertrag", "pvertrag", "pv_yield", "pvyield", "ertrag"],
        MeterType::PvFeedIn => &["pv_einspeisung", "pveinspeisung", "pv_feedin", "pvfeedin", "einspeisung"],
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvParseResult {
    pub success: bool,
    pub readings: Vec<MeterReading>,
    /// Only filled by the extended dialect
    pub replacements: Vec<MeterReplacement>,
    /// Structural problems; non-empty means nothing was imported
    pub errors: Vec<String>,
    /// Row-level problems: a skipped row or a value taken as zero
    pub warnings: Vec<String>,
}

impl CsvParseResult {
    fn fail(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        warn!("CSV import failed: {}", message);
        self.success = false;
        self.readings.clear();
        self.replacements.clear();
        self.errors.push(message);
        self
    }

    pub fn record_count(&self) -> usize {
        self.readings.len() + self.replacements.len()
    }
}

/// First header position whose normalized text contains an alias. Aliases
/// are tried in order, so earlier aliases win over later ones.
fn find_column_index(headers: &[String], aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        let alias = normalize_header(alias);
        headers.iter().position(|h| h.contains(&alias))
    })
}

struct ColumnMap {
    date: usize,
    values: [Option<usize>; 7],
    row_type: Option<usize>,
    meter_type: Option<usize>,
    old_reading: Option<usize>,
    new_reading: Option<usize>,
    notes: Option<usize>,
}

impl ColumnMap {
    fn detect(header: &StringRecord) -> Option<Self> {
        let headers: Vec<String> = header.iter().map(normalize_header).collect();
        debug!("Normalized CSV header: {:?}", headers);

        let date = find_column_index(&headers, DATE_ALIASES)?;
        let values = MeterType::ALL.map(|t| find_column_index(&headers, value_aliases(t)));

        Some(Self {
            date,
            values,
            row_type: find_column_index(&headers, ROW_TYPE_ALIASES),
            meter_type: find_column_index(&headers, METER_ALIASES),
            old_reading: find_column_index(&headers, OLD_READING_ALIASES),
            new_reading: find_column_index(&headers, NEW_READING_ALIASES),
            notes: find_column_index(&headers, NOTES_ALIASES),
        })
    }

    fn is_replacement_row(&self, record: &StringRecord) -> bool {
        field(record, self.row_type)
            .map(normalize_header)
            .is_some_and(|t| t.contains("wechsel") || t.contains("replacement"))
    }
}

fn field(record: &StringRecord, column: Option<usize>) -> Option<&str> {
    column.and_then(|idx| record.get(idx))
}

fn read_record(line: &str, delimiter: u8) -> csv::Result<Option<StringRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    Ok(reader.read_record(&mut record)?.then_some(record))
}

/// A quote that is opened but never closed on its own line.
fn has_open_quote(line: &str) -> bool {
    line.matches('"').count() % 2 == 1
}

/// Parses semicolon- or comma-delimited meter data.
///
/// Every non-empty line is one row. One bad row never voids the import: rows
/// with an unreadable date, a dangling quote or (on replacement rows) an
/// unknown or repeated meter are skipped with a warning. Unreadable numbers
/// count as zero, and negative counter values are taken as zero with a
/// warning.
pub fn parse_csv(content: &str) -> CsvParseResult {
    let mut result = CsvParseResult::default();

    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < 2 {
        return result.fail(
            "Die CSV-Datei muss mindestens eine Kopfzeile und eine Datenzeile enthalten.",
        );
    }

    let delimiter = if lines[0].contains(';') { b';' } else { b',' };
    debug!("Detected CSV delimiter '{}'", delimiter as char);

    let header = match read_record(lines[0], delimiter) {
        Ok(Some(header)) => header,
        _ => return result.fail("Fehler beim Lesen der CSV-Datei."),
    };

    let Some(columns) = ColumnMap::detect(&header) else {
        return result.fail("Spalte \"Datum\" nicht gefunden. Bitte prüfen Sie die Kopfzeile.");
    };

    let mut replacement_keys: HashSet<(NaiveDate, MeterType)> = HashSet::new();

    for (idx, line) in lines.iter().enumerate().skip(1) {
        let line_no = idx + 1;

        let record = match read_record(line, delimiter) {
            Ok(Some(record)) if !has_open_quote(line) => record,
            Ok(_) => {
                warn!("CSV line {} has an unterminated quote", line_no);
                result.warnings.push(parse_error_warning(line_no));
                continue;
            }
            Err(e) => {
                warn!("CSV line {} unreadable: {}", line_no, e);
                result.warnings.push(parse_error_warning(line_no));
                continue;
            }
        };

        let raw_date = record.get(columns.date).unwrap_or("");
        let date = match parse_date(raw_date) {
            Ok(date) => date,
            Err(e) => {
                warn!("CSV line {}: {}", line_no, e);
                result.warnings.push(format!(
                    "Zeile {}: Ungültiges Datum \"{}\" - Zeile übersprungen.",
                    line_no, raw_date
                ));
                continue;
            }
        };

        let mut row = RowParser {
            record: &record,
            columns: &columns,
            line_no,
            warnings: &mut result.warnings,
        };

        if columns.is_replacement_row(&record) {
            match row.replacement(date) {
                Ok(replacement) => {
                    if replacement_keys.insert((replacement.date, replacement.meter_type)) {
                        result.replacements.push(replacement);
                    } else {
                        warn!(
                            "CSV line {}: second {} replacement on {}",
                            line_no,
                            replacement.meter_type.id(),
                            replacement.date
                        );
                        result.warnings.push(format!(
                            "Zeile {}: Doppelter Zählerwechsel für {} am {} - Zeile übersprungen.",
                            line_no, replacement.meter_type, raw_date
                        ));
                    }
                }
                Err(raw_meter) => {
                    warn!("CSV line {}: unknown meter type '{}'", line_no, raw_meter);
                    result.warnings.push(format!(
                        "Zeile {}: Unbekannter Zähler \"{}\" - Zeile übersprungen.",
                        line_no, raw_meter
                    ));
                }
            }
        } else {
            let reading = row.reading(date);
            result.readings.push(reading);
        }
    }

    if result.record_count() == 0 {
        return result.fail("Keine gültigen Daten gefunden.");
    }

    result.success = true;
    info!(
        "Parsed CSV: {} readings, {} replacements, {} row warnings",
        result.readings.len(),
        result.replacements.len(),
        result.warnings.len()
    );
    result
}

fn parse_error_warning(line_no: usize) -> String {
    format!("Zeile {}: Fehler beim Parsen - Zeile übersprungen.", line_no)
}

/// Turns one data row into a record, collecting row warnings on the way.
struct RowParser<'a> {
    record: &'a StringRecord,
    columns: &'a ColumnMap,
    line_no: usize,
    warnings: &'a mut Vec<String>,
}

impl RowParser<'_> {
    /// A cumulative counter never goes below zero, so a negative cell is
    /// taken as zero.
    fn counter(&mut self, column: Option<usize>, name: &str) -> f64 {
        let raw = field(self.record, column);
        let value = parse_decimal_or_zero(raw);
        if value >= 0.0 {
            return value;
        }

        warn!("CSV line {}: negative {} value {}", self.line_no, name, value);
        self.warnings.push(format!(
            "Zeile {}: Negativer Wert \"{}\" für {} - als 0 übernommen.",
            self.line_no,
            raw.unwrap_or(""),
            name
        ));
        0.0
    }

    fn reading(&mut self, date: NaiveDate) -> MeterReading {
        let mut reading = MeterReading::new(generate_id(), date);
        for (meter_type, column) in MeterType::ALL.into_iter().zip(self.columns.values) {
            let value = self.counter(column, meter_type.label());
            reading.set_value(meter_type, value);
        }
        reading
    }

    /// Err carries the raw meter text for the row warning.
    fn replacement(&mut self, date: NaiveDate) -> std::result::Result<MeterReplacement, String> {
        let raw_meter = field(self.record, self.columns.meter_type).unwrap_or("");
        let meter_type = MeterType::parse(raw_meter).map_err(|_| raw_meter.to_string())?;

        let notes = field(self.record, self.columns.notes)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(MeterReplacement {
            id: generate_id(),
            date,
            meter_type,
            old_final_reading: self.counter(self.columns.old_reading, "Alter Stand"),
            new_initial_reading: self.counter(self.columns.new_reading, "Neuer Stand"),
            notes,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOutcome {
    pub data: MeterDataSet,
    pub added_readings: usize,
    pub skipped_readings: usize,
    pub added_replacements: usize,
    pub skipped_replacements: usize,
}

/// Applies a parse result to existing data without touching `existing`.
///
/// `Replace` swaps the readings out wholesale, and the replacements too when
/// the import carried any. `Merge` only adds readings on dates not yet
/// present in `existing` and replacements whose (date, meter) pair is new.
/// Meter numbers are never touched by an import.
pub fn merge_import(existing: &MeterDataSet, parsed: &CsvParseResult, mode: ImportMode) -> ImportOutcome {
    if !parsed.success {
        return ImportOutcome {
            data: existing.clone(),
            ..Default::default()
        };
    }

    let outcome = match mode {
        ImportMode::Replace => {
            let replacements = if parsed.replacements.is_empty() {
                existing.replacements.clone()
            } else {
                parsed.replacements.clone()
            };
            ImportOutcome {
                added_readings: parsed.readings.len(),
                added_replacements: parsed.replacements.len(),
                data: MeterDataSet {
                    readings: parsed.readings.clone(),
                    replacements,
                    meter_numbers: existing.meter_numbers.clone(),
                },
                ..Default::default()
            }
        }
        ImportMode::Merge => {
            let mut data = existing.clone();

            // Only dates already stored block a reading; repeats inside the
            // file are kept.
            let reading_dates: HashSet<NaiveDate> =
                existing.readings.iter().map(|r| r.date).collect();
            let new_readings: Vec<MeterReading> = parsed
                .readings
                .iter()
                .filter(|r| !reading_dates.contains(&r.date))
                .cloned()
                .collect();

            let mut replacement_keys: HashSet<(NaiveDate, MeterType)> = existing
                .replacements
                .iter()
                .map(|r| (r.date, r.meter_type))
                .collect();
            let new_replacements: Vec<MeterReplacement> = parsed
                .replacements
                .iter()
                .filter(|r| replacement_keys.insert((r.date, r.meter_type)))
                .cloned()
                .collect();

            let outcome = ImportOutcome {
                added_readings: new_readings.len(),
                skipped_readings: parsed.readings.len() - new_readings.len(),
                added_replacements: new_replacements.len(),
                skipped_replacements: parsed.replacements.len() - new_replacements.len(),
                data: MeterDataSet::default(),
            };

            data.readings.extend(new_readings);
            data.replacements.extend(new_replacements);
            ImportOutcome { data, ..outcome }
        }
    };

    info!(
        "Import ({:?}): {} readings added, {} skipped; {} replacements added, {} skipped",
        mode,
        outcome.added_readings,
        outcome.skipped_readings,
        outcome.added_replacements,
        outcome.skipped_replacements
    );

    outcome
}
