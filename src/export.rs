use crate::error::{MeterError, Result};
use crate::schema::{MeterReading, MeterReplacement, MeterType};
use crate::utils::{format_decimal, format_iso_date};
use csv::{Terminator, WriterBuilder};
use log::info;

pub const BOM: &str = "\u{feff}";

pub const CSV_HEADERS: [&str; 13] = [
    "Datum",
    "Kaltwasser",
    "Gartenwasser",
    "Strom_Licht",
    "Heizung_HT",
    "Heizung_NT",
    "PV_Ertrag",
    "PV_Einspeisung",
    "Typ",
    "Zaehler",
    "Alter_Stand",
    "Neuer_Stand",
    "Notiz",
];

pub const READING_ROW_TYPE: &str = "Ablesung";
pub const REPLACEMENT_ROW_TYPE: &str = "Zaehlerwechsel";

enum Row<'a> {
    Reading(&'a MeterReading),
    Replacement(&'a MeterReplacement),
}

impl Row<'_> {
    fn fields(&self) -> Vec<String> {
        match self {
            Row::Reading(reading) => {
                let mut fields = vec![format_iso_date(reading.date)];
                fields.extend(
                    MeterType::ALL
                        .iter()
                        .map(|t| format_decimal(t.value_of(reading))),
                );
                fields.push(READING_ROW_TYPE.to_string());
                fields.extend(std::iter::repeat(String::new()).take(4));
                fields
            }
            Row::Replacement(replacement) => {
                let mut fields = vec![format_iso_date(replacement.date)];
                fields.extend(std::iter::repeat(String::new()).take(MeterType::ALL.len()));
                fields.push(REPLACEMENT_ROW_TYPE.to_string());
                fields.push(replacement.meter_type.label().to_string());
                fields.push(format_decimal(replacement.old_final_reading));
                fields.push(format_decimal(replacement.new_initial_reading));
                fields.push(
                    replacement
                        .notes
                        .as_deref()
                        .unwrap_or("")
                        .replace(['\r', '\n'], " "),
                );
                fields
            }
        }
    }
}

/// Renders readings and replacements as one date-ordered, semicolon-delimited
/// stream with decimal commas, prefixed with a byte-order mark. On the same
/// date readings come before replacements.
pub fn export_csv(readings: &[MeterReading], replacements: &[MeterReplacement]) -> Result<String> {
    let mut rows: Vec<(chrono::NaiveDate, u8, Row)> = readings
        .iter()
        .map(|r| (r.date, 0, Row::Reading(r)))
        .chain(replacements.iter().map(|r| (r.date, 1, Row::Replacement(r))))
        .collect();
    rows.sort_by_key(|(date, order, _)| (*date, *order));

    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .terminator(Terminator::Any(b'\n'))
        .flexible(false)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADERS)?;
    for (_, _, row) in &rows {
        writer.write_record(row.fields())?;
    }
    writer.flush()?;

    let bytes = writer
        .into_inner()
        .map_err(|e| MeterError::Io(e.into_error()))?;

    info!(
        "Exported {} readings and {} replacements",
        readings.len(),
        replacements.len()
    );

    Ok(format!("{}{}", BOM, String::from_utf8_lossy(&bytes)))
}

/// Import template with three example rows, with the same byte-order mark
/// as an export.
pub fn sample_csv() -> String {
    let rows = [
        "Datum;Kaltwasser;Gartenwasser;Strom_Licht;Heizung_HT;Heizung_NT;PV_Ertrag;PV_Einspeisung",
        "2024-01-01;100;20;5000;3000;2000;200;150",
        "2024-02-01;112;20;5280;3450;2300;380;280",
        "2024-03-01;124;22;5520;3800;2520;650;480",
    ];
    format!("{}{}", BOM, rows.join("\n"))
}
