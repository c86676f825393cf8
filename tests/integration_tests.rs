use chrono::NaiveDate;
use meter_history::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn reading(id: &str, d: NaiveDate, values: [f64; 7]) -> MeterReading {
    let mut r = MeterReading::new(id, d);
    for (meter_type, value) in MeterType::ALL.into_iter().zip(values) {
        r.set_value(meter_type, value);
    }
    r
}

/// A year of monthly readings, starting in January of `year`.
fn household_year(year: i32) -> Vec<MeterReading> {
    let rows: [[f64; 7]; 12] = [
        [100.0, 20.0, 5000.0, 3000.0, 2000.0, 200.0, 150.0],
        [112.0, 20.0, 5280.0, 3450.0, 2300.0, 380.0, 280.0],
        [124.0, 22.0, 5520.0, 3800.0, 2520.0, 650.0, 480.0],
        [138.0, 28.0, 5750.0, 4050.0, 2680.0, 1100.0, 850.0],
        [155.0, 42.0, 5980.0, 4180.0, 2780.0, 1650.0, 1300.0],
        [175.0, 65.0, 6200.0, 4250.0, 2830.0, 2100.0, 1700.0],
        [198.0, 95.0, 6420.0, 4300.0, 2860.0, 2500.0, 2050.0],
        [220.0, 120.0, 6650.0, 4350.0, 2890.0, 2350.0, 1900.0],
        [238.0, 130.0, 6880.0, 4420.0, 2940.0, 1800.0, 1400.0],
        [252.0, 132.0, 7130.0, 4600.0, 3080.0, 1100.0, 800.0],
        [264.0, 132.0, 7400.0, 4900.0, 3280.0, 500.0, 350.0],
        [275.0, 132.0, 7700.0, 5250.0, 3520.0, 280.0, 180.0],
    ];

    rows.iter()
        .enumerate()
        .map(|(i, values)| {
            reading(
                &format!("{}-{}", year, i + 1),
                date(year, i as u32 + 1, 1),
                *values,
            )
        })
        .collect()
}

#[test]
fn test_consumption_without_replacements_matches_clamped_differences() {
    let readings = household_year(2024);
    let records = derive_consumption(&readings, &[]);
    assert_eq!(records.len(), readings.len());

    for (pair, record) in readings.windows(2).zip(records.iter().skip(1)) {
        let (prev, curr) = (&pair[0], &pair[1]);
        for meter_type in MeterType::ALL {
            let expected = (meter_type.value_of(curr) - meter_type.value_of(prev)).max(0.0);
            assert_eq!(
                record.value_of(meter_type),
                expected,
                "{} on {}",
                meter_type.id(),
                curr.date
            );
        }
        assert_eq!(record.total_water, record.cold_water + record.garden_water);
        assert_eq!(record.total_heating, record.heating_ht + record.heating_nt);
        assert_eq!(record.pv_self_consumption, record.pv_yield - record.pv_feed_in);
    }
}

#[test]
fn test_first_record_reports_raw_pv() {
    let readings = household_year(2024);
    let first = &derive_consumption(&readings, &[])[0];

    assert_eq!(first.total_water, 0.0);
    assert_eq!(first.electricity_light, 0.0);
    assert_eq!(first.total_heating, 0.0);
    assert_eq!(first.pv_yield, 200.0);
    assert_eq!(first.pv_feed_in, 150.0);
    assert_eq!(first.pv_self_consumption, 50.0);
}

#[test]
fn test_replacement_splicing_example() {
    let readings = vec![
        MeterReading::new("p", date(2024, 1, 1)).with_value(MeterType::GardenWater, 100.0),
        MeterReading::new("c", date(2024, 2, 1)).with_value(MeterType::GardenWater, 30.0),
    ];
    let replacements = vec![MeterReplacement {
        id: "r".to_string(),
        date: date(2024, 1, 20),
        meter_type: MeterType::GardenWater,
        old_final_reading: 120.0,
        new_initial_reading: 0.0,
        notes: None,
    }];

    let records = derive_consumption(&readings, &replacements);
    assert_eq!(records[1].garden_water, 50.0);
}

#[test]
fn test_yearly_totals_over_two_years() {
    let mut readings = household_year(2023);
    readings.extend(household_year(2024));
    let records = derive_consumption(&readings, &[]);

    let yearly = aggregate_yearly(&records);
    assert_eq!(yearly.len(), 2);
    assert_eq!(yearly[0].year, 2023);
    assert_eq!(yearly[1].year, 2024);

    for year in &yearly {
        let in_year: Vec<&ConsumptionRecord> =
            records.iter().filter(|r| r.year == year.year).collect();
        let water: f64 = in_year.iter().map(|r| r.total_water).sum();
        let heating: f64 = in_year.iter().map(|r| r.total_heating).sum();
        assert!((year.total_water - water).abs() < 1e-9);
        assert!((year.total_heating - heating).abs() < 1e-9);
    }

    // 2023: Jan is the baseline, Feb..Dec add up to Dec - Jan.
    assert_eq!(yearly[0].total_electricity, 2700.0);
}

#[test]
fn test_dashboard_warns_on_unusual_heating() {
    let mut store = InMemoryStore::new();
    for r in household_year(2023) {
        store.add_reading(r).unwrap();
    }
    // January 2024: heating jumps well above last January's.
    store
        .add_reading(reading(
            "2024-1",
            date(2024, 1, 1),
            [287.0, 132.0, 8000.0, 6500.0, 4000.0, 400.0, 260.0],
        ))
        .unwrap();

    let dashboard = MeterDashboard::new(store);
    let snapshot = dashboard.snapshot().unwrap();

    // Jan 2023 is the baseline record with zero consumption: no average to compare.
    assert!(snapshot.warnings.is_empty());

    let mut store = dashboard.into_store();
    store
        .add_reading(reading(
            "2024-2",
            date(2024, 2, 1),
            [299.0, 132.0, 8280.0, 7600.0, 4900.0, 580.0, 390.0],
        ))
        .unwrap();

    let snapshot = MeterDashboard::new(store).snapshot().unwrap();
    let kinds: Vec<WarningKind> = snapshot.warnings.iter().map(|w| w.kind).collect();
    assert_eq!(kinds, vec![WarningKind::Heating]);

    let heating = &snapshot.warnings[0];
    // Feb 2023: 450 + 300; Feb 2024: 1100 + 900.
    assert_eq!(heating.average_value, 750.0);
    assert_eq!(heating.current_value, 2000.0);
    assert!(heating.message.starts_with("Heizungsverbrauch"));
}

#[test]
fn test_csv_round_trip_preserves_values() {
    let readings = vec![
        reading("a", date(2024, 1, 1), [100.5, 20.25, 5000.0, 3000.0, 2000.0, 200.0, 150.0]),
        reading("b", date(2024, 2, 1), [112.0, 20.25, 5280.75, 3450.0, 2300.0, 380.0, 280.5]),
    ];

    let csv = export_csv(&readings, &[]).unwrap();
    let parsed = parse_csv(&csv);

    assert!(parsed.success);
    assert_eq!(parsed.readings.len(), readings.len());
    for (original, back) in readings.iter().zip(&parsed.readings) {
        assert_eq!(original.date, back.date);
        for meter_type in MeterType::ALL {
            assert_eq!(meter_type.value_of(original), meter_type.value_of(back));
        }
    }
}

#[test]
fn test_csv_date_formats_normalize() {
    for text in ["2024-01-15", "15.01.2024", "01/15/2024"] {
        assert_eq!(normalize_date(text).unwrap(), "2024-01-15");
    }
}

#[test]
fn test_csv_without_date_column_fails() {
    let result = parse_csv("Kaltwasser;Gartenwasser\n1;2\n3;4\n");
    assert!(!result.success);
    assert!(!result.errors.is_empty());
    assert!(result.readings.is_empty());
}

#[test]
fn test_csv_with_one_bad_date_row() {
    let csv = "Datum;Kaltwasser;Strom_Licht\n\
               01.01.2024;100;5000\n\
               01.02.2024;110;5200\n\
               32.13.2024;120;5400\n\
               01.04.2024;130;5600\n";

    let result = parse_csv(csv);
    assert!(result.success);
    assert_eq!(result.readings.len(), 3);
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_import_with_negative_cell_keeps_valid_rows() -> anyhow::Result<()> {
    let mut dashboard = MeterDashboard::new(InMemoryStore::new());

    let (parsed, outcome) = dashboard.import_csv(
        "Datum;Kaltwasser\n2024-01-01;100\n2024-02-01;-5\n2024-03-01;120\n",
        ImportMode::Merge,
    )?;
    assert!(parsed.success);
    assert_eq!(parsed.warnings.len(), 1);
    assert!(parsed.warnings[0].starts_with("Zeile 3:"));
    assert_eq!(outcome.added_readings, 3);

    let stored = dashboard.store().readings()?;
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[1].cold_water, 0.0);
    Ok(())
}

#[test]
fn test_replace_import_with_repeated_replacement_row() -> anyhow::Result<()> {
    let mut dashboard = MeterDashboard::new(InMemoryStore::new());
    let file = "Datum;Kaltwasser;Typ;Zaehler;Alter_Stand;Neuer_Stand\n\
                2024-01-01;100;Ablesung;;;\n\
                2024-01-15;;Zaehlerwechsel;Kaltwasser;120;0\n\
                2024-01-15;;Zaehlerwechsel;Kaltwasser;125;0\n\
                2024-02-01;30;Ablesung;;;\n";

    let (parsed, outcome) = dashboard.import_csv(file, ImportMode::Replace)?;
    assert!(parsed.success);
    assert_eq!(parsed.warnings.len(), 1);
    assert_eq!(outcome.added_replacements, 1);
    assert_eq!(dashboard.store().replacements()?.len(), 1);

    // First row wins: (120 - 100) + (30 - 0)
    assert_eq!(dashboard.consumption()?[1].cold_water, 50.0);
    Ok(())
}

#[test]
fn test_import_with_stray_quote_keeps_following_rows() -> anyhow::Result<()> {
    let mut dashboard = MeterDashboard::new(InMemoryStore::new());
    let file = "Datum;Kaltwasser;Notiz\n2024-01-01;100;\"Zoll\n2024-02-01;110;\n2024-03-01;120;\n2024-04-01;130;\n";

    let (parsed, _) = dashboard.import_csv(file, ImportMode::Merge)?;
    assert!(parsed.success);
    assert_eq!(parsed.warnings.len(), 1);
    assert_eq!(dashboard.store().readings()?.len(), 3);
    Ok(())
}

#[test]
fn test_import_keeps_meter_numbers() -> anyhow::Result<()> {
    let mut store = InMemoryStore::new();
    store.set_meter_number(MeterType::ColdWater, Some("KW-4711"))?;
    let mut dashboard = MeterDashboard::new(store);

    dashboard.import_csv(&sample_csv(), ImportMode::Replace)?;
    let snapshot = dashboard.snapshot()?;
    assert_eq!(snapshot.consumption.len(), 3);
    assert_eq!(
        snapshot.meter_numbers.get(&MeterType::ColdWater).map(String::as_str),
        Some("KW-4711")
    );
    Ok(())
}

#[test]
fn test_import_merge_then_replace() -> anyhow::Result<()> {
    let mut dashboard = MeterDashboard::new(InMemoryStore::new());

    let (parsed, outcome) = dashboard.import_csv(&sample_csv(), ImportMode::Merge)?;
    assert!(parsed.success);
    assert_eq!(outcome.added_readings, 3);
    assert_eq!(dashboard.store().readings()?.len(), 3);

    // Same file again: every date already exists.
    let (_, outcome) = dashboard.import_csv(&sample_csv(), ImportMode::Merge)?;
    assert_eq!(outcome.added_readings, 0);
    assert_eq!(outcome.skipped_readings, 3);

    let replacement_file = "Datum;Kaltwasser;Typ;Zaehler;Alter_Stand;Neuer_Stand\n\
                            2024-04-01;150;Ablesung;;;\n\
                            2024-03-15;;Zaehlerwechsel;cold_water;130;0\n";
    let (_, outcome) = dashboard.import_csv(replacement_file, ImportMode::Merge)?;
    assert_eq!(outcome.added_readings, 1);
    assert_eq!(outcome.added_replacements, 1);

    let consumption = dashboard.consumption()?;
    let april = consumption.last().unwrap();
    // (130 - 124) + (150 - 0)
    assert_eq!(april.cold_water, 156.0);

    let (_, outcome) = dashboard.import_csv("Datum;Strom\n2025-01-01;1\n", ImportMode::Replace)?;
    assert_eq!(outcome.added_readings, 1);
    assert_eq!(dashboard.store().readings()?.len(), 1);
    assert_eq!(dashboard.store().replacements()?.len(), 1);

    Ok(())
}

#[test]
fn test_failed_import_keeps_store() -> anyhow::Result<()> {
    let mut dashboard = MeterDashboard::new(InMemoryStore::new());
    dashboard.import_csv(&sample_csv(), ImportMode::Merge)?;

    let (parsed, _) = dashboard.import_csv("Datum;Kaltwasser\nkaputt;1\n", ImportMode::Replace)?;
    assert!(!parsed.success);
    assert_eq!(dashboard.store().readings()?.len(), 3);
    Ok(())
}

#[test]
fn test_dashboard_export_and_pv_report() -> anyhow::Result<()> {
    let mut store = InMemoryStore::new();
    for r in household_year(2024) {
        store.add_reading(r)?;
    }
    store.add_replacement(MeterReplacement {
        id: String::new(),
        date: date(2024, 6, 15),
        meter_type: MeterType::PvFeedIn,
        old_final_reading: 1800.0,
        new_initial_reading: 0.0,
        notes: Some("Zweirichtungszähler".to_string()),
    })?;
    let dashboard = MeterDashboard::new(store);

    let csv = dashboard.export_csv()?;
    let parsed = parse_csv(&csv);
    assert_eq!(parsed.readings.len(), 12);
    assert_eq!(parsed.replacements.len(), 1);
    assert_eq!(parsed.replacements[0].meter_type, MeterType::PvFeedIn);

    let report = dashboard.pv_report(2024)?;
    assert_eq!(report.months.len(), 12);
    assert_eq!(report.months[0].pv_self_consumption, 50.0);
    let sum: f64 = report.months.iter().map(|m| m.pv_self_consumption).sum();
    assert!((report.total_self_consumption - sum).abs() < 1e-9);
    Ok(())
}
