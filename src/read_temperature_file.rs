use crate::core::detector::Sample;
use anyhow::{anyhow, bail};
use chrono::NaiveDateTime;
use csv::ReaderBuilder as CsvReaderBuilder;
use std::io::Read;

const TIMESTAMP_COLUMN: &str = "Timestamp";
// sensor exports title this column "Temperature_Celsius(°C)", match on the prefix
const TEMPERATURE_COLUMN_PREFIX: &str = "Temperature_Celsius";

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Read one room's temperature log into an ordered sample series.
///
/// All input validation happens here, before any detection: missing columns,
/// unparseable fields, out-of-order timestamps and too-short series are
/// rejected with the room and offending row named, and bad rows are never
/// replaced with substitute values.
pub fn temperature_data_to_samples(file: impl Read, room_id: &str) -> anyhow::Result<Vec<Sample>> {
    let mut reader = CsvReaderBuilder::new().flexible(true).from_reader(file);

    let headers = reader
        .headers()
        .map_err(|error| anyhow!("room {room_id}: could not read CSV header: {error}"))?;
    let timestamp_index = headers
        .iter()
        .position(|header| header.trim() == TIMESTAMP_COLUMN)
        .ok_or_else(|| anyhow!("room {room_id}: no '{TIMESTAMP_COLUMN}' column in header"))?;
    let temperature_index = headers
        .iter()
        .position(|header| header.trim().starts_with(TEMPERATURE_COLUMN_PREFIX))
        .ok_or_else(|| {
            anyhow!("room {room_id}: no '{TEMPERATURE_COLUMN_PREFIX}' column in header")
        })?;

    let mut samples: Vec<Sample> = Vec::new();
    for (i, record) in reader.records().enumerate() {
        // row numbers are 1-based and include the header row
        let row = i + 2;
        let record =
            record.map_err(|error| anyhow!("room {room_id}: unreadable row {row}: {error}"))?;

        let timestamp_field = record
            .get(timestamp_index)
            .ok_or_else(|| anyhow!("room {room_id}: missing timestamp in row {row}"))?;
        let timestamp = parse_timestamp(timestamp_field).ok_or_else(|| {
            anyhow!("room {room_id}: unparseable timestamp {timestamp_field:?} in row {row}")
        })?;

        let temperature_field = record
            .get(temperature_index)
            .ok_or_else(|| anyhow!("room {room_id}: missing temperature in row {row}"))?;
        let temperature: f64 = temperature_field.trim().parse().map_err(|_| {
            anyhow!("room {room_id}: unparseable temperature {temperature_field:?} in row {row}")
        })?;

        if let Some(previous) = samples.last() {
            if timestamp <= previous.timestamp {
                bail!("room {room_id}: timestamps not strictly increasing in row {row}");
            }
        }

        samples.push(Sample {
            timestamp,
            temperature,
        });
    }

    if samples.len() < 2 {
        bail!(
            "room {room_id}: {} data row(s), at least 2 needed to compute a temperature rate",
            samples.len()
        );
    }

    Ok(samples)
}

fn parse_timestamp(field: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(field.trim(), format).ok())
}
