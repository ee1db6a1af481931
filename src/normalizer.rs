//! Raw crawler rows to clean station-hour readings.
//!
//! Every step degrades instead of failing: junk values become absent, values
//! outside the plausible range become absent, rows without a usable timestamp
//! or without any usable pollutant are dropped and counted.

use chrono::NaiveDateTime;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::config::NormalizerConfig;
use crate::data_models::{CleanReading, Pollutant, PollutantValues, RawReading};
use crate::models::SensorValue;
use crate::utils::{floor_to_hour, format_time, parse_timestamp};

/// Numeric value of a raw cell, or `None` for anything unusable.
pub fn coerce(value: &SensorValue) -> Option<f64> {
    match value {
        SensorValue::Number(v) if v.is_finite() => Some(*v),
        SensorValue::Number(_) | SensorValue::Empty => None,
        SensorValue::Text(s) => match SensorValue::from_field(s, &[]) {
            SensorValue::Number(v) if v.is_finite() => Some(v),
            _ => None,
        },
    }
}

/// Out-of-range values are sensor errors: dropped, never clipped.
pub fn filter_range(pollutant: Pollutant, value: f64) -> Option<f64> {
    let (low, high) = pollutant.plausible_range();
    (low..=high).contains(&value).then_some(value)
}

pub fn bucket_by_hour(timestamp: &str, formats: &[String]) -> Option<NaiveDateTime> {
    parse_timestamp(timestamp, formats).and_then(floor_to_hour)
}

/// Per-pollutant counters for one normalization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollutantStats {
    pub valid: usize,
    pub missing: usize,
    pub non_numeric: usize,
    pub out_of_range: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub rows_in: usize,
    pub dropped_bad_timestamp: usize,
    pub dropped_no_pollutant: usize,
    pub rows_bucketed: usize,
    pub groups_out: usize,
    pub per_pollutant: BTreeMap<Pollutant, PollutantStats>,
}

impl NormalizeStats {
    pub fn merged_rows(&self) -> usize {
        self.rows_bucketed - self.groups_out
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub clean: Vec<CleanReading>,
    pub stats: NormalizeStats,
}

/// A single raw row after coercion, range filtering and bucketing.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketedReading {
    pub station_id: String,
    pub station_name: String,
    pub hour: NaiveDateTime,
    pub values: PollutantValues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueOutcome {
    Valid,
    Missing,
    NonNumeric,
    OutOfRange,
}

#[derive(Debug)]
enum RowOutcome {
    BadTimestamp,
    NoPollutant([Option<ValueOutcome>; Pollutant::COUNT]),
    Bucketed(BucketedReading, [Option<ValueOutcome>; Pollutant::COUNT]),
}

fn normalize_row(raw: &RawReading, pollutants: &[Pollutant], config: &NormalizerConfig) -> RowOutcome {
    let Some(hour) = bucket_by_hour(&raw.get_time, &config.timestamp_formats) else {
        return RowOutcome::BadTimestamp;
    };

    let mut values = PollutantValues::new();
    let mut outcomes = [None; Pollutant::COUNT];
    for &pollutant in pollutants {
        let (value, outcome) = match raw.sensors.get(pollutant.column_name()) {
            None | Some(SensorValue::Empty) => (None, ValueOutcome::Missing),
            Some(cell) => match coerce(cell) {
                None => (None, ValueOutcome::NonNumeric),
                Some(v) => match filter_range(pollutant, v) {
                    Some(v) => (Some(v), ValueOutcome::Valid),
                    None => (None, ValueOutcome::OutOfRange),
                },
            },
        };
        values.set(pollutant, value);
        outcomes[pollutant.index()] = Some(outcome);
    }

    if values.is_empty() {
        return RowOutcome::NoPollutant(outcomes);
    }
    RowOutcome::Bucketed(
        BucketedReading {
            station_id: raw.station_id.clone(),
            station_name: raw.station_name.clone(),
            hour,
            values,
        },
        outcomes,
    )
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    station_name: String,
    sums: [f64; Pollutant::COUNT],
    counts: [usize; Pollutant::COUNT],
}

/// Group ordering for station ids: all-digit ids sort by value and before any
/// other id; the rest sort as text. The id itself stays part of the key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum StationKey {
    Numeric(u128, String),
    Text(String),
}

impl StationKey {
    fn new(id: String) -> Self {
        if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = id.parse::<u128>() {
                return StationKey::Numeric(n, id);
            }
        }
        StationKey::Text(id)
    }

    fn into_id(self) -> String {
        match self {
            StationKey::Numeric(_, id) | StationKey::Text(id) => id,
        }
    }
}

/// Collapses rows to one reading per (station, hour): arithmetic mean per
/// pollutant over the rows where it is present. A pollutant absent from every
/// row of a group stays absent. Rows with no pollutant at all contribute
/// nothing. Output is ordered by station id (numerically for numeric ids),
/// then hour.
pub fn aggregate(rows: Vec<BucketedReading>) -> Vec<CleanReading> {
    let mut groups: BTreeMap<(StationKey, NaiveDateTime), GroupAccumulator> = BTreeMap::new();

    for row in rows {
        if row.values.is_empty() {
            continue;
        }
        let acc = groups
            .entry((StationKey::new(row.station_id), row.hour))
            .or_insert_with(|| GroupAccumulator {
                station_name: row.station_name,
                ..Default::default()
            });
        for (pollutant, value) in row.values.present() {
            acc.sums[pollutant.index()] += value;
            acc.counts[pollutant.index()] += 1;
        }
    }

    groups
        .into_iter()
        .map(|((station, hour), acc)| {
            let mut values = PollutantValues::new();
            for pollutant in Pollutant::ALL {
                let i = pollutant.index();
                if acc.counts[i] > 0 {
                    values.set(pollutant, Some(acc.sums[i] / acc.counts[i] as f64));
                }
            }
            CleanReading {
                station_id: station.into_id(),
                station_name: acc.station_name,
                get_time: hour,
                values,
            }
        })
        .collect()
}

/// Full normalization stage over one batch. `pollutants` are the pollutant
/// columns present in the batch; other sensor keys are ignored.
pub fn normalize(raw: &[RawReading], pollutants: &[Pollutant], config: &NormalizerConfig) -> NormalizeOutcome {
    normalize_with_progress(raw, pollutants, config, &ProgressBar::hidden())
}

/// [`normalize`] advancing `progress` once per raw row.
pub fn normalize_with_progress(
    raw: &[RawReading],
    pollutants: &[Pollutant],
    config: &NormalizerConfig,
    progress: &ProgressBar,
) -> NormalizeOutcome {
    let outcomes: Vec<RowOutcome> = raw
        .par_iter()
        .map(|row| {
            let outcome = normalize_row(row, pollutants, config);
            progress.inc(1);
            outcome
        })
        .collect();

    let mut stats = NormalizeStats {
        rows_in: raw.len(),
        per_pollutant: pollutants.iter().map(|&p| (p, PollutantStats::default())).collect(),
        ..Default::default()
    };
    let mut bucketed = Vec::with_capacity(outcomes.len());

    for outcome in outcomes {
        let value_outcomes = match outcome {
            RowOutcome::BadTimestamp => {
                stats.dropped_bad_timestamp += 1;
                continue;
            }
            RowOutcome::NoPollutant(value_outcomes) => {
                stats.dropped_no_pollutant += 1;
                value_outcomes
            }
            RowOutcome::Bucketed(row, value_outcomes) => {
                bucketed.push(row);
                value_outcomes
            }
        };
        for pollutant in Pollutant::ALL {
            let Some(outcome) = value_outcomes[pollutant.index()] else {
                continue;
            };
            let entry = stats.per_pollutant.entry(pollutant).or_default();
            match outcome {
                ValueOutcome::Valid => entry.valid += 1,
                ValueOutcome::Missing => entry.missing += 1,
                ValueOutcome::NonNumeric => entry.non_numeric += 1,
                ValueOutcome::OutOfRange => entry.out_of_range += 1,
            }
        }
    }

    stats.rows_bucketed = bucketed.len();
    let clean = aggregate(bucketed);
    stats.groups_out = clean.len();

    NormalizeOutcome { clean, stats }
}

impl From<&CleanReading> for RawReading {
    fn from(reading: &CleanReading) -> Self {
        RawReading {
            station_id: reading.station_id.clone(),
            station_name: reading.station_name.clone(),
            get_time: format_time(&reading.get_time),
            sensors: reading
                .values
                .present()
                .map(|(p, v)| (p.column_name().to_string(), SensorValue::Number(v)))
                .collect(),
        }
    }
}
