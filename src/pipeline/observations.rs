/*
Copyright 2021 Jakub Lewandowski

This file is part of Observed Wind Interpolation (wind-interp).

Observed Wind Interpolation (wind-interp) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

Observed Wind Interpolation (wind-interp) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with Observed Wind Interpolation (wind-interp). If not, see https://www.gnu.org/licenses/.
*/

//! Module responsible for reading station wind observations.
//!
//! Observations come as plain text with one `DATE TIME SPEED DIRECTION`
//! record per line, fields separated by any amount of whitespace.
//! Records with non-numeric or out-of-range values are dropped
//! (not clamped), and the remaining ones form a table sorted by time.

use crate::constants::{MAX_WIND_DIRECTION, MAX_WIND_SPEED};
use crate::{errors::ObservationError, Float};
use chrono::NaiveDateTime;
use log::debug;
use rustc_hash::FxHashMap;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

/// Datetime layouts accepted for the joined `DATE TIME` fields.
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y%m%d %H%M",
];

/// Single wind reading from the station.
///
/// Direction follows the meteorological convention:
/// it is the direction the wind is blowing from,
/// in degrees clockwise from north.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug)]
pub struct StationObservation {
    pub datetime: NaiveDateTime,
    pub speed: Float,
    pub direction: Float,
}

/// Validated observations sorted by time, without duplicated timestamps.
#[derive(Clone, PartialEq, Debug)]
pub struct ObservationTable {
    records: Vec<StationObservation>,
    dropped: usize,
}

impl ObservationTable {
    /// Reads and validates observations from a text file.
    pub fn new_from_file(file_path: &Path) -> Result<Self, ObservationError> {
        debug!("Reading wind observations from {}", file_path.display());

        let file = File::open(file_path)?;
        ObservationTable::new_from_reader(BufReader::new(file))
    }

    /// Reads and validates observations from any buffered source.
    ///
    /// When the same timestamp occurs more than once,
    /// the record appearing last in the input is kept.
    pub fn new_from_reader<R: BufRead>(reader: R) -> Result<Self, ObservationError> {
        let mut by_time: FxHashMap<NaiveDateTime, StationObservation> = FxHashMap::default();
        let mut dropped = 0;

        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = line.map_err(|err| match err.kind() {
                io::ErrorKind::InvalidData => ObservationError::Parse {
                    line: line_number,
                    reason: err.to_string(),
                },
                _ => ObservationError::CantOpenFile(err),
            })?;

            if line.trim().is_empty() {
                continue;
            }

            match parse_record(&line, line_number)? {
                Some(observation) => {
                    if by_time.insert(observation.datetime, observation).is_some() {
                        debug!(
                            "Duplicate observation at {} in line {}, keeping the later one",
                            observation.datetime, line_number
                        );
                    }
                }
                None => dropped += 1,
            }
        }

        if by_time.is_empty() {
            return Err(ObservationError::EmptyData);
        }

        let mut records: Vec<StationObservation> = by_time.into_values().collect();
        records.sort_unstable_by_key(|obs| obs.datetime);

        debug!(
            "Read {} valid observations, dropped {} records",
            records.len(),
            dropped
        );

        Ok(ObservationTable { records, dropped })
    }

    pub fn records(&self) -> &[StationObservation] {
        &self.records
    }

    /// Number of records discarded as malformed or out of range.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Parses one line into an observation.
///
/// Returns `Ok(None)` when the record must be dropped: missing or non-numeric
/// speed or direction, or values outside of `0 <= speed < 100` and
/// `0 <= direction <= 360`. The datetime is parsed only for records that
/// pass those filters, and a malformed datetime is an error.
fn parse_record(
    line: &str,
    line_number: usize,
) -> Result<Option<StationObservation>, ObservationError> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    if fields.len() > 4 {
        return Err(ObservationError::Parse {
            line: line_number,
            reason: format!("expected 4 fields, found {}", fields.len()),
        });
    }

    if fields.len() < 4 {
        return Ok(None);
    }

    let (speed, direction) = match (fields[2].parse::<Float>(), fields[3].parse::<Float>()) {
        (Ok(speed), Ok(direction)) => (speed, direction),
        _ => return Ok(None),
    };

    // NaN fails both comparisons so it is dropped here as well
    let speed_valid = speed >= 0.0 && speed < MAX_WIND_SPEED;
    let direction_valid = (0.0..=MAX_WIND_DIRECTION).contains(&direction);

    if !speed_valid || !direction_valid {
        return Ok(None);
    }

    let datetime = parse_datetime(fields[0], fields[1]).ok_or_else(|| ObservationError::Parse {
        line: line_number,
        reason: format!("cannot parse datetime from '{} {}'", fields[0], fields[1]),
    })?;

    Ok(Some(StationObservation {
        datetime,
        speed,
        direction,
    }))
}

fn parse_datetime(date: &str, time: &str) -> Option<NaiveDateTime> {
    let joined = format!("{} {}", date, time);

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&joined, format).ok())
}
