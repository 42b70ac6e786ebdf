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

//! Module aligning observed wind components to the target time axis.
//!
//! The target axis is regular, starts and ends exactly at the first and
//! last native steps, and has a configured spacing. Observations are
//! reindexed onto it: only observations falling exactly on target steps
//! are kept, and remaining steps are filled by linear interpolation in time
//! between the nearest known steps.

use super::bisection;
use super::components::ComponentSample;
use super::configuration::EdgePolicy;
use super::dataset::TimeAxis;
use crate::errors::{AlignmentError, SearchError};
use crate::Float;
use chrono::{Duration, NaiveDateTime};
use log::debug;
use rustc_hash::FxHashMap;

/// Builds the regular target axis spanning the native axis.
///
/// The interval is taken as given. If it does not divide the native
/// span, the regular part stops before the last native step
/// and the last native step is appended to close the axis.
pub fn build_target_axis(native: &TimeAxis, interval: Duration) -> Result<TimeAxis, AlignmentError> {
    if interval <= Duration::zero() {
        return Err(AlignmentError::InvalidInterval(interval.num_seconds()));
    }

    let (start, end) = match (native.first(), native.last()) {
        (Some(start), Some(end)) if native.len() >= 2 => (start, end),
        _ => return Err(AlignmentError::InsufficientNativeSteps(native.len())),
    };

    let target = TimeAxis::regular_spanning(start, end, interval);

    if (end - start).num_seconds() % interval.num_seconds() != 0 {
        debug!(
            "Target interval of {} s does not divide native span, last target step is shorter",
            interval.num_seconds()
        );
    }

    Ok(target)
}

/// Resamples the component series onto the target axis.
///
/// Returns exactly one sample per target step.
pub fn align_components(
    samples: &[ComponentSample],
    target: &TimeAxis,
    edge_policy: EdgePolicy,
) -> Result<Vec<ComponentSample>, AlignmentError> {
    let by_time: FxHashMap<NaiveDateTime, (Float, Float)> = samples
        .iter()
        .map(|sample| (sample.datetime, (sample.u, sample.v)))
        .collect();

    let reindexed: Vec<Option<(Float, Float)>> = target
        .steps()
        .iter()
        .map(|datetime| by_time.get(datetime).copied())
        .collect();

    let known: Vec<(NaiveDateTime, (Float, Float))> = target
        .steps()
        .iter()
        .zip(&reindexed)
        .filter_map(|(&datetime, value)| value.map(|value| (datetime, value)))
        .collect();

    if known.is_empty() {
        return Err(AlignmentError::NoObservationsOnAxis);
    }

    debug!(
        "{} of {} target steps have observations, interpolating the rest",
        known.len(),
        target.len()
    );

    let known_times: Vec<NaiveDateTime> = known.iter().map(|(datetime, _)| *datetime).collect();

    target
        .steps()
        .iter()
        .zip(reindexed)
        .map(|(&datetime, value)| {
            let (u, v) = match value {
                Some(value) => value,
                None => fill_missing(datetime, &known, &known_times, edge_policy)?,
            };

            Ok(ComponentSample { datetime, u, v })
        })
        .collect()
}

/// Interpolates the value at `datetime` from known steps,
/// or applies the edge policy when they do not bracket it.
fn fill_missing(
    datetime: NaiveDateTime,
    known: &[(NaiveDateTime, (Float, Float))],
    known_times: &[NaiveDateTime],
    edge_policy: EdgePolicy,
) -> Result<(Float, Float), AlignmentError> {
    match bisection::find_bracket(known_times, &datetime) {
        Ok((left, right)) => {
            let (t_left, (u_left, v_left)) = known[left];
            let (t_right, (u_right, v_right)) = known[right];

            if left == right {
                return Ok((u_left, v_left));
            }

            let weight = (datetime - t_left).num_seconds() as Float
                / (t_right - t_left).num_seconds() as Float;

            Ok((
                u_left + weight * (u_right - u_left),
                v_left + weight * (v_right - v_left),
            ))
        }
        Err(SearchError::OutOfBounds) => match edge_policy {
            EdgePolicy::Fail => Err(AlignmentError::UncoveredTimestep(datetime)),
            EdgePolicy::NearestHold => {
                // known is not empty here, checked by the caller
                let (_, value) = if datetime < known_times[0] {
                    known[0]
                } else {
                    known[known.len() - 1]
                };
                Ok(value)
            }
        },
        Err(err) => Err(err.into()),
    }
}
