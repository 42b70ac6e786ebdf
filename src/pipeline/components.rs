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

//! Module converting wind speed and direction into
//! eastward and northward components.
//!
//! Direction cannot be interpolated linearly because of its
//! wraparound at 360 degrees, so observations are decomposed
//! into components before any temporal interpolation.

use super::observations::StationObservation;
use crate::constants::{MAX_WIND_DIRECTION, MAX_WIND_SPEED};
use crate::{errors::ComponentError, Float};
use chrono::NaiveDateTime;

/// Wind components derived from one observation.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug)]
pub struct ComponentSample {
    pub datetime: NaiveDateTime,
    /// Eastward component in m/s.
    pub u: Float,
    /// Northward component in m/s.
    pub v: Float,
}

/// Computes `(u, v)` of wind blowing from `direction` (degrees,
/// clockwise from north) with given `speed`.
///
/// Speed is clamped to `[0, 100]` and direction to `[0, 360]` before
/// computation, independently of the range check of the observation reader.
pub fn wind_components(speed: Float, direction: Float) -> Result<(Float, Float), ComponentError> {
    let speed_clamped = speed.clamp(0.0, MAX_WIND_SPEED);
    let direction_clamped = direction.clamp(0.0, MAX_WIND_DIRECTION);

    let (sin_dir, cos_dir) = direction_clamped.to_radians().sin_cos();

    let u = -speed_clamped * sin_dir;
    let v = -speed_clamped * cos_dir;

    if !u.is_finite() || !v.is_finite() {
        return Err(ComponentError::ComponentCalc { speed, direction });
    }

    Ok((u, v))
}

/// Decomposes every observation of the series.
pub fn resolve_components(
    observations: &[StationObservation],
) -> Result<Vec<ComponentSample>, ComponentError> {
    observations
        .iter()
        .map(|obs| {
            let (u, v) = wind_components(obs.speed, obs.direction)?;

            Ok(ComponentSample {
                datetime: obs.datetime,
                u,
                v,
            })
        })
        .collect()
}

/// Wind speed recovered from components.
pub fn wind_speed(u: Float, v: Float) -> Float {
    u.hypot(v)
}

/// Meteorological wind direction (degrees, `[0, 360)`) recovered from components.
pub fn wind_direction(u: Float, v: Float) -> Float {
    let direction = (-u).atan2(-v).to_degrees();

    direction.rem_euclid(360.0)
}
