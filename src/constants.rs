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

//! Module containing constants used by the pipeline.

use crate::Float;

/// Upper bound (exclusive at loading, inclusive at clamping)
/// of a plausible wind speed in m/s.
pub const MAX_WIND_SPEED: Float = 100.0;

/// Upper bound of meteorological wind direction in degrees.
pub const MAX_WIND_DIRECTION: Float = 360.0;

/// Default spacing of the target time axis in seconds.
///
/// Half of the hourly ERA5 step. It is a fixed duration and is
/// never derived from the native time axis.
pub const DEFAULT_TARGET_INTERVAL: i64 = 1800;

/// Default number of target steps per native step for the midpoint densifier.
pub const DEFAULT_DENSIFY_RATIO: usize = 2;

/// Fill value of the floating-point output fields.
pub const OUTPUT_FILL_VALUE: f32 = -9999.0;

/// Name of the mean sea level pressure variable.
pub const MSL: &str = "msl";

/// Name of the 10 m eastward wind component variable.
pub const U10: &str = "u10";

/// Name of the 10 m northward wind component variable.
pub const V10: &str = "v10";

/// Name of the latitude coordinate and dimension.
pub const LATITUDE: &str = "latitude";

/// Name of the longitude coordinate and dimension.
pub const LONGITUDE: &str = "longitude";

/// Names under which the native time coordinate can be found.
pub const NATIVE_TIME_NAMES: [&str; 2] = ["valid_time", "time"];

/// Name of the time coordinate in the output dataset.
pub const OUTPUT_TIME: &str = "time";

/// Name given to native time dimension of passthrough variables
/// when it would collide with [`OUTPUT_TIME`].
pub const NATIVE_TIME_FALLBACK: &str = "native_time";

/// Units of the output time coordinate.
pub const TIME_UNITS: &str = "seconds since 1970-01-01";

/// Calendar of the output time coordinate.
pub const TIME_CALENDAR: &str = "proleptic_gregorian";

/// Every how many broadcast steps a progress message is logged at info level.
pub const PROGRESS_LOG_EVERY: usize = 10;

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "WIND_INTERP_CONFIG";

/// Configuration file path used when [`CONFIG_PATH_ENV`] is not set.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
