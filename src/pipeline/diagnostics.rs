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

//! Diagnostics of a pipeline run: the aligned component series
//! written to CSV and value ranges of the produced fields.

use super::components::{wind_direction, wind_speed, ComponentSample};
use super::dataset::{Dataset, TimeAxis};
use crate::errors::OutputError;
use crate::Float;
use log::{info, warn};
use ndarray::{ArrayBase, Data, Dimension};
use std::io;
use std::path::Path;

/// Writes the aligned component series, with wind speed and direction
/// recovered from the components, to a CSV file.
pub fn save_components_csv(aligned: &[ComponentSample], file_path: &Path) -> Result<(), OutputError> {
    if file_path.exists() {
        return Err(OutputError::FileExists(file_path.display().to_string()));
    }

    let out_file = csv::Writer::from_path(file_path)?;
    write_components(aligned, out_file)
}

fn write_components<W: io::Write>(
    aligned: &[ComponentSample],
    mut out_file: csv::Writer<W>,
) -> Result<(), OutputError> {
    out_file.write_record(&["dateTime", "u10", "v10", "windSpeed", "windDirection"])?;

    for sample in aligned {
        out_file.write_record(&[
            sample.datetime.to_string(),
            sample.u.to_string(),
            sample.v.to_string(),
            wind_speed(sample.u, sample.v).to_string(),
            wind_direction(sample.u, sample.v).to_string(),
        ])?;
    }

    out_file.flush()?;

    Ok(())
}

/// Minimum and maximum of the array, ignoring NaN.
///
/// Returns `None` when there are no finite values.
pub fn value_range<S, D>(data: &ArrayBase<S, D>) -> Option<(Float, Float)>
where
    S: Data<Elem = Float>,
    D: Dimension,
{
    data.iter()
        .filter(|value| !value.is_nan())
        .fold(None, |range, &value| match range {
            None => Some((value, value)),
            Some((min, max)) => Some((min.min(value), max.max(value))),
        })
}

/// Logs value ranges of every variable in the dataset.
pub fn log_field_ranges(dataset: &Dataset) {
    for (name, variable) in &dataset.variables {
        match value_range(&variable.data) {
            Some((min, max)) => info!("{}: min {:.3}, max {:.3}", name, min, max),
            None => warn!("{} holds no valid values", name),
        }
    }
}

/// Logs the range of wind speed recovered from the aligned series.
pub fn log_observed_wind(aligned: &[ComponentSample]) {
    let speeds: Vec<Float> = aligned
        .iter()
        .map(|sample| wind_speed(sample.u, sample.v))
        .collect();

    if let Some((min, max)) = value_range(&ndarray::aview1(&speeds)) {
        info!("Observed wind speed ranges from {:.2} to {:.2} m/s", min, max);
    }
}

pub fn log_run_summary(native: &TimeAxis, target: &TimeAxis) {
    if let (Some(first), Some(last)) = (target.first(), target.last()) {
        info!(
            "Original timesteps: {}, interpolated timesteps: {} ({} to {})",
            native.len(),
            target.len(),
            first,
            last
        );
    }
}
