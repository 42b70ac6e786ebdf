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

//! Module with the in-memory representation of gridded datasets.
//!
//! A [`Dataset`] holds a time axis, a rectilinear latitude/longitude grid,
//! named numeric and text variables with their dimension names and
//! attributes, and global attributes. Attributes are carried opaquely
//! from input to output.

#[cfg(feature = "netcdf")]
mod netcdf_io;

use crate::constants::{LATITUDE, LONGITUDE, OUTPUT_FILL_VALUE};
use crate::errors::{AssemblyError, InputError, OutputError};
use crate::Float;
use chrono::{DateTime, Duration, NaiveDateTime};
use ndarray::{Array1, Array3, ArrayD, Axis, Ix3, Slice};
use std::collections::BTreeMap;
use std::path::Path;

/// Value of a dataset, variable or coordinate attribute.
#[derive(Clone, PartialEq, Debug)]
pub enum AttributeValue {
    Text(String),
    Texts(Vec<String>),
    Int(i64),
    Ints(Vec<i64>),
    Double(f64),
    Doubles(Vec<f64>),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

/// Attribute name to value mapping.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Strictly increasing sequence of datetimes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TimeAxis {
    steps: Vec<NaiveDateTime>,
}

impl TimeAxis {
    pub fn new(steps: Vec<NaiveDateTime>) -> Result<Self, InputError> {
        if let Some(i) = steps.windows(2).position(|pair| pair[0] >= pair[1]) {
            return Err(InputError::UnorderedTime(i + 1));
        }

        Ok(TimeAxis { steps })
    }

    /// Creates the axis from seconds since Unix epoch.
    pub fn from_timestamps(timestamps: &[i64]) -> Result<Self, InputError> {
        let steps = timestamps
            .iter()
            .map(|&ts| {
                DateTime::from_timestamp(ts, 0)
                    .map(|dt| dt.naive_utc())
                    .ok_or(InputError::InvalidTime(ts))
            })
            .collect::<Result<Vec<_>, _>>()?;

        TimeAxis::new(steps)
    }

    /// Regular axis from `start` with `interval` spacing, not going past `end`.
    ///
    /// When `end` does not fall on the regular grid it is appended
    /// as the last step, so the axis always ends exactly at `end`.
    /// A step beyond the representable datetime range ends the grid.
    pub(super) fn regular_spanning(
        start: NaiveDateTime,
        end: NaiveDateTime,
        interval: Duration,
    ) -> Self {
        let mut steps = vec![];
        let mut current = Some(start);

        while let Some(step) = current.filter(|step| *step <= end) {
            steps.push(step);
            current = step.checked_add_signed(interval);
        }

        if steps.last() != Some(&end) {
            steps.push(end);
        }

        TimeAxis { steps }
    }

    pub fn steps(&self) -> &[NaiveDateTime] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn first(&self) -> Option<NaiveDateTime> {
        self.steps.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDateTime> {
        self.steps.last().copied()
    }

    /// Seconds since Unix epoch of every step.
    pub fn timestamps(&self) -> Vec<i64> {
        self.steps.iter().map(|dt| dt.and_utc().timestamp()).collect()
    }

    fn truncated(&self, steps: usize) -> TimeAxis {
        TimeAxis {
            steps: self.steps[..steps].to_vec(),
        }
    }
}

/// One-dimensional coordinate (latitude or longitude).
#[derive(Clone, PartialEq, Debug)]
pub struct Coordinate {
    pub values: Array1<Float>,
    pub attrs: Attributes,
}

/// Any non-coordinate variable of the dataset.
///
/// Numeric variables hold floats, text variables (like ERA5 `expver`) strings.
#[derive(Clone, PartialEq, Debug)]
pub struct Variable<T = Float> {
    pub dims: Vec<String>,
    pub data: ArrayD<T>,
    pub attrs: Attributes,
}

/// Variable with string values.
pub type TextVariable = Variable<String>;

impl<T> Variable<T> {
    pub fn axis_of(&self, dim: &str) -> Option<Axis> {
        self.dims.iter().position(|d| d == dim).map(Axis)
    }
}

/// Physical variable on a (time, latitude, longitude) grid.
#[derive(Clone, PartialEq, Debug)]
pub struct GriddedField {
    pub data: Array3<Float>,
    pub attrs: Attributes,
}

impl GriddedField {
    /// Spatial (latitude, longitude) shape of the field.
    pub fn grid_shape(&self) -> (usize, usize) {
        let (_, lat, lon) = self.data.dim();
        (lat, lon)
    }
}

/// Additional time coordinate, for variables kept on a time
/// dimension other than the main one.
#[derive(Clone, PartialEq, Debug)]
pub struct AuxiliaryTime {
    pub name: String,
    pub axis: TimeAxis,
    pub attrs: Attributes,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Dataset {
    /// Name of the time coordinate and dimension.
    pub time_name: String,
    pub time: TimeAxis,
    pub time_attrs: Attributes,
    pub auxiliary_time: Option<AuxiliaryTime>,
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    pub variables: BTreeMap<String, Variable>,
    pub text_variables: BTreeMap<String, TextVariable>,
    pub attrs: Attributes,
}

impl Dataset {
    /// Reads the dataset from NetCDF file.
    #[cfg(feature = "netcdf")]
    pub fn new_from_file(file_path: &Path) -> Result<Self, InputError> {
        netcdf_io::read_dataset(file_path)
    }

    #[cfg(not(feature = "netcdf"))]
    pub fn new_from_file(_file_path: &Path) -> Result<Self, InputError> {
        Err(InputError::FeatureDisabled)
    }

    /// Writes the dataset to a new NetCDF file.
    ///
    /// Variables listed in `single_precision` are stored as 32-bit floats
    /// with the output fill value, all other numeric variables as 64-bit
    /// floats and text variables as strings.
    #[cfg(feature = "netcdf")]
    pub fn write_to_file(
        &self,
        file_path: &Path,
        single_precision: &[&str],
    ) -> Result<(), OutputError> {
        netcdf_io::write_dataset(self, file_path, single_precision)
    }

    #[cfg(not(feature = "netcdf"))]
    pub fn write_to_file(
        &self,
        _file_path: &Path,
        _single_precision: &[&str],
    ) -> Result<(), OutputError> {
        Err(OutputError::FeatureDisabled)
    }

    /// Spatial (latitude, longitude) shape of the grid.
    pub fn grid_shape(&self) -> (usize, usize) {
        (self.latitude.values.len(), self.longitude.values.len())
    }

    /// Total number of variables, coordinates included.
    pub fn variable_count(&self) -> usize {
        let auxiliary = usize::from(self.auxiliary_time.is_some());
        self.variables.len() + self.text_variables.len() + 3 + auxiliary
    }

    /// Lists every dimension used by the dataset together with its length.
    ///
    /// Time, latitude and longitude come first, then the auxiliary time,
    /// then dimensions of other variables in order of appearance.
    pub fn dimensions(&self) -> Result<Vec<(String, usize)>, OutputError> {
        let (nlat, nlon) = self.grid_shape();

        let mut dims = vec![
            (self.time_name.clone(), self.time.len()),
            (LATITUDE.to_string(), nlat),
            (LONGITUDE.to_string(), nlon),
        ];

        if let Some(auxiliary) = &self.auxiliary_time {
            add_dimension(&mut dims, &auxiliary.name, auxiliary.axis.len())?;
        }

        let numeric = self
            .variables
            .values()
            .map(|var| (&var.dims, var.data.shape()));
        let text = self
            .text_variables
            .values()
            .map(|var| (&var.dims, var.data.shape()));

        for (var_dims, shape) in numeric.chain(text) {
            for (dim, &len) in var_dims.iter().zip(shape) {
                add_dimension(&mut dims, dim, len)?;
            }
        }

        Ok(dims)
    }

    /// Extracts a variable as a (time, latitude, longitude) field.
    pub fn gridded_field(&self, name: &str) -> Result<GriddedField, AssemblyError> {
        if self.text_variables.contains_key(name) {
            return Err(AssemblyError::NotGridded(name.to_string()));
        }

        let variable = self
            .variables
            .get(name)
            .ok_or_else(|| AssemblyError::MissingVariable(name.to_string()))?;

        if variable.dims != [self.time_name.as_str(), LATITUDE, LONGITUDE] {
            return Err(AssemblyError::NotGridded(name.to_string()));
        }

        let data = variable
            .data
            .clone()
            .into_dimensionality::<Ix3>()
            .map_err(|_| AssemblyError::NotGridded(name.to_string()))?;

        Ok(GriddedField {
            data,
            attrs: variable.attrs.clone(),
        })
    }

    /// Returns a copy of the dataset limited to the first `steps` time steps.
    pub fn select_time_steps(&self, steps: usize) -> Result<Dataset, InputError> {
        if steps > self.time.len() {
            return Err(InputError::TimeSelection {
                requested: steps,
                available: self.time.len(),
            });
        }

        let mut selected = self.clone();
        selected.time = self.time.truncated(steps);

        for variable in selected.variables.values_mut() {
            if let Some(axis) = variable.axis_of(&self.time_name) {
                variable.data.slice_axis_inplace(axis, Slice::from(..steps));
            }
        }

        for variable in selected.text_variables.values_mut() {
            if let Some(axis) = variable.axis_of(&self.time_name) {
                variable.data.slice_axis_inplace(axis, Slice::from(..steps));
            }
        }

        Ok(selected)
    }

    /// Reverses the order of latitudes together with every
    /// variable that has a latitude dimension.
    pub fn reverse_latitude(mut self) -> Dataset {
        self.latitude.values.invert_axis(Axis(0));

        for variable in self.variables.values_mut() {
            if let Some(axis) = variable.axis_of(LATITUDE) {
                variable.data.invert_axis(axis);
            }
        }

        for variable in self.text_variables.values_mut() {
            if let Some(axis) = variable.axis_of(LATITUDE) {
                variable.data.invert_axis(axis);
            }
        }

        self
    }
}

fn add_dimension(
    dims: &mut Vec<(String, usize)>,
    name: &str,
    len: usize,
) -> Result<(), OutputError> {
    match dims.iter().find(|(known, _)| known == name) {
        Some((_, known_len)) if *known_len != len => {
            Err(OutputError::InconsistentDimension(name.to_string()))
        }
        Some(_) => Ok(()),
        None => {
            dims.push((name.to_string(), len));
            Ok(())
        }
    }
}

/// Values of a field stored as 32-bit floats, in logical (row-major) order,
/// with NaN replaced by the output fill value.
fn single_precision_values(data: &ArrayD<Float>) -> Vec<f32> {
    data.iter()
        .map(|&v| if v.is_nan() { OUTPUT_FILL_VALUE } else { v as f32 })
        .collect()
}

/// Converts time values encoded as `<unit> since <reference>`
/// into seconds since Unix epoch.
///
/// Values without units are taken as seconds since Unix epoch.
pub fn decode_time(values: &[Float], units: Option<&str>) -> Result<Vec<i64>, InputError> {
    let (scale, reference) = match units {
        None => (1.0, 0),
        Some(units) => parse_time_units(units)
            .ok_or_else(|| InputError::InvalidTimeUnits(units.to_string()))?,
    };

    Ok(values
        .iter()
        .map(|v| reference + (v * scale).round() as i64)
        .collect())
}

fn parse_time_units(units: &str) -> Option<(Float, i64)> {
    let (unit, reference) = units.split_once(" since ")?;

    let scale = match unit.trim() {
        "seconds" | "second" | "s" => 1.0,
        "minutes" | "minute" => 60.0,
        "hours" | "hour" | "h" => 3600.0,
        "days" | "day" | "d" => 86400.0,
        _ => return None,
    };

    let reference = reference.trim().trim_end_matches(" UTC").trim_end_matches('Z');
    let reference = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .find_map(|format| NaiveDateTime::parse_from_str(reference, format).ok())
    .or_else(|| {
        chrono::NaiveDate::parse_from_str(reference, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    })?;

    Some((scale, reference.and_utc().timestamp()))
}
