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

//! Sub-module reading and writing datasets in NetCDF format.
//!
//! Packed variables (`scale_factor`, `add_offset`) are unpacked on reading
//! and values equal to `_FillValue` or `missing_value` become NaN, so the
//! in-memory dataset carries no encoding attributes. String and character
//! variables are read as text and written back as strings.

use super::{
    decode_time, single_precision_values, AttributeValue, Attributes, Coordinate, Dataset,
    TextVariable, TimeAxis, Variable,
};
use crate::constants::{
    LATITUDE, LONGITUDE, NATIVE_TIME_NAMES, OUTPUT_FILL_VALUE, TIME_CALENDAR, TIME_UNITS,
};
use crate::errors::{InputError, OutputError};
use crate::Float;
use log::{debug, warn};
use ndarray::{Array1, ArrayD, Dimension, IxDyn};
use netcdf::types::NcVariableType;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const ENCODING_ATTRIBUTES: [&str; 4] = ["_FillValue", "missing_value", "scale_factor", "add_offset"];

pub(super) fn read_dataset(file_path: &Path) -> Result<Dataset, InputError> {
    debug!("Reading gridded dataset from {}", file_path.display());

    let file = netcdf::open(file_path)?;

    let (time_name, time_var) = NATIVE_TIME_NAMES
        .iter()
        .find_map(|name| file.variable(name).map(|var| (name.to_string(), var)))
        .ok_or(InputError::MissingCoordinate("valid_time"))?;

    let time_attrs = read_attributes(time_var.attributes())?;
    let units = match time_attrs.get("units") {
        Some(AttributeValue::Text(units)) => Some(units.as_str()),
        _ => None,
    };
    let time_values: Vec<Float> = time_var.get_values(..)?;
    let time = TimeAxis::from_timestamps(&decode_time(&time_values, units)?)?;

    let latitude = read_coordinate(&file, LATITUDE)?;
    let longitude = read_coordinate(&file, LONGITUDE)?;

    let mut variables = BTreeMap::new();
    let mut text_variables = BTreeMap::new();

    for var in file.variables() {
        let name = var.name();

        if name == time_name || name == LATITUDE || name == LONGITUDE {
            continue;
        }

        match var.vartype() {
            NcVariableType::Int(_) | NcVariableType::Float(_) => {
                let variable = read_variable(&var, &name)?;
                variables.insert(name, variable);
            }
            NcVariableType::String => {
                let variable = read_string_variable(&var, &name)?;
                text_variables.insert(name, variable);
            }
            NcVariableType::Char => {
                let variable = read_char_variable(&var, &name)?;
                text_variables.insert(name, variable);
            }
            _ => return Err(InputError::UnsupportedType(name)),
        }
    }

    let attrs = read_attributes(file.attributes())?;

    debug!(
        "Read {} time steps on {}x{} grid with {} numeric and {} text variables",
        time.len(),
        latitude.values.len(),
        longitude.values.len(),
        variables.len(),
        text_variables.len()
    );

    Ok(Dataset {
        time_name,
        time,
        time_attrs,
        auxiliary_time: None,
        latitude,
        longitude,
        variables,
        text_variables,
        attrs,
    })
}

fn read_coordinate(file: &netcdf::File, name: &'static str) -> Result<Coordinate, InputError> {
    let var = file
        .variable(name)
        .ok_or(InputError::MissingCoordinate(name))?;

    let values: Vec<Float> = var.get_values(..)?;
    let attrs = read_attributes(var.attributes())?;

    Ok(Coordinate {
        values: Array1::from_vec(values),
        attrs,
    })
}

fn dimensions_of(var: &netcdf::Variable) -> (Vec<String>, Vec<usize>) {
    var.dimensions()
        .iter()
        .map(|d| (d.name(), d.len()))
        .unzip()
}

fn read_variable(var: &netcdf::Variable, name: &str) -> Result<Variable, InputError> {
    let (dims, shape) = dimensions_of(var);

    let mut attrs = read_attributes(var.attributes())?;

    let scale = attribute_number(&attrs, "scale_factor").unwrap_or(1.0);
    let offset = attribute_number(&attrs, "add_offset").unwrap_or(0.0);
    let fill_values: Vec<Float> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|key| attribute_number(&attrs, key))
        .collect();

    let raw: Vec<Float> = var.get_values(..)?;
    let values: Vec<Float> = raw
        .into_iter()
        .map(|v| {
            if fill_values.contains(&v) {
                Float::NAN
            } else {
                v * scale + offset
            }
        })
        .collect();

    for key in ENCODING_ATTRIBUTES {
        attrs.remove(key);
    }

    let data = ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|err| InputError::Shape(name.to_string(), err))?;

    Ok(Variable { dims, data, attrs })
}

/// Reads variable of NetCDF-4 `string` type, element by element.
fn read_string_variable(var: &netcdf::Variable, name: &str) -> Result<TextVariable, InputError> {
    let (dims, shape) = dimensions_of(var);
    let attrs = read_attributes(var.attributes())?;

    let values = ndarray::indices(IxDyn(&shape))
        .into_iter()
        .map(|index| var.get_string(index.slice()))
        .collect::<Result<Vec<String>, _>>()?;

    let data = ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|err| InputError::Shape(name.to_string(), err))?;

    Ok(TextVariable { dims, data, attrs })
}

/// Reads a character array, whose last dimension is the string length,
/// as strings over the remaining dimensions.
fn read_char_variable(var: &netcdf::Variable, name: &str) -> Result<TextVariable, InputError> {
    let (mut dims, mut shape) = dimensions_of(var);
    let attrs = read_attributes(var.attributes())?;

    let string_length = match (dims.pop(), shape.pop()) {
        (Some(_), Some(len)) => len,
        _ => 1,
    };

    let count: usize = shape.iter().product();
    let raw: Vec<u8> = var.get_raw_values(..)?;

    let values: Vec<String> = if string_length == 0 {
        vec![String::new(); count]
    } else {
        raw.chunks(string_length)
            .map(|chars| {
                String::from_utf8_lossy(chars)
                    .trim_end_matches('\0')
                    .to_string()
            })
            .collect()
    };

    let data = ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|err| InputError::Shape(name.to_string(), err))?;

    Ok(TextVariable { dims, data, attrs })
}

fn read_attributes<'a>(
    attributes: impl Iterator<Item = netcdf::Attribute<'a>>,
) -> Result<Attributes, InputError> {
    let mut attrs = Attributes::new();

    for attribute in attributes {
        let name = attribute.name().to_string();

        match convert_attribute(attribute.value()?) {
            Some(value) => {
                attrs.insert(name, value);
            }
            None => warn!("Attribute {} has unsupported type and is not carried over", name),
        }
    }

    Ok(attrs)
}

fn attribute_number(attrs: &Attributes, key: &str) -> Option<Float> {
    match attrs.get(key)? {
        AttributeValue::Double(value) => Some(*value),
        AttributeValue::Int(value) => Some(*value as Float),
        AttributeValue::Doubles(values) => values.first().copied(),
        AttributeValue::Ints(values) => values.first().map(|&v| v as Float),
        _ => None,
    }
}

fn convert_attribute(value: netcdf::AttributeValue) -> Option<AttributeValue> {
    use netcdf::AttributeValue as Nc;

    let converted = match value {
        Nc::Str(text) => AttributeValue::Text(text),
        Nc::Strs(texts) => AttributeValue::Texts(texts),
        Nc::Schar(v) => AttributeValue::Int(i64::from(v)),
        Nc::Uchar(v) => AttributeValue::Int(i64::from(v)),
        Nc::Short(v) => AttributeValue::Int(i64::from(v)),
        Nc::Ushort(v) => AttributeValue::Int(i64::from(v)),
        Nc::Int(v) => AttributeValue::Int(i64::from(v)),
        Nc::Uint(v) => AttributeValue::Int(i64::from(v)),
        Nc::Longlong(v) => AttributeValue::Int(v),
        Nc::Shorts(v) => AttributeValue::Ints(v.into_iter().map(i64::from).collect()),
        Nc::Ints(v) => AttributeValue::Ints(v.into_iter().map(i64::from).collect()),
        Nc::Longlongs(v) => AttributeValue::Ints(v),
        Nc::Float(v) => AttributeValue::Double(Float::from(v)),
        Nc::Double(v) => AttributeValue::Double(v),
        Nc::Floats(v) => AttributeValue::Doubles(v.into_iter().map(Float::from).collect()),
        Nc::Doubles(v) => AttributeValue::Doubles(v),
        _ => return None,
    };

    Some(converted)
}

fn to_netcdf_attribute(value: &AttributeValue) -> netcdf::AttributeValue {
    use netcdf::AttributeValue as Nc;

    match value {
        AttributeValue::Text(text) => Nc::Str(text.clone()),
        AttributeValue::Texts(texts) => Nc::Strs(texts.clone()),
        AttributeValue::Int(v) => Nc::Longlong(*v),
        AttributeValue::Ints(v) => Nc::Longlongs(v.clone()),
        AttributeValue::Double(v) => Nc::Double(*v),
        AttributeValue::Doubles(v) => Nc::Doubles(v.clone()),
    }
}

/// Writes the dataset to a new file.
///
/// When writing fails after the file was created,
/// the partially written file is removed.
pub(super) fn write_dataset(
    dataset: &Dataset,
    file_path: &Path,
    single_precision: &[&str],
) -> Result<(), OutputError> {
    if file_path.exists() {
        return Err(OutputError::FileExists(file_path.display().to_string()));
    }

    let dims = dataset.dimensions()?;

    debug!("Writing dataset to {}", file_path.display());

    let written = netcdf::create(file_path)
        .map_err(OutputError::from)
        .and_then(|mut file| write_contents(&mut file, dataset, &dims, single_precision));

    if written.is_err() && file_path.exists() {
        warn!("Removing partially written {}", file_path.display());

        if let Err(err) = fs::remove_file(file_path) {
            warn!("Cannot remove {}: {}", file_path.display(), err);
        }
    }

    written
}

fn write_contents(
    file: &mut netcdf::FileMut,
    dataset: &Dataset,
    dims: &[(String, usize)],
    single_precision: &[&str],
) -> Result<(), OutputError> {
    for (name, len) in dims {
        file.add_dimension(name, *len)?;
    }

    for (name, value) in &dataset.attrs {
        file.add_attribute(name, to_netcdf_attribute(value))?;
    }

    write_time(file, &dataset.time_name, &dataset.time, &dataset.time_attrs)?;

    if let Some(auxiliary) = &dataset.auxiliary_time {
        write_time(file, &auxiliary.name, &auxiliary.axis, &auxiliary.attrs)?;
    }

    for (name, coordinate) in [(LATITUDE, &dataset.latitude), (LONGITUDE, &dataset.longitude)] {
        let mut coord_var = file.add_variable::<Float>(name, &[name])?;
        for (attr_name, value) in &coordinate.attrs {
            coord_var.put_attribute(attr_name, to_netcdf_attribute(value))?;
        }
        let values: Vec<Float> = coordinate.values.iter().copied().collect();
        coord_var.put_values(&values, ..)?;
    }

    for (name, variable) in &dataset.variables {
        let var_dims: Vec<&str> = variable.dims.iter().map(String::as_str).collect();

        if single_precision.contains(&name.as_str()) {
            let mut var = file.add_variable::<f32>(name, &var_dims)?;
            var.set_fill_value(OUTPUT_FILL_VALUE)?;
            for (attr_name, value) in &variable.attrs {
                var.put_attribute(attr_name, to_netcdf_attribute(value))?;
            }

            var.put_values(&single_precision_values(&variable.data), ..)?;
        } else {
            let mut var = file.add_variable::<Float>(name, &var_dims)?;
            for (attr_name, value) in &variable.attrs {
                var.put_attribute(attr_name, to_netcdf_attribute(value))?;
            }

            // logical (row-major) order, the array may have inverted strides
            let values: Vec<Float> = variable.data.iter().copied().collect();
            var.put_values(&values, ..)?;
        }
    }

    for (name, variable) in &dataset.text_variables {
        let var_dims: Vec<&str> = variable.dims.iter().map(String::as_str).collect();

        let mut var = file.add_string_variable(name, &var_dims)?;
        for (attr_name, value) in &variable.attrs {
            var.put_attribute(attr_name, to_netcdf_attribute(value))?;
        }

        for (index, value) in variable.data.indexed_iter() {
            var.put_string(value, index.slice())?;
        }
    }

    Ok(())
}

/// Writes a time coordinate as 64-bit seconds since Unix epoch, without fill value.
///
/// Units and calendar always describe that encoding,
/// whatever the attributes say.
fn write_time(
    file: &mut netcdf::FileMut,
    name: &str,
    axis: &TimeAxis,
    attrs: &Attributes,
) -> Result<(), OutputError> {
    let mut time_var = file.add_variable::<i64>(name, &[name])?;

    for (attr_name, value) in attrs {
        if attr_name == "units" || attr_name == "calendar" {
            continue;
        }
        time_var.put_attribute(attr_name, to_netcdf_attribute(value))?;
    }
    time_var.put_attribute("units", TIME_UNITS)?;
    time_var.put_attribute("calendar", TIME_CALENDAR)?;

    time_var.put_values(&axis.timestamps(), ..)?;

    Ok(())
}
