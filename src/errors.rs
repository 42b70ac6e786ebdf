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

use crate::Float;
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Error while reading config.yaml: {0}")]
    Config(#[from] ConfigError),

    #[error("Error while creating ThreadPool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Cannot set memory limit of {0} MB")]
    MemoryLimit(usize),

    #[error("Error while reading wind observations: {0}")]
    Observations(#[from] ObservationError),

    #[error("Error while calculating wind components: {0}")]
    Components(#[from] ComponentError),

    #[error("Error in temporal alignment of observations: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("Error while assembling output dataset: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Error while reading input dataset: {0}")]
    Input(#[from] InputError),

    #[error("Error while writing output: {0}")]
    Output(#[from] OutputError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open config.yaml: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot deserialize config.yaml: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("Configuration component is out of bounds {0}")]
    OutOfBounds(&'static str),
}

#[derive(Error, Debug)]
pub enum ObservationError {
    #[error("Cannot open observations file: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot parse record in line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("No valid wind data after filtering")]
    EmptyData,
}

#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("Components of wind {speed} m/s from {direction} deg are not finite")]
    ComponentCalc { speed: Float, direction: Float },
}

#[derive(Error, Debug)]
pub enum AlignmentError {
    #[error("Native time axis must have at least 2 steps, found {0}")]
    InsufficientNativeSteps(usize),

    #[error("Target interval must be positive, found {0} s")]
    InvalidInterval(i64),

    #[error("None of the observations falls on the target time axis")]
    NoObservationsOnAxis,

    #[error("Observations do not cover target timestep {0}")]
    UncoveredTimestep(NaiveDateTime),

    #[error("Error while searching the time axis: {0}")]
    Search(#[from] SearchError),
}

#[derive(Error, Debug)]
pub enum DensifyError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("At least 2 native time steps are needed, found {0}")]
    InsufficientData(usize),

    #[error("Error while searching the time axis: {0}")]
    Search(#[from] SearchError),
}

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Required variable {0} is absent from the input dataset")]
    MissingVariable(String),

    #[error("Variable {0} is not a (time, latitude, longitude) field")]
    NotGridded(String),

    #[error("Spatial grid of {name} is {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        found: (usize, usize),
        expected: (usize, usize),
    },

    #[error("Cannot densify {0}: {1}")]
    Densify(String, #[source] DensifyError),

    #[error("Aligned series has {series} steps but target axis has {axis}")]
    SeriesLength { series: usize, axis: usize },
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Searched value is out of axis bounds")]
    OutOfBounds,

    #[error("Searched axis is empty")]
    EmptyArray,
}

#[derive(Error, Debug)]
pub enum InputError {
    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    #[error("Cannot reshape values of {0}: {1}")]
    Shape(String, #[source] ndarray::ShapeError),

    #[error("Coordinate variable {0} not found in dataset")]
    MissingCoordinate(&'static str),

    #[error("Time value {0} cannot be represented as a datetime")]
    InvalidTime(i64),

    #[error("Cannot decode time units '{0}'")]
    InvalidTimeUnits(String),

    #[error("Time axis is not strictly increasing at step {0}")]
    UnorderedTime(usize),

    #[error("Variable {0} has a type that cannot be read")]
    UnsupportedType(String),

    #[error("Cannot select {requested} time steps from dataset with {available}")]
    TimeSelection { requested: usize, available: usize },

    #[error("Dataset support was not compiled in, enable the netcdf feature")]
    FeatureDisabled,
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Output file {0} already exists")]
    FileExists(String),

    #[error("Output IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot write components CSV: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    #[error("Dimension {0} has inconsistent lengths across variables")]
    InconsistentDimension(String),

    #[error("Dataset support was not compiled in, enable the netcdf feature")]
    FeatureDisabled,
}
