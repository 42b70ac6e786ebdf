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

//! Module assembling the output dataset at target time resolution.
//!
//! Spatially-resolved variables are densified cell by cell with the
//! configured [`TemporalDensifier`], wind components are replaced by the
//! aligned observed series broadcast over the grid, and every remaining
//! variable is carried through untouched. The spatial grid and global
//! attributes come verbatim from the native dataset. Variables carried
//! through on the native time dimension keep their timestamps as an
//! auxiliary time coordinate.

use super::components::ComponentSample;
use super::dataset::{AttributeValue, Attributes, AuxiliaryTime, Dataset, TimeAxis, Variable};
use super::densifier::{broadcast_series, TemporalDensifier};
use super::progress::{PipelineEvent, ProgressObserver};
use crate::constants::{
    LATITUDE, LONGITUDE, NATIVE_TIME_FALLBACK, OUTPUT_TIME, TIME_CALENDAR, TIME_UNITS, U10, V10,
};
use crate::errors::AssemblyError;
use crate::Float;
use log::debug;
use ndarray::Axis;
use rayon::ThreadPool;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

/// Everything the assembler needs besides the data.
pub struct Assembler<'a> {
    /// Rule used for spatially-resolved variables.
    pub densifier: &'a dyn TemporalDensifier,

    /// Names of spatially-resolved variables densified per cell.
    pub variables: &'a [String],

    /// Pool on which per-cell densification runs.
    pub threadpool: &'a ThreadPool,
}

impl<'a> Assembler<'a> {
    /// Builds the output dataset on `target` axis from the native dataset
    /// and observed wind components aligned to that axis.
    ///
    /// The native dataset is not modified.
    pub fn assemble(
        &self,
        native: &Dataset,
        target: &TimeAxis,
        aligned: &[ComponentSample],
        observer: &dyn ProgressObserver,
    ) -> Result<Dataset, AssemblyError> {
        self.check_required(native)?;

        if aligned.len() != target.len() {
            return Err(AssemblyError::SeriesLength {
                series: aligned.len(),
                axis: target.len(),
            });
        }

        let grid_shape = native.grid_shape();
        let grid_dims = vec![
            OUTPUT_TIME.to_string(),
            LATITUDE.to_string(),
            LONGITUDE.to_string(),
        ];

        let mut variables = BTreeMap::new();

        for name in self.variables {
            let field = native.gridded_field(name)?;
            check_grid_shape(name, field.grid_shape(), grid_shape)?;

            let densified = self
                .threadpool
                .install(|| self.densifier.densify(&field, &native.time, target))
                .map_err(|err| AssemblyError::Densify(name.clone(), err))?;

            observer.notify(&PipelineEvent::FieldDensified {
                name,
                steps: densified.data.len_of(Axis(0)),
            });

            variables.insert(
                name.clone(),
                Variable {
                    dims: grid_dims.clone(),
                    data: densified.data.into_dyn(),
                    attrs: densified.attrs,
                },
            );
        }

        let total = aligned.len();
        for (step, sample) in aligned.iter().enumerate() {
            observer.notify(&PipelineEvent::BroadcastStep {
                step,
                total,
                u: sample.u,
                v: sample.v,
            });
        }

        let u_series: Vec<Float> = aligned.iter().map(|sample| sample.u).collect();
        let v_series: Vec<Float> = aligned.iter().map(|sample| sample.v).collect();

        for (name, series) in [(U10, u_series), (V10, v_series)] {
            let placeholder = native.gridded_field(name)?;
            check_grid_shape(name, placeholder.grid_shape(), grid_shape)?;

            variables.insert(
                name.to_string(),
                Variable {
                    dims: grid_dims.clone(),
                    data: broadcast_series(&series, grid_shape).into_dyn(),
                    attrs: placeholder.attrs,
                },
            );

            observer.notify(&PipelineEvent::FieldBroadcast {
                name,
                steps: series.len(),
            });
        }

        let native_time = native_time_dimension(&native.time_name);
        let mut on_native_time = false;

        for (name, variable) in &native.variables {
            if variables.contains_key(name) {
                continue;
            }

            debug!("Passing {} through unchanged", name);
            let copied = passthrough(variable, &native.time_name);
            on_native_time |= copied.axis_of(native_time).is_some();
            variables.insert(name.clone(), copied);
        }

        let mut text_variables = BTreeMap::new();

        for (name, variable) in &native.text_variables {
            debug!("Passing text variable {} through unchanged", name);
            let copied = passthrough(variable, &native.time_name);
            on_native_time |= copied.axis_of(native_time).is_some();
            text_variables.insert(name.clone(), copied);
        }

        let auxiliary_time = on_native_time.then(|| AuxiliaryTime {
            name: native_time.to_string(),
            axis: native.time.clone(),
            attrs: native_time_attributes(&native.time_attrs),
        });

        let assembled = Dataset {
            time_name: OUTPUT_TIME.to_string(),
            time: target.clone(),
            time_attrs: canonical_time_attributes(),
            auxiliary_time,
            latitude: native.latitude.clone(),
            longitude: native.longitude.clone(),
            variables,
            text_variables,
            attrs: native.attrs.clone(),
        };

        observer.notify(&PipelineEvent::DatasetAssembled {
            variables: assembled.variable_count(),
        });

        Ok(assembled)
    }

    /// Checks that every variable of both transform paths is present.
    fn check_required(&self, native: &Dataset) -> Result<(), AssemblyError> {
        let mut seen = FxHashSet::default();

        for name in self
            .variables
            .iter()
            .map(String::as_str)
            .chain([U10, V10])
        {
            if !seen.insert(name) {
                continue;
            }

            if !native.variables.contains_key(name) {
                return Err(AssemblyError::MissingVariable(name.to_string()));
            }
        }

        Ok(())
    }
}

fn check_grid_shape(
    name: &str,
    found: (usize, usize),
    expected: (usize, usize),
) -> Result<(), AssemblyError> {
    if found != expected {
        return Err(AssemblyError::ShapeMismatch {
            name: name.to_string(),
            found,
            expected,
        });
    }

    Ok(())
}

/// Name under which the native time dimension appears in the output.
fn native_time_dimension(native_time_name: &str) -> &str {
    if native_time_name == OUTPUT_TIME {
        NATIVE_TIME_FALLBACK
    } else {
        native_time_name
    }
}

/// Copies an untouched variable. A native time dimension
/// named like the output time is renamed to avoid a clash.
fn passthrough<T: Clone>(variable: &Variable<T>, native_time_name: &str) -> Variable<T> {
    let mut copied = variable.clone();
    let renamed = native_time_dimension(native_time_name);

    for dim in copied.dims.iter_mut() {
        if dim == native_time_name {
            *dim = renamed.to_string();
        }
    }

    copied
}

/// Native time attributes, with units and calendar of the
/// seconds-since-epoch encoding used on output.
fn native_time_attributes(native: &Attributes) -> Attributes {
    let mut attrs = native.clone();

    attrs.insert("units".to_string(), AttributeValue::from(TIME_UNITS));
    attrs.insert("calendar".to_string(), AttributeValue::from(TIME_CALENDAR));

    attrs
}

fn canonical_time_attributes() -> Attributes {
    [
        ("long_name", "time"),
        ("standard_name", "time"),
        ("units", TIME_UNITS),
        ("calendar", TIME_CALENDAR),
        ("axis", "T"),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), AttributeValue::from(value)))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::Assembler;
    use crate::constants::{OUTPUT_TIME, TIME_UNITS};
    use crate::errors::AssemblyError;
    use crate::pipeline::components::ComponentSample;
    use crate::pipeline::dataset::tests::synthetic_dataset;
    use crate::pipeline::dataset::{AttributeValue, Dataset, TimeAxis};
    use crate::pipeline::densifier::MidpointDensifier;
    use crate::pipeline::progress::tests::RecordingObserver;
    use ndarray::{s, Axis};
    use rayon::{ThreadPool, ThreadPoolBuilder};

    fn threadpool() -> ThreadPool {
        ThreadPoolBuilder::new().num_threads(2).build().unwrap()
    }

    fn target_axis() -> TimeAxis {
        TimeAxis::from_timestamps(&[0, 1800, 3600, 5400, 7200]).unwrap()
    }

    fn aligned(target: &TimeAxis) -> Vec<ComponentSample> {
        target
            .steps()
            .iter()
            .enumerate()
            .map(|(i, &datetime)| ComponentSample {
                datetime,
                u: i as f64,
                v: -2.0 * i as f64,
            })
            .collect()
    }

    fn assemble(native: &Dataset) -> Result<Dataset, AssemblyError> {
        let pool = threadpool();
        let variables = vec!["msl".to_string()];
        let target = target_axis();

        Assembler {
            densifier: &MidpointDensifier { ratio: 2 },
            variables: &variables,
            threadpool: &pool,
        }
        .assemble(native, &target, &aligned(&target), &RecordingObserver::default())
    }

    #[test]
    fn every_variable_reaches_output() {
        let native = synthetic_dataset(&[0, 3600, 7200], 3, 4);

        let output = assemble(&native).unwrap();

        assert!(output.variable_count() >= native.variable_count());
        for name in native.variables.keys() {
            assert!(output.variables.contains_key(name), "{} was dropped", name);
        }

        for name in native.text_variables.keys() {
            assert!(output.text_variables.contains_key(name), "{} was dropped", name);
        }

        assert_eq!(output.variables["lsm"], native.variables["lsm"]);
        assert_eq!(output.variables["sst"], native.variables["sst"]);
        assert_eq!(output.latitude, native.latitude);
        assert_eq!(output.longitude, native.longitude);
        assert_eq!(output.attrs, native.attrs);
    }

    #[test]
    fn pressure_is_densified_per_cell() {
        let native = synthetic_dataset(&[0, 3600, 7200], 3, 4);

        let output = assemble(&native).unwrap();
        let msl_in = native.gridded_field("msl").unwrap().data;
        let msl_out = output.gridded_field("msl").unwrap().data;

        assert_eq!(output.variables["msl"].dims, ["time", "latitude", "longitude"]);
        assert_eq!(msl_out.shape(), &[5, 3, 4]);
        assert_eq!(msl_out.index_axis(Axis(0), 2), msl_in.index_axis(Axis(0), 1));
        assert_eq!(
            msl_out.slice(s![1, .., ..]),
            (&msl_in.slice(s![0, .., ..]) + &msl_in.slice(s![1, .., ..])) / 2.0
        );
        assert_eq!(
            output.variables["msl"].attrs["units"],
            AttributeValue::from("Pa")
        );
    }

    #[test]
    fn wind_is_broadcast_uniformly() {
        let native = synthetic_dataset(&[0, 3600, 7200], 3, 4);

        let output = assemble(&native).unwrap();

        for (name, scale) in [("u10", 1.0), ("v10", -2.0)] {
            let field = &output.variables[name];
            assert_eq!(field.data.shape(), &[5, 3, 4]);

            for (step, slice) in field.data.axis_iter(Axis(0)).enumerate() {
                assert!(slice.iter().all(|&value| value == scale * step as f64));
            }
        }
    }

    #[test]
    fn time_metadata_is_canonical() {
        let native = synthetic_dataset(&[0, 3600, 7200], 2, 2);

        let output = assemble(&native).unwrap();

        assert_eq!(output.time_name, OUTPUT_TIME);
        assert_eq!(output.time, target_axis());
        assert_eq!(output.time_attrs["units"], AttributeValue::from(TIME_UNITS));
        assert_eq!(
            output.time_attrs["calendar"],
            AttributeValue::from("proleptic_gregorian")
        );
    }

    #[test]
    fn native_time_dimension_is_renamed_on_clash() {
        let mut native = synthetic_dataset(&[0, 3600, 7200], 2, 2);
        native.time_name = "time".to_string();
        let dims = native
            .variables
            .values_mut()
            .map(|variable| &mut variable.dims)
            .chain(native.text_variables.values_mut().map(|variable| &mut variable.dims));
        for variable_dims in dims {
            for dim in variable_dims.iter_mut() {
                if dim == "valid_time" {
                    *dim = "time".to_string();
                }
            }
        }

        let output = assemble(&native).unwrap();

        assert_eq!(
            output.variables["sst"].dims,
            ["native_time", "latitude", "longitude"]
        );
        assert_eq!(output.text_variables["expver"].dims, ["native_time"]);
        assert_eq!(output.variables["msl"].dims, ["time", "latitude", "longitude"]);

        let auxiliary = output.auxiliary_time.as_ref().unwrap();
        assert_eq!(auxiliary.name, "native_time");
        assert_eq!(auxiliary.axis, native.time);
        assert_eq!(
            output.dimensions().unwrap(),
            [
                ("time".to_string(), 5),
                ("latitude".to_string(), 2),
                ("longitude".to_string(), 2),
                ("native_time".to_string(), 3),
            ]
        );
    }

    #[test]
    fn text_variables_pass_through() {
        let mut native = synthetic_dataset(&[0, 3600, 7200], 2, 2);
        native
            .text_variables
            .get_mut("expver")
            .unwrap()
            .data
            .as_slice_mut()
            .unwrap()[2] = "0005".to_string();

        let output = assemble(&native).unwrap();

        assert_eq!(output.text_variables, native.text_variables);
        assert!(output.variables.get("expver").is_none());
    }

    #[test]
    fn native_timestamps_are_kept() {
        let mut native = synthetic_dataset(&[0, 3600, 7200], 2, 2);
        native
            .time_attrs
            .insert("long_name".to_string(), AttributeValue::from("time"));
        native.time_attrs.insert(
            "units".to_string(),
            AttributeValue::from("hours since 1970-01-01"),
        );

        let output = assemble(&native).unwrap();
        let auxiliary = output.auxiliary_time.as_ref().unwrap();

        assert_eq!(auxiliary.name, "valid_time");
        assert_eq!(auxiliary.axis.timestamps(), [0, 3600, 7200]);
        assert_eq!(auxiliary.attrs["long_name"], AttributeValue::from("time"));
        assert_eq!(auxiliary.attrs["units"], AttributeValue::from(TIME_UNITS));
        assert_eq!(output.variables["sst"].dims[0], "valid_time");
    }

    #[test]
    fn static_passthrough_needs_no_native_time() {
        let mut native = synthetic_dataset(&[0, 3600, 7200], 2, 2);
        native.variables.remove("sst");
        native.text_variables.clear();

        let output = assemble(&native).unwrap();

        assert!(output.auxiliary_time.is_none());
        assert!(output.dimensions().unwrap().iter().all(|(name, _)| name != "valid_time"));
    }

    #[test]
    fn missing_variables_are_reported() {
        for missing in ["msl", "u10", "v10"] {
            let mut native = synthetic_dataset(&[0, 3600, 7200], 2, 2);
            native.variables.remove(missing);

            let result = assemble(&native);

            assert!(
                matches!(result, Err(AssemblyError::MissingVariable(ref name)) if name == missing)
            );
        }
    }

    #[test]
    fn series_must_match_target_axis() {
        let native = synthetic_dataset(&[0, 3600, 7200], 2, 2);
        let pool = threadpool();
        let variables = vec!["msl".to_string()];
        let target = target_axis();
        let mut series = aligned(&target);
        series.pop();

        let result = Assembler {
            densifier: &MidpointDensifier { ratio: 2 },
            variables: &variables,
            threadpool: &pool,
        }
        .assemble(&native, &target, &series, &RecordingObserver::default());

        assert!(matches!(
            result,
            Err(AssemblyError::SeriesLength { series: 4, axis: 5 })
        ));
    }

    #[test]
    fn densifier_errors_name_the_variable() {
        let native = synthetic_dataset(&[0, 3600, 7200], 2, 2);
        let pool = threadpool();
        let variables = vec!["msl".to_string()];
        let target = TimeAxis::from_timestamps(&[0, 2400, 4800, 7200]).unwrap();

        let result = Assembler {
            densifier: &MidpointDensifier { ratio: 2 },
            variables: &variables,
            threadpool: &pool,
        }
        .assemble(&native, &target, &aligned(&target), &RecordingObserver::default());

        assert!(matches!(result, Err(AssemblyError::Densify(ref name, _)) if name == "msl"));
    }

    #[test]
    fn progress_is_reported() {
        let native = synthetic_dataset(&[0, 3600, 7200], 2, 2);
        let pool = threadpool();
        let variables = vec!["msl".to_string()];
        let target = target_axis();
        let observer = RecordingObserver::default();

        Assembler {
            densifier: &MidpointDensifier { ratio: 2 },
            variables: &variables,
            threadpool: &pool,
        }
        .assemble(&native, &target, &aligned(&target), &observer)
        .unwrap();

        let events = observer.events.borrow();
        let broadcast_steps = events
            .iter()
            .filter(|event| event.starts_with("BroadcastStep"))
            .count();

        assert_eq!(broadcast_steps, 5);
        assert!(events[0].starts_with("FieldDensified"));
        assert!(events.last().unwrap().starts_with("DatasetAssembled"));
    }
}
