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

//! Module densifying gridded fields in time.
//!
//! Every rule implements [`TemporalDensifier`] by describing, for each
//! target step, which native steps it is made of. Applying that plan
//! to the whole spatial grid is shared and runs in parallel over
//! target steps, as every step only reads the native field.

use super::bisection;
use super::configuration::{DensifierKind, Interpolation};
use super::dataset::{GriddedField, TimeAxis};
use crate::{errors::DensifyError, Float};
use ndarray::parallel::prelude::*;
use ndarray::{Array3, Axis, Zip};

/// Native steps making up one target step.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum SourceStep {
    /// Native step copied verbatim.
    Copy(usize),

    /// Linear blend `(1 - weight) * left + weight * right`.
    Between {
        left: usize,
        right: usize,
        weight: Float,
    },
}

/// Rule producing a field at target time resolution from native field.
pub trait TemporalDensifier: Sync {
    fn name(&self) -> &'static str;

    /// Lists the source of every target step.
    fn plan(&self, native: &TimeAxis, target: &TimeAxis) -> Result<Vec<SourceStep>, DensifyError>;

    /// Densifies the field over its whole spatial grid.
    fn densify(
        &self,
        field: &GriddedField,
        native: &TimeAxis,
        target: &TimeAxis,
    ) -> Result<GriddedField, DensifyError> {
        let native_steps = field.data.len_of(Axis(0));

        if native_steps < 2 {
            return Err(DensifyError::InsufficientData(native_steps));
        }

        if native_steps != native.len() {
            return Err(DensifyError::ShapeMismatch(format!(
                "field has {} time steps but native axis has {}",
                native_steps,
                native.len()
            )));
        }

        let plan = self.plan(native, target)?;
        let (nlat, nlon) = field.grid_shape();
        let mut data = Array3::<Float>::zeros((plan.len(), nlat, nlon));

        data.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(plan.par_iter())
            .for_each(|(mut slice, source)| match *source {
                SourceStep::Copy(step) => slice.assign(&field.data.index_axis(Axis(0), step)),
                SourceStep::Between {
                    left,
                    right,
                    weight,
                } => {
                    Zip::from(&mut slice)
                        .and(&field.data.index_axis(Axis(0), left))
                        .and(&field.data.index_axis(Axis(0), right))
                        .for_each(|out, &a, &b| *out = (1.0 - weight) * a + weight * b);
                }
            });

        Ok(GriddedField {
            data,
            attrs: field.attrs.clone(),
        })
    }
}

/// Inserts `ratio - 1` evenly spaced linear blends between each
/// pair of consecutive native steps, by index.
///
/// With `ratio = 2` every native step is copied and followed by the
/// mean of it and the next step. The last native step is copied to
/// the last target step.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MidpointDensifier {
    pub ratio: usize,
}

impl TemporalDensifier for MidpointDensifier {
    fn name(&self) -> &'static str {
        "midpoint"
    }

    fn plan(&self, native: &TimeAxis, target: &TimeAxis) -> Result<Vec<SourceStep>, DensifyError> {
        let native_steps = native.len();

        if native_steps < 2 {
            return Err(DensifyError::InsufficientData(native_steps));
        }

        let expected = (native_steps - 1) * self.ratio + 1;

        if target.len() != expected {
            return Err(DensifyError::ShapeMismatch(format!(
                "midpoint rule with ratio {} makes {} steps from {} native steps, but target axis has {}",
                self.ratio,
                expected,
                native_steps,
                target.len()
            )));
        }

        let mut plan = Vec::with_capacity(expected);

        for i in 0..native_steps - 1 {
            plan.push(SourceStep::Copy(i));

            for k in 1..self.ratio {
                plan.push(SourceStep::Between {
                    left: i,
                    right: i + 1,
                    weight: k as Float / self.ratio as Float,
                });
            }
        }

        plan.push(SourceStep::Copy(native_steps - 1));

        Ok(plan)
    }
}

/// Holds the value of the latest native step at or before each target step.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct NearestHoldDensifier;

impl TemporalDensifier for NearestHoldDensifier {
    fn name(&self) -> &'static str {
        "nearest_hold"
    }

    fn plan(&self, native: &TimeAxis, target: &TimeAxis) -> Result<Vec<SourceStep>, DensifyError> {
        target
            .steps()
            .iter()
            .map(|datetime| -> Result<SourceStep, DensifyError> {
                let step = bisection::find_left_closest(native.steps(), datetime)?;
                Ok(SourceStep::Copy(step))
            })
            .collect()
    }
}

/// Interpolates linearly in time between native steps bracketing each target step.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct LinearDensifier;

impl TemporalDensifier for LinearDensifier {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn plan(&self, native: &TimeAxis, target: &TimeAxis) -> Result<Vec<SourceStep>, DensifyError> {
        let steps = native.steps();

        target
            .steps()
            .iter()
            .map(|datetime| -> Result<SourceStep, DensifyError> {
                let (left, right) = bisection::find_bracket(steps, datetime)?;

                if left == right {
                    return Ok(SourceStep::Copy(left));
                }

                let weight = (*datetime - steps[left]).num_seconds() as Float
                    / (steps[right] - steps[left]).num_seconds() as Float;

                Ok(SourceStep::Between {
                    left,
                    right,
                    weight,
                })
            })
            .collect()
    }
}

/// Creates the densifier selected in configuration.
pub fn densifier_from_config(interpolation: &Interpolation) -> Box<dyn TemporalDensifier> {
    match interpolation.densifier {
        DensifierKind::Midpoint => Box::new(MidpointDensifier {
            ratio: interpolation.ratio,
        }),
        DensifierKind::NearestHold => Box::new(NearestHoldDensifier),
        DensifierKind::Linear => Box::new(LinearDensifier),
    }
}

/// Spreads a point time series over the whole spatial grid.
///
/// Observed wind is assumed to be uniform over the domain,
/// so every cell at a given step holds the same value.
pub fn broadcast_series(values: &[Float], grid_shape: (usize, usize)) -> Array3<Float> {
    Array3::from_shape_fn((values.len(), grid_shape.0, grid_shape.1), |(t, _, _)| {
        values[t]
    })
}

#[cfg(test)]
mod tests {
    use super::{
        broadcast_series, LinearDensifier, MidpointDensifier, NearestHoldDensifier,
        TemporalDensifier,
    };
    use crate::errors::DensifyError;
    use crate::pipeline::dataset::{Attributes, GriddedField, TimeAxis};
    use float_cmp::approx_eq;
    use ndarray::{Array3, Axis};

    fn field(values: Vec<f64>, nlat: usize, nlon: usize) -> GriddedField {
        let nt = values.len();
        GriddedField {
            data: Array3::from_shape_fn((nt, nlat, nlon), |(t, j, i)| {
                values[t] + (j * nlon + i) as f64
            }),
            attrs: Attributes::new(),
        }
    }

    fn axis(timestamps: &[i64]) -> TimeAxis {
        TimeAxis::from_timestamps(timestamps).unwrap()
    }

    #[test]
    fn midpoint_pressure_scenario() {
        let pressure = field(vec![10.0, 20.0, 30.0], 1, 1);
        let native = axis(&[0, 3600, 7200]);
        let target = axis(&[0, 1800, 3600, 5400, 7200]);

        let densified = MidpointDensifier { ratio: 2 }
            .densify(&pressure, &native, &target)
            .unwrap();

        let values: Vec<f64> = densified.data.iter().copied().collect();
        assert_eq!(values, vec![10.0, 15.0, 20.0, 25.0, 30.0]);
    }

    #[test]
    fn midpoint_rule_is_exact_on_the_grid() {
        let native_values = vec![101325.3, 100980.7, 99871.1, 98001.9, 98512.25, 99102.0];
        let n = native_values.len();
        let input = field(native_values, 3, 4);
        let native = axis(&(0..n as i64).map(|i| i * 3600).collect::<Vec<_>>());
        let target = axis(&(0..(2 * n - 1) as i64).map(|i| i * 1800).collect::<Vec<_>>());

        let output = MidpointDensifier { ratio: 2 }
            .densify(&input, &native, &target)
            .unwrap();

        assert_eq!(output.data.len_of(Axis(0)), 2 * n - 1);

        for i in 0..n {
            assert_eq!(
                output.data.index_axis(Axis(0), 2 * i),
                input.data.index_axis(Axis(0), i)
            );
        }

        for i in 0..n - 1 {
            let expected = (&input.data.index_axis(Axis(0), i)
                + &input.data.index_axis(Axis(0), i + 1))
                / 2.0;
            assert_eq!(output.data.index_axis(Axis(0), 2 * i + 1), expected);
        }
    }

    #[test]
    fn midpoint_generalizes_to_higher_ratio() {
        let input = field(vec![0.0, 4.0, 8.0], 2, 2);
        let native = axis(&[0, 3600, 7200]);
        let target = axis(&(0..9).map(|i| i * 900).collect::<Vec<_>>());

        let output = MidpointDensifier { ratio: 4 }
            .densify(&input, &native, &target)
            .unwrap();

        let first_cell: Vec<f64> = output.data.slice(ndarray::s![.., 0, 0]).to_vec();
        assert_eq!(first_cell, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn midpoint_rejects_mismatched_target() {
        let input = field(vec![0.0, 1.0, 2.0], 1, 1);
        let native = axis(&[0, 3600, 7200]);
        let target = axis(&[0, 2400, 4800, 7200]);

        let result = MidpointDensifier { ratio: 2 }.densify(&input, &native, &target);

        assert!(matches!(result, Err(DensifyError::ShapeMismatch(_))));
    }

    #[test]
    fn single_native_step_is_insufficient() {
        let input = field(vec![1.0], 1, 1);
        let native = axis(&[0]);

        for densifier in [
            &MidpointDensifier { ratio: 2 } as &dyn TemporalDensifier,
            &NearestHoldDensifier,
            &LinearDensifier,
        ] {
            let result = densifier.densify(&input, &native, &native);
            assert!(matches!(result, Err(DensifyError::InsufficientData(1))));
        }
    }

    #[test]
    fn nearest_hold_keeps_previous_native_value() {
        let input = field(vec![10.0, 20.0, 30.0], 1, 1);
        let native = axis(&[0, 3600, 7200]);
        let target = axis(&[0, 2400, 4800, 7200]);

        let output = NearestHoldDensifier
            .densify(&input, &native, &target)
            .unwrap();

        let values: Vec<f64> = output.data.iter().copied().collect();
        assert_eq!(values, vec![10.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn linear_follows_irregular_native_axis() {
        let input = field(vec![0.0, 10.0, 40.0], 1, 1);
        let native = axis(&[0, 3600, 10800]);
        let target = axis(&[0, 1800, 3600, 5400, 7200, 9000, 10800]);

        let output = LinearDensifier.densify(&input, &native, &target).unwrap();

        let values: Vec<f64> = output.data.iter().copied().collect();
        let expected = [0.0, 5.0, 10.0, 17.5, 25.0, 32.5, 40.0];
        for (value, expected) in values.iter().zip(expected) {
            assert!(approx_eq!(f64, *value, expected, epsilon = 1e-9));
        }
    }

    #[test]
    fn linear_and_midpoint_agree_on_regular_axis() {
        let input = field(vec![3.0, -1.0, 7.5, 2.25], 2, 3);
        let native = axis(&[0, 3600, 7200, 10800]);
        let target = axis(&(0..7).map(|i| i * 1800).collect::<Vec<_>>());

        let linear = LinearDensifier.densify(&input, &native, &target).unwrap();
        let midpoint = MidpointDensifier { ratio: 2 }
            .densify(&input, &native, &target)
            .unwrap();

        assert_eq!(linear.data, midpoint.data);
    }

    #[test]
    fn broadcast_is_uniform_over_grid() {
        let series = [1.5, -2.0, 0.25];

        let broadcast = broadcast_series(&series, (4, 5));

        assert_eq!(broadcast.dim(), (3, 4, 5));
        for (t, slice) in broadcast.axis_iter(Axis(0)).enumerate() {
            let mean = slice.mean().unwrap();
            let variance = slice.mapv(|v| (v - mean).powi(2)).sum();

            assert_eq!(variance, 0.0);
            assert!(slice.iter().all(|&v| v == series[t]));
        }
    }
}
