//! Mapping from fit parameters to per-sample model parameters
//!
//! A [`ParameterMap`] holds, for every sample, one [`ParameterSlot`] per model
//! parameter (in model order). A slot either points into the fit-parameter
//! vector or carries a literal value. Fit parameters can be fixed to values
//! after construction; fixing removes the parameter from the fit vector and
//! renumbers all larger fit indices so they stay dense.

use std::collections::HashMap;

use ndarray::Array1;
use thiserror::Error;

use super::fit::FitParameterConfig;
use super::model::{ModelParameterBinding, ModelParameterConfig};
use crate::model::PhysicalModel;

/// Errors raised while building or mutating a parameter map
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterMapError {
    #[error("sample {sample}: '{name}' is not a parameter of the model")]
    UnknownModelParameter { sample: usize, name: String },

    #[error("sample {sample}: model parameter '{name}' is not declared")]
    MissingDeclaration { sample: usize, name: String },

    #[error("sample {sample}: model parameter '{model_parameter}' refers to unknown fit parameter '{fit_parameter}'")]
    UnknownFitParameter {
        sample: usize,
        model_parameter: String,
        fit_parameter: String,
    },

    #[error("sample {sample}: fit parameter {target_index} is bound to more than one model parameter")]
    DuplicateBinding { sample: usize, target_index: usize },

    #[error("sample {sample} has {found} model parameters, expected {expected}")]
    InconsistentSlotCount {
        sample: usize,
        expected: usize,
        found: usize,
    },

    #[error("fit parameter index {index} out of range ({count} fit parameters)")]
    FitIndexOutOfRange { index: usize, count: usize },

    #[error("sample index {sample} out of range ({count} samples)")]
    SampleOutOfRange { sample: usize, count: usize },

    #[error("fit vector has {found} entries, expected at least {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Source of one model parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterSlot {
    Fitted { target_index: usize },
    Fixed { value: f64 },
}

/// Per-sample slot table with fix/reset support
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMap {
    original: Vec<Vec<ParameterSlot>>,
    current: Vec<Vec<ParameterSlot>>,
    parameter_count: usize,
    fixed: Vec<usize>,
}

impl ParameterMap {
    /// Build the map from model parameter names and per-sample declarations.
    ///
    /// # Arguments
    ///
    /// * `model_parameters` - The parameters the model requires, in model order
    /// * `is_model_parameter` - Validity test for declared model parameter names
    /// * `fit_parameters` - Fit parameter name to fit index table
    /// * `samples` - One declaration list per sample
    pub fn new<F>(
        model_parameters: &[String],
        is_model_parameter: F,
        fit_parameters: &HashMap<String, usize>,
        samples: &[ModelParameterConfig],
    ) -> Result<Self, ParameterMapError>
    where
        F: Fn(&str) -> bool,
    {
        let mut slots = Vec::with_capacity(samples.len());

        for (sample, declarations) in samples.iter().enumerate() {
            if let Some((name, _)) = declarations.iter().find(|(n, _)| !is_model_parameter(*n)) {
                return Err(ParameterMapError::UnknownModelParameter {
                    sample,
                    name: name.to_string(),
                });
            }

            let mut sample_slots = Vec::with_capacity(model_parameters.len());
            for name in model_parameters {
                let binding =
                    declarations
                        .get(name)
                        .ok_or_else(|| ParameterMapError::MissingDeclaration {
                            sample,
                            name: name.clone(),
                        })?;
                let slot = match binding {
                    ModelParameterBinding::Fixed(value) => ParameterSlot::Fixed { value: *value },
                    ModelParameterBinding::Fitted(fit_name) => {
                        let target_index = *fit_parameters.get(fit_name).ok_or_else(|| {
                            ParameterMapError::UnknownFitParameter {
                                sample,
                                model_parameter: name.clone(),
                                fit_parameter: fit_name.clone(),
                            }
                        })?;
                        ParameterSlot::Fitted { target_index }
                    }
                };
                sample_slots.push(slot);
            }
            slots.push(sample_slots);
        }

        Self::from_slots(slots, fit_parameters.len())
    }

    /// Build the map for `model` from a fit parameter configuration.
    pub fn for_model(
        model: &dyn PhysicalModel,
        fit_parameters: &FitParameterConfig,
        samples: &[ModelParameterConfig],
    ) -> Result<Self, ParameterMapError> {
        Self::new(
            model.parameter_names(),
            |name| model.is_model_parameter(name),
            &fit_parameters.name_table(),
            samples,
        )
    }

    /// Build the map from raw slots.
    ///
    /// All samples must have the same number of slots, every fitted slot
    /// must point below `parameter_count`, and no sample may bind the same
    /// fit parameter twice.
    pub fn from_slots(
        slots: Vec<Vec<ParameterSlot>>,
        parameter_count: usize,
    ) -> Result<Self, ParameterMapError> {
        if let Some(first) = slots.first() {
            let expected = first.len();
            for (sample, sample_slots) in slots.iter().enumerate() {
                if sample_slots.len() != expected {
                    return Err(ParameterMapError::InconsistentSlotCount {
                        sample,
                        expected,
                        found: sample_slots.len(),
                    });
                }
                let mut seen = vec![false; parameter_count];
                for slot in sample_slots {
                    if let ParameterSlot::Fitted { target_index } = *slot {
                        if target_index >= parameter_count {
                            return Err(ParameterMapError::FitIndexOutOfRange {
                                index: target_index,
                                count: parameter_count,
                            });
                        }
                        if seen[target_index] {
                            return Err(ParameterMapError::DuplicateBinding {
                                sample,
                                target_index,
                            });
                        }
                        seen[target_index] = true;
                    }
                }
            }
        }

        Ok(Self {
            current: slots.clone(),
            original: slots,
            parameter_count,
            fixed: Vec::new(),
        })
    }

    pub fn sample_count(&self) -> usize {
        self.current.len()
    }

    /// Number of model parameters per sample.
    pub fn slot_count(&self) -> usize {
        self.current.first().map_or(0, Vec::len)
    }

    /// Number of fit parameters still being fitted.
    pub fn fitted_parameter_count(&self) -> usize {
        self.parameter_count - self.fixed.len()
    }

    /// Whether the original fit parameter `index` is currently fixed.
    pub fn is_fixed(&self, index: usize) -> bool {
        self.fixed.contains(&index)
    }

    pub fn slots(&self, sample: usize) -> Option<&[ParameterSlot]> {
        self.current.get(sample).map(Vec::as_slice)
    }

    /// Expand a fit vector into one model parameter vector per sample.
    pub fn map_parameter_values(
        &self,
        fit_values: &Array1<f64>,
    ) -> Result<Vec<Array1<f64>>, ParameterMapError> {
        let expected = self.fitted_parameter_count();
        if fit_values.len() < expected {
            return Err(ParameterMapError::DimensionMismatch {
                expected,
                found: fit_values.len(),
            });
        }

        Ok(self
            .current
            .iter()
            .map(|sample_slots| {
                sample_slots
                    .iter()
                    .map(|slot| match *slot {
                        ParameterSlot::Fitted { target_index } => fit_values[target_index],
                        ParameterSlot::Fixed { value } => value,
                    })
                    .collect()
            })
            .collect())
    }

    /// Fix fit parameters (original indices) to the given values.
    ///
    /// Fixing always starts from the originally constructed mapping, so
    /// calling this twice with different lists does not accumulate. Fixes are
    /// applied from the highest index down; every slot bound to the fixed
    /// index becomes a literal and every larger index shifts down by one. If
    /// an index appears more than once, its first value is used.
    pub fn fix_parameters(&mut self, fixes: &[(usize, f64)]) -> Result<(), ParameterMapError> {
        if let Some(&(index, _)) = fixes.iter().find(|(i, _)| *i >= self.parameter_count) {
            return Err(ParameterMapError::FitIndexOutOfRange {
                index,
                count: self.parameter_count,
            });
        }

        let mut ordered = fixes.to_vec();
        ordered.sort_by(|a, b| b.0.cmp(&a.0));
        ordered.dedup_by_key(|(index, _)| *index);

        let mut mapping = self.original.clone();
        for &(index, value) in &ordered {
            for slot in mapping.iter_mut().flatten() {
                if let ParameterSlot::Fitted { target_index } = *slot {
                    if target_index == index {
                        *slot = ParameterSlot::Fixed { value };
                    } else if target_index > index {
                        *slot = ParameterSlot::Fitted {
                            target_index: target_index - 1,
                        };
                    }
                }
            }
        }

        self.current = mapping;
        self.fixed = ordered.iter().map(|(i, _)| *i).collect();
        self.fixed.sort_unstable();
        Ok(())
    }

    /// Undo all fixing.
    pub fn reset_parameters(&mut self) {
        self.current = self.original.clone();
        self.fixed.clear();
    }

    /// Slot position of every fit parameter within `sample`.
    ///
    /// The list has one entry per fit index up to the largest index in use
    /// anywhere in the map. Entry `i` holds the model-parameter position
    /// bound to fit index `i` in this sample, or `None` if the sample does
    /// not use that parameter.
    pub fn fitted_parameter_indices(
        &self,
        sample: usize,
    ) -> Result<Vec<Option<usize>>, ParameterMapError> {
        let sample_slots = self
            .current
            .get(sample)
            .ok_or(ParameterMapError::SampleOutOfRange {
                sample,
                count: self.current.len(),
            })?;

        let len = self
            .current
            .iter()
            .flatten()
            .filter_map(|slot| match *slot {
                ParameterSlot::Fitted { target_index } => Some(target_index + 1),
                ParameterSlot::Fixed { .. } => None,
            })
            .max()
            .unwrap_or(0);

        let mut indices = vec![None; len];
        for (position, slot) in sample_slots.iter().enumerate() {
            if let ParameterSlot::Fitted { target_index } = *slot {
                indices[target_index] = Some(position);
            }
        }
        Ok(indices)
    }
}
