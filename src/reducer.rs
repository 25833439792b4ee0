//! Science frame reduction
//!
//! Removes the bias and the dark current from raw science frames and corrects
//! them for the flat field.

use std::path::Path;

use crate::{
    calibration::{CalibrationError, CalibrationKind, LoaderError, RawFrameLoader, ReferenceStore},
    measurement::{Measurement, MeasurementError},
};

#[derive(thiserror::Error, Debug)]
pub enum ReducerError {
    #[error("failed to load the reference frames")]
    Calibration(#[from] CalibrationError),
    #[error("failed to load the science frames")]
    Loader(#[from] LoaderError),
    #[error("failed to reduce the science frames")]
    Measurement(#[from] MeasurementError),
}
type Result<T> = std::result::Result<T, ReducerError>;

/// Bias, dark and flat reference frames
///
/// A missing reference frame is replaced by its identity: a zero bias with a 0s exposure,
/// a zero dark rate and a unit flat.
#[derive(Debug, Clone, Default)]
pub struct FrameReducer {
    bias: Option<Measurement>,
    dark: Option<Measurement>,
    flat: Option<Measurement>,
}
impl FrameReducer {
    pub fn new(
        bias: Option<Measurement>,
        dark: Option<Measurement>,
        flat: Option<Measurement>,
    ) -> Self {
        Self { bias, dark, flat }
    }
    /// Loads the reference frames that exist in the store
    pub fn from_store(store: &ReferenceStore) -> Result<Self> {
        Ok(Self {
            bias: store.load(CalibrationKind::Bias)?,
            dark: store.load(CalibrationKind::Dark)?,
            flat: store.load(CalibrationKind::Flat)?,
        })
    }
    /// Reduces `data`: `((data - bias) - dark) / flat`
    ///
    /// Negative dark current rates are set to 0.
    pub fn reduce(&self, data: &Measurement) -> Result<Measurement> {
        let bias = self
            .bias
            .clone()
            .unwrap_or_else(|| data.filled_like(0f64, 0f64));
        let dark = self
            .dark
            .as_ref()
            .map(|dark| dark.clamp_negative())
            .unwrap_or_else(|| data.filled_like(0f64, 1f64));
        let flat = self
            .flat
            .clone()
            .unwrap_or_else(|| data.filled_like(1f64, 1f64));
        Ok(data.subtract(&bias)?.subtract(&dark)?.divide(&flat)?)
    }
    /// Loads and reduces a raw science file
    pub fn reduce_file<L: RawFrameLoader>(&self, loader: &L, path: &Path) -> Result<Measurement> {
        let data = loader.load(path)?;
        self.reduce(&data)
    }
}
