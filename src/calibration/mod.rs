//! Calibration reference frames
//!
//! Master bias, dark and flat frames are built from batches of raw calibration
//! files with [ReferenceBuilder] and persisted with [ReferenceStore].

use crate::measurement::MeasurementError;

mod builder;
pub mod loader;
mod store;

pub use builder::{master_bias, master_dark, master_flat, ReferenceBuilder};
pub use loader::{LoaderError, NpzLoader, RawFrameLoader};
pub use store::ReferenceStore;

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("raw files do not have the same number of frames: {0:?}")]
    UnequalBatchShape(Vec<usize>),
    #[error("raw frames at the same index do not have the same shape: {0:?}")]
    UnequalFrameShape(Vec<Vec<(usize, usize)>>),
    #[error("no raw {0} files in {1:?}")]
    EmptyBatch(CalibrationKind, std::path::PathBuf),
    #[error("no raw files to combine")]
    NothingToCombine,
    #[error("failed to load raw frames")]
    Loader(#[from] LoaderError),
    #[error("frame arithmetic failed")]
    Measurement(#[from] MeasurementError),
    #[error("failed to access {1:?}")]
    Io(#[source] std::io::Error, std::path::PathBuf),
    #[error("failed to (de)serialize the reference frame")]
    Pickle(#[from] serde_pickle::Error),
    #[error("failed to write the reference frame")]
    Persist(#[from] tempfile::PersistError),
}
type Result<T> = std::result::Result<T, CalibrationError>;

/// Calibration reference frame kinds
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::EnumIter,
    strum_macros::EnumString,
    strum_macros::Display,
)]
#[strum(ascii_case_insensitive)]
pub enum CalibrationKind {
    #[strum(serialize = "bias")]
    Bias,
    #[strum(serialize = "dark")]
    Dark,
    #[strum(serialize = "flat")]
    Flat,
}
impl CalibrationKind {
    /// Name of the master reference frame
    pub fn master(&self) -> String {
        format!("master_{}", self)
    }
}
