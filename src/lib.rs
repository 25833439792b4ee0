//! CCD frame calibration and laser focus characterisation
//!
//! Raw CCD frames are loaded as [Measurement]s, the master bias, dark and flat
//! reference frames are built with [ReferenceBuilder] and persisted with [ReferenceStore],
//! and science frames are reduced with [FrameReducer].
//! The reduced frames of a focus scan are assembled into a [BeamCube] and characterised with [Focus].

pub mod calibration;
pub mod config;
pub mod cube;
pub mod error;
pub mod focus;
pub mod geometry;
pub mod laser;
pub mod measurement;
pub mod reducer;

pub use calibration::{
    CalibrationKind, NpzLoader, RawFrameLoader, ReferenceBuilder, ReferenceStore,
};
pub use config::Config;
pub use cube::{Alignment, BeamCube};
pub use error::Error;
pub use focus::{BeamReport, FocalFraction, Focus};
pub use measurement::{Measurement, Operand};
pub use reducer::FrameReducer;

pub type Result<T> = std::result::Result<T, Error>;
