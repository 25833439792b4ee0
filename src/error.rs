use crate::{
    calibration::{CalibrationError, LoaderError},
    cube::CubeError,
    focus::FocusError,
    geometry::GeometryError,
    laser::LaserError,
    measurement::MeasurementError,
    reducer::ReducerError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `measurement` module")]
    Measurement(#[from] MeasurementError),
    #[error("Error in the `geometry` module")]
    Geometry(#[from] GeometryError),
    #[error("Error while loading raw frames")]
    Loader(#[from] LoaderError),
    #[error("Error in the `calibration` module")]
    Calibration(#[from] CalibrationError),
    #[error("Error in the `reducer` module")]
    Reducer(#[from] ReducerError),
    #[error("Error in the `laser` module")]
    Laser(#[from] LaserError),
    #[error("Error in the `cube` module")]
    Cube(#[from] CubeError),
    #[error("Error in the `focus` module")]
    Focus(#[from] FocusError),
    #[error("failed to write the CSV report")]
    Csv(#[from] csv::Error),
}
