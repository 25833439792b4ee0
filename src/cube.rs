//! Beam cubes
//!
//! A focus scan is a folder of raw files, one per axial position of the camera,
//! named after that position (e.g. `Focus 13.140.npz` for 13.140mm).
//! The files are reduced, normalized to counts/s and cropped around the laser spot
//! into cubes of shape (axial position, row, column), one cube per frame of the raw files.

use std::path::{Path, PathBuf};

use indicatif::ProgressIterator;
use ndarray::{s, stack, Array3, ArrayView2, Axis};

use crate::{
    calibration::{LoaderError, RawFrameLoader},
    laser::argmax,
    measurement::{Measurement, MeasurementError},
    reducer::{FrameReducer, ReducerError},
};

#[derive(thiserror::Error, Debug)]
pub enum CubeError {
    #[error("delta ({delta}px) is too large for a laser spot at {center:?} in a {shape:?} frame")]
    DeltaTooLarge {
        center: (usize, usize),
        delta: usize,
        shape: (usize, usize),
    },
    #[error("failed to get the axial position from {0:?}")]
    AxialPosition(String),
    #[error("no raw files in {0:?}")]
    EmptyFolder(PathBuf),
    #[error("raw files do not have the same number of frames: {0:?}")]
    FrameCount(Vec<usize>),
    #[error("invalid axial position regex")]
    Regex(#[from] regex::Error),
    #[error("failed to stack the frames")]
    Shape(#[from] ndarray::ShapeError),
    #[error("failed to load the raw files")]
    Loader(#[from] LoaderError),
    #[error("failed to reduce the raw files")]
    Reducer(#[from] ReducerError),
    #[error("failed to normalize the frames")]
    Measurement(#[from] MeasurementError),
}
type Result<T> = std::result::Result<T, CubeError>;

/// Centering of the frames in the cubes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    /// All the frames are cropped around the brightest pixel of the whole scan
    #[default]
    Common,
    /// Each frame is cropped around its own brightest pixel
    PerFile,
}

fn check_bounds(center: (usize, usize), delta: usize, shape: (usize, usize)) -> Result<()> {
    let (row, col) = center;
    let (rows, cols) = shape;
    if row > delta && col > delta && rows - row > delta && cols - col > delta {
        Ok(())
    } else {
        Err(CubeError::DeltaTooLarge {
            center,
            delta,
            shape,
        })
    }
}

fn crop(frame: ArrayView2<f64>, center: (usize, usize), delta: usize) -> Result<ArrayView2<f64>> {
    check_bounds(center, delta, frame.dim())?;
    let (row, col) = center;
    Ok(frame.slice_move(s![row - delta..=row + delta, col - delta..=col + delta]))
}

/// Crops the frames of a focus scan around the laser spot
///
/// `scan` holds the reduced measurements at each axial position. The returned cubes,
/// one for each frame index, have the shape (axial position, 2*delta+1, 2*delta+1).
pub fn assemble(scan: &[Measurement], delta: usize, alignment: Alignment) -> Result<Vec<Array3<f64>>> {
    let Some(first) = scan.first() else {
        return Ok(vec![]);
    };
    if scan.iter().any(|data| data.len() != first.len()) {
        return Err(CubeError::FrameCount(scan.iter().map(|data| data.len()).collect()));
    }
    (0..first.len())
        .map(|i| -> Result<Array3<f64>> {
            let frames: Vec<ArrayView2<f64>> =
                scan.iter().map(|data| data.frames()[i].view()).collect();
            let crops = match alignment {
                Alignment::Common => {
                    let center = frames
                        .iter()
                        .map(|frame| {
                            let idx = argmax(frame.view());
                            (idx, frame[idx])
                        })
                        .fold(None, |brightest: Option<((usize, usize), f64)>, (idx, value)| {
                            match brightest {
                                Some((_, max)) if max >= value => brightest,
                                _ => Some((idx, value)),
                            }
                        })
                        .map(|(idx, _)| idx)
                        .unwrap_or_default();
                    frames
                        .iter()
                        .map(|frame| crop(frame.view(), center, delta))
                        .collect::<Result<Vec<_>>>()?
                }
                Alignment::PerFile => frames
                    .iter()
                    .map(|frame| crop(frame.view(), argmax(frame.view()), delta))
                    .collect::<Result<Vec<_>>>()?,
            };
            Ok(stack(Axis(0), &crops)?)
        })
        .collect()
}

/// Axial position [m] from a file stem ending with the position in mm
pub fn axial_position(stem: &str) -> Result<f64> {
    let re = regex::Regex::new(r"(-?\d+(?:\.\d*)?)\s*$")?;
    let caps = re
        .captures(stem)
        .ok_or(CubeError::AxialPosition(stem.to_string()))?;
    let z: f64 = caps[1]
        .parse()
        .map_err(|_| CubeError::AxialPosition(stem.to_string()))?;
    Ok(z * 1e-3)
}

/// Reduced focus scan
#[derive(Debug, Clone)]
pub struct BeamCube {
    /// One cube per raw frame index
    pub cubes: Vec<Array3<f64>>,
    /// Axial positions [m] relative to the camera position closest to the laser
    pub z: Vec<f64>,
    /// File stems in the order of the cubes axial axis
    pub names: Vec<String>,
}
impl BeamCube {
    /// Builds the cubes from the reduced measurements of a scan and their file stems
    ///
    /// The axial positions are given by the stems, the increasing stem positions
    /// move toward the laser, so both the positions and the cubes axial axis are reversed.
    pub fn from_scan(
        names: Vec<String>,
        scan: &[Measurement],
        delta: usize,
        alignment: Alignment,
    ) -> Result<Self> {
        let z_raw = names
            .iter()
            .map(|name| axial_position(name))
            .collect::<Result<Vec<f64>>>()?;
        let z_min = z_raw.iter().cloned().fold(f64::INFINITY, f64::min);
        let z: Vec<f64> = z_raw.iter().rev().map(|z| z_min - z).collect();
        let cubes = assemble(scan, delta, alignment)?
            .into_iter()
            .map(|cube| cube.slice(s![..;-1, .., ..]).to_owned())
            .collect();
        Ok(Self {
            cubes,
            z,
            names: names.into_iter().rev().collect(),
        })
    }
    /// Loads, reduces and assembles the raw files of a focus scan in `folder`
    pub fn from_folder<L: RawFrameLoader>(
        folder: &Path,
        loader: &L,
        reducer: &FrameReducer,
        delta: usize,
        alignment: Alignment,
    ) -> Result<Self> {
        let files = loader.list(folder)?;
        if files.is_empty() {
            return Err(CubeError::EmptyFolder(folder.to_path_buf()));
        }
        log::info!("Reducing {} files from {:?}", files.len(), folder);
        let n = files.len() as u64;
        let mut names = vec![];
        let mut scan = vec![];
        for file in files.iter().progress_count(n) {
            let data = reducer.reduce_file(loader, file)?;
            scan.push(data.divide(data.exposures())?);
            names.push(
                file.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
        }
        Self::from_scan(names, &scan, delta, alignment)
    }
    /// Number of axial positions
    pub fn len(&self) -> usize {
        self.z.len()
    }
    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }
}
