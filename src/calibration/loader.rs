//! Raw frame loaders
//!
//! A [RawFrameLoader] turns one raw CCD file into a [Measurement].
//! [NpzLoader] reads numpy `.npz` archives where every 2D array is a frame and
//! the `exptime` array holds the exposure times.

use std::{
    io::Read,
    path::{Path, PathBuf},
};

use ndarray::{Array2, ShapeBuilder};
use npyz::{npz::NpzArchive, DType, NpyFile, Order};

use crate::measurement::{Measurement, MeasurementError};

#[derive(thiserror::Error, Debug)]
pub enum LoaderError {
    #[error("failed to read {1:?}")]
    Io(#[source] std::io::Error, PathBuf),
    #[error("invalid glob pattern")]
    Pattern(#[from] glob::PatternError),
    #[error("failed to list files")]
    Glob(#[from] glob::GlobError),
    #[error("array {0:?} in {1:?} has unsupported data type {2}")]
    DataType(String, PathBuf, String),
    #[error("array {0:?} in {1:?} with shape {2:?} is not a frame")]
    NotAFrame(String, PathBuf, Vec<u64>),
    #[error("no exposure time (`exptime`) in {0:?}")]
    MissingExposure(PathBuf),
    #[error("{0:?}: {1} exposure times for {2} frames")]
    ExposureCount(PathBuf, usize, usize),
    #[error("failed to build the measurement")]
    Measurement(#[from] MeasurementError),
}
type Result<T> = std::result::Result<T, LoaderError>;

/// Loads raw CCD files
pub trait RawFrameLoader {
    /// File extension of the raw files
    fn extension(&self) -> &str;
    /// Loads the file at `path`
    fn load(&self, path: &Path) -> Result<Measurement>;
    /// Lists the raw files within `folder`, sorted by name
    fn list(&self, folder: &Path) -> Result<Vec<PathBuf>> {
        let pattern = folder.join(format!("*.{}", self.extension()));
        let mut paths = glob::glob(&pattern.to_string_lossy())?
            .collect::<std::result::Result<Vec<PathBuf>, glob::GlobError>>()?;
        paths.sort();
        Ok(paths)
    }
}

/// Loader for numpy `.npz` archives
#[derive(Debug, Default, Clone, Copy)]
pub struct NpzLoader;

/// Name of the array with the exposure times
pub const EXPTIME: &str = "exptime";

fn to_f64<R: Read>(npy: NpyFile<R>, name: &str, path: &Path) -> Result<Vec<f64>> {
    let type_str = match npy.dtype() {
        DType::Plain(type_str) => type_str.to_string(),
        dtype => {
            return Err(LoaderError::DataType(
                name.into(),
                path.into(),
                format!("{:?}", dtype),
            ))
        }
    };
    let io = |e| LoaderError::Io(e, path.into());
    let values = match type_str.trim_start_matches(['<', '>', '|', '=']) {
        "f8" => npy.into_vec::<f64>().map_err(io)?,
        "f4" => npy
            .into_vec::<f32>()
            .map_err(io)?
            .into_iter()
            .map(f64::from)
            .collect(),
        "u1" => npy
            .into_vec::<u8>()
            .map_err(io)?
            .into_iter()
            .map(f64::from)
            .collect(),
        "u2" => npy
            .into_vec::<u16>()
            .map_err(io)?
            .into_iter()
            .map(f64::from)
            .collect(),
        "u4" => npy
            .into_vec::<u32>()
            .map_err(io)?
            .into_iter()
            .map(f64::from)
            .collect(),
        "i2" => npy
            .into_vec::<i16>()
            .map_err(io)?
            .into_iter()
            .map(f64::from)
            .collect(),
        "i4" => npy
            .into_vec::<i32>()
            .map_err(io)?
            .into_iter()
            .map(f64::from)
            .collect(),
        "i8" => npy
            .into_vec::<i64>()
            .map_err(io)?
            .into_iter()
            .map(|x| x as f64)
            .collect(),
        _ => return Err(LoaderError::DataType(name.into(), path.into(), type_str)),
    };
    Ok(values)
}

impl RawFrameLoader for NpzLoader {
    fn extension(&self) -> &str {
        "npz"
    }
    fn load(&self, path: &Path) -> Result<Measurement> {
        log::debug!("Loading {:?}...", path);
        let io = |e| LoaderError::Io(e, path.into());
        let mut npz = NpzArchive::open(path).map_err(io)?;
        let mut names: Vec<String> = npz.array_names().map(String::from).collect();
        names.sort();

        let mut exposures: Option<Vec<f64>> = None;
        let mut frames = vec![];
        for name in names {
            let Some(npy) = npz.by_name(&name).map_err(io)? else {
                continue;
            };
            if name == EXPTIME {
                exposures = Some(to_f64(npy, &name, path)?);
                continue;
            }
            let shape = npy.shape().to_vec();
            let order = npy.order();
            let (rows, cols) = match shape[..] {
                [cols] => (1, cols as usize),
                [rows, cols] => (rows as usize, cols as usize),
                _ => return Err(LoaderError::NotAFrame(name, path.into(), shape.clone())),
            };
            let values = to_f64(npy, &name, path)?;
            let frame = match order {
                Order::C => Array2::from_shape_vec((rows, cols), values),
                Order::Fortran => Array2::from_shape_vec((rows, cols).f(), values),
            }
            .map_err(|_| LoaderError::NotAFrame(name, path.into(), shape))?;
            frames.push(frame);
        }

        let exposures = match exposures {
            Some(exposures) if exposures.len() == frames.len() => exposures,
            Some(exposures) if exposures.len() == 1 => vec![exposures[0]; frames.len()],
            Some(exposures) => {
                return Err(LoaderError::ExposureCount(
                    path.into(),
                    exposures.len(),
                    frames.len(),
                ))
            }
            None => return Err(LoaderError::MissingExposure(path.into())),
        };
        Ok(Measurement::anonymous(frames, exposures)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use npyz::{npz::NpzWriter, WriterBuilder};
    use std::fs::File;
    use tempfile::TempDir;

    /// Writes a `.npz` archive with the given frames and exposure times
    pub(crate) fn write_frames(path: &Path, frames: &[Array2<f64>], exptime: &[f64]) {
        let mut npz = NpzWriter::create(path).unwrap();
        let mut add = |name: &str, data: Vec<f64>, shape: &[u64]| {
            let mut writer = npz
                .array(name, Default::default())
                .unwrap()
                .default_dtype()
                .shape(shape)
                .begin_nd()
                .unwrap();
            writer.extend(data).unwrap();
            writer.finish().unwrap();
        };
        for (i, frame) in frames.iter().enumerate() {
            let (rows, cols) = frame.dim();
            add(
                &format!("frame{:02}", i),
                frame.iter().cloned().collect(),
                &[rows as u64, cols as u64],
            );
        }
        add(EXPTIME, exptime.to_vec(), &[exptime.len() as u64]);
    }

    /// Writes a `.npz` archive with constant frames of the given `shape`
    pub(crate) fn write_npz(path: &Path, values: &[f64], shape: (usize, usize), exptime: &[f64]) {
        let frames: Vec<Array2<f64>> = values
            .iter()
            .map(|&value| Array2::from_elem(shape, value))
            .collect();
        write_frames(path, &frames, exptime)
    }

    #[test]
    fn load_npz() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bias.npz");
        write_npz(&path, &[10., 20.], (4, 3), &[2.]);
        let data = NpzLoader.load(&path).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.shape(), vec![(4, 3); 2]);
        assert_eq!(data.exposures(), &[2., 2.]);
        assert_eq!(data.medians(), vec![10., 20.]);
        assert_eq!(data.ids(), &[None, None]);
    }

    #[test]
    fn frame_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("science.npz");
        let frame = Array2::from_shape_fn((3, 4), |(i, j)| (10 * i + j) as f64);
        write_frames(&path, &[frame.clone()], &[0.5]);
        let data = NpzLoader.load(&path).unwrap();
        assert_eq!(data.frames(), &[frame]);
        assert_eq!(data.exposures(), &[0.5]);
    }

    #[test]
    fn exposure_count_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dark.npz");
        write_npz(&path, &[10., 20., 30.], (2, 2), &[1., 2.]);
        assert!(matches!(
            NpzLoader.load(&path),
            Err(LoaderError::ExposureCount(_, 2, 3))
        ));
    }

    #[test]
    fn sorted_listing() {
        let dir = TempDir::new().unwrap();
        for name in ["b.npz", "a.npz", "c.txt"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let files = NpzLoader.list(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.npz"), dir.path().join("b.npz")]
        );
    }
}
