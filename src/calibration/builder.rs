use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use indicatif::ProgressIterator;
use ndarray::Array2;

use super::{CalibrationError, CalibrationKind, RawFrameLoader, ReferenceStore, Result};
use crate::measurement::{median, Measurement};

/// Per-pixel median, frame by frame, of a batch of raw measurements
///
/// Every measurement of the batch must have the same number of frames and
/// frames at the same index must have the same shape.
fn median_combine(batch: &[Measurement]) -> Result<Vec<Array2<f64>>> {
    let Some(first) = batch.first() else {
        return Err(CalibrationError::NothingToCombine);
    };
    if batch.iter().any(|data| data.len() != first.len()) {
        return Err(CalibrationError::UnequalBatchShape(
            batch.iter().map(|data| data.len()).collect(),
        ));
    }
    let shape = first.shape();
    if batch.iter().any(|data| data.shape() != shape) {
        return Err(CalibrationError::UnequalFrameShape(
            batch.iter().map(|data| data.shape()).collect(),
        ));
    }
    let mut buffer = Vec::with_capacity(batch.len());
    Ok(shape
        .into_iter()
        .enumerate()
        .map(|(i, dim)| {
            Array2::from_shape_fn(dim, |idx| {
                buffer.clear();
                buffer.extend(batch.iter().map(|data| data.frames()[i][idx]));
                median(&mut buffer)
            })
        })
        .collect())
}

fn reference(frames: Vec<Array2<f64>>, exposure: f64) -> Result<Measurement> {
    let n = frames.len();
    Ok(Measurement::anonymous(frames, vec![exposure; n])?)
}

/// Master bias: the per-pixel median of the raw bias frames with a 0s exposure
pub fn master_bias(batch: &[Measurement]) -> Result<Measurement> {
    reference(median_combine(batch)?, 0f64)
}

/// Master dark: the per-pixel median of the bias subtracted dark current rates [counts/s]
///
/// The rates are not clamped at this stage, negative values are kept.
pub fn master_dark(batch: &[Measurement], bias: Option<&Measurement>) -> Result<Measurement> {
    let rates = batch
        .iter()
        .map(|data| {
            let bias = bias
                .cloned()
                .unwrap_or_else(|| data.filled_like(0f64, 0f64));
            data.subtract(&bias)?.divide(data.exposures())
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    reference(median_combine(&rates)?, 1f64)
}

/// Master flat: the per-pixel median of the bias and dark corrected flats
///
/// Each flat frame is normalized by its mean before the median and the median frames
/// are normalized to a unit mean.
pub fn master_flat(
    batch: &[Measurement],
    bias: Option<&Measurement>,
    dark: Option<&Measurement>,
) -> Result<Measurement> {
    let normalized = batch
        .iter()
        .map(|data| {
            let bias = bias
                .cloned()
                .unwrap_or_else(|| data.filled_like(0f64, 0f64));
            let dark = dark
                .cloned()
                .unwrap_or_else(|| data.filled_like(0f64, 1f64));
            let flat = data.subtract(&bias)?.subtract(&dark)?;
            flat.divide(&flat.moment(1))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let frames = median_combine(&normalized)?
        .into_iter()
        .map(|frame| {
            let mean = frame.mean().unwrap_or(1f64);
            frame / mean
        })
        .collect();
    reference(frames, 1f64)
}

/// Builds the master reference frames from folders of raw calibration files
pub struct ReferenceBuilder<L: RawFrameLoader> {
    loader: L,
    store: ReferenceStore,
}
impl<L: RawFrameLoader> ReferenceBuilder<L> {
    pub fn new(loader: L, store: ReferenceStore) -> Self {
        Self { loader, store }
    }
    pub fn store(&self) -> &ReferenceStore {
        &self.store
    }
    /// Loads all the raw files in `folder`
    pub fn load_batch(&self, kind: CalibrationKind, folder: &Path) -> Result<Vec<Measurement>> {
        let files = self.loader.list(folder)?;
        if files.is_empty() {
            return Err(CalibrationError::EmptyBatch(kind, folder.to_path_buf()));
        }
        log::info!("Loading {} raw {} files from {:?}", files.len(), kind, folder);
        let n = files.len() as u64;
        files
            .iter()
            .progress_count(n)
            .map(|file| Ok(self.loader.load(file)?))
            .collect()
    }
    /// Creates, saves and returns the master reference frame of a given kind
    ///
    /// The raw files are read from `folder`, the master frames the new one depends on
    /// are loaded from the store if they exist.
    pub fn create<P: AsRef<Path>>(&self, kind: CalibrationKind, folder: P) -> Result<Measurement> {
        let batch = self.load_batch(kind, folder.as_ref())?;
        let now = Instant::now();
        let master = match kind {
            CalibrationKind::Bias => master_bias(&batch)?,
            CalibrationKind::Dark => {
                let bias = self.store.load(CalibrationKind::Bias)?;
                master_dark(&batch, bias.as_ref())?
            }
            CalibrationKind::Flat => {
                let bias = self.store.load(CalibrationKind::Bias)?;
                let dark = self.store.load(CalibrationKind::Dark)?;
                master_flat(&batch, bias.as_ref(), dark.as_ref())?
            }
        };
        log::info!("{} created in {}ms", kind.master(), now.elapsed().as_millis());
        self.store.save(kind, &master)?;
        Ok(master)
    }
    /// Creates the master bias, dark and flat in that order
    ///
    /// `folders` gives the raw files folder for each kind
    pub fn create_all(&self, folders: [PathBuf; 3]) -> Result<[Measurement; 3]> {
        let [bias, dark, flat] = folders;
        Ok([
            self.create(CalibrationKind::Bias, bias)?,
            self.create(CalibrationKind::Dark, dark)?,
            self.create(CalibrationKind::Flat, flat)?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{loader::tests::write_npz, NpzLoader};
    use approx::assert_abs_diff_eq;
    use tempfile::TempDir;

    fn constant(value: f64, exposure: f64) -> Measurement {
        Measurement::anonymous(vec![Array2::from_elem((4, 4), value)], vec![exposure]).unwrap()
    }

    #[test]
    fn median_robustness() {
        let mut batch = vec![constant(10., 0.); 5];
        let mut outlier = Array2::from_elem((4, 4), 10.);
        outlier[[0, 0]] = 1000.;
        batch.push(Measurement::anonymous(vec![outlier], vec![0.]).unwrap());
        let bias = master_bias(&batch).unwrap();
        assert_eq!(bias.exposures(), &[0.]);
        assert!(bias.frames()[0].iter().all(|&x| x == 10.));
    }

    #[test]
    fn unequal_batch_shape() {
        let two = constant(10., 0.).concatenate(&constant(10., 0.));
        let batch = vec![constant(10., 0.), two];
        assert!(matches!(
            master_bias(&batch),
            Err(CalibrationError::UnequalBatchShape(counts)) if counts == vec![1, 2]
        ));
        assert!(matches!(
            master_dark(&batch, None),
            Err(CalibrationError::UnequalBatchShape(_))
        ));
        assert!(matches!(
            master_flat(&batch, None, None),
            Err(CalibrationError::UnequalBatchShape(_))
        ));
    }

    #[test]
    fn dark_rate() {
        let bias = constant(10., 0.);
        let dark = master_dark(&[constant(50., 5.), constant(50., 5.)], Some(&bias)).unwrap();
        assert_eq!(dark.exposures(), &[1.]);
        assert!(dark.frames()[0].iter().all(|&x| x == 8.));
        let dark = master_dark(&[constant(50., 5.)], None).unwrap();
        assert!(dark.frames()[0].iter().all(|&x| x == 10.));
    }

    #[test]
    fn unit_mean_flat() {
        let bias = constant(10., 0.);
        let dark = constant(8., 1.);
        let mut vignetted = Array2::from_elem((4, 4), 100.);
        vignetted[[0, 0]] = 50.;
        let raw = Measurement::anonymous(vec![vignetted], vec![1.]).unwrap();
        let flat = master_flat(&[raw.clone(), raw], Some(&bias), Some(&dark)).unwrap();
        assert_eq!(flat.exposures(), &[1.]);
        assert_abs_diff_eq!(flat.frames()[0].mean().unwrap(), 1., epsilon = 1e-12);
        assert_abs_diff_eq!(
            flat.frames()[0][[0, 0]] / flat.frames()[0][[1, 1]],
            32. / 82.,
            epsilon = 1e-12
        );
    }

    #[test]
    fn flat_without_references() {
        let mut vignetted = Array2::from_elem((4, 4), 100.);
        vignetted[[0, 0]] = 50.;
        let raw = Measurement::anonymous(vec![vignetted], vec![2.]).unwrap();
        let flat = master_flat(&[raw], None, None).unwrap();
        assert_eq!(flat.exposures(), &[1.]);
        assert_abs_diff_eq!(flat.frames()[0].mean().unwrap(), 1., epsilon = 1e-12);
        let mean = (15. * 100. + 50.) / 16.;
        assert_abs_diff_eq!(flat.frames()[0][[1, 1]], 100. / mean, epsilon = 1e-12);
        assert_abs_diff_eq!(flat.frames()[0][[0, 0]], 50. / mean, epsilon = 1e-12);
    }

    #[test]
    fn create_from_folders() {
        let dir = TempDir::new().unwrap();
        let folder = |name: &str| {
            let path = dir.path().join(name);
            std::fs::create_dir(&path).unwrap();
            path
        };
        let (bias, dark, flat) = (folder("bias"), folder("dark"), folder("flat"));
        for i in 0..3 {
            write_npz(&bias.join(format!("bias{i}.npz")), &[10.], (4, 4), &[0.]);
            write_npz(&dark.join(format!("dark{i}.npz")), &[50.], (4, 4), &[5.]);
            write_npz(&flat.join(format!("flat{i}.npz")), &[100.], (4, 4), &[1.]);
        }
        let store = ReferenceStore::new(dir.path().join("master"));
        let builder = ReferenceBuilder::new(NpzLoader, store.clone());
        let [_, master_dark, master_flat] = builder.create_all([bias, dark, flat]).unwrap();
        assert!(master_dark.frames()[0].iter().all(|&x| x == 8.));
        assert!(master_flat.frames()[0].iter().all(|&x| x == 1.));
        assert_eq!(
            store.load(CalibrationKind::Flat).unwrap(),
            Some(master_flat)
        );
        assert!(matches!(
            builder.create(CalibrationKind::Bias, dir.path().join("master")),
            Err(CalibrationError::EmptyBatch(CalibrationKind::Bias, _))
        ));
    }
}
