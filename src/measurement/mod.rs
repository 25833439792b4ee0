//! Calibrated measurements
//!
//! A [Measurement] couples a stack of 2D frames to the exposure time and the
//! identity of each frame.
//! Arithmetic between measurements is aware of the exposure times and
//! rescales the right operand to the exposure of the left one before combining counts.

use std::{collections::BTreeMap, fmt, ops::RangeBounds};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

mod arithmetic;
mod statistics;
pub use arithmetic::Operand;
pub(crate) use statistics::{frame_median, median};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MeasurementError {
    #[error("measurements cannot be combined: {0}")]
    Incompatible(String),
    #[error("invalid operand: {0}")]
    InvalidOperand(String),
    #[error("index {index} is out of range for a measurement of length {len}")]
    Index { index: usize, len: usize },
    #[error("frames ({frames}), exposures ({exposures}) and ids ({ids}) lengths must match")]
    Construction {
        frames: usize,
        exposures: usize,
        ids: usize,
    },
}
type Result<T> = std::result::Result<T, MeasurementError>;

/// Frame identifier, only used to tell datasets apart
pub type Id = Option<String>;
/// Auxiliary header record attached to a measurement
pub type Header = BTreeMap<String, String>;

/// A stack of frames with their exposure times [s] and identifiers
///
/// Frames may have different shapes, only frames at the same index of two
/// measurements need to agree for the measurements to be combined.
/// An exposure of 0 marks an offset frame (e.g. a bias) that is never rescaled in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    frames: Vec<Array2<f64>>,
    exposures: Vec<f64>,
    ids: Vec<Id>,
    aux: Option<Vec<Header>>,
}
impl Measurement {
    /// Creates a new measurement, the 3 sequences must have the same length
    pub fn new(frames: Vec<Array2<f64>>, exposures: Vec<f64>, ids: Vec<Id>) -> Result<Self> {
        if frames.len() != exposures.len() || frames.len() != ids.len() {
            return Err(MeasurementError::Construction {
                frames: frames.len(),
                exposures: exposures.len(),
                ids: ids.len(),
            });
        }
        Ok(Self {
            frames,
            exposures,
            ids,
            aux: None,
        })
    }
    /// Creates a measurement with anonymous frames
    pub fn anonymous(frames: Vec<Array2<f64>>, exposures: Vec<f64>) -> Result<Self> {
        let ids = vec![None; frames.len()];
        Self::new(frames, exposures, ids)
    }
    /// Attaches auxiliary header records
    pub fn with_aux(self, aux: Vec<Header>) -> Self {
        Self {
            aux: Some(aux),
            ..self
        }
    }
    /// A measurement with the same structure as `self` and every pixel set to `value`
    pub fn filled_like(&self, value: f64, exposure: f64) -> Self {
        Self {
            frames: self
                .frames
                .iter()
                .map(|frame| Array2::from_elem(frame.dim(), value))
                .collect(),
            exposures: vec![exposure; self.len()],
            ids: self.ids.clone(),
            aux: None,
        }
    }
    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
    /// The frames
    pub fn frames(&self) -> &[Array2<f64>] {
        &self.frames
    }
    /// The exposure times [s]
    pub fn exposures(&self) -> &[f64] {
        &self.exposures
    }
    /// The frame identifiers
    pub fn ids(&self) -> &[Id] {
        &self.ids
    }
    /// The auxiliary header records
    pub fn aux(&self) -> Option<&[Header]> {
        self.aux.as_deref()
    }
    /// The (rows, columns) shape of every frame
    pub fn shape(&self) -> Vec<(usize, usize)> {
        self.frames.iter().map(|frame| frame.dim()).collect()
    }
    /// Consumes the measurement, returning the frames
    pub fn into_frames(self) -> Vec<Array2<f64>> {
        self.frames
    }
    /// Returns the frame at `index` as a single frame measurement
    pub fn get(&self, index: usize) -> Result<Self> {
        if index >= self.len() {
            return Err(MeasurementError::Index {
                index,
                len: self.len(),
            });
        }
        Ok(Self {
            frames: vec![self.frames[index].clone()],
            exposures: vec![self.exposures[index]],
            ids: vec![self.ids[index].clone()],
            aux: None,
        })
    }
    /// Returns the frames within `range`
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Result<Self> {
        use std::ops::Bound::*;
        let start = match range.start_bound() {
            Included(&i) => i,
            Excluded(&i) => i + 1,
            Unbounded => 0,
        };
        let end = match range.end_bound() {
            Included(&i) => i + 1,
            Excluded(&i) => i,
            Unbounded => self.len(),
        };
        if end > self.len() {
            return Err(MeasurementError::Index {
                index: end,
                len: self.len(),
            });
        }
        let start = start.min(end);
        Ok(Self {
            frames: self.frames[start..end].to_vec(),
            exposures: self.exposures[start..end].to_vec(),
            ids: self.ids[start..end].to_vec(),
            aux: None,
        })
    }
    /// Checks that `self` and `other` can be combined frame by frame
    ///
    /// Both must have the same length, the same shape at every index and the same ids
    pub fn check_combinable(&self, other: &Self) -> Result<()> {
        if self.len() != other.len() {
            return Err(MeasurementError::Incompatible(format!(
                "lengths differ ({} vs {})",
                self.len(),
                other.len()
            )));
        }
        if self.shape() != other.shape() {
            return Err(MeasurementError::Incompatible(format!(
                "shapes differ ({:?} vs {:?})",
                self.shape(),
                other.shape()
            )));
        }
        if self.ids != other.ids {
            return Err(MeasurementError::Incompatible(format!(
                "ids differ ({:?} vs {:?})",
                self.ids, other.ids
            )));
        }
        Ok(())
    }
}
impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ((frame, exposure), id) in self
            .frames
            .iter()
            .zip(self.exposures.iter())
            .zip(self.ids.iter())
        {
            writeln!(f, "({},\n{}, {:?}),\n", frame, exposure, id)?;
        }
        write!(f, "aux:\n{:?}", self.aux)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn single() -> Measurement {
        Measurement::new(
            vec![array![[1., 1.], [1., 4.]]],
            vec![1.],
            vec![Some("blabla".into())],
        )
        .unwrap()
    }
    fn double() -> Measurement {
        Measurement::new(
            vec![array![[1., 1.], [1., 4.]], array![[2., 3.]]],
            vec![1., 5.3],
            vec![Some("blabla".into()), Some("bloblo".into())],
        )
        .unwrap()
    }

    #[test]
    fn creation() {
        assert_eq!(single().shape(), vec![(2, 2)]);
        assert_eq!(double().shape(), vec![(2, 2), (1, 2)]);
        assert!(matches!(
            Measurement::new(vec![array![[1.]]], vec![1., 2.], vec![None]),
            Err(MeasurementError::Construction { .. })
        ));
    }

    #[test]
    fn indexing() {
        let x = single();
        assert_eq!(x.get(0).unwrap(), x);
        let y = double();
        assert_eq!(y.get(0).unwrap().len(), 1);
        assert_eq!(y.get(0).unwrap(), x);
        assert_eq!(y.slice(1..).unwrap().exposures(), &[5.3]);
        assert_eq!(y.slice(..).unwrap(), y);
        assert!(matches!(y.get(2), Err(MeasurementError::Index { index: 2, len: 2 })));
    }

    #[test]
    fn equality() {
        let x = single();
        assert_eq!(x, single());
        assert_ne!(x, single().with_aux(vec![Header::new()]));
        assert_ne!(x, double());
        let y = Measurement::new(vec![array![[1., 1.], [1., 4.]]], vec![1.], vec![Some("bla".into())])
            .unwrap();
        assert_ne!(x, y);
        let nan = Measurement::anonymous(vec![array![[f64::NAN]]], vec![1.]).unwrap();
        assert_ne!(nan, nan.clone());
    }

    #[test]
    fn combinability() {
        let x = double();
        assert!(x.check_combinable(&double()).is_ok());
        assert!(matches!(
            x.check_combinable(&single()),
            Err(MeasurementError::Incompatible(_))
        ));
    }
}
