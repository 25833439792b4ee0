use std::ops::{Add, Div, Mul, Sub};

use ndarray::{Array2, Zip};

use super::{Measurement, MeasurementError, Result};

/// Right hand side of a product or a quotient
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    /// Frame by frame with another measurement
    Measurement(&'a Measurement),
    /// The same factor for every frame
    Scalar(f64),
    /// One factor per frame
    Sequence(&'a [f64]),
}
impl<'a> From<&'a Measurement> for Operand<'a> {
    fn from(value: &'a Measurement) -> Self {
        Operand::Measurement(value)
    }
}
impl From<f64> for Operand<'_> {
    fn from(value: f64) -> Self {
        Operand::Scalar(value)
    }
}
impl<'a> From<&'a [f64]> for Operand<'a> {
    fn from(value: &'a [f64]) -> Self {
        Operand::Sequence(value)
    }
}
impl<'a> From<&'a Vec<f64>> for Operand<'a> {
    fn from(value: &'a Vec<f64>) -> Self {
        Operand::Sequence(value.as_slice())
    }
}

enum Factor<'a> {
    Frame(&'a Array2<f64>),
    Scalar(f64),
}

impl Measurement {
    /// Frame by frame sum or difference, rescaling `other` to the exposure of `self`
    fn accumulate(&self, other: &Self, sign: f64) -> Result<Self> {
        self.check_combinable(other)?;
        let frames = self
            .frames
            .iter()
            .zip(other.frames.iter())
            .zip(self.exposures.iter().zip(other.exposures.iter()))
            .map(|((x, y), (&x_exposure, &y_exposure))| {
                if y_exposure == 0f64 {
                    Zip::from(x).and(y).map_collect(|&x, &y| x + sign * y)
                } else {
                    let ratio = x_exposure / y_exposure;
                    Zip::from(x)
                        .and(y)
                        .map_collect(|&x, &y| x + sign * (y * ratio))
                }
            })
            .collect();
        Ok(Self {
            frames,
            exposures: self.exposures.clone(),
            ids: self.ids.clone(),
            aux: None,
        })
    }
    /// Adds `other` to `self`
    ///
    /// Each frame of `other` is scaled by the ratio of the exposures of `self` and `other`,
    /// unless the exposure of `other` is 0 in which case the frames are added as they are.
    /// The result keeps the exposures and ids of `self`.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.accumulate(other, 1f64)
    }
    /// Subtracts `other` from `self`, see [Measurement::add] for the exposure rescaling
    pub fn subtract(&self, other: &Self) -> Result<Self> {
        self.accumulate(other, -1f64)
    }
    fn factors<'a>(&self, operand: Operand<'a>) -> Result<Vec<(Factor<'a>, f64)>> {
        match operand {
            Operand::Measurement(other) => {
                self.check_combinable(other)?;
                Ok(other
                    .frames
                    .iter()
                    .zip(other.exposures.iter())
                    .map(|(frame, &exposure)| (Factor::Frame(frame), exposure))
                    .collect())
            }
            Operand::Scalar(value) => Ok((0..self.len())
                .map(|_| (Factor::Scalar(value), value))
                .collect()),
            Operand::Sequence(values) => {
                if values.len() != self.len() {
                    return Err(MeasurementError::InvalidOperand(format!(
                        "expected {} factors, found {}",
                        self.len(),
                        values.len()
                    )));
                }
                Ok(values
                    .iter()
                    .map(|&value| (Factor::Scalar(value), value))
                    .collect())
            }
        }
    }
    fn scale<'a>(&self, operand: Operand<'a>, op: fn(f64, f64) -> f64) -> Result<Self> {
        let (frames, exposures) = self
            .frames
            .iter()
            .zip(self.exposures.iter())
            .zip(self.factors(operand)?)
            .map(|((frame, &exposure), (factor, factor_exposure))| {
                let frame = match factor {
                    Factor::Frame(other) => {
                        Zip::from(frame).and(other).map_collect(|&x, &y| op(x, y))
                    }
                    Factor::Scalar(value) => frame.mapv(|x| op(x, value)),
                };
                (frame, op(exposure, factor_exposure))
            })
            .unzip();
        Ok(Self {
            frames,
            exposures,
            ids: self.ids.clone(),
            aux: None,
        })
    }
    /// Multiplies the frames and the exposures of `self` by `operand`
    ///
    /// Scalar factors act on the exposures as well.
    pub fn multiply<'a, O: Into<Operand<'a>>>(&self, operand: O) -> Result<Self> {
        self.scale(operand.into(), |x, y| x * y)
    }
    /// Divides the frames and the exposures of `self` by `operand`
    ///
    /// Dividing by the exposures gives rates [counts/s] with a 1s exposure.
    pub fn divide<'a, O: Into<Operand<'a>>>(&self, operand: O) -> Result<Self> {
        self.scale(operand.into(), |x, y| x / y)
    }
    /// Appends the frames, exposures and ids of `other` after the ones of `self`
    pub fn concatenate(&self, other: &Self) -> Self {
        let mut this = self.clone();
        this.frames.extend(other.frames.iter().cloned());
        this.exposures.extend_from_slice(&other.exposures);
        this.ids.extend(other.ids.iter().cloned());
        this.aux = None;
        this
    }
    /// Concatenates `n` copies of `self`, `n` must be at least 2
    pub fn repeat(&self, n: usize) -> Result<Self> {
        if n < 2 {
            return Err(MeasurementError::InvalidOperand(format!(
                "a measurement can only be repeated at least twice, not {}",
                n
            )));
        }
        Ok((1..n).fold(self.clone(), |this, _| this.concatenate(self)))
    }
    /// Clamps every negative pixel to 0
    pub fn clamp_negative(&self) -> Self {
        Self {
            frames: self.frames.iter().map(|frame| frame.mapv(|x| x.max(0f64))).collect(),
            ..self.clone()
        }
    }
}

impl Add for &Measurement {
    type Output = Result<Measurement>;

    fn add(self, rhs: Self) -> Self::Output {
        Measurement::add(self, rhs)
    }
}
impl Sub for &Measurement {
    type Output = Result<Measurement>;

    fn sub(self, rhs: Self) -> Self::Output {
        self.subtract(rhs)
    }
}
impl<'a, O: Into<Operand<'a>>> Mul<O> for &Measurement {
    type Output = Result<Measurement>;

    fn mul(self, rhs: O) -> Self::Output {
        self.multiply(rhs)
    }
}
impl<'a, O: Into<Operand<'a>>> Div<O> for &Measurement {
    type Output = Result<Measurement>;

    fn div(self, rhs: O) -> Self::Output {
        self.divide(rhs)
    }
}
