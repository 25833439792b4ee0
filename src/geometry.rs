//! Apertures and 1D profile helpers
//!
//! Circular aperture masks for photometry on frames, linear up-sampling of
//! profiles and the detection of the crossings between two profiles.

use ndarray::Array2;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GeometryError {
    #[error("sequences lengths do not match ({0} vs {1})")]
    ShapeMismatch(usize, usize),
}
type Result<T> = std::result::Result<T, GeometryError>;

/// Default number of segments inserted between 2 consecutive samples by [extender]
pub const EXTENSION: usize = 100;

fn distance(row: usize, col: usize, center: (f64, f64)) -> f64 {
    let (r0, c0) = center;
    ((row as f64 - r0).powi(2) + (col as f64 - c0).powi(2)).sqrt()
}

/// Circular weight mask of a given `radius` centered on `center` (row, column)
///
/// Pixels within `radius-0.5` of the center weight 1, pixels within
/// `(radius-0.5, radius+0.5]` weight 0.5 and all the other pixels weight 0.
/// With `sharp` edges the mask is 1 within `radius` and 0 elsewhere.
pub fn aperturized(shape: (usize, usize), center: (f64, f64), radius: f64, sharp: bool) -> Array2<f64> {
    Array2::from_shape_fn(shape, |(row, col)| {
        let d = distance(row, col, center);
        if sharp {
            if d <= radius {
                1f64
            } else {
                0f64
            }
        } else if d <= radius - 0.5 {
            1f64
        } else if d <= radius + 0.5 {
            0.5
        } else {
            0f64
        }
    })
}

/// Boolean circular aperture: `true` within `radius` of `center` (row, column)
pub fn aperture(shape: (usize, usize), center: (f64, f64), radius: f64) -> Array2<bool> {
    Array2::from_shape_fn(shape, |(row, col)| distance(row, col, center) <= radius)
}

/// Linearly up-samples `x` with `interval` segments between consecutive samples
///
/// The output has `(x.len()-1)*interval+1` samples and contains all the samples of `x`.
pub fn extender(x: &[f64], interval: usize) -> Vec<f64> {
    if x.len() < 2 {
        return x.to_vec();
    }
    let mut extended = Vec::with_capacity((x.len() - 1) * interval + 1);
    for pair in x.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let step = (b - a) / interval as f64;
        extended.extend((0..interval).map(|k| a + k as f64 * step));
    }
    if let Some(&last) = x.last() {
        extended.push(last);
    }
    extended
}

/// A profile or a constant level
#[derive(Debug, Clone, Copy)]
pub enum Level<'a> {
    Profile(&'a [f64]),
    Constant(f64),
}
impl<'a> From<&'a [f64]> for Level<'a> {
    fn from(value: &'a [f64]) -> Self {
        Level::Profile(value)
    }
}
impl<'a> From<&'a Vec<f64>> for Level<'a> {
    fn from(value: &'a Vec<f64>) -> Self {
        Level::Profile(value.as_slice())
    }
}
impl From<f64> for Level<'_> {
    fn from(value: f64) -> Self {
        Level::Constant(value)
    }
}
impl Level<'_> {
    fn len(&self) -> Option<usize> {
        match self {
            Level::Profile(p) => Some(p.len()),
            Level::Constant(_) => None,
        }
    }
    fn at(&self, i: usize) -> f64 {
        match self {
            Level::Profile(p) => p[i],
            Level::Constant(c) => *c,
        }
    }
}

fn sign(x: f64) -> f64 {
    if x.is_nan() {
        f64::NAN
    } else if x > 0f64 {
        1f64
    } else if x < 0f64 {
        -1f64
    } else {
        0f64
    }
}

/// Returns the indices immediately before every crossing of `f` and `g`
///
/// An index `i` is returned when the sign of `f-g` at `i` differs from the sign at `i+1`,
/// touching (`f-g=0`) counts as a sign change.
/// Either `f` or `g` can be a constant level.
pub fn intersect<'a, 'b, F, G>(f: F, g: G) -> Result<Vec<usize>>
where
    F: Into<Level<'a>>,
    G: Into<Level<'b>>,
{
    let (f, g) = (f.into(), g.into());
    let n = match (f.len(), g.len()) {
        (Some(nf), Some(ng)) if nf != ng => return Err(GeometryError::ShapeMismatch(nf, ng)),
        (Some(n), _) | (None, Some(n)) => n,
        (None, None) => return Ok(vec![]),
    };
    let signs: Vec<f64> = (0..n).map(|i| sign(f.at(i) - g.at(i))).collect();
    Ok(signs
        .windows(2)
        .enumerate()
        .filter(|(_, s)| s[1] - s[0] != 0f64)
        .map(|(i, _)| i)
        .collect())
}

/// Gaussian profile with an offset: `a*exp(-0.5((x-x0)/sigma)^2)+z0`
pub fn gauss(x: f64, a: f64, sigma: f64, x0: f64, z0: f64) -> f64 {
    let y = (x - x0) / sigma;
    a * (-0.5 * y * y).exp() + z0
}

/// Weighted moment of order `n` of `data`
///
/// Returns the mean for `n=1`, the variance for `n=2` and the standardized moment otherwise.
/// The weights are normalized, uniform weights are used if none are given.
pub fn moment(data: &[f64], n: i32, weights: Option<&[f64]>) -> Result<f64> {
    let uniform;
    let weights = match weights {
        Some(w) if w.len() != data.len() => {
            return Err(GeometryError::ShapeMismatch(data.len(), w.len()))
        }
        Some(w) => w,
        None => {
            uniform = vec![1f64; data.len()];
            uniform.as_slice()
        }
    };
    let total: f64 = weights.iter().sum();
    let weighted_sum =
        |f: &dyn Fn(f64) -> f64| -> f64 { data.iter().zip(weights).map(|(&x, &w)| w / total * f(x)).sum() };
    let mean = weighted_sum(&|x| x);
    if n == 1 {
        return Ok(mean);
    }
    let var = weighted_sum(&|x| (x - mean).powi(2));
    if n == 2 {
        return Ok(var);
    }
    let std = var.sqrt();
    Ok(weighted_sum(&|x| ((x - mean) / std).powi(n)))
}
