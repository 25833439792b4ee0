use ndarray::Array2;

use super::Measurement;

/// Median of `values`, the mean of the 2 central values for an even number of values
///
/// The slice is reordered in place. Returns NaN for an empty slice or if any value is NaN.
pub(crate) fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 || values.iter().any(|x| x.is_nan()) {
        return f64::NAN;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// Median of all the pixels of a frame
pub(crate) fn frame_median(frame: &Array2<f64>) -> f64 {
    let mut values: Vec<f64> = frame.iter().cloned().collect();
    median(&mut values)
}

impl Measurement {
    /// The median of each frame
    pub fn medians(&self) -> Vec<f64> {
        self.frames.iter().map(frame_median).collect()
    }
    /// The maximum of each frame
    pub fn maximums(&self) -> Vec<f64> {
        self.frames
            .iter()
            .map(|frame| frame.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
            .collect()
    }
    /// The minimum of each frame
    pub fn minimums(&self) -> Vec<f64> {
        self.frames
            .iter()
            .map(|frame| frame.iter().cloned().fold(f64::INFINITY, f64::min))
            .collect()
    }
    /// The normalized central moment of order `m` of each frame
    ///
    /// Returns the mean for `m=1` and the variance for `m=2`.
    /// For any other order, the moment of the frame standardized to zero mean and
    /// unit variance, or NaN if the variance is 0.
    pub fn moment(&self, m: i32) -> Vec<f64> {
        self.frames
            .iter()
            .map(|frame| {
                let n = frame.len() as f64;
                let mean = frame.sum() / n;
                let var = frame.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
                match m {
                    1 => mean,
                    2 => var,
                    _ if var != 0f64 => {
                        let std = var.sqrt();
                        frame.iter().map(|x| ((x - mean) / std).powi(m)).sum::<f64>() / n
                    }
                    _ => f64::NAN,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn single() -> Measurement {
        Measurement::anonymous(vec![array![[1., 1.], [1., 4.]]], vec![1.]).unwrap()
    }
    fn double() -> Measurement {
        Measurement::anonymous(vec![array![[1., 1.], [1., 4.]], array![[2., 3.]]], vec![1., 5.3])
            .unwrap()
    }

    #[test]
    fn medians() {
        assert_eq!(single().medians(), vec![1.]);
        assert_eq!(double().medians(), vec![1., 2.5]);
        assert_eq!(median(&mut [5., 1., 3.]), 3.);
    }

    #[test]
    fn nan_median() {
        assert!(median(&mut [5., f64::NAN, 1., 3., 2.]).is_nan());
        assert!(median(&mut []).is_nan());
        let m = Measurement::anonymous(vec![array![[1., f64::NAN], [1., 4.]]], vec![1.]).unwrap();
        assert!(m.medians()[0].is_nan());
    }

    #[test]
    fn extrema() {
        assert_eq!(double().maximums(), vec![4., 3.]);
        assert_eq!(double().minimums(), vec![1., 2.]);
    }

    #[test]
    fn moments() {
        let var1 = 3. / 4. * (1f64 - 7. / 4.).powi(2) + (4f64 - 7. / 4.).powi(2) / 4.;
        assert_eq!(single().moment(0), vec![1.]);
        assert_eq!(single().moment(1), vec![7. / 4.]);
        assert_abs_diff_eq!(single().moment(2)[0], var1, epsilon = 1e-12);
        let m = double();
        assert_eq!(m.moment(1), vec![7. / 4., 2.5]);
        assert_abs_diff_eq!(m.moment(2)[1], 0.25, epsilon = 1e-12);
        // a symmetric 2-point distribution has no skew and a kurtosis of 1
        assert_abs_diff_eq!(m.moment(3)[1], 0., epsilon = 1e-12);
        assert_abs_diff_eq!(m.moment(4)[1], 1., epsilon = 1e-12);
    }

    #[test]
    fn flat_frame_moment_is_nan() {
        let m = Measurement::anonymous(vec![Array2::from_elem((3, 3), 7.)], vec![1.]).unwrap();
        assert!(m.moment(3)[0].is_nan());
        assert_eq!(m.moment(2), vec![0.]);
    }
}
