//! Laser focus characterisation
//!
//! The focus of a laser beam is characterised from a [BeamCube]: a stack of images
//! of the beam at consecutive axial positions, each image centered on the beam axis.
//!
//! For each cube, the waists are the half widths of the beam at `1/e^2` of the peak
//! intensity along the x, y and axial directions at the focal plane.
//! The power is integrated within a circular aperture of the radius of the mean x and y waists
//! and the Rayleigh ranges are the distances from the focal plane where the beam
//! waist is `sqrt(2)` times the waist at the focal plane.

use std::f64::consts::SQRT_2;

use ndarray::{s, Array3, ArrayView1, ArrayView2, Axis};

use crate::{
    cube::BeamCube,
    geometry::{aperturized, extender, intersect, GeometryError, EXTENSION},
    measurement::frame_median,
};

mod report;
pub use report::{free_filename, render, to_csv, BeamReport, FocalFraction};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FocusError {
    #[error("profile analysis failed")]
    Geometry(#[from] GeometryError),
    #[error("expected a cube of shape {expected:?}, found {found:?}")]
    CubeShape {
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },
    #[error("the focus scan has no axial position")]
    EmptyScan,
}
type Result<T> = std::result::Result<T, FocusError>;

/// `1/e^2`
pub fn e2() -> f64 {
    (-2f64).exp()
}

/// Beam waist: half the distance between the outermost crossings of a profile with a given height
///
/// The profile and its coordinates are linearly up-sampled before looking for the crossings.
/// If the profile never crosses the height, the waist is half of the coordinates range.
/// Returns the waist and the coordinates of the crossings.
pub fn find_waist(profile: &[f64], x: &[f64], height: f64) -> Result<(f64, (f64, f64))> {
    if profile.len() != x.len() {
        return Err(GeometryError::ShapeMismatch(profile.len(), x.len()).into());
    }
    let (extended_x, extended) = (extender(x, EXTENSION), extender(profile, EXTENSION));
    let idx = intersect(&extended, height)?;
    match (idx.first(), idx.last()) {
        (Some(&first), Some(&last)) => {
            let (a, b) = (extended_x[first], extended_x[last]);
            Ok(((b - a) / 2f64, (a, b)))
        }
        _ => {
            log::warn!("no waist found at height {}", height);
            let (a, b) = (
                x.first().cloned().unwrap_or_default(),
                x.last().cloned().unwrap_or_default(),
            );
            Ok(((b - a) / 2f64, (a, b)))
        }
    }
}

/// Axial index of the peak intensity along the beam axis
pub fn axial_peak(axial_profile: ArrayView1<f64>) -> usize {
    axial_profile
        .indexed_iter()
        .fold((0, f64::NEG_INFINITY), |(i_max, max), (i, &value)| {
            if value > max {
                (i, value)
            } else {
                (i_max, max)
            }
        })
        .0
}

/// A laser focus sampled at consecutive axial positions
#[derive(Debug, Clone)]
pub struct Focus {
    cubes: Vec<Array3<f64>>,
    z: Vec<f64>,
    delta: usize,
    pixel_size: f64,
}
impl Focus {
    /// Creates a new focus from cubes of shape `(z.len(), 2*delta+1, 2*delta+1)`
    ///
    /// `z` must hold at least one axial position.
    /// `z` are the axial positions [m] and `pixel_size` is the size of a pixel in the focal plane [m].
    pub fn new(cubes: Vec<Array3<f64>>, z: Vec<f64>, delta: usize, pixel_size: f64) -> Result<Self> {
        if z.is_empty() {
            return Err(FocusError::EmptyScan);
        }
        let expected = (z.len(), 2 * delta + 1, 2 * delta + 1);
        if let Some(cube) = cubes.iter().find(|cube| cube.dim() != expected) {
            return Err(FocusError::CubeShape {
                expected,
                found: cube.dim(),
            });
        }
        Ok(Self {
            cubes,
            z,
            delta,
            pixel_size,
        })
    }
    /// Creates a new focus from a reduced focus scan
    pub fn from_beam(beam: BeamCube, delta: usize, pixel_size: f64) -> Result<Self> {
        Self::new(beam.cubes, beam.z, delta, pixel_size)
    }
    pub fn cubes(&self) -> &[Array3<f64>] {
        &self.cubes
    }
    pub fn z(&self) -> &[f64] {
        &self.z
    }
    /// Coordinates [m] of the pixels across the beam, centered on the beam axis
    pub fn x(&self) -> Vec<f64> {
        let delta = self.delta as f64;
        (0..=2 * self.delta)
            .map(|i| (i as f64 - delta) * self.pixel_size)
            .collect()
    }
    fn axial_profile<'a>(&self, cube: &'a Array3<f64>) -> ArrayView1<'a, f64> {
        cube.slice(s![.., self.delta, self.delta])
    }
    fn x_profile(&self, image: ArrayView2<f64>) -> Vec<f64> {
        image.row(self.delta).to_vec()
    }
    fn y_profile(&self, image: ArrayView2<f64>) -> Vec<f64> {
        image.column(self.delta).to_vec()
    }
    /// Mean of the x and y waists of an image at a given height
    fn mean_waist(&self, image: ArrayView2<f64>, height: f64) -> Result<f64> {
        let x = self.x();
        let (x_waist, _) = find_waist(&self.x_profile(image), &x, height)?;
        let (y_waist, _) = find_waist(&self.y_profile(image), &x, height)?;
        Ok(0.5 * (x_waist + y_waist))
    }
    /// Power and area [m^2] within a circular aperture of radius `waist` [m] centered on the beam axis
    ///
    /// The median of the image is removed first.
    /// If the aperture does not fit in the image, both the power and the area are set to -1.
    pub fn focal_power(&self, image: ArrayView2<f64>, waist: f64) -> (f64, f64) {
        let radius = waist / self.pixel_size;
        if radius >= self.delta as f64 {
            log::warn!(
                "aperture radius ({:.1}px) is larger than the image half width ({}px)",
                radius,
                self.delta
            );
            return (-1f64, -1f64);
        }
        let background = frame_median(&image.to_owned());
        let center = (self.delta as f64, self.delta as f64);
        let mask = aperturized(image.dim(), center, radius, false);
        let power = (&image - background)
            .iter()
            .zip(mask.iter())
            .map(|(x, w)| x * w)
            .sum();
        let area = self.pixel_size.powi(2) * mask.sum();
        (power, area)
    }
    /// Rayleigh ranges [m] on both sides of the focal plane at axial index `z0`
    ///
    /// The waist at each axial position is the mean of the x and y waists at `1/e^2` of the
    /// intensity on the beam axis at that position.
    /// If the waist never reaches `sqrt(2)` times the focal plane waist, the distances to the
    /// ends of the scan are returned.
    pub fn rayleigh_range(&self, cube: &Array3<f64>, z0: usize) -> Result<(f64, f64)> {
        let waists = cube
            .axis_iter(Axis(0))
            .map(|image| {
                let height = image[[self.delta, self.delta]] * e2();
                self.mean_waist(image, height)
            })
            .collect::<Result<Vec<f64>>>()?;
        let z: Vec<f64> = self.z.iter().map(|z| z - self.z[z0]).collect();
        let (extended_w, extended_z) = (extender(&waists, EXTENSION), extender(&z, EXTENSION));
        let idx = intersect(&extended_w, SQRT_2 * waists[z0])?;
        match (idx.first(), idx.last()) {
            (Some(&first), Some(&last)) => {
                Ok((extended_z[first].abs(), extended_z[last].abs()))
            }
            _ => {
                log::warn!("the beam waist never grows by sqrt(2), the Rayleigh ranges are the scan extents");
                Ok((
                    z.first().map(|z| z.abs()).unwrap_or_default(),
                    z.last().map(|z| z.abs()).unwrap_or_default(),
                ))
            }
        }
    }
    /// Characterises the focus of a single cube
    pub fn characterise_cube(&self, cube: &Array3<f64>) -> Result<BeamReport> {
        let axial_profile = self.axial_profile(cube);
        let z0 = axial_peak(axial_profile);
        let image = cube.index_axis(Axis(0), z0);
        let height = cube.iter().cloned().fold(f64::NEG_INFINITY, f64::max) * e2();

        let x = self.x();
        let (x_waist, _) = find_waist(&self.x_profile(image), &x, height)?;
        let (y_waist, _) = find_waist(&self.y_profile(image), &x, height)?;
        let z: Vec<f64> = self.z.iter().map(|z| z - self.z[z0]).collect();
        let (z_waist, _) = find_waist(&axial_profile.to_vec(), &z, height)?;
        let (power, area) = self.focal_power(image, 0.5 * (x_waist + y_waist));
        let rayleigh = self.rayleigh_range(cube, z0)?;
        Ok(BeamReport {
            power,
            area,
            waists: (z_waist, x_waist, y_waist),
            rayleigh,
        })
    }
    /// Characterises the focus of every cube
    pub fn characterise(&self) -> Result<Vec<BeamReport>> {
        self.cubes
            .iter()
            .map(|cube| self.characterise_cube(cube))
            .collect()
    }
    /// Fraction of the power in the focal spot
    ///
    /// For each cube, the focal power is integrated within the waist at `1/e^2` of the
    /// intensity at the center of the focal plane. The fraction of the focal power over
    /// the total power of the image at each axial position is returned together with
    /// the focal intensity normalized by the reference intensity `i0`.
    pub fn focal_fraction(&self, i0: f64) -> Result<Vec<FocalFraction>> {
        self.cubes
            .iter()
            .map(|cube| {
                let z0 = axial_peak(self.axial_profile(cube));
                let image = cube.index_axis(Axis(0), z0);
                let height = image[[self.delta, self.delta]] * e2();
                let waist = self.mean_waist(image, height)?;
                let (power, area) = self.focal_power(image, waist);
                let fractions = cube
                    .axis_iter(Axis(0))
                    .map(|image| power / image.sum())
                    .collect();
                Ok(FocalFraction {
                    omega: power / area / i0,
                    fractions,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::f64::consts::PI;

    #[test]
    fn waist_round_trip() {
        let spacing = 0.37;
        let w = 10. * spacing;
        let x: Vec<f64> = (-30..=30).map(|i| i as f64 * spacing).collect();
        let a = 2.5;
        let profile: Vec<f64> = x.iter().map(|x| a * (-2. * (x / w).powi(2)).exp()).collect();
        let (waist, (lower, upper)) = find_waist(&profile, &x, a * e2()).unwrap();
        let step = spacing / EXTENSION as f64;
        assert!((waist - w).abs() <= step + 1e-12);
        assert!(lower < 0. && upper > 0.);
    }

    #[test]
    fn no_waist() {
        let x = vec![-2., -1., 0., 1., 2.];
        let (waist, limits) = find_waist(&[1.; 5], &x, e2()).unwrap();
        assert_eq!(waist, 2.);
        assert_eq!(limits, (-2., 2.));
        assert!(find_waist(&[1.; 4], &x, e2()).is_err());
    }

    /// Gaussian beam with a waist `w0` at z=0 and a Rayleigh range `z_r`
    fn gaussian_beam(delta: usize, w0: f64, z_r: f64, z: &[f64]) -> Array3<f64> {
        let n = 2 * delta + 1;
        let c = delta as f64;
        Array3::from_shape_fn((z.len(), n, n), |(k, i, j)| {
            let w = w0 * (1. + (z[k] / z_r).powi(2)).sqrt();
            let r2 = (i as f64 - c).powi(2) + (j as f64 - c).powi(2);
            (w0 / w).powi(2) * (-2. * r2 / (w * w)).exp()
        })
    }

    #[test]
    fn synthetic_beam() {
        let (delta, w0, z_r) = (30, 10., 20.);
        let z: Vec<f64> = (-10..=10).map(|k| k as f64 * 5.).collect();
        let cube = gaussian_beam(delta, w0, z_r, &z);
        let focus = Focus::new(vec![cube], z, delta, 1.).unwrap();
        let reports = focus.characterise().unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        let (z_waist, x_waist, y_waist) = report.waists;
        assert_abs_diff_eq!(x_waist, w0, epsilon = 0.1);
        assert_abs_diff_eq!(y_waist, w0, epsilon = 0.1);
        // the axial profile never falls to 1/e^2 within the scan
        assert_eq!(z_waist, 50.);
        assert_abs_diff_eq!(report.rayleigh.0, z_r, epsilon = 1.);
        assert_abs_diff_eq!(report.rayleigh.1, z_r, epsilon = 1.);
        assert_relative_eq!(report.area, PI * w0 * w0, max_relative = 0.03);
        assert!(report.power > 0.);
    }

    #[test]
    fn oversized_aperture() {
        let z = vec![0.];
        let cube = gaussian_beam(5, 10., 20., &z);
        let focus = Focus::new(vec![cube], z, 5, 1.).unwrap();
        let report = focus.characterise_cube(&focus.cubes()[0]).unwrap();
        assert_eq!((report.power, report.area), (-1., -1.));
    }

    #[test]
    fn cube_shape() {
        let cube = Array3::<f64>::zeros((3, 5, 5));
        assert_eq!(
            Focus::new(vec![cube], vec![0., 1.], 2, 1.).unwrap_err(),
            FocusError::CubeShape {
                expected: (2, 5, 5),
                found: (3, 5, 5)
            }
        );
    }

    #[test]
    fn empty_scan() {
        assert_eq!(
            Focus::new(vec![Array3::zeros((0, 5, 5))], vec![], 2, 1.).unwrap_err(),
            FocusError::EmptyScan
        );
    }

    #[test]
    fn rayleigh_range_beyond_scan() {
        // collimated beam: the waist is the same at every axial position
        let (delta, w0) = (10, 4.);
        let z: Vec<f64> = (0..5).map(|k| k as f64 * 2.).collect();
        let n = 2 * delta + 1;
        let c = delta as f64;
        let cube = Array3::from_shape_fn((z.len(), n, n), |(_, i, j)| {
            let r2 = (i as f64 - c).powi(2) + (j as f64 - c).powi(2);
            (-2. * r2 / (w0 * w0)).exp()
        });
        let focus = Focus::new(vec![cube], z, delta, 1.).unwrap();
        let (before, after) = focus.rayleigh_range(&focus.cubes()[0], 2).unwrap();
        assert_eq!((before, after), (4., 4.));
        let (before, after) = focus.rayleigh_range(&focus.cubes()[0], 0).unwrap();
        assert_eq!((before, after), (0., 8.));
    }

    #[test]
    fn focal_fraction() {
        let (delta, w0, z_r) = (30, 10., 20.);
        let z: Vec<f64> = (-4..=4).map(|k| k as f64 * 5.).collect();
        let focus = Focus::new(vec![gaussian_beam(delta, w0, z_r, &z)], z, delta, 1.).unwrap();
        let fractions = focus.focal_fraction(1.).unwrap();
        let ff = &fractions[0];
        assert_eq!(ff.fractions.len(), 9);
        // about 1-1/e^2 of a Gaussian beam power is within its waist
        assert_abs_diff_eq!(ff.fractions[4], 1. - e2(), epsilon = 0.03);
        assert!(ff.fractions[0] > 0.9 * ff.fractions[4]);
        assert!(ff.omega > 0.);
    }
}
