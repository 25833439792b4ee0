//! Laser spot photometry
//!
//! Locates the laser spot in reduced frames, integrates its power within circular
//! apertures and computes the transmissivity of a lens from frames taken with and
//! without the lens in the beam.

use ndarray::{Array2, ArrayView2};

use crate::{geometry::aperturized, measurement::Measurement};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum LaserError {
    #[error("expected {expected} {what}, found {found}")]
    Length {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}
type Result<T> = std::result::Result<T, LaserError>;

fn check_length(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        Err(LaserError::Length {
            what,
            expected,
            found,
        })
    } else {
        Ok(())
    }
}

/// (row, column) of the first brightest pixel of a frame
pub fn argmax(frame: ArrayView2<f64>) -> (usize, usize) {
    frame
        .indexed_iter()
        .fold(((0, 0), f64::NEG_INFINITY), |(idx_max, max), (idx, &value)| {
            if value > max {
                (idx, value)
            } else {
                (idx_max, max)
            }
        })
        .0
}

/// (row, column) of the laser spot, i.e. the first brightest pixel, in every frame
pub fn find_laser(data: &Measurement) -> Vec<(usize, usize)> {
    data.frames().iter().map(|frame| argmax(frame.view())).collect()
}

/// Distance in pixels from `position` (row, column) to the closest edge of a frame of a given `shape`
pub fn smallest_distance_to_edge(position: (usize, usize), shape: (usize, usize)) -> usize {
    let (row, col) = position;
    let (rows, cols) = shape;
    col.min(cols.saturating_sub(col))
        .min(row.min(rows.saturating_sub(row)))
}

fn enclosed(frame: &Array2<f64>, center: (f64, f64), radius: f64) -> f64 {
    (frame * &aperturized(frame.dim(), center, radius, false)).sum()
}

fn as_center((row, col): (usize, usize)) -> (f64, f64) {
    (row as f64, col as f64)
}

/// Power within a circular aperture of a given `radius` in every frame
///
/// The apertures are centered on `positions` (row, column) or on the laser spots if none are given.
pub fn power_within_area(
    data: &Measurement,
    radius: f64,
    positions: Option<&[(usize, usize)]>,
) -> Result<Vec<f64>> {
    let lasers;
    let positions = match positions {
        Some(positions) => {
            check_length("positions", data.len(), positions.len())?;
            positions
        }
        None => {
            lasers = find_laser(data);
            lasers.as_slice()
        }
    };
    let distance = positions
        .iter()
        .zip(data.shape())
        .map(|(&position, shape)| smallest_distance_to_edge(position, shape))
        .min()
        .unwrap_or_default();
    if radius + 0.5 >= distance as f64 {
        log::warn!(
            "part of the aperture (radius: {}px) lies outside of the frame ({}px from the edge)",
            radius,
            distance
        );
    }
    Ok(data
        .frames()
        .iter()
        .zip(positions)
        .map(|(frame, &position)| enclosed(frame, as_center(position), radius))
        .collect())
}

/// Fraction of the total power of a frame enclosed within an aperture centered on the laser
///
/// For every frame, the fractions are given for all the integer radii from 0 to the
/// distance between the laser spot and the closest edge.
pub fn cumulative_power_fraction(data: &Measurement) -> Vec<Vec<f64>> {
    data.frames()
        .iter()
        .zip(find_laser(data))
        .map(|(frame, position)| {
            let total = frame.sum();
            let distance = smallest_distance_to_edge(position, frame.dim());
            (0..distance)
                .map(|radius| enclosed(frame, as_center(position), radius as f64) / total)
                .collect()
        })
        .collect()
}

/// Transmissivity of a lens in the back focal plane
///
/// The ratio of the power with the lens over the power without the lens, both integrated
/// over circular apertures of radii `radii` centered on `centers` (row, column).
/// The frames are expected to be reduced and normalized to counts/s.
pub fn transmissivity(
    lens: &Measurement,
    no_lens: &Measurement,
    centers: &[(f64, f64)],
    radii: &[f64],
) -> Result<Vec<f64>> {
    check_length("frames without lens", lens.len(), no_lens.len())?;
    check_length("aperture centers", lens.len(), centers.len())?;
    check_length("aperture radii", lens.len(), radii.len())?;
    Ok(lens
        .frames()
        .iter()
        .zip(no_lens.frames())
        .zip(centers.iter().zip(radii))
        .map(|((lens, no_lens), (&center, &radius))| {
            enclosed(lens, center, radius) / enclosed(no_lens, center, radius)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn spot(shape: (usize, usize), center: (usize, usize)) -> Array2<f64> {
        let mut frame = Array2::from_elem(shape, 1.);
        frame[center] = 100.;
        frame
    }

    #[test]
    fn laser_location() {
        let data = Measurement::anonymous(
            vec![spot((20, 30), (5, 12)), spot((10, 10), (7, 2))],
            vec![1., 1.],
        )
        .unwrap();
        assert_eq!(find_laser(&data), vec![(5, 12), (7, 2)]);
        let mut tie = Array2::zeros((3, 3));
        tie[[1, 2]] = 1.;
        tie[[2, 0]] = 1.;
        assert_eq!(argmax(tie.view()), (1, 2));
    }

    #[test]
    fn edge_distance() {
        assert_eq!(smallest_distance_to_edge((5, 12), (20, 30)), 5);
        assert_eq!(smallest_distance_to_edge((10, 28), (20, 30)), 2);
        assert_eq!(smallest_distance_to_edge((10, 10), (20, 30)), 10);
    }

    #[test]
    fn aperture_power() {
        let data = Measurement::anonymous(vec![spot((41, 41), (20, 20))], vec![1.]).unwrap();
        // only half of the central pixel lies within the aperture edge
        let power = power_within_area(&data, 0.4, None).unwrap();
        assert_eq!(power, vec![50.]);
        let power = power_within_area(&data, 10., Some(&[(20, 20)])).unwrap();
        let weights = aperturized((41, 41), (20., 20.), 10., false).sum();
        assert_abs_diff_eq!(power[0], 99. + weights, epsilon = 1e-9);
        assert_eq!(
            power_within_area(&data, 10., Some(&[])),
            Err(LaserError::Length {
                what: "positions",
                expected: 1,
                found: 0
            })
        );
    }

    #[test]
    fn cumulative_fraction() {
        let mut frame = Array2::zeros((21, 31));
        frame[[10, 15]] = 3.;
        frame[[10, 17]] = 1.;
        let data = Measurement::anonymous(vec![frame], vec![1.]).unwrap();
        let fractions = cumulative_power_fraction(&data);
        assert_eq!(fractions[0].len(), 10);
        assert_eq!(fractions[0][0], 0.375);
        assert_eq!(fractions[0][1], 0.75);
        assert_abs_diff_eq!(fractions[0][2], 0.875, epsilon = 1e-12);
        assert_eq!(fractions[0][9], 1.);
    }

    #[test]
    fn lens_transmissivity() {
        let no_lens =
            Measurement::anonymous(vec![Array2::from_elem((50, 50), 4.); 2], vec![1., 1.]).unwrap();
        let lens = no_lens.multiply(&vec![0.5, 0.9]).unwrap();
        let t = transmissivity(&lens, &no_lens, &[(25., 25.), (20., 30.)], &[10., 5.]).unwrap();
        assert_abs_diff_eq!(t[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(t[1], 0.9, epsilon = 1e-12);
        assert!(matches!(
            transmissivity(&lens, &no_lens, &[(25., 25.)], &[10., 5.]),
            Err(LaserError::Length { .. })
        ));
    }
}
