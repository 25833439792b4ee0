use std::{
    f64::consts::PI,
    fmt,
    path::{Path, PathBuf},
};

/// Focus characteristics of one cube
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamReport {
    /// Power within the mean waist [counts/s], -1 if the waist is too large
    pub power: f64,
    /// Area of the aperture [m^2], -1 if the waist is too large
    pub area: f64,
    /// Axial, x and y waists [m]
    pub waists: (f64, f64, f64),
    /// Rayleigh ranges [m] before and after the focal plane
    pub rayleigh: (f64, f64),
}
impl BeamReport {
    /// Mean of the x and y waists [m]
    pub fn mean_waist(&self) -> f64 {
        0.5 * (self.waists.1 + self.waists.2)
    }
    /// Area of the disk of radius the mean waist [m^2]
    pub fn circle(&self) -> f64 {
        PI * self.mean_waist().powi(2)
    }
}
impl fmt::Display for BeamReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (z_waist, x_waist, y_waist) = self.waists;
        writeln!(
            f,
            "Total power: {} counts in area {} m^2",
            self.power, self.area
        )?;
        writeln!(
            f,
            "x-waist: {} m, y-waist: {} m, mean: {} m",
            x_waist,
            y_waist,
            self.mean_waist()
        )?;
        writeln!(
            f,
            "Perfect circle: {} m^2, area/circle: {}",
            self.circle(),
            self.area / self.circle()
        )?;
        writeln!(
            f,
            "The Rayleigh ranges: {}, {} m",
            self.rayleigh.0, self.rayleigh.1
        )?;
        writeln!(f, "z-waist: {} m", z_waist)
    }
}

/// Renders the reports of all the cubes
pub fn render(reports: &[BeamReport]) -> String {
    reports
        .iter()
        .enumerate()
        .map(|(i, report)| format!("CCD {}:\n{}\n", i, report))
        .collect()
}

/// Saves the reports of all the cubes into a CSV file
pub fn to_csv<P: AsRef<Path>>(reports: &[BeamReport], path: P) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "CCD",
        "Power [counts/s]",
        "Area [m^2]",
        "z-waist [m]",
        "x-waist [m]",
        "y-waist [m]",
        "Rayleigh range 1 [m]",
        "Rayleigh range 2 [m]",
    ])?;
    for (i, report) in reports.iter().enumerate() {
        let (z_waist, x_waist, y_waist) = report.waists;
        wtr.write_record(
            [
                i as f64,
                report.power,
                report.area,
                z_waist,
                x_waist,
                y_waist,
                report.rayleigh.0,
                report.rayleigh.1,
            ]
            .iter()
            .map(|x| format!("{}", x)),
        )?;
    }
    wtr.flush()?;
    Ok(())
}

/// The first `stem.ext`, `stem(1).ext`, `stem(2).ext`, ... that does not exist yet in `dir`
pub fn free_filename<P: AsRef<Path>>(dir: P, stem: &str, ext: &str) -> PathBuf {
    let dir = dir.as_ref();
    let path = dir.join(format!("{}.{}", stem, ext));
    if !path.exists() {
        return path;
    }
    (1..)
        .map(|i| dir.join(format!("{}({}).{}", stem, i, ext)))
        .find(|path| !path.exists())
        .unwrap_or(path)
}

/// Fraction of the power in the focal spot of one cube
#[derive(Debug, Clone, PartialEq)]
pub struct FocalFraction {
    /// Focal spot intensity normalized by the reference intensity
    pub omega: f64,
    /// Focal power over the total power at each axial position
    pub fractions: Vec<f64>,
}
