use std::{fs, path::PathBuf, str::FromStr};

use ccd_reduction::{
    focus::{free_filename, render, to_csv},
    Alignment, CalibrationKind, Config, FrameReducer, NpzLoader, RawFrameLoader,
    ReferenceBuilder, ReferenceStore,
};
use structopt::StructOpt;

/// Reference frames to create
#[derive(Debug)]
enum Kind {
    One(CalibrationKind),
    All,
}
impl FromStr for Kind {
    type Err = strum::ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(Kind::All)
        } else {
            CalibrationKind::from_str(s).map(Kind::One)
        }
    }
}

#[derive(Debug, StructOpt)]
#[structopt(name = "ccd-reduction", about = "CCD frame reduction and laser focus characterisation")]
enum Opt {
    /// Creates the master reference frames
    Master {
        /// Reference frame: bias, dark, flat or all
        #[structopt(short, long, default_value = "all")]
        kind: Kind,
        /// Raw calibration files folder, with bias, dark and flat sub-folders if kind is all
        #[structopt(short, long)]
        files: PathBuf,
        /// Master reference frames folder
        #[structopt(short, long)]
        master: PathBuf,
    },
    /// Reduces a raw file and prints the statistics of the reduced frames
    Reduce {
        /// Raw science file
        #[structopt(short, long)]
        file: PathBuf,
        /// Master reference frames folder, default to the parent folder of the file
        #[structopt(short, long)]
        master: Option<PathBuf>,
    },
    /// Characterises the focus of a laser from a folder of raw files
    Focus {
        /// Focus scan folder
        #[structopt(short, long)]
        folder: PathBuf,
        /// Master reference frames folder, default to the parent folder of the scan folder
        #[structopt(short, long)]
        master: Option<PathBuf>,
        /// Half width of the cube images [px]
        #[structopt(short, long, default_value = "150")]
        delta: usize,
        /// Camera pixel size [m]
        #[structopt(long, default_value = "9e-6")]
        pixel_size: f64,
        /// Magnification of the optics in front of the camera
        #[structopt(long, default_value = "100")]
        magnification: f64,
        /// Centers each image on its own brightest pixel
        #[structopt(long)]
        realign: bool,
        /// Saves the report in the scan folder
        #[structopt(short, long)]
        save: bool,
        /// Exports the report to a CSV file
        #[structopt(long)]
        csv: Option<PathBuf>,
        /// Reference intensity for the focal fraction [counts/s/m^2]
        #[structopt(long, default_value = "5.88052e9")]
        i0: f64,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    log::debug!("{:?}", opt);

    match opt {
        Opt::Master {
            kind,
            files,
            master,
        } => {
            let builder = ReferenceBuilder::new(NpzLoader, ReferenceStore::new(master));
            match kind {
                Kind::One(kind) => {
                    let reference = builder.create(kind, &files)?;
                    println!(
                        "{}: {} frames of shape {:?}",
                        kind.master(),
                        reference.len(),
                        reference.shape()
                    );
                }
                Kind::All => {
                    builder.create_all([files.join("bias"), files.join("dark"), files.join("flat")])?;
                    println!(
                        "Reference frames saved in {:?}",
                        builder.store().master_path()
                    );
                }
            }
        }
        Opt::Reduce { file, master } => {
            let mut config = Config::default();
            if let Some(master) = master {
                config = config.master_path(master);
            }
            let reducer = FrameReducer::from_store(&config.store(&file))?;
            let data = reducer.reduce(&NpzLoader.load(&file)?)?;
            let (medians, maximums, minimums, means, variances) = (
                data.medians(),
                data.maximums(),
                data.minimums(),
                data.moment(1),
                data.moment(2),
            );
            println!(
                "{:>5} {:>12} {:>12} {:>12} {:>12} {:>12}",
                "frame", "median", "min", "max", "mean", "variance"
            );
            for i in 0..data.len() {
                println!(
                    "{:>5} {:>12.3} {:>12.3} {:>12.3} {:>12.3} {:>12.3}",
                    i, medians[i], minimums[i], maximums[i], means[i], variances[i]
                );
            }
        }
        Opt::Focus {
            folder,
            master,
            delta,
            pixel_size,
            magnification,
            realign,
            save,
            csv,
            i0,
        } => {
            let mut config = Config::default()
                .delta(delta)
                .pixel_size(pixel_size)
                .magnification(magnification)
                .i0(i0);
            if realign {
                config = config.alignment(Alignment::PerFile);
            }
            if let Some(master) = master {
                config = config.master_path(master);
            }
            let focus = config.load_focus(&folder, &NpzLoader)?;
            let reports = focus.characterise()?;
            let text = render(&reports);
            println!("{}", text);
            if save {
                let path = free_filename(&folder, "Characteristics_focus", "txt");
                fs::write(&path, &text)?;
                log::info!("Report saved to {:?}", path);
            }
            if let Some(path) = csv {
                to_csv(&reports, path)?;
            }
            for (i, fraction) in focus.focal_fraction(i0)?.iter().enumerate() {
                println!("CCD {}: omega = {}", i, fraction.omega);
                println!("focal fractions: {:?}", fraction.fractions);
            }
        }
    }

    Ok(())
}
