use std::path::PathBuf;

use ccd_reduction::{laser, Config, FrameReducer, NpzLoader};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "transmissivity",
    about = "Lens transmissivity in the back focal plane"
)]
struct Opt {
    /// Raw file with the lens
    #[structopt(long)]
    lens: PathBuf,
    /// Raw file without the lens
    #[structopt(long)]
    no_lens: PathBuf,
    /// Aperture center columns [px], one per frame
    #[structopt(short, long)]
    x: Vec<f64>,
    /// Aperture center rows [px], one per frame
    #[structopt(short, long)]
    y: Vec<f64>,
    /// Aperture radii [px], one per frame
    #[structopt(short, long)]
    r: Vec<f64>,
    /// Master reference frames folder, default to the parent folder of the lens file
    #[structopt(short, long)]
    master: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut config = Config::default();
    if let Some(master) = opt.master {
        config = config.master_path(master);
    }
    let reducer = FrameReducer::from_store(&config.store(&opt.lens))?;
    let lens = reducer.reduce_file(&NpzLoader, &opt.lens)?;
    let lens = lens.divide(lens.exposures())?;
    let no_lens = reducer.reduce_file(&NpzLoader, &opt.no_lens)?;
    let no_lens = no_lens.divide(no_lens.exposures())?;

    anyhow::ensure!(
        opt.x.len() == opt.y.len(),
        "expected as many x ({}) as y ({}) coordinates",
        opt.x.len(),
        opt.y.len()
    );
    let centers: Vec<(f64, f64)> = opt.y.iter().cloned().zip(opt.x.iter().cloned()).collect();
    let t = laser::transmissivity(&lens, &no_lens, &centers, &opt.r)?;
    for (i, t) in t.iter().enumerate() {
        println!("CCD {}: transmissivity = {:.4}", i, t);
    }

    Ok(())
}
