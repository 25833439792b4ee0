//! Focus analysis configuration

use std::path::{Path, PathBuf};

use crate::{
    calibration::{RawFrameLoader, ReferenceStore},
    cube::{Alignment, BeamCube},
    focus::Focus,
    reducer::FrameReducer,
    Result,
};

/// Focus analysis configuration
///
/// ```no_run
/// use ccd_reduction::{Alignment, Config, NpzLoader};
///
/// let focus = Config::default()
///     .master_path("data/master")
///     .delta(100)
///     .alignment(Alignment::PerFile)
///     .load_focus("data/focus", &NpzLoader)?;
/// # Ok::<(), ccd_reduction::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) master_path: Option<PathBuf>,
    pub(crate) delta: usize,
    pub(crate) pixel_size: f64,
    pub(crate) magnification: f64,
    pub(crate) alignment: Alignment,
    pub(crate) i0: f64,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            master_path: None,
            delta: 150,
            pixel_size: 9e-6,
            magnification: 100f64,
            alignment: Alignment::Common,
            i0: 5.88052e9,
        }
    }
}
impl Config {
    /// Folder of the master reference frames, default to the parent folder of the raw files
    pub fn master_path<P: AsRef<Path>>(self, master_path: P) -> Self {
        Self {
            master_path: Some(master_path.as_ref().to_path_buf()),
            ..self
        }
    }
    /// Half width of the images in the cubes [px]
    pub fn delta(self, delta: usize) -> Self {
        Self { delta, ..self }
    }
    /// Camera pixel size [m]
    pub fn pixel_size(self, pixel_size: f64) -> Self {
        Self { pixel_size, ..self }
    }
    /// Magnification of the optics in front of the camera
    pub fn magnification(self, magnification: f64) -> Self {
        Self {
            magnification,
            ..self
        }
    }
    pub fn alignment(self, alignment: Alignment) -> Self {
        Self { alignment, ..self }
    }
    /// Reference intensity for the focal fraction [counts/s/m^2]
    pub fn i0(self, i0: f64) -> Self {
        Self { i0, ..self }
    }
    /// Pixel size in the focal plane [m]
    pub fn focal_plane_pixel_size(&self) -> f64 {
        self.pixel_size / self.magnification
    }
    /// The reference frames store, in the master folder or else in the parent folder of `raw`
    pub fn store<P: AsRef<Path>>(&self, raw: P) -> ReferenceStore {
        match &self.master_path {
            Some(path) => ReferenceStore::new(path),
            None => ReferenceStore::new(
                raw.as_ref()
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
            ),
        }
    }
    /// Reduces the raw files of a focus scan in `folder`
    pub fn load_focus<P: AsRef<Path>, L: RawFrameLoader>(
        &self,
        folder: P,
        loader: &L,
    ) -> Result<Focus> {
        let folder = folder.as_ref();
        let reducer = FrameReducer::from_store(&self.store(folder))?;
        let beam = BeamCube::from_folder(folder, loader, &reducer, self.delta, self.alignment)?;
        Ok(Focus::from_beam(
            beam,
            self.delta,
            self.focal_plane_pixel_size(),
        )?)
    }
}
