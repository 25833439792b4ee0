use std::{
    fs::{self, File},
    io::{BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use serde_pickle as pkl;
use tempfile::NamedTempFile;

use super::{CalibrationError, CalibrationKind, Result};
use crate::measurement::Measurement;

/// Persistence of the master reference frames
///
/// Each kind is saved in its own pickle file `master_<kind>.pkl` within the master folder.
#[derive(Debug, Clone)]
pub struct ReferenceStore {
    master_path: PathBuf,
}
impl ReferenceStore {
    pub fn new<P: AsRef<Path>>(master_path: P) -> Self {
        Self {
            master_path: master_path.as_ref().to_path_buf(),
        }
    }
    pub fn master_path(&self) -> &Path {
        &self.master_path
    }
    /// Path to the reference frame file of a given kind
    pub fn path(&self, kind: CalibrationKind) -> PathBuf {
        self.master_path.join(kind.master()).with_extension("pkl")
    }
    /// Saves a reference frame, replacing any previous one
    ///
    /// The frame is written to a temporary file first, then moved over the previous one.
    pub fn save(&self, kind: CalibrationKind, reference: &Measurement) -> Result<()> {
        let io = |e| CalibrationError::Io(e, self.master_path.clone());
        fs::create_dir_all(&self.master_path).map_err(io)?;
        let mut file = NamedTempFile::new_in(&self.master_path).map_err(io)?;
        pkl::to_writer(&mut file, reference, Default::default())?;
        file.flush().map_err(io)?;
        file.persist(self.path(kind))?;
        log::info!("{} saved to {:?}", kind.master(), self.path(kind));
        Ok(())
    }
    /// Loads a reference frame, returns `None` if it has not been created yet
    pub fn load(&self, kind: CalibrationKind) -> Result<Option<Measurement>> {
        let path = self.path(kind);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("{:?} not found", path);
                return Ok(None);
            }
            Err(e) => return Err(CalibrationError::Io(e, path)),
        };
        let now = Instant::now();
        let reference = pkl::from_reader(BufReader::new(file), Default::default())?;
        log::info!("{:?} loaded in {}ms", path, now.elapsed().as_millis());
        Ok(Some(reference))
    }
}
