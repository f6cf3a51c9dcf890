use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;

use crate::config::default_data_extensions;
use crate::error::ReductionError;

/// Locates data, calibration and mapping files from a name hint.
pub trait FileResolver {
    fn find_file(&self, hint: &str) -> Result<Utf8PathBuf, ReductionError>;

    /// Run files may be found under an extension other than the hinted one;
    /// the first entry is the preferred match.
    fn find_runs(&self, hint: &str) -> Result<Vec<Utf8PathBuf>, ReductionError>;
}

/// Searches an ordered list of directories. File names are compared
/// case-insensitively, as instrument data archives mix `MAR11001.RAW` and
/// `mar11001.raw`.
#[derive(Debug, Clone)]
pub struct SearchPathResolver {
    dirs: Vec<Utf8PathBuf>,
    data_extensions: Vec<String>,
}

impl SearchPathResolver {
    pub fn new(dirs: Vec<Utf8PathBuf>) -> Self {
        Self {
            dirs,
            data_extensions: default_data_extensions(),
        }
    }

    /// Current directory followed by the per-user data directory.
    pub fn with_default_dirs() -> Result<Self, ReductionError> {
        let cwd =
            std::env::current_dir().map_err(|err| ReductionError::Filesystem(err.to_string()))?;
        let cwd = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| ReductionError::Filesystem("invalid working directory".to_string()))?;
        let mut dirs = vec![cwd];
        if let Some(data_dir) = ProjectDirs::from("org", "direct-runs", "direct-runs")
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.data_dir().to_path_buf()).ok())
        {
            dirs.push(data_dir);
        }
        Ok(Self::new(dirs))
    }

    pub fn with_data_extensions(mut self, extensions: Vec<String>) -> Self {
        self.data_extensions = extensions;
        self
    }

    pub fn add_dir(&mut self, dir: Utf8PathBuf) {
        self.dirs.push(dir);
    }

    pub fn dirs(&self) -> &[Utf8PathBuf] {
        &self.dirs
    }

    fn locate(&self, hint: &str) -> Option<Utf8PathBuf> {
        let path = Utf8Path::new(hint);
        if path.as_std_path().is_file() {
            return Some(path.to_path_buf());
        }
        let file_name = path.file_name()?;
        self.dirs
            .iter()
            .find_map(|dir| lookup_in_dir(dir, file_name))
    }
}

impl FileResolver for SearchPathResolver {
    fn find_file(&self, hint: &str) -> Result<Utf8PathBuf, ReductionError> {
        self.locate(hint).ok_or_else(|| {
            ReductionError::FileNotFound(format!(
                "can not find file {hint} on the current search paths"
            ))
        })
    }

    fn find_runs(&self, hint: &str) -> Result<Vec<Utf8PathBuf>, ReductionError> {
        if let Some(found) = self.locate(hint) {
            return Ok(vec![found]);
        }
        let path = Utf8Path::new(hint);
        let stem = match path.extension() {
            Some(ext) => &hint[..hint.len() - ext.len() - 1],
            None => hint,
        };
        let found = self
            .data_extensions
            .iter()
            .filter_map(|ext| self.locate(&format!("{stem}{ext}")))
            .collect::<Vec<_>>();
        if found.is_empty() {
            return Err(ReductionError::FileNotFound(format!(
                "can not find run file matching {hint} on the current search paths"
            )));
        }
        Ok(found)
    }
}

fn lookup_in_dir(dir: &Utf8Path, file_name: &str) -> Option<Utf8PathBuf> {
    let exact = dir.join(file_name);
    if exact.as_std_path().is_file() {
        return Some(exact);
    }
    let wanted = file_name.to_lowercase();
    let entries = fs::read_dir(dir.as_std_path()).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.to_lowercase() == wanted && entry.path().is_file() {
            return Some(dir.join(name));
        }
    }
    None
}
