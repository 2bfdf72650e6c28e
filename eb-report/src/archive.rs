//! Filesystem session source over an archive of capture folders.
//!
//! Each sub-directory of the archive root is one session, named after the
//! capture's start time, so name order is chronological.
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use eb_telemetry::constants::{LOG_FILE_EXTENSION, LOG_FILE_PREFIX, POSITIONS_FILE_NAME};
use eb_telemetry::{SampleLoad, SessionSource, read_samples};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive root {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read position table {}", path.display())]
    Positions {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl ArchiveError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveSource {
    root: PathBuf,
}

impl ArchiveSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, session: &str) -> PathBuf {
        self.root.join(session)
    }

    /// Log fragments of a session folder, in file-name order.
    fn log_files(dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(|err| ArchiveError::io(dir, err))? {
            let path = entry.map_err(|err| ArchiveError::io(dir, err))?.path();
            if path.is_file() && is_log_fragment(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn is_log_fragment(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
    let extension_matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(LOG_FILE_EXTENSION));
    name_matches && extension_matches
}

impl SessionSource for ArchiveSource {
    type Error = ArchiveError;

    fn sessions(&self) -> Result<Vec<String>, Self::Error> {
        if !self.root.is_dir() {
            return Err(ArchiveError::NotADirectory {
                path: self.root.clone(),
            });
        }
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|err| ArchiveError::io(&self.root, err))? {
            let entry = entry.map_err(|err| ArchiveError::io(&self.root, err))?;
            if !entry.path().is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => sessions.push(name),
                Err(name) => log::warn!("skipping non-UTF-8 session folder {name:?}"),
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    fn load_positions(&self, session: &str) -> Result<Option<SampleLoad>, Self::Error> {
        let path = self.session_dir(session).join(POSITIONS_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let file = File::open(&path).map_err(|err| ArchiveError::io(&path, err))?;
        let load = read_samples(BufReader::new(file))
            .map_err(|source| ArchiveError::Positions {
                path: path.clone(),
                source,
            })?;
        if load.stats.skipped > 0 {
            log::debug!(
                "{}: skipped {} of {} rows",
                path.display(),
                load.stats.skipped,
                load.stats.rows
            );
        }
        Ok(Some(load))
    }

    fn load_logs(&self, session: &str) -> Result<Option<Vec<String>>, Self::Error> {
        let files = Self::log_files(&self.session_dir(session))?;
        if files.is_empty() {
            return Ok(None);
        }
        let mut fragments = Vec::with_capacity(files.len());
        for path in files {
            let bytes = fs::read(&path).map_err(|err| ArchiveError::io(&path, err))?;
            fragments.push(String::from_utf8_lossy(&bytes).into_owned());
        }
        Ok(Some(fragments))
    }
}
