//! Named storage for message logs.
//!
//! A [`LogStore`] creates, opens, lists and deletes logs by name.
//! [`MemoryLogStore`] keeps logs in process memory and is cheap to clone;
//! clones share the same logs. [`DirLogStore`] keeps one `<name>.dlm` file
//! per log in a directory.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::error::LogError;

/// File extension of logs in a [`DirLogStore`].
pub const LOG_EXTENSION: &str = "dlm";

/// Whether `name` can name a log: non-empty, no path separators, not a
/// relative path component.
pub fn is_valid_log_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

fn check_name(name: &str) -> Result<(), LogError> {
    if is_valid_log_name(name) {
        Ok(())
    } else {
        Err(LogError::InvalidLogName {
            name: name.to_string(),
        })
    }
}

/// Storage for named logs.
pub trait LogStore: Send {
    /// Create (or truncate) the log `name` and return a writer for it.
    fn create(&mut self, name: &str) -> Result<Box<dyn Write + Send>, LogError>;

    /// Open the log `name` for reading.
    ///
    /// # Errors
    ///
    /// [`LogError::LogNotFound`] when no such log exists.
    fn open(&self, name: &str) -> Result<Box<dyn Read + Send>, LogError>;

    /// Names of the stored logs, sorted.
    fn list(&self) -> Result<Vec<String>, LogError>;

    /// Delete the log `name`. Returns whether it existed.
    fn delete(&mut self, name: &str) -> Result<bool, LogError>;

    /// Whether the log `name` exists.
    fn contains(&self, name: &str) -> Result<bool, LogError> {
        Ok(self.list()?.iter().any(|n| n == name))
    }
}

// ── MemoryLogStore ──────────────────────────────────────────────────

type Logs = Arc<Mutex<IndexMap<String, Vec<u8>>>>;

fn lock(logs: &Logs) -> MutexGuard<'_, IndexMap<String, Vec<u8>>> {
    logs.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory log store.
#[derive(Clone, Debug, Default)]
pub struct MemoryLogStore {
    logs: Logs,
}

impl MemoryLogStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes of log `name`.
    pub fn bytes(&self, name: &str) -> Option<Vec<u8>> {
        lock(&self.logs).get(name).cloned()
    }
}

/// Appends to one log of a [`MemoryLogStore`].
struct MemoryLogWriter {
    logs: Logs,
    name: String,
}

impl Write for MemoryLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match lock(&self.logs).get_mut(&self.name) {
            Some(log) => {
                log.extend_from_slice(buf);
                Ok(buf.len())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("log {:?} was deleted", self.name),
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogStore for MemoryLogStore {
    fn create(&mut self, name: &str) -> Result<Box<dyn Write + Send>, LogError> {
        check_name(name)?;
        lock(&self.logs).insert(name.to_string(), Vec::new());
        Ok(Box::new(MemoryLogWriter {
            logs: Arc::clone(&self.logs),
            name: name.to_string(),
        }))
    }

    fn open(&self, name: &str) -> Result<Box<dyn Read + Send>, LogError> {
        check_name(name)?;
        let bytes = self.bytes(name).ok_or_else(|| LogError::LogNotFound {
            name: name.to_string(),
        })?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn list(&self) -> Result<Vec<String>, LogError> {
        let mut names: Vec<String> = lock(&self.logs).keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn delete(&mut self, name: &str) -> Result<bool, LogError> {
        check_name(name)?;
        Ok(lock(&self.logs).shift_remove(name).is_some())
    }

    fn contains(&self, name: &str) -> Result<bool, LogError> {
        Ok(lock(&self.logs).contains_key(name))
    }
}

// ── DirLogStore ─────────────────────────────────────────────────────

/// Log store backed by a directory of `<name>.dlm` files.
#[derive(Clone, Debug)]
pub struct DirLogStore {
    dir: PathBuf,
}

impl DirLogStore {
    /// Store in `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, LogError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        log::debug!("log store at {}", dir.display());
        Ok(Self { dir })
    }

    /// The backing directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding log `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{LOG_EXTENSION}"))
    }
}

impl LogStore for DirLogStore {
    fn create(&mut self, name: &str) -> Result<Box<dyn Write + Send>, LogError> {
        check_name(name)?;
        let file = File::create(self.path(name))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn open(&self, name: &str) -> Result<Box<dyn Read + Send>, LogError> {
        check_name(name)?;
        match File::open(self.path(name)) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(LogError::LogNotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>, LogError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION)
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&mut self, name: &str) -> Result<bool, LogError> {
        check_name(name)?;
        match fs::remove_file(self.path(name)) {
            Ok(()) => {
                log::info!("deleted log {name:?}");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, name: &str) -> Result<bool, LogError> {
        Ok(is_valid_log_name(name) && self.path(name).is_file())
    }
}
