//! Output file lifecycle.
//!
//! Bytes are appended strictly in offset order to a working file (`<dest>.part`
//! by default). The driver owns the single handle for the whole transfer; a
//! restart truncates it in place. On success the file is synced and atomically
//! renamed to its final name. A finished `<dest>` found on resume is checked
//! in place and only moved aside once the transfer needs to change it.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::retry::TransferError;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Sequential writer over the working file.
#[derive(Debug)]
pub struct OutputFile {
    file: File,
    path: PathBuf,
    len: u64,
    /// Working path to move to before the first change, while `path` is a
    /// finished file opened read-only for verification.
    pending: Option<PathBuf>,
}

impl OutputFile {
    /// Open the working file at `path`. With `resume`, an existing file of a
    /// plausible size (non-empty, not larger than `size_hint`) is kept and
    /// appended to; otherwise it is created or truncated.
    pub fn open(path: &Path, resume: bool, size_hint: Option<u64>) -> Result<Self, TransferError> {
        let existing = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let keep = resume && existing > 0 && size_hint.map_or(true, |hint| existing <= hint);
        if existing > 0 && !keep {
            tracing::debug!(
                path = %path.display(),
                existing,
                "discarding existing partial file"
            );
        }

        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(!keep)
            .open(path)
            .map_err(|e| TransferError::storage(path, e))?;
        let len = if keep {
            file.seek(SeekFrom::End(0))
                .map_err(|e| TransferError::storage(path, e))?
        } else {
            0
        };
        Ok(OutputFile {
            file,
            path: path.to_path_buf(),
            len,
            pending: None,
        })
    }

    /// Open the working file for `dest`. When resuming into a part file that
    /// does not exist yet, a previously completed `dest` is opened read-only
    /// so that it only needs verifying; it stays under its own name unless
    /// body bytes arrive for it.
    pub fn prepare(
        dest: &Path,
        part_file: bool,
        resume: bool,
        size_hint: Option<u64>,
    ) -> Result<Self, TransferError> {
        if !part_file {
            return Self::open(dest, resume, size_hint);
        }
        let working = temp_path(dest);
        if resume && !working.exists() && dest.is_file() {
            let existing = std::fs::metadata(dest)
                .map_err(|e| TransferError::storage(dest, e))?
                .len();
            if existing > 0 && size_hint.map_or(true, |hint| existing <= hint) {
                let file = File::open(dest).map_err(|e| TransferError::storage(dest, e))?;
                tracing::debug!(path = %dest.display(), existing, "verifying existing file in place");
                return Ok(OutputFile {
                    file,
                    path: dest.to_path_buf(),
                    len: existing,
                    pending: Some(working),
                });
            }
        }
        Self::open(&working, resume, size_hint)
    }

    /// Move a file being verified in place to the working path so it can be
    /// extended.
    fn claim(&mut self) -> Result<(), TransferError> {
        let Some(working) = self.pending.clone() else {
            return Ok(());
        };
        std::fs::rename(&self.path, &working).map_err(|e| TransferError::storage(&self.path, e))?;
        let mut file = File::options()
            .read(true)
            .write(true)
            .open(&working)
            .map_err(|e| TransferError::storage(&working, e))?;
        file.seek(SeekFrom::End(0))
            .map_err(|e| TransferError::storage(&working, e))?;
        tracing::debug!(path = %working.display(), len = self.len, "extending existing file");
        self.file = file;
        self.path = working;
        self.pending = None;
        Ok(())
    }

    /// Bytes written so far (the resume offset for the next request).
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<(), TransferError> {
        if data.is_empty() {
            return Ok(());
        }
        self.claim()?;
        self.file
            .write_all(data)
            .map_err(|e| TransferError::storage(&self.path, e))?;
        self.len += data.len() as u64;
        Ok(())
    }

    /// Drop every byte; the next write lands at offset zero. A file being
    /// verified in place is left alone and a fresh working file is started.
    pub fn truncate(&mut self) -> Result<(), TransferError> {
        if let Some(working) = self.pending.clone() {
            self.file = File::options()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&working)
                .map_err(|e| TransferError::storage(&working, e))?;
            self.path = working;
            self.pending = None;
            self.len = 0;
            return Ok(());
        }
        self.file
            .set_len(0)
            .and_then(|_| self.file.seek(SeekFrom::Start(0)))
            .map_err(|e| TransferError::storage(&self.path, e))?;
        self.len = 0;
        Ok(())
    }

    /// Size reported by the filesystem.
    pub fn on_disk_len(&self) -> Result<u64, TransferError> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| TransferError::storage(&self.path, e))
    }

    pub fn sync(&self) -> Result<(), TransferError> {
        if self.pending.is_some() {
            return Ok(());
        }
        self.file
            .sync_all()
            .map_err(|e| TransferError::storage(&self.path, e))
    }

    /// Atomically rename to `final_path` (no-op when writing in place).
    /// Consumes the writer and closes the file.
    pub fn finalize(self, final_path: &Path) -> Result<(), TransferError> {
        let OutputFile { file, path, .. } = self;
        drop(file);
        if path != final_path {
            std::fs::rename(&path, final_path).map_err(|e| TransferError::storage(&path, e))?;
        }
        Ok(())
    }
}
