//! Output placement: one writer per output path, and no partial files.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Error;

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn ensure_parent(path: &Path) -> Result<&Path, Error> {
    let parent = parent_dir(path);
    std::fs::create_dir_all(parent).map_err(|e| Error::output(path, e))?;
    Ok(parent)
}

/// Exclusive claim on an output path, held while a job converts into it.
///
/// Backed by a `.<name>.lock` file next to the output, created with `create_new`
/// and removed on drop.
#[derive(Debug)]
pub struct OutputLock {
    lock_path: PathBuf,
    _file: File,
}

impl OutputLock {
    pub fn acquire(output: &Path) -> Result<Self, Error> {
        let parent = ensure_parent(output)?;
        let name = output
            .file_name()
            .ok_or_else(|| Error::output(output, "output path has no file name"))?;
        let mut lock_name = OsString::from(".");
        lock_name.push(name);
        lock_name.push(".lock");
        let lock_path = parent.join(lock_name);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    Error::output(output, "another job is writing this file")
                }
                _ => Error::output(output, e),
            })?;
        Ok(Self {
            lock_path,
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            log::warn!("could not remove lock {}: {e}", self.lock_path.display());
        }
    }
}

/// Write `bytes` to `output` through a staging file in the same directory.
///
/// The staging file is renamed over `output` only once fully written; on any
/// error it is deleted and `output` is left as it was.
pub fn write_atomic(output: &Path, bytes: &[u8]) -> Result<(), Error> {
    let parent = ensure_parent(output)?;
    let mut staged = tempfile::Builder::new()
        .prefix(".easy-convert-")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|e| Error::output(output, e))?;
    staged
        .write_all(bytes)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| Error::output(output, e))?;
    staged
        .persist(output)
        .map_err(|e| Error::output(output, e.error))?;
    log::debug!("wrote {} bytes to {}", bytes.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.pdf");

        let lock = OutputLock::acquire(&out).unwrap();
        assert!(lock.path().exists());
        let err = OutputLock::acquire(&out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutputWriteError);

        let lock_path = lock.path().to_path_buf();
        drop(lock);
        assert!(!lock_path.exists());
        assert!(OutputLock::acquire(&out).is_ok());
    }

    #[test]
    fn write_atomic_creates_parents_and_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/deeper/out.pdf");
        write_atomic(&out, b"%PDF-1.7").unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"%PDF-1.7");

        let leftovers: Vec<_> = std::fs::read_dir(out.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "out.pdf")
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn parent_that_is_a_file_is_an_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let err = write_atomic(&blocker.join("out.pdf"), b"data").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutputWriteError);
    }
}
