use ballotchain::{Error, MemStore, StoreSnapshot};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// How a command uses the state file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Read only, any number of readers at once
    Read,
    /// Read then write back, alone
    Write,
}

/// A locked handle on the JSON state file.
///
/// The lock lives on a `<path>.lock` file next to the state and is held from
/// `open` until the handle is dropped, so a load and the save that follows it
/// can never interleave with another process.
pub struct StateFile {
    path: PathBuf,
    access: Access,
    _lock: File,
}

impl StateFile {
    /// Open the state at `path`, waiting for any conflicting lock
    pub fn open<P: AsRef<Path>>(path: P, access: Access) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let lock_path = lock_path(&path);
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&lock_path)
            .map_err(|e| io_error("unable to open", &lock_path, e))?;

        let locked = match access {
            Access::Read => lock.lock_shared(),
            Access::Write => lock.lock_exclusive(),
        };
        locked.map_err(|e| io_error("unable to lock", &lock_path, e))?;

        Ok(StateFile {
            path,
            access,
            _lock: lock,
        })
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// Load the store, or an empty one if there is no state yet
    pub fn load(&self) -> Result<MemStore, Error> {
        if !self.path.exists() {
            log::info!(
                "ballotchain: no state at {}, starting empty",
                self.path.display()
            );
            return Ok(MemStore::default());
        }
        let bytes =
            std::fs::read(&self.path).map_err(|e| io_error("unable to read", &self.path, e))?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;
        Ok(MemStore::from(snapshot))
    }

    /// Replace the state with `store`
    pub fn save(&self, store: &MemStore) -> Result<(), Error> {
        if self.access != Access::Write {
            return Err(Error::Store(format!(
                "{} was opened read-only",
                self.path.display()
            )));
        }
        let json = serde_json::to_vec_pretty(&store.snapshot()?)?;

        // Write then rename, so the old state stays whole until the new one is
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| io_error("unable to write", &self.path, e))
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut lock = path.to_path_buf().into_os_string();
    lock.push(".lock");
    PathBuf::from(lock)
}

fn io_error(what: &str, path: &Path, e: std::io::Error) -> Error {
    Error::Store(format!("{} {}: {}", what, path.display(), e))
}
