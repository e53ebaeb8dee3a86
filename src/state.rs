use std::{
    ffi::OsString,
    fs,
    io,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::snapshot::Snapshot;

/// First line of a state file. Only there for people reading the file, it is ignored when loading.
const STATE_HEADER: &str = "Client MAC: LastSeen";

/// Persists the snapshot of the previous run so the next run has something to compare against.
///
/// The file consists of two lines: a header and the snapshot as a JSON object.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot of the previous run.
    ///
    /// Returns `None` if there is no usable state, for instance on the first run or when the file
    /// is corrupted. This never fails.
    pub fn load(&self) -> Option<Snapshot> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(v) => v,
            Err(err) => {
                debug!(
                    path = %self.path.display(),
                    "Could not read state file, this is normal on the first run: {err}"
                );
                return None;
            }
        };

        let Some(line) = contents.lines().nth(1) else {
            debug!(path = %self.path.display(), "State file does not contain a snapshot");
            return None;
        };

        match serde_json::from_str::<Snapshot>(line) {
            Ok(snapshot) => {
                debug!(
                    path = %self.path.display(),
                    clients = snapshot.len(),
                    "Loaded previous snapshot: {snapshot:?}"
                );
                Some(snapshot)
            }
            Err(err) => {
                debug!(path = %self.path.display(), "State file has an invalid snapshot: {err}");
                None
            }
        }
    }

    /// Replaces the stored state with `snapshot`.
    ///
    /// The state is first written to a temporary file next to the destination, which is then
    /// moved over it. The previous state is left intact if writing fails.
    pub fn save(&self, snapshot: &Snapshot) -> io::Result<()> {
        let json = serde_json::to_string(snapshot)?;
        let contents = format!("{STATE_HEADER}\n{json}\n");

        let tmp_path = self.tmp_path();
        if let Err(err) =
            fs::write(&tmp_path, contents).and_then(|_| fs::rename(&tmp_path, &self.path))
        {
            // The temporary file may not exist at this point.
            _ = fs::remove_file(&tmp_path);
            return Err(err);
        }

        debug!(
            path = %self.path.display(),
            clients = snapshot.len(),
            "Wrote snapshot to state file"
        );
        Ok(())
    }

    /// The file the state is written to before it replaces the actual state file.
    pub fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store() -> (TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state"));
        (dir, store)
    }

    #[test]
    fn test_round_trip() {
        let (_dir, store) = store();
        let snapshot: Snapshot = [
            ("AA:BB:CC:DD:EE:01", "2025-03-01 09:05:10"),
            ("AA:BB:CC:DD:EE:02", "it's \"quoted\""),
        ]
        .into_iter()
        .collect();

        store.save(&snapshot).unwrap();
        assert_eq!(store.load(), Some(snapshot));
    }

    #[test]
    fn test_round_trip_empty() {
        let (_dir, store) = store();

        store.save(&Snapshot::default()).unwrap();
        assert_eq!(store.load(), Some(Snapshot::default()));
    }

    #[test]
    fn test_file_layout() {
        let (_dir, store) = store();
        let snapshot: Snapshot = [("AA:BB", "10:00:00")].into_iter().collect();

        store.save(&snapshot).unwrap();
        let contents = fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents, "Client MAC: LastSeen\n{\"AA:BB\":\"10:00:00\"}\n");
    }

    #[test]
    fn test_save_replaces_previous_state() {
        let (_dir, store) = store();
        let first: Snapshot = [("AA:BB", "1"), ("CC:DD", "2")].into_iter().collect();
        let second: Snapshot = [("EE:FF", "3")].into_iter().collect();

        store.save(&first).unwrap();
        store.save(&second).unwrap();
        assert_eq!(store.load(), Some(second));
    }

    #[test]
    fn test_missing_file() {
        let (_dir, store) = store();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_header_only() {
        let (_dir, store) = store();
        fs::write(store.path(), "Client MAC: LastSeen\n").unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_corrupt_snapshot() {
        let (_dir, store) = store();
        fs::write(store.path(), "Client MAC: LastSeen\n{'AA:BB': '10:00:00'}").unwrap();
        assert_eq!(store.load(), None);

        fs::write(store.path(), "Client MAC: LastSeen\n{\"AA:BB\": 5}").unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_header_is_ignored() {
        let (_dir, store) = store();
        fs::write(store.path(), "anything at all\n{\"AA:BB\":\"t1\"}").unwrap();

        let expected: Snapshot = [("AA:BB", "t1")].into_iter().collect();
        assert_eq!(store.load(), Some(expected));
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let (dir, _) = store();
        let store = StateStore::new(dir.path().join("missing").join("state"));

        assert!(store.save(&Snapshot::default()).is_err());
        assert!(!dir.path().join("missing").exists());
    }
}
