use std::{
    fs,
    path::{self, Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

use crate::{presence::NewClientPolicy, state::StateStore};

/// Configuration for a single presence run.
///
/// Every field is optional in a configuration file and falls back to its default.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PresenceConfig {
    /// The CSV export written by airodump-ng.
    pub source_path: PathBuf,
    /// Where the snapshot of the previous run is stored.
    pub state_path: PathBuf,
    /// Enables debug diagnostics. Has no effect on which clients are reported.
    pub verbose: bool,
    /// How to classify clients that were not in the previous snapshot.
    pub new_clients: NewClientPolicy,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from("out-01.csv"),
            state_path: PathBuf::from("state"),
            verbose: false,
            new_clients: NewClientPolicy::default(),
        }
    }
}

impl PresenceConfig {
    /// Reads a configuration file to a [PresenceConfig] object.
    pub fn read(p: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conf = fs::read_to_string(p).context("could not read configuration file")?;
        let config: Self = toml::from_str(&conf)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for any disallowed values.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.source_path.as_os_str().is_empty() {
            anyhow::bail!("source path must not be empty");
        }
        if self.state_path.as_os_str().is_empty() {
            anyhow::bail!("state path must not be empty");
        }

        // Saving the state must not overwrite the capture export. Only `.` components are
        // resolved, symlinks and `..` are not.
        let source = path::absolute(&self.source_path).context("invalid source path")?;
        let state = path::absolute(&self.state_path).context("invalid state path")?;
        let store = StateStore::new(state);
        if source == store.path() || source == store.tmp_path() {
            anyhow::bail!(
                "source path `{}` would be overwritten by the state file `{}`",
                self.source_path.display(),
                self.state_path.display()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_defaults() {
        let config: PresenceConfig = toml::from_str("").unwrap();

        assert_eq!(config, PresenceConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_read() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
source-path = "/tmp/capture/out-01.csv"
state-path = "/var/lib/presence/state"
verbose = true
new-clients = "inactive"
"#
        )
        .unwrap();

        let config = PresenceConfig::read(file.path()).unwrap();
        assert_eq!(
            config,
            PresenceConfig {
                source_path: PathBuf::from("/tmp/capture/out-01.csv"),
                state_path: PathBuf::from("/var/lib/presence/state"),
                verbose: true,
                new_clients: NewClientPolicy::Inactive,
            }
        );
    }

    #[test]
    fn test_same_paths_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "source-path = \"state\"").unwrap();

        assert!(PresenceConfig::read(file.path()).is_err());
    }

    #[test]
    fn test_equivalent_paths_are_rejected() {
        let config = PresenceConfig {
            source_path: PathBuf::from("./state"),
            state_path: PathBuf::from("state"),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PresenceConfig {
            source_path: PathBuf::from("/var/lib/presence/state"),
            state_path: PathBuf::from("/var/lib/presence/./state"),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_temporary_state_path_is_rejected() {
        let config = PresenceConfig {
            source_path: PathBuf::from("state.tmp"),
            state_path: PathBuf::from("state"),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<PresenceConfig>("debug = true").is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PresenceConfig::read(dir.path().join("presence.toml")).is_err());
    }
}
