use std::path::PathBuf;

use thiserror::Error;

use crate::presence::ActiveSet;

/// Errors that abort a presence run.
///
/// Failing to load the previous state is not part of this list: it is treated as a cold start.
#[derive(Debug, Error)]
pub enum Error {
    /// The capture export could not be opened.
    #[error("could not open capture export `{}`", path.display())]
    OpenSnapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The capture export could not be read as delimited text.
    #[error("could not read capture export `{}`", path.display())]
    ParseSnapshot {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    /// The current snapshot could not be persisted. The clients that were classified as active
    /// before the failure are kept so a caller can still use them.
    #[error("could not write state file `{}`", path.display())]
    SaveState {
        path: PathBuf,
        active: ActiveSet,
        #[source]
        source: std::io::Error,
    },
}
