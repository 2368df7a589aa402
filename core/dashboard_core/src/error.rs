use std::path::PathBuf;

use thiserror::Error;

/// Failures loading snapshots or the category file.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
