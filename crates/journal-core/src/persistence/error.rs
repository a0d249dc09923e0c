use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::codec::CodecError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Unable to access the selected library folder.")]
    DirectoryNotReachable(#[source] Option<io::Error>),
    #[error("Library folder contents could not be read: {}", path.display())]
    DirectoryContentsReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{file} could not be read. Reason: {source}")]
    UnableToParse {
        file: String,
        #[source]
        source: CodecError,
    },
    #[error("Unexpected item in user directory {0}")]
    UnexpectedItemInUserDirectory(String),
    #[error("Persistence service unavailable.")]
    PersistenceServiceUnavailable,
    #[error("Filename collision {0}")]
    NamingCollision(String),
    #[error("Failed to encode entry {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: CodecError,
    },
    #[error("Failed to write library to {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
