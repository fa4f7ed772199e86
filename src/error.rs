#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("version {version} was already saved")]
    VersionExists { version: u64 },

    #[error("version {version} does not exist")]
    NoSuchVersion { version: u64 },

    #[error("version must be greater than zero")]
    InvalidVersion,

    #[error("version {version} is not greater than the latest saved version {latest}")]
    NonMonotonic { version: u64, latest: u64 },

    #[error("tree is empty, nothing to save")]
    EmptyTree,

    #[error("cannot delete version {version}: it is the latest saved version")]
    CannotDeleteLatestVersion { version: u64 },

    #[error("unsaved fast iterator must be created with a NodeDB but none was given")]
    NilNdb,

    #[error("unsaved fast iterator must be created with unsaved additions but they were nil")]
    NilAdditions,

    #[error("unsaved fast iterator must be created with unsaved removals but they were nil")]
    NilRemovals,

    #[error("backend I/O error: {0}")]
    BackendIo(String),

    #[error("tree corrupted: node with hash {hash} not found")]
    Corruption { hash: String },

    #[error("tree corrupted: failed to decode node: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, Error>;
