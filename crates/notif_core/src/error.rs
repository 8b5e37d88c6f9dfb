use thiserror::Error;

pub type Result<T> = std::result::Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("render failure: {0}")]
    Render(#[from] RenderError),

    #[error("invalid notification: {0}")]
    InvalidNotification(String),

    #[error("scheduler was built without a {0}")]
    MissingCollaborator(&'static str),

    #[error("scheduled entry {id} could not be decoded: {source}")]
    CorruptEntry {
        id: i32,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to encode notification {id}: {source}")]
    Encode {
        id: i32,
        #[source]
        source: serde_json::Error,
    },
}

/// Raised by a [`PersistentStore`](crate::store::PersistentStore) when a write cannot be made durable.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to encode store contents: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store rejected write: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("missing resource `{0}`")]
    MissingResource(String),

    #[error("platform refused notification: {0}")]
    Platform(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("unsupported image url `{0}`")]
    UnsupportedUrl(String),

    #[error("image download failed: {0}")]
    Download(String),
}
