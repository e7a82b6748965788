use thiserror::Error;

/// Failures surfaced to embedders. Internal plumbing uses `anyhow` and is
/// wrapped into one of these at the facade boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// An adapter's scan of the page failed as a whole.
    #[error("scan failed for adapter `{adapter}`: {source}")]
    Scan {
        adapter: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// One field of one media item could not be resolved.
    #[error("failed to resolve `{field}`: {source}")]
    FieldResolution {
        field: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("http request failed: {0}")]
    Http(#[source] anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn field(field: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Error::FieldResolution { field, source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
