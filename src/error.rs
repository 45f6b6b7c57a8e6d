// Error taxonomy for the GDP ETL pipeline

use thiserror::Error;

pub type EtlResult<T> = Result<T, EtlError>;

#[derive(Debug, Error)]
pub enum EtlError {
    /// Network request failed or the server answered with a non-2xx status
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The forecast table or its expected columns were not found
    #[error("parse error: {0}")]
    Parse(String),

    /// A read-only aggregate query failed (recovered at the query boundary)
    #[error("query failed: {0}")]
    Query(rusqlite::Error),

    /// The database could not be opened or written
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("region data error: {0}")]
    RegionData(String),

    #[error("schedule error: {0}")]
    Schedule(String),
}

impl EtlError {
    /// Fetch and parse failures are the ones a cycle may skip over
    pub fn is_source_failure(&self) -> bool {
        matches!(self, EtlError::Fetch { .. } | EtlError::Parse(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_failure_classification() {
        let fetch = EtlError::Fetch {
            url: "http://example.invalid".to_string(),
            reason: "connection refused".to_string(),
        };
        let parse = EtlError::Parse("no forecast table".to_string());
        let config = EtlError::Config("missing db_file".to_string());

        assert!(fetch.is_source_failure());
        assert!(parse.is_source_failure());
        assert!(!config.is_source_failure());
        assert!(!EtlError::Storage(rusqlite::Error::InvalidQuery).is_source_failure());
    }

    #[test]
    fn test_error_messages() {
        let err = EtlError::Fetch {
            url: "http://example.invalid/gdp".to_string(),
            reason: "HTTP status 503".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "fetch failed for http://example.invalid/gdp: HTTP status 503"
        );
    }
}
