use thiserror::Error;

/// Error kinds surfaced by the sync engine.
///
/// Every I/O failure is folded into one of these at a single site
/// ([`From<std::io::Error>`]); the lifecycle controller consults
/// [`SyncError::is_fatal`] to decide whether sync must stop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("network is unavailable")]
    NoNetwork,
    #[error("cloud storage quota exhausted")]
    OutOfSpace,
    #[error("cloud storage is unavailable")]
    CloudUnavailable,
    #[error("cloud container is missing")]
    ContainerNotFound,
    #[error("file is unavailable: {0}")]
    FileUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Fatal kinds stop the sync session; the rest are logged and
    /// re-derived from the monitors' next observation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::NoNetwork
                | SyncError::OutOfSpace
                | SyncError::CloudUnavailable
                | SyncError::ContainerNotFound
        )
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => SyncError::FileUnavailable(err.to_string()),
            std::io::ErrorKind::StorageFull | std::io::ErrorKind::QuotaExceeded => {
                SyncError::OutOfSpace
            }
            _ => SyncError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_errors_are_fatal() {
        assert!(SyncError::OutOfSpace.is_fatal());
        assert!(SyncError::CloudUnavailable.is_fatal());
        assert!(SyncError::ContainerNotFound.is_fatal());
        assert!(SyncError::NoNetwork.is_fatal());
        assert!(!SyncError::FileUnavailable("gone".into()).is_fatal());
        assert!(!SyncError::Internal("oops".into()).is_fatal());
    }

    #[test]
    fn io_errors_fold_into_engine_kinds() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        assert!(matches!(
            SyncError::from(missing),
            SyncError::FileUnavailable(_)
        ));

        let full = std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full");
        assert_eq!(SyncError::from(full), SyncError::OutOfSpace);

        let other = std::io::Error::other("strange");
        assert!(matches!(SyncError::from(other), SyncError::Internal(_)));
    }
}
