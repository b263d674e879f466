// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or watching the hook log file
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Permission denied reading log file: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot watch {path} for changes: {source}")]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

impl WatchError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Why a subscriber could not accept an event
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    #[error("subscriber is closed")]
    Closed,

    #[error("subscriber queue is full")]
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_maps_permission_denied() {
        let err = WatchError::io(
            "/var/log/hooks-log.txt",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, WatchError::PermissionDenied { .. }));
        assert!(err.to_string().contains("/var/log/hooks-log.txt"));
    }

    #[test]
    fn test_io_keeps_other_kinds() {
        let err = WatchError::io(
            "hooks-log.txt",
            std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"),
        );
        match err {
            WatchError::Io { source, .. } => assert_eq!(source.to_string(), "disk on fire"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
