//! Error type shared by the library surface.
//!
//! Gameplay itself cannot fail: responses come from a fixed input set and
//! timer races are settled by the controller. Everything here comes from the
//! edges of the crate (disk, SQLite, the remote gameplay service).

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gameplay service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Could not load the gameplay: {0}")]
    Load(String),
}

impl Error {
    /// Whether the error came from talking to the remote gameplay service.
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Api { .. } | Error::Load(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_message_includes_status() {
        let err = Error::Api {
            status: 404,
            message: "gameplay not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Gameplay service returned 404: gameplay not found"
        );
        assert!(err.is_remote());
    }

    #[test]
    fn io_errors_are_local() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(!err.is_remote());
    }
}
