use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// The leader was soft-deleted instead of removed. The soft delete has
    /// already been applied and persisted when this is returned.
    #[error("{player} has conductor history and was deactivated instead of removed")]
    ConflictWithHistory { player: String },

    #[error("backing store unavailable: {0}")]
    BackingStoreUnavailable(String),

    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, RosterError>;

impl RosterError {
    pub fn validation<T>(message: impl Into<String>) -> Result<T> {
        Err(RosterError::Validation(message.into()))
    }

    pub fn not_found<T>(what: impl Into<String>) -> Result<T> {
        Err(RosterError::NotFound(what.into()))
    }
}

impl ResponseError for RosterError {
    fn status_code(&self) -> StatusCode {
        match self {
            RosterError::Validation(_) | RosterError::Csv { .. } => StatusCode::BAD_REQUEST,
            RosterError::NotFound(_) => StatusCode::NOT_FOUND,
            RosterError::ConflictWithHistory { .. } => StatusCode::CONFLICT,
            RosterError::BackingStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let kind = match self {
            RosterError::Validation(_) => "validation",
            RosterError::NotFound(_) => "not_found",
            RosterError::ConflictWithHistory { .. } => "conflict_with_history",
            RosterError::BackingStoreUnavailable(_) => "backing_store_unavailable",
            _ => "internal",
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "kind": kind,
            "error": self.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_409() {
        let err = RosterError::ConflictWithHistory { player: "Dave".to_string() };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("Dave"));
    }

    #[test]
    fn helpers_build_errors() {
        let err = RosterError::not_found::<()>("leader Eve").unwrap_err();
        assert_eq!(err.to_string(), "leader Eve not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
