//! HTTP surface of Tandem: axum router, identity resolution and the mapping
//! from engine and sync errors to JSON responses.

use api_types::ErrorBody;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;
use ynab_sync::SyncError;

pub use identity::{
    AuthContext, DEV_ADMIN_ID, IdentityError, IdentityResolver, JwtVerifier, ServiceAccount,
    TokenVerifier, VerifiedIdentity,
};
pub use server::{ServerState, app, router, run_with_listener};

mod blobs;
mod categories;
mod credentials;
mod entries;
mod identity;
mod permissions;
mod principals;
mod reports;
mod server;
mod sync;

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    Sync(SyncError),
    Identity(IdentityError),
    Generic(String),
}

fn classify_engine_error(err: &EngineError) -> (StatusCode, &'static str) {
    match err {
        EngineError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
        EngineError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
        EngineError::KeyNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        EngineError::ExistingKey(_) => (StatusCode::CONFLICT, "conflict"),
        EngineError::InvalidInput(_)
        | EngineError::InvalidAmount(_)
        | EngineError::InvalidName(_)
        | EngineError::InvalidRole(_)
        | EngineError::InvalidId(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input"),
        EngineError::NotConfigured(_) => (StatusCode::PRECONDITION_FAILED, "not_configured"),
        EngineError::Crypto(_) | EngineError::Database(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    }
}

fn classify_sync_error(err: &SyncError) -> (StatusCode, &'static str) {
    match err {
        SyncError::NotConfigured(_) => (StatusCode::PRECONDITION_FAILED, "not_configured"),
        SyncError::Upstream { .. } | SyncError::Network(_) => {
            (StatusCode::BAD_GATEWAY, "upstream_error")
        }
        SyncError::InProgress(_) => (StatusCode::CONFLICT, "conflict"),
        SyncError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "upstream_error"),
        SyncError::UnknownCategory(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unknown_category"),
        SyncError::InvalidInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input"),
        SyncError::Engine(err) => classify_engine_error(err),
    }
}

impl ServerError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Engine(err) => classify_engine_error(err),
            ServerError::Sync(err) => classify_sync_error(err),
            ServerError::Identity(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ServerError::Generic(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }

    /// Message for the response body. Internal details only reach the log.
    fn public_message(self, status: StatusCode) -> String {
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {self}");
            return "internal server error".to_string();
        }
        if let ServerError::Identity(err) = &self {
            tracing::debug!("authentication failed: {err}");
            return "authentication required".to_string();
        }
        self.to_string()
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Engine(err) => err.fmt(f),
            ServerError::Sync(err) => err.fmt(f),
            ServerError::Identity(err) => err.fmt(f),
            ServerError::Generic(msg) => f.write_str(msg),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, kind) = self.classify();
        let error = self.public_message(status);
        (
            status,
            Json(ErrorBody {
                error,
                kind: kind.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<SyncError> for ServerError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

impl From<IdentityError> for ServerError {
    fn from(value: IdentityError) -> Self {
        Self::Identity(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_and_kind(err: ServerError) -> (StatusCode, &'static str) {
        err.classify()
    }

    #[test]
    fn engine_forbidden_maps_to_403() {
        let res = ServerError::from(EngineError::Forbidden("forbidden".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::KeyNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn engine_conflict_maps_to_409() {
        let res = ServerError::from(EngineError::ExistingKey("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_errors_share_a_kind() {
        for err in [
            EngineError::InvalidAmount("x".to_string()),
            EngineError::InvalidInput("x".to_string()),
            EngineError::InvalidRole("x".to_string()),
            EngineError::InvalidName("x".to_string()),
        ] {
            assert_eq!(
                status_and_kind(err.into()),
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input")
            );
        }
    }

    #[test]
    fn sync_errors_map_to_gateway_and_precondition() {
        assert_eq!(
            status_and_kind(SyncError::Upstream { status: 500 }.into()),
            (StatusCode::BAD_GATEWAY, "upstream_error")
        );
        assert_eq!(
            status_and_kind(SyncError::InProgress("p".to_string()).into()),
            (StatusCode::CONFLICT, "conflict")
        );
        assert_eq!(
            status_and_kind(SyncError::NotConfigured("x".to_string()).into()),
            (StatusCode::PRECONDITION_FAILED, "not_configured")
        );
        assert_eq!(
            status_and_kind(SyncError::UnknownCategory("Food".to_string()).into()),
            (StatusCode::UNPROCESSABLE_ENTITY, "unknown_category")
        );
        assert_eq!(
            status_and_kind(SyncError::Engine(EngineError::Forbidden("x".to_string())).into()),
            (StatusCode::FORBIDDEN, "forbidden")
        );
    }

    #[test]
    fn crypto_errors_are_hidden() {
        let err = ServerError::from(EngineError::Crypto("bad tag".to_string()));
        assert_eq!(err.classify(), (StatusCode::INTERNAL_SERVER_ERROR, "internal"));
        assert_eq!(
            err.public_message(StatusCode::INTERNAL_SERVER_ERROR),
            "internal server error"
        );
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
