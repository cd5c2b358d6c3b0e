use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rota_core::RotaError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        let Some(e) = self.0.downcast_ref::<RotaError>() else {
            return StatusCode::INTERNAL_SERVER_ERROR;
        };
        match e {
            RotaError::ConfigNotFound(_)
            | RotaError::RoleNotFound(_)
            | RotaError::UnresolvableParticipant(_)
            | RotaError::MemberNotFound(_) => StatusCode::NOT_FOUND,
            RotaError::DuplicateMember(_) | RotaError::NotConfigured(_) => StatusCode::CONFLICT,
            RotaError::MissingKeys(_)
            | RotaError::MalformedConfig(_)
            | RotaError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RotaError::Permission(_) => StatusCode::FORBIDDEN,
            RotaError::Transient(_) | RotaError::GrantFailed { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RotaError::Task(_) | RotaError::Io(_) | RotaError::Yaml(_) | RotaError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(%status, error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_core::{ParticipantId, RoleId};
    use std::path::PathBuf;

    fn status_of(err: RotaError) -> StatusCode {
        AppError(err.into()).into_response().status()
    }

    #[test]
    fn config_not_found_maps_to_404() {
        assert_eq!(
            status_of(RotaError::ConfigNotFound(PathBuf::from(".rota/rotation.yaml"))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn member_not_found_maps_to_404() {
        assert_eq!(
            status_of(RotaError::MemberNotFound(ParticipantId::new("7"))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn role_not_found_maps_to_404() {
        assert_eq!(
            status_of(RotaError::RoleNotFound(RoleId::new("9"))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn duplicate_member_maps_to_409() {
        assert_eq!(
            status_of(RotaError::DuplicateMember(ParticipantId::new("7"))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn not_configured_maps_to_409() {
        assert_eq!(
            status_of(RotaError::NotConfigured("unloaded".into())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn invariant_violation_maps_to_422() {
        assert_eq!(
            status_of(RotaError::InvariantViolation("index 9 out of range".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn missing_keys_maps_to_422() {
        assert_eq!(
            status_of(RotaError::MissingKeys(vec!["roster".into()])),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn permission_maps_to_403() {
        assert_eq!(
            status_of(RotaError::Permission("On Call".into())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn grant_failed_maps_to_503() {
        assert_eq!(
            status_of(RotaError::GrantFailed {
                participant: ParticipantId::new("7"),
                reason: "rate limited".into(),
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn unknown_error_maps_to_500() {
        let response = AppError(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
