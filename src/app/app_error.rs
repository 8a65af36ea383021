use axum::{
    Json,
    extract::rejection::PathRejection,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::pagination::InvalidPage;
use crate::store::StoreError;
use crate::validation::FieldErrors;

/// Standard JSON envelope for every response body.
#[derive(Serialize, ToSchema, Debug)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    data: Option<()>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input.")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication credentials were not provided or are invalid.")]
    Unauthorized,

    #[error("You do not have permission to perform this action.")]
    Forbidden,

    #[error("Not found.")]
    NotFound,

    #[error("Invalid page.")]
    InvalidPage,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound | Self::InvalidPage => StatusCode::NOT_FOUND,
            Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            Self::Validation(errors) => ErrorBody {
                data: None,
                message: "Invalid input.".into(),
                errors: Some(errors),
            },
            Self::Other(err) => {
                error!(error = ?err, "request failed");
                ErrorBody {
                    data: None,
                    message: "Internal server error".into(),
                    errors: None,
                }
            }
            other => ErrorBody {
                data: None,
                message: other.to_string(),
                errors: None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Basic realm=\"catalog\""),
            );
        }
        response
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

/// An id that does not parse cannot name an existing record.
impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        debug!(%rejection, "unparseable path parameter");
        Self::NotFound
    }
}

impl From<InvalidPage> for AppError {
    fn from(_: InvalidPage) -> Self {
        Self::InvalidPage
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::UnknownProducts(ids) => {
                let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
                Self::Validation(FieldErrors::single(
                    "items",
                    format!("Invalid product id(s): {}.", ids.join(", ")),
                ))
            }
            StoreError::StaleStatus { expected } => Self::Validation(FieldErrors::single(
                "status",
                format!("Order status changed from {expected} while updating. Reload and retry."),
            )),
            StoreError::Conflict(message) | StoreError::Constraint(message) => {
                Self::BadRequest(message)
            }
            other => Self::Other(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::{Value, json};

    use crate::models::OrderStatus;

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_errors_carry_field_map() {
        let response =
            AppError::from(FieldErrors::single("price", "Price must be greater than zero"))
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({
                "data": null,
                "message": "Invalid input.",
                "errors": { "price": ["Price must be greater than zero"] }
            })
        );
    }

    #[tokio::test]
    async fn internal_errors_are_redacted() {
        let response = AppError::Other(anyhow::anyhow!("connection string leaked")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], "Internal server error");
    }

    #[tokio::test]
    async fn unauthorized_challenges_for_basic_auth() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[test]
    fn store_errors_map_to_http_semantics() {
        assert_eq!(
            AppError::from(StoreError::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(StoreError::UnknownProducts(vec![4, 9])).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(StoreError::StaleStatus {
                expected: OrderStatus::Pending
            })
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(StoreError::Pool("timed out".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
