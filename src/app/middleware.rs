use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};

use crate::app::{app_error::AppError, app_state::AppState};
use crate::auth::{self, CurrentUser};

type BasicAuth = Option<TypedHeader<Authorization<Basic>>>;

async fn identify(state: &AppState, credentials: BasicAuth) -> Result<CurrentUser, AppError> {
    let TypedHeader(Authorization(basic)) = credentials.ok_or(AppError::Unauthorized)?;
    auth::authenticate(state.store.as_ref(), basic.username(), basic.password()).await
}

/// Rejects anonymous requests and exposes the caller as `Extension<CurrentUser>`.
pub async fn require_user(
    State(state): State<AppState>,
    credentials: BasicAuth,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = identify(&state, credentials).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Like [`require_user`], but only staff accounts get through.
pub async fn require_staff(
    State(state): State<AppState>,
    credentials: BasicAuth,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = identify(&state, credentials).await?;
    if !user.is_staff {
        tracing::debug!(username = %user.username, "staff-only route refused");
        return Err(AppError::Forbidden);
    }
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
