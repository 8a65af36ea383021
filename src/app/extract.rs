use axum::extract::{FromRequestParts, Path};

use crate::app::app_error::AppError;

/// [`Path`] that answers an unparseable id with the 404 error envelope.
#[derive(FromRequestParts, Debug)]
#[from_request(via(Path), rejection(AppError))]
pub struct IdPath<T>(pub T);
