use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

pub fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    if !headers.contains_key(axum::http::header::AUTHORIZATION) {
        return Err(AppError::Auth("Missing authorization header".to_string()));
    }

    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

/// Validates the bearer token and stores the caller's `User` in request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;

    let user = validate_token(&token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Caller id as a UUID; tokens whose subject is not a UUID cannot own records here.
pub fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    user.uuid()
        .ok_or_else(|| AppError::Auth("Token subject is not a valid user id".to_string()))
}

pub fn require_doctor(user: &User) -> Result<Uuid, AppError> {
    let id = user_uuid(user)?;
    if !user.is_doctor() {
        return Err(AppError::Forbidden("Only providers can manage availability".to_string()));
    }
    Ok(id)
}
