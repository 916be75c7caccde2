use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::auth::AdminClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/login", post(login_admin))
}

/// Exchange the configured admin credential for a JWT. The studio runs with
/// a single admin identity; there is no customer login.
async fn login_admin(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if req.email != state.auth.admin_email || req.password != state.auth.admin_password {
        return Err(AppError::AuthenticationError("invalid credentials".to_string()));
    }

    let claims = AdminClaims {
        sub: req.email,
        role: "ADMIN".to_owned(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration_seconds as i64)).timestamp()
            as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;

    Ok(Json(AuthResponse { token }))
}
