use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::categories;
use crate::db;
use crate::error::Error;
use crate::models::User;
use crate::routes::AppState;

const TOKEN_LIFETIME_DAYS: i64 = 7;

#[derive(Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i64,
}

#[derive(Deserialize)]
pub struct AuthReq {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<AuthReq>,
) -> Result<Json<AuthPayload>, Error> {
    let conn = db::open(&state.db_path)?;
    let user = create_user(&conn, &req.email, &hash_password(&req.password)?)?;

    // Best effort: a user without a starting category set can still log in,
    // so a provisioning failure must not undo the registration.
    if let Err(e) = categories::provision_user(&conn, user.id) {
        tracing::warn!(user_id = user.id, "category provisioning failed: {e}");
    }

    let token = encode_jwt(user.id, &state.jwt_secret)?;
    Ok(Json(AuthPayload { token, user }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<AuthReq>,
) -> Result<Json<AuthPayload>, Error> {
    let conn = db::open(&state.db_path)?;
    let row = conn
        .query_row(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
            params![req.email],
            |row| {
                Ok((
                    User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        created_at: row.get(3)?,
                    },
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    // Same rejection for unknown email and bad password.
    let (user, stored_hash) = row.ok_or(Error::InvalidCredentials)?;
    if !verify_password(&req.password, &stored_hash)? {
        return Err(Error::InvalidCredentials);
    }

    let token = encode_jwt(user.id, &state.jwt_secret)?;
    Ok(Json(AuthPayload { token, user }))
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Option<User>>, Error> {
    let Some(user_id) = bearer_user(&headers, &state.jwt_secret) else {
        return Ok(Json(None));
    };
    let conn = db::open(&state.db_path)?;
    let user = conn
        .query_row(
            "SELECT id, email, created_at FROM users WHERE id = ?1",
            params![user_id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(Json(user))
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Error> {
    let user_id = bearer_user(req.headers(), &state.jwt_secret).ok_or(Error::Unauthenticated)?;
    req.extensions_mut().insert(AuthUser { user_id });
    Ok(next.run(req).await)
}

pub fn create_user(conn: &Connection, email: &str, password_hash: &str) -> Result<User, Error> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM users WHERE email = ?1", params![email], |row| row.get(0))
        .optional()?;
    if existing.is_some() {
        return Err(Error::EmailTaken);
    }

    conn.execute(
        "INSERT INTO users (email, password_hash) VALUES (?1, ?2)",
        params![email, password_hash],
    )?;
    let id = conn.last_insert_rowid();
    let user = conn.query_row(
        "SELECT id, email, created_at FROM users WHERE id = ?1",
        params![id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                created_at: row.get(2)?,
            })
        },
    )?;
    Ok(user)
}

pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| Error::Hash)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, Error> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| Error::Hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn encode_jwt(user_id: i64, secret: &str) -> Result<String, Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(jsonwebtoken::Algorithm::HS256),
    )?;
    Ok(data.claims)
}

fn bearer_user(headers: &HeaderMap, secret: &str) -> Option<i64> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))?;
    let claims = decode_jwt(token, secret).ok()?;
    claims.sub.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use crate::db::init_db;
    use crate::error::Error;

    use super::{create_user, decode_jwt, encode_jwt, hash_password, verify_password};

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("tr3s-secret").unwrap();
        assert!(verify_password("tr3s-secret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn jwt_round_trip() {
        let token = encode_jwt(42, "secret").unwrap();
        let claims = decode_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, "42");
        assert!(decode_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();

        let user = create_user(&conn, "marie@test.com", "hash").unwrap();
        assert_eq!(user.email, "marie@test.com");
        assert!(matches!(
            create_user(&conn, "marie@test.com", "hash"),
            Err(Error::EmailTaken)
        ));
    }
}
