use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use axum_extra::{headers::Cookie, typed_header::TypedHeader};
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    extract::ValidatedJson,
    models::{NewRefreshToken, NewUser, NewUserProfile, User},
    schema::{refresh_tokens, user_profiles, users},
    state::AppState,
    status::UserType,
};

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(
        min = 6,
        message = "password must be at least 6 characters long"
    ))]
    pub password: String,
    pub password2: String,
    #[serde(default)]
    #[validate(length(max = 301))]
    pub display_name: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub phone_number: String,
    #[serde(default = "default_user_type")]
    pub user_type: UserType,
}

fn default_user_type() -> UserType {
    UserType::Shipper
}

#[derive(Deserialize)]
pub struct CheckEmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Serialize)]
pub struct CheckEmailResponse {
    pub exists: bool,
    pub email: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<LoginResponse>)> {
    if payload.password != payload.password2 {
        return Err(AppError::bad_request("passwords do not match"));
    }

    let email = normalize_email(&payload.email);
    let (first_name, last_name) = split_display_name(&payload.display_name);
    let password_hash = password::hash_password(&payload.password)?;

    let mut conn = state.db()?;
    let exists: bool = diesel::select(diesel::dsl::exists(
        users::table.filter(users::email.eq(&email)),
    ))
    .get_result(&mut conn)?;
    if exists {
        return Err(AppError::conflict("this email address is already registered"));
    }

    let user = create_account(
        &mut conn,
        NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash: Some(password_hash),
            first_name,
            last_name,
            is_admin: false,
        },
        payload.user_type,
        payload.phone_number.trim().to_string(),
    )?;

    tracing::info!(user_id = %user.id, user_type = %payload.user_type, "registered new account");

    let (headers, body) = issue_session(&state, &mut conn, &user)?;
    Ok((StatusCode::CREATED, headers, body))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let mut conn = state.db()?;

    let user: User = users::table
        .filter(users::email.eq(normalize_email(&payload.email)))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    if !user.is_active {
        return Err(AppError::unauthorized());
    }

    let stored_hash = user
        .password_hash
        .as_deref()
        .ok_or_else(AppError::unauthorized)?;
    let valid = password::verify_password(&payload.password, stored_hash)
        .map_err(|_| AppError::unauthorized())?;

    if !valid {
        return Err(AppError::unauthorized());
    }

    issue_session(&state, &mut conn, &user)
}

/// Rotates the refresh cookie. The presented token is revoked in the same
/// statement that looks it up, so it can be spent only once.
pub async fn refresh(
    State(state): State<AppState>,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let presented = jar
        .as_ref()
        .and_then(|TypedHeader(cookies)| cookies.get(REFRESH_COOKIE.name))
        .ok_or_else(AppError::unauthorized)?;

    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let owner: Option<Uuid> = diesel::update(
        refresh_tokens::table
            .filter(refresh_tokens::token_hash.eq(hash_refresh_token(presented)))
            .filter(refresh_tokens::revoked_at.is_null())
            .filter(refresh_tokens::expires_at.gt(now)),
    )
    .set((
        refresh_tokens::revoked_at.eq(now),
        refresh_tokens::updated_at.eq(now),
    ))
    .returning(refresh_tokens::user_id)
    .get_result(&mut conn)
    .optional()?;

    let user_id = owner.ok_or_else(AppError::unauthorized)?;
    let user: User = users::table.find(user_id).first(&mut conn)?;
    if !user.is_active {
        return Err(AppError::unauthorized());
    }

    issue_session(&state, &mut conn, &user)
}

/// Revokes the presented refresh token, or every open one when the cookie
/// is missing or already spent.
pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, StatusCode)> {
    let mut conn = state.db()?;
    let presented = jar
        .as_ref()
        .and_then(|TypedHeader(cookies)| cookies.get(REFRESH_COOKIE.name))
        .map(hash_refresh_token);

    let revoked = match presented {
        Some(hash) => revoke_refresh_tokens(&mut conn, user.user_id, Some(&hash))?,
        None => 0,
    };
    if revoked == 0 {
        revoke_refresh_tokens(&mut conn, user.user_id, None)?;
    }

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, refresh_cookie(&state, None)?);
    Ok((headers, StatusCode::NO_CONTENT))
}

/// Marks open refresh tokens of `user_id` revoked; limited to one token hash
/// when given. Returns how many rows changed.
pub(crate) fn revoke_refresh_tokens(
    conn: &mut PgConnection,
    user_id: Uuid,
    token_hash: Option<&str>,
) -> AppResult<usize> {
    let now = Utc::now().naive_utc();
    let mut target = refresh_tokens::table
        .filter(refresh_tokens::user_id.eq(user_id))
        .filter(refresh_tokens::revoked_at.is_null())
        .into_boxed();
    if let Some(hash) = token_hash {
        target = target.filter(refresh_tokens::token_hash.eq(hash.to_owned()));
    }
    let ids: Vec<Uuid> = target.select(refresh_tokens::id).load(conn)?;
    if ids.is_empty() {
        return Ok(0);
    }

    Ok(diesel::update(refresh_tokens::table.filter(refresh_tokens::id.eq_any(ids)))
        .set((
            refresh_tokens::revoked_at.eq(now),
            refresh_tokens::updated_at.eq(now),
        ))
        .execute(conn)?)
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}

pub async fn check_email(
    State(state): State<AppState>,
    Json(payload): Json<CheckEmailRequest>,
) -> AppResult<Json<CheckEmailResponse>> {
    let email = normalize_email(&payload.email);
    if email.is_empty() {
        return Err(AppError::bad_request("email is required"));
    }

    let mut conn = state.db()?;
    let exists: bool = diesel::select(diesel::dsl::exists(
        users::table.filter(users::email.eq(&email)),
    ))
    .get_result(&mut conn)?;

    Ok(Json(CheckEmailResponse { exists, email }))
}

/// Inserts a user and its profile in one transaction.
pub fn create_account(
    conn: &mut PgConnection,
    new_user: NewUser,
    user_type: UserType,
    phone_number: String,
) -> AppResult<User> {
    conn.transaction::<User, AppError, _>(|conn| {
        let user: User = diesel::insert_into(users::table)
            .values(&new_user)
            .get_result(conn)?;

        let profile = NewUserProfile {
            id: Uuid::new_v4(),
            user_id: user.id,
            user_type: user_type.to_string(),
            phone_number,
            documents_verified: user_type == UserType::Shipper,
        };
        diesel::insert_into(user_profiles::table)
            .values(&profile)
            .execute(conn)?;

        Ok(user)
    })
}

/// Mints an access token and a rotated refresh cookie for `user`.
pub(crate) fn issue_session(
    state: &AppState,
    conn: &mut PgConnection,
    user: &User,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let access_token = state
        .jwt
        .generate_token(user.id, &user.email, user.is_admin)
        .map_err(AppError::from)?;

    let now = Utc::now();
    let refresh_value = generate_refresh_token();
    let refresh_expires_at = now + ChronoDuration::days(state.config.refresh_token_expiry_days);

    let new_refresh = NewRefreshToken {
        id: Uuid::new_v4(),
        user_id: user.id,
        token_hash: hash_refresh_token(&refresh_value),
        issued_at: now.naive_utc(),
        expires_at: refresh_expires_at.naive_utc(),
    };

    diesel::insert_into(refresh_tokens::table)
        .values(&new_refresh)
        .execute(conn)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        refresh_cookie(state, Some(&refresh_value))?,
    );

    Ok((
        headers,
        Json(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.jwt.access_ttl_seconds(),
        }),
    ))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Splits "Ayşe Nur Yılmaz" into ("Ayşe", "Nur Yılmaz").
pub(crate) fn split_display_name(display_name: &str) -> (String, String) {
    let trimmed = display_name.trim();
    match trimmed.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Name, path and same-site policy of an HttpOnly cookie the API sets.
pub(crate) struct CookieSpec {
    pub name: &'static str,
    pub path: &'static str,
    pub same_site: &'static str,
}

const REFRESH_COOKIE: CookieSpec = CookieSpec {
    name: "refresh_token",
    path: "/",
    same_site: "Strict",
};

/// `Set-Cookie` value carrying `value` for `ttl`, or clearing the cookie when
/// `value` is `None`.
pub(crate) fn http_only_cookie(
    state: &AppState,
    spec: &CookieSpec,
    value: Option<(&str, ChronoDuration)>,
) -> AppResult<HeaderValue> {
    let name = spec.name;
    let mut cookie = match value {
        Some((value, ttl)) => format!(
            "{name}={value}; Max-Age={}; Expires={}",
            ttl.num_seconds(),
            (Utc::now() + ttl).format("%a, %d %b %Y %H:%M:%S GMT"),
        ),
        None => format!("{name}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT"),
    };
    cookie.push_str(&format!(
        "; Path={}; HttpOnly; SameSite={}",
        spec.path, spec.same_site
    ));
    if state.config.refresh_cookie_secure {
        cookie.push_str("; Secure");
    }
    if let Some(domain) = &state.config.refresh_cookie_domain {
        cookie.push_str(&format!("; Domain={domain}"));
    }

    HeaderValue::from_str(&cookie).map_err(AppError::internal)
}

fn refresh_cookie(state: &AppState, token: Option<&str>) -> AppResult<HeaderValue> {
    let ttl = ChronoDuration::days(state.config.refresh_token_expiry_days);
    http_only_cookie(state, &REFRESH_COOKIE, token.map(|token| (token, ttl)))
}
