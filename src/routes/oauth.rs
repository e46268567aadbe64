use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::Redirect,
    Json,
};
use axum_extra::{headers::Cookie, typed_header::TypedHeader};
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{NewUser, User},
    routes::auth::{
        create_account, http_only_cookie, issue_session, normalize_email, CookieSpec,
        LoginResponse,
    },
    schema::{oauth_state_nonces, users},
    state::AppState,
    status::UserType,
};

/// Holds the nonce of the sign-in this browser started. `Lax` so it survives
/// the top-level redirect back from the provider.
const STATE_COOKIE: CookieSpec = CookieSpec {
    name: "oauth_state",
    path: "/oauth",
    same_site: "Lax",
};

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn google_login(State(state): State<AppState>) -> AppResult<(HeaderMap, Redirect)> {
    let provider = state.identity_provider()?;
    let (oauth_state, nonce) = state.jwt.generate_oauth_state()?;
    let location = provider.authorize_url(&oauth_state)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        http_only_cookie(
            &state,
            &STATE_COOKIE,
            Some((&nonce.to_string(), state.jwt.oauth_state_ttl())),
        )?,
    );
    Ok((headers, Redirect::to(&location)))
}

pub async fn google_callback(
    State(state): State<AppState>,
    jar: Option<TypedHeader<Cookie>>,
    Query(query): Query<CallbackQuery>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    if let Some(error) = query.error {
        return Err(AppError::bad_request(format!("sign-in was cancelled: {error}")));
    }
    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::bad_request("authorization code is missing"))?;
    let returned_state = query
        .state
        .ok_or_else(|| AppError::bad_request("state parameter is missing"))?;
    let claims = state
        .jwt
        .verify_oauth_state(&returned_state)
        .map_err(|_| AppError::bad_request("invalid or expired state parameter"))?;
    let started_here = jar
        .as_ref()
        .and_then(|TypedHeader(cookies)| cookies.get(STATE_COOKIE.name))
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .is_some_and(|nonce| nonce == claims.nonce);
    if !started_here {
        return Err(AppError::bad_request("sign-in was not started from this browser"));
    }
    {
        let mut conn = state.db()?;
        consume_state_nonce(&mut conn, claims.nonce, state.jwt.oauth_state_ttl())?;
    }

    let provider = state.identity_provider()?;
    let identity = provider.exchange_code(&code).await.map_err(|err| {
        tracing::warn!(error = %err, "OAuth code exchange failed");
        AppError::bad_request("could not complete sign-in with the provider")
    })?;

    let email = identity
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| AppError::bad_request("provider did not return an email address"))?;

    let mut conn = state.db()?;
    let existing: Option<User> = users::table
        .filter(users::email.eq(&email))
        .first(&mut conn)
        .optional()?;

    let user = match existing {
        Some(user) => user,
        None => {
            let user = create_account(
                &mut conn,
                NewUser {
                    id: Uuid::new_v4(),
                    email,
                    password_hash: None,
                    first_name: identity.given_name.unwrap_or_default(),
                    last_name: identity.family_name.unwrap_or_default(),
                    is_admin: false,
                },
                UserType::Shipper,
                String::new(),
            )?;
            tracing::info!(user_id = %user.id, provider = "google", "created account from OAuth sign-in");
            user
        }
    };

    if !user.is_active {
        return Err(AppError::unauthorized());
    }

    let (mut headers, body) = issue_session(&state, &mut conn, &user)?;
    headers.append(SET_COOKIE, http_only_cookie(&state, &STATE_COOKIE, None)?);
    Ok((headers, body))
}

/// Marks a state nonce spent; a second callback with the same state fails.
/// Expired entries are swept on the way.
fn consume_state_nonce(
    conn: &mut PgConnection,
    nonce: Uuid,
    ttl: ChronoDuration,
) -> AppResult<()> {
    let now = Utc::now().naive_utc();
    diesel::delete(oauth_state_nonces::table.filter(oauth_state_nonces::expires_at.lt(now)))
        .execute(conn)?;

    let inserted = diesel::insert_into(oauth_state_nonces::table)
        .values((
            oauth_state_nonces::nonce.eq(nonce),
            oauth_state_nonces::expires_at.eq(now + ttl),
        ))
        .on_conflict_do_nothing()
        .execute(conn)?;
    if inserted == 0 {
        return Err(AppError::bad_request("this sign-in has already been completed"));
    }
    Ok(())
}
