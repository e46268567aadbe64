use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    extract::ValidatedJson,
    models::{User, UserProfile},
    schema::{user_documents, user_profiles, users},
    state::AppState,
    status::{DocumentStatus, DocumentType, UserType},
    utils::text::contains_pattern,
};

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub user_type: String,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<String>,
    pub service_areas: String,
    pub working_hours: String,
    pub bio: String,
    pub rating_avg: BigDecimal,
    pub rating_count: i32,
    pub profile_completed: bool,
    pub documents_verified: bool,
    pub created_at: NaiveDateTime,
}

impl ProfileResponse {
    /// Full view for the profile owner.
    fn private(profile: UserProfile, user: &User) -> Self {
        let mut response = Self::public(profile.clone(), user);
        response.iban = Some(profile.iban);
        response.tax_id = Some(profile.tax_id);
        response.billing_address = Some(profile.billing_address);
        response
    }

    fn public(profile: UserProfile, user: &User) -> Self {
        Self {
            id: profile.id,
            user_id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            display_name: user.display_name(),
            user_type: profile.user_type,
            phone_number: profile.phone_number,
            iban: None,
            company_name: profile.company_name,
            tax_id: None,
            billing_address: None,
            service_areas: profile.service_areas,
            working_hours: profile.working_hours,
            bio: profile.bio,
            rating_avg: profile.rating_avg,
            rating_count: profile.rating_count,
            profile_completed: profile.profile_completed,
            documents_verified: profile.documents_verified,
            created_at: profile.created_at,
        }
    }
}

#[derive(Deserialize, Validate, Default)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    pub user_type: Option<UserType>,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    pub iban: Option<String>,
    #[validate(length(max = 200))]
    pub company_name: Option<String>,
    #[validate(length(max = 20))]
    pub tax_id: Option<String>,
    pub billing_address: Option<String>,
    pub service_areas: Option<String>,
    #[validate(length(max = 100))]
    pub working_hours: Option<String>,
    #[validate(length(max = 500, message = "bio must be at most 500 characters"))]
    pub bio: Option<String>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = user_profiles)]
struct ProfileChangeset {
    user_type: Option<String>,
    phone_number: Option<String>,
    iban: Option<String>,
    company_name: Option<String>,
    tax_id: Option<String>,
    billing_address: Option<String>,
    service_areas: Option<String>,
    working_hours: Option<String>,
    bio: Option<String>,
}

#[derive(Deserialize)]
pub struct ListProfilesQuery {
    pub search: Option<String>,
}

pub async fn get_my_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ProfileResponse>> {
    let mut conn = state.db()?;
    let account: User = users::table.find(user.user_id).first(&mut conn)?;
    let profile = load_profile(&mut conn, user.user_id)?;
    Ok(Json(ProfileResponse::private(profile, &account)))
}

pub async fn update_my_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(payload): ValidatedJson<UpdateProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    let iban = payload.iban.as_deref().map(normalize_iban).transpose()?;

    let mut conn = state.db()?;
    let current = load_profile(&mut conn, user.user_id)?;

    let user_type = payload.user_type.unwrap_or(if current.is_carrier() {
        UserType::Carrier
    } else {
        UserType::Shipper
    });

    let mut changes = ProfileChangeset {
        user_type: payload.user_type.map(|value| value.to_string()),
        phone_number: payload.phone_number.map(|value| value.trim().to_string()),
        iban,
        ..Default::default()
    };
    match user_type {
        UserType::Shipper => {
            changes.company_name = payload.company_name.map(|value| value.trim().to_string());
            changes.tax_id = payload.tax_id.map(|value| value.trim().to_string());
            changes.billing_address = payload.billing_address;
        }
        UserType::Carrier => {
            changes.service_areas = payload.service_areas;
            changes.working_hours = payload.working_hours.map(|value| value.trim().to_string());
            changes.bio = payload.bio;
        }
    }

    let (account, profile) = conn.transaction::<_, AppError, _>(|conn| {
        if payload.first_name.is_some() || payload.last_name.is_some() {
            diesel::update(users::table.find(user.user_id))
                .set((
                    payload
                        .first_name
                        .as_deref()
                        .map(|value| users::first_name.eq(value.trim())),
                    payload
                        .last_name
                        .as_deref()
                        .map(|value| users::last_name.eq(value.trim())),
                ))
                .execute(conn)?;
        }

        let profile: UserProfile =
            diesel::update(user_profiles::table.filter(user_profiles::user_id.eq(user.user_id)))
                .set((
                    &changes,
                    user_profiles::updated_at.eq(diesel::dsl::now),
                ))
                .get_result(conn)?;

        let completed = is_profile_complete(&profile.phone_number, &profile.iban);
        diesel::update(user_profiles::table.find(profile.id))
            .set(user_profiles::profile_completed.eq(completed))
            .execute(conn)?;
        refresh_documents_verified(conn, user.user_id)?;

        let account: User = users::table.find(user.user_id).first(conn)?;
        let profile: UserProfile = user_profiles::table.find(profile.id).first(conn)?;
        Ok((account, profile))
    })?;

    Ok(Json(ProfileResponse::private(profile, &account)))
}

pub async fn list_verified_carriers(
    State(state): State<AppState>,
    Query(query): Query<ListProfilesQuery>,
) -> AppResult<Json<Vec<ProfileResponse>>> {
    let mut conn = state.db()?;

    let mut statement = user_profiles::table
        .inner_join(users::table)
        .filter(user_profiles::user_type.eq(UserType::Carrier.as_ref()))
        .filter(user_profiles::documents_verified.eq(true))
        .filter(users::is_active.eq(true))
        .into_boxed();

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = contains_pattern(search);
        statement = statement.filter(
            users::email
                .ilike(pattern.clone())
                .or(users::first_name.ilike(pattern.clone()))
                .or(users::last_name.ilike(pattern.clone()))
                .or(user_profiles::company_name.ilike(pattern)),
        );
    }

    let rows: Vec<(UserProfile, User)> = statement
        .order((user_profiles::rating_avg.desc(), user_profiles::created_at.desc()))
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|(profile, user)| ProfileResponse::public(profile, &user))
            .collect(),
    ))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
) -> AppResult<Json<ProfileResponse>> {
    let mut conn = state.db()?;
    let (profile, user): (UserProfile, User) = user_profiles::table
        .inner_join(users::table)
        .filter(user_profiles::id.eq(profile_id))
        .first(&mut conn)?;
    Ok(Json(ProfileResponse::public(profile, &user)))
}

pub(crate) fn load_profile(conn: &mut PgConnection, user_id: Uuid) -> AppResult<UserProfile> {
    user_profiles::table
        .filter(user_profiles::user_id.eq(user_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}

/// Re-derives `documents_verified` from the user's approved documents.
pub(crate) fn refresh_documents_verified(conn: &mut PgConnection, user_id: Uuid) -> AppResult<bool> {
    let profile = load_profile(conn, user_id)?;
    let verified = if profile.is_carrier() {
        let approved: Vec<String> = user_documents::table
            .filter(user_documents::user_id.eq(user_id))
            .filter(user_documents::status.eq(DocumentStatus::Approved.as_ref()))
            .select(user_documents::document_type)
            .load(conn)?;
        has_all_document_types(&approved)
    } else {
        true
    };

    if verified != profile.documents_verified {
        diesel::update(user_profiles::table.find(profile.id))
            .set(user_profiles::documents_verified.eq(verified))
            .execute(conn)?;
        tracing::info!(user_id = %user_id, documents_verified = verified, "updated verification status");
    }
    Ok(verified)
}

fn has_all_document_types(approved: &[String]) -> bool {
    let approved: HashSet<&str> = approved.iter().map(String::as_str).collect();
    DocumentType::iter().all(|kind| approved.contains(kind.as_ref()))
}

fn is_profile_complete(phone_number: &str, iban: &str) -> bool {
    !phone_number.trim().is_empty() && !iban.trim().is_empty()
}

/// Trims and upper-cases an IBAN; Turkish IBANs are `TR` plus 24 digits.
pub(crate) fn normalize_iban(raw: &str) -> AppResult<String> {
    let iban = raw.trim().to_uppercase();
    if iban.is_empty() {
        return Ok(iban);
    }
    if !iban.starts_with("TR") {
        return Err(AppError::bad_request("IBAN must start with TR"));
    }
    if iban.chars().count() != 26 {
        return Err(AppError::bad_request("IBAN must be 26 characters long"));
    }
    Ok(iban)
}
