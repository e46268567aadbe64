use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    extract::ValidatedJson,
    models::{NewVehicle, Vehicle},
    routes::profiles::load_profile,
    schema::vehicles,
    state::AppState,
    status::VehicleType,
};

#[derive(Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[validate(length(min = 1, max = 20, message = "plate_number is required"))]
    pub plate_number: String,
    #[validate(length(min = 1, max = 100))]
    pub brand: String,
    #[validate(length(min = 1, max = 100))]
    pub model: String,
    #[validate(range(min = 1950, message = "year is out of range"))]
    pub year: i32,
    pub vehicle_type: VehicleType,
    #[validate(range(min = 1, message = "max_weight_kg must be positive"))]
    pub max_weight_kg: i32,
    pub max_volume_m3: BigDecimal,
    #[serde(default)]
    pub has_cargo_insurance: bool,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub insurance_company: String,
    pub insurance_expiry: Option<NaiveDate>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateVehicleRequest {
    #[validate(length(min = 1, max = 100))]
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub model: Option<String>,
    #[validate(range(min = 1950))]
    pub year: Option<i32>,
    pub vehicle_type: Option<VehicleType>,
    #[validate(range(min = 1))]
    pub max_weight_kg: Option<i32>,
    pub max_volume_m3: Option<BigDecimal>,
    pub has_cargo_insurance: Option<bool>,
    #[validate(length(max = 100))]
    pub insurance_company: Option<String>,
    pub insurance_expiry: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(AsChangeset)]
#[diesel(table_name = vehicles)]
struct VehicleChangeset {
    brand: Option<String>,
    model: Option<String>,
    year: Option<i32>,
    vehicle_type: Option<String>,
    max_weight_kg: Option<i32>,
    max_volume_m3: Option<BigDecimal>,
    has_cargo_insurance: Option<bool>,
    insurance_company: Option<String>,
    insurance_expiry: Option<Option<NaiveDate>>,
    is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct VehicleListQuery {
    pub carrier_id: Option<Uuid>,
    pub vehicle_type: Option<VehicleType>,
    pub ordering: Option<String>,
}

pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(query): Query<VehicleListQuery>,
) -> AppResult<Json<Vec<Vehicle>>> {
    let mut conn = state.db()?;
    let mut statement = vehicles::table
        .filter(vehicles::is_active.eq(true))
        .into_boxed();

    if let Some(carrier_id) = query.carrier_id {
        statement = statement.filter(vehicles::owner_id.eq(carrier_id));
    }
    if let Some(vehicle_type) = query.vehicle_type {
        statement = statement.filter(vehicles::vehicle_type.eq(vehicle_type.to_string()));
    }

    statement = match query.ordering.as_deref() {
        Some("year") => statement.order(vehicles::year.asc()),
        Some("-year") => statement.order(vehicles::year.desc()),
        Some("created_at") => statement.order(vehicles::created_at.asc()),
        Some("-created_at") | None => statement.order(vehicles::created_at.desc()),
        Some(other) => {
            return Err(AppError::bad_request(format!("unsupported ordering: {other}")));
        }
    };

    Ok(Json(statement.load(&mut conn)?))
}

pub async fn list_my_vehicles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Vehicle>>> {
    let mut conn = state.db()?;
    let rows = vehicles::table
        .filter(vehicles::owner_id.eq(user.user_id))
        .order(vehicles::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn create_vehicle(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(payload): ValidatedJson<CreateVehicleRequest>,
) -> AppResult<(StatusCode, Json<Vehicle>)> {
    validate_year(payload.year)?;
    validate_volume(&payload.max_volume_m3)?;

    let mut conn = state.db()?;
    let profile = load_profile(&mut conn, user.user_id)?;
    if !profile.is_carrier() {
        return Err(AppError::forbidden("only carriers can register vehicles"));
    }

    let new_vehicle = NewVehicle {
        id: Uuid::new_v4(),
        owner_id: user.user_id,
        plate_number: normalize_plate(&payload.plate_number),
        brand: payload.brand.trim().to_string(),
        model: payload.model.trim().to_string(),
        year: payload.year,
        vehicle_type: payload.vehicle_type.to_string(),
        max_weight_kg: payload.max_weight_kg,
        max_volume_m3: payload.max_volume_m3,
        has_cargo_insurance: payload.has_cargo_insurance,
        insurance_company: payload.insurance_company.trim().to_string(),
        insurance_expiry: payload.insurance_expiry,
    };

    let vehicle: Vehicle = match diesel::insert_into(vehicles::table)
        .values(&new_vehicle)
        .get_result(&mut conn)
    {
        Ok(vehicle) => vehicle,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::conflict("a vehicle with this plate number already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    tracing::info!(vehicle_id = %vehicle.id, owner_id = %user.user_id, "registered vehicle");
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<Uuid>,
) -> AppResult<Json<Vehicle>> {
    let mut conn = state.db()?;
    let vehicle = vehicles::table.find(vehicle_id).first(&mut conn)?;
    Ok(Json(vehicle))
}

pub async fn update_vehicle(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(vehicle_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateVehicleRequest>,
) -> AppResult<Json<Vehicle>> {
    if let Some(year) = payload.year {
        validate_year(year)?;
    }
    if let Some(volume) = payload.max_volume_m3.as_ref() {
        validate_volume(volume)?;
    }

    let mut conn = state.db()?;
    let existing: Vehicle = vehicles::table.find(vehicle_id).first(&mut conn)?;
    ensure_owner(&existing, &user)?;

    let changes = VehicleChangeset {
        brand: payload.brand.map(|value| value.trim().to_string()),
        model: payload.model.map(|value| value.trim().to_string()),
        year: payload.year,
        vehicle_type: payload.vehicle_type.map(|value| value.to_string()),
        max_weight_kg: payload.max_weight_kg,
        max_volume_m3: payload.max_volume_m3,
        has_cargo_insurance: payload.has_cargo_insurance,
        insurance_company: payload.insurance_company.map(|value| value.trim().to_string()),
        insurance_expiry: payload.insurance_expiry.map(Some),
        is_active: payload.is_active,
    };

    let vehicle = diesel::update(vehicles::table.find(vehicle_id))
        .set((&changes, vehicles::updated_at.eq(diesel::dsl::now)))
        .get_result(&mut conn)?;
    Ok(Json(vehicle))
}

pub async fn delete_vehicle(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(vehicle_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let existing: Vehicle = vehicles::table.find(vehicle_id).first(&mut conn)?;
    ensure_owner(&existing, &user)?;

    diesel::delete(vehicles::table.find(vehicle_id)).execute(&mut conn)?;
    tracing::info!(vehicle_id = %vehicle_id, "deleted vehicle");
    Ok(StatusCode::NO_CONTENT)
}

fn ensure_owner(vehicle: &Vehicle, user: &AuthenticatedUser) -> AppResult<()> {
    if vehicle.owner_id != user.user_id {
        return Err(AppError::forbidden("you can only manage your own vehicles"));
    }
    Ok(())
}

fn validate_year(year: i32) -> AppResult<()> {
    let latest = Utc::now().year() + 1;
    if year > latest {
        return Err(AppError::bad_request(format!("year must not be after {latest}")));
    }
    Ok(())
}

fn validate_volume(volume: &BigDecimal) -> AppResult<()> {
    if volume <= &BigDecimal::from(0) {
        return Err(AppError::bad_request("max_volume_m3 must be positive"));
    }
    Ok(())
}

fn normalize_plate(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}
