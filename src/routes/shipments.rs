use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate, Utc};
use diesel::{pg::Pg, prelude::*};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    extract::ValidatedJson,
    models::{Bid, NewShipment, Shipment},
    routes::profiles::load_profile,
    schema::{bids, shipments},
    state::AppState,
    status::{BidStatus, CargoType, Responsibility, ShipmentStatus},
    utils::{
        json::{classify_nullable, nullable_date, NullableValue},
        text::contains_pattern,
    },
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize, Validate)]
pub struct CreateShipmentRequest {
    #[validate(length(min = 1, max = 255, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_cargo_type")]
    pub cargo_type: CargoType,
    #[validate(length(min = 1, max = 100, message = "from_city is required"))]
    pub from_city: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub from_district: String,
    #[validate(length(min = 1, message = "from_address is required"))]
    pub from_address: String,
    #[validate(length(min = 1, max = 100, message = "to_city is required"))]
    pub to_city: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub to_district: String,
    #[validate(length(min = 1, message = "to_address is required"))]
    pub to_address: String,
    pub weight_kg: BigDecimal,
    pub length_cm: Option<BigDecimal>,
    pub width_cm: Option<BigDecimal>,
    pub height_cm: Option<BigDecimal>,
    #[serde(default = "default_responsibility")]
    pub loading_responsibility: Responsibility,
    #[serde(default = "default_responsibility")]
    pub unloading_responsibility: Responsibility,
    pub suggested_price: BigDecimal,
    pub pickup_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub images: Vec<String>,
}

fn default_cargo_type() -> CargoType {
    CargoType::Diger
}

fn default_responsibility() -> Responsibility {
    Responsibility::Shipper
}

#[derive(Deserialize, Default)]
pub struct ShipmentListQuery {
    pub status: Option<ShipmentStatus>,
    pub cargo_type: Option<CargoType>,
    pub city: Option<String>,
    pub from_city: Option<String>,
    pub to_city: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Serialize)]
pub struct ShipmentPage {
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
    pub results: Vec<Shipment>,
}

#[derive(Serialize)]
pub struct ShipmentDetail {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub status_display: &'static str,
    pub assigned_bid: Option<Bid>,
    pub is_owner: bool,
}

#[derive(Deserialize, Default)]
pub struct CancelShipmentRequest {
    #[serde(default)]
    pub reason: String,
}

type BoxedShipmentQuery<'a> = shipments::BoxedQuery<'a, Pg>;

fn filtered_shipments(query: &ShipmentListQuery) -> BoxedShipmentQuery<'static> {
    let status = query.status.unwrap_or(ShipmentStatus::Active);
    let mut statement = shipments::table
        .filter(shipments::status.eq(status.to_string()))
        .into_boxed();

    if let Some(cargo_type) = query.cargo_type {
        statement = statement.filter(shipments::cargo_type.eq(cargo_type.to_string()));
    }
    if let Some(city) = non_empty(query.city.as_deref()) {
        let pattern = contains_pattern(city);
        statement = statement.filter(
            shipments::from_city
                .ilike(pattern.clone())
                .or(shipments::to_city.ilike(pattern)),
        );
    }
    if let Some(from_city) = non_empty(query.from_city.as_deref()) {
        statement = statement.filter(shipments::from_city.ilike(contains_pattern(from_city)));
    }
    if let Some(to_city) = non_empty(query.to_city.as_deref()) {
        statement = statement.filter(shipments::to_city.ilike(contains_pattern(to_city)));
    }
    if let Some(search) = non_empty(query.search.as_deref()) {
        let pattern = contains_pattern(search);
        statement = statement.filter(
            shipments::title
                .ilike(pattern.clone())
                .or(shipments::description.ilike(pattern.clone()))
                .or(shipments::tracking_number.ilike(pattern)),
        );
    }
    statement
}

fn apply_ordering(
    statement: BoxedShipmentQuery<'static>,
    ordering: Option<&str>,
) -> AppResult<BoxedShipmentQuery<'static>> {
    let ordered = match ordering.unwrap_or("-created_at") {
        "created_at" => statement.order(shipments::created_at.asc()),
        "-created_at" => statement.order(shipments::created_at.desc()),
        "suggested_price" => statement.order(shipments::suggested_price.asc()),
        "-suggested_price" => statement.order(shipments::suggested_price.desc()),
        "pickup_date" => statement.order(shipments::pickup_date.asc()),
        "-pickup_date" => statement.order(shipments::pickup_date.desc()),
        "view_count" => statement.order(shipments::view_count.asc()),
        "-view_count" => statement.order(shipments::view_count.desc()),
        "bid_count" => statement.order(shipments::bid_count.asc()),
        "-bid_count" => statement.order(shipments::bid_count.desc()),
        other => {
            return Err(AppError::bad_request(format!("unsupported ordering: {other}")));
        }
    };
    Ok(ordered)
}

pub async fn list_shipments(
    State(state): State<AppState>,
    Query(query): Query<ShipmentListQuery>,
) -> AppResult<Json<ShipmentPage>> {
    let (page, page_size) = page_bounds(query.page, query.page_size);
    let mut conn = state.db()?;

    let total_count: i64 = filtered_shipments(&query).count().get_result(&mut conn)?;
    let results = apply_ordering(filtered_shipments(&query), query.ordering.as_deref())?
        .limit(page_size)
        .offset(page_offset(page, page_size))
        .load(&mut conn)?;

    Ok(Json(ShipmentPage {
        total_count,
        page,
        page_size,
        results,
    }))
}

pub async fn create_shipment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(payload): ValidatedJson<CreateShipmentRequest>,
) -> AppResult<(StatusCode, Json<Shipment>)> {
    let zero = BigDecimal::from(0);
    if payload.weight_kg <= zero {
        return Err(AppError::bad_request("weight_kg must be greater than zero"));
    }
    if payload.suggested_price <= zero {
        return Err(AppError::bad_request("suggested_price must be greater than zero"));
    }
    if let Some(delivery_date) = payload.delivery_date {
        if delivery_date < payload.pickup_date {
            return Err(AppError::bad_request("delivery_date must not precede pickup_date"));
        }
    }

    let mut conn = state.db()?;
    let profile = load_profile(&mut conn, user.user_id)?;
    let tracking_number = unique_tracking_number(&mut conn)?;

    let new_shipment = NewShipment {
        id: Uuid::new_v4(),
        tracking_number,
        shipper_id: user.user_id,
        shipper_email: user.email.clone(),
        shipper_phone: profile.phone_number,
        title: payload.title.trim().to_string(),
        description: payload.description,
        cargo_type: payload.cargo_type.to_string(),
        from_city: payload.from_city.trim().to_string(),
        from_district: payload.from_district.trim().to_string(),
        from_address: payload.from_address,
        to_city: payload.to_city.trim().to_string(),
        to_district: payload.to_district.trim().to_string(),
        to_address: payload.to_address,
        weight_kg: payload.weight_kg,
        length_cm: payload.length_cm,
        width_cm: payload.width_cm,
        height_cm: payload.height_cm,
        loading_responsibility: payload.loading_responsibility.to_string(),
        unloading_responsibility: payload.unloading_responsibility.to_string(),
        suggested_price: payload.suggested_price,
        pickup_date: payload.pickup_date,
        delivery_date: payload.delivery_date,
        images: Value::from(payload.images),
    };

    let shipment: Shipment = diesel::insert_into(shipments::table)
        .values(&new_shipment)
        .get_result(&mut conn)?;

    tracing::info!(
        shipment_id = %shipment.id,
        tracking_number = %shipment.tracking_number,
        shipper_id = %user.user_id,
        "shipment posted"
    );
    Ok((StatusCode::CREATED, Json(shipment)))
}

pub async fn list_my_shipments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Shipment>>> {
    let mut conn = state.db()?;
    let rows = shipments::table
        .filter(shipments::shipper_id.eq(user.user_id))
        .order(shipments::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn get_shipment(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Path(tracking_number): Path<String>,
) -> AppResult<Json<ShipmentDetail>> {
    let mut conn = state.db()?;
    let mut shipment = find_by_tracking_number(&mut conn, &tracking_number)?;

    let is_owner = viewer
        .as_ref()
        .is_some_and(|viewer| viewer.user_id == shipment.shipper_id);
    if !is_owner {
        shipment = diesel::update(shipments::table.find(shipment.id))
            .set(shipments::view_count.eq(shipments::view_count + 1))
            .get_result(&mut conn)?;
    }

    let assigned_bid = match shipment.assigned_bid_id {
        Some(bid_id) => bids::table.find(bid_id).first(&mut conn).optional()?,
        None => None,
    };

    Ok(Json(ShipmentDetail {
        status_display: status_label(&shipment.status),
        shipment,
        assigned_bid,
        is_owner,
    }))
}

/// Partial update of an active listing. `delivery_date: null` clears it.
pub async fn update_shipment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(tracking_number): Path<String>,
    Json(body): Json<Value>,
) -> AppResult<Json<Shipment>> {
    let mut conn = state.db()?;
    let existing = find_by_tracking_number(&mut conn, &tracking_number)?;
    ensure_owner(&existing, &user)?;
    ensure_active(&existing, "only active shipments can be edited")?;

    let changes = ShipmentChangeset::from_patch(&body)?;
    let pickup_date = changes.pickup_date.unwrap_or(existing.pickup_date);
    let delivery_date = changes.delivery_date.unwrap_or(existing.delivery_date);
    if let Some(delivery_date) = delivery_date {
        if delivery_date < pickup_date {
            return Err(AppError::bad_request("delivery_date must not precede pickup_date"));
        }
    }
    if changes.is_empty() {
        return Ok(Json(existing));
    }

    let shipment = diesel::update(shipments::table.find(existing.id))
        .set((&changes, shipments::updated_at.eq(diesel::dsl::now)))
        .get_result(&mut conn)?;
    Ok(Json(shipment))
}

pub async fn cancel_shipment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(tracking_number): Path<String>,
    payload: Option<Json<CancelShipmentRequest>>,
) -> AppResult<Json<Shipment>> {
    let reason = payload.map(|Json(body)| body.reason).unwrap_or_default();
    let mut conn = state.db()?;

    let (shipment, rejected_bids) = conn.transaction::<_, AppError, _>(|conn| {
        let existing: Shipment = shipments::table
            .filter(shipments::tracking_number.eq(&tracking_number))
            .for_update()
            .first(conn)?;
        ensure_owner(&existing, &user)?;
        ensure_active(&existing, "only active shipments can be cancelled")?;

        let now = Utc::now().naive_utc();
        let rejected = diesel::update(
            bids::table
                .filter(bids::shipment_id.eq(existing.id))
                .filter(bids::status.eq_any(open_bid_statuses())),
        )
        .set((
            bids::status.eq(BidStatus::Rejected.as_ref()),
            bids::rejected_at.eq(now),
            bids::updated_at.eq(now),
        ))
        .execute(conn)?;

        let shipment: Shipment = diesel::update(shipments::table.find(existing.id))
            .set((
                shipments::status.eq(ShipmentStatus::Cancelled.as_ref()),
                shipments::updated_at.eq(now),
            ))
            .get_result(conn)?;
        Ok((shipment, rejected))
    })?;

    tracing::info!(
        tracking_number = %shipment.tracking_number,
        rejected_bids,
        reason = %reason,
        "shipment cancelled"
    );
    Ok(Json(shipment))
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = shipments)]
struct ShipmentChangeset {
    title: Option<String>,
    description: Option<String>,
    from_address: Option<String>,
    to_address: Option<String>,
    suggested_price: Option<BigDecimal>,
    pickup_date: Option<NaiveDate>,
    delivery_date: Option<Option<NaiveDate>>,
}

impl ShipmentChangeset {
    fn from_patch(body: &Value) -> AppResult<Self> {
        let mut changes = Self::default();

        match classify_nullable(body.get("title")).map_err(AppError::bad_request)? {
            NullableValue::Omitted => {}
            NullableValue::Null => return Err(AppError::bad_request("title cannot be null")),
            NullableValue::String(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(AppError::bad_request("title must not be empty"));
                }
                changes.title = Some(trimmed.to_string());
            }
        }
        for (field, slot) in [
            ("description", &mut changes.description),
            ("from_address", &mut changes.from_address),
            ("to_address", &mut changes.to_address),
        ] {
            match classify_nullable(body.get(field)).map_err(AppError::bad_request)? {
                NullableValue::Omitted => {}
                NullableValue::Null => *slot = Some(String::new()),
                NullableValue::String(value) => *slot = Some(value),
            }
        }

        if let Some(raw) = body.get("suggested_price") {
            let price = decimal_from_json(raw)
                .ok_or_else(|| AppError::bad_request("suggested_price must be a number"))?;
            if price <= BigDecimal::from(0) {
                return Err(AppError::bad_request("suggested_price must be greater than zero"));
            }
            changes.suggested_price = Some(price);
        }

        changes.pickup_date = match nullable_date("pickup_date", body.get("pickup_date"))
            .map_err(AppError::bad_request)?
        {
            Some(None) => return Err(AppError::bad_request("pickup_date cannot be null")),
            Some(Some(date)) => Some(date),
            None => None,
        };
        changes.delivery_date =
            nullable_date("delivery_date", body.get("delivery_date")).map_err(AppError::bad_request)?;

        Ok(changes)
    }

    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.from_address.is_none()
            && self.to_address.is_none()
            && self.suggested_price.is_none()
            && self.pickup_date.is_none()
            && self.delivery_date.is_none()
    }
}

fn decimal_from_json(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(number) => BigDecimal::from_str(&number.to_string()).ok(),
        Value::String(text) => BigDecimal::from_str(text.trim()).ok(),
        _ => None,
    }
}

pub(crate) fn find_by_tracking_number(
    conn: &mut PgConnection,
    tracking_number: &str,
) -> AppResult<Shipment> {
    Ok(shipments::table
        .filter(shipments::tracking_number.eq(tracking_number))
        .first(conn)?)
}

pub(crate) fn open_bid_statuses() -> [&'static str; 2] {
    [
        BidStatus::Pending.as_ref(),
        BidStatus::CounterOffered.as_ref(),
    ]
}

pub(crate) fn status_label(status: &str) -> &'static str {
    ShipmentStatus::from_str(status)
        .map(ShipmentStatus::label)
        .unwrap_or("")
}

/// Number of bids on a shipment that still count towards `bid_count`.
pub fn refresh_bid_count(conn: &mut PgConnection, shipment_id: Uuid) -> QueryResult<i32> {
    let count: i64 = bids::table
        .filter(bids::shipment_id.eq(shipment_id))
        .filter(bids::status.ne(BidStatus::Withdrawn.as_ref()))
        .count()
        .get_result(conn)?;
    let count = i32::try_from(count).unwrap_or(i32::MAX);
    diesel::update(shipments::table.find(shipment_id))
        .set(shipments::bid_count.eq(count))
        .execute(conn)?;
    Ok(count)
}

fn ensure_owner(shipment: &Shipment, user: &AuthenticatedUser) -> AppResult<()> {
    if shipment.shipper_id != user.user_id {
        return Err(AppError::forbidden("only the shipment owner can do this"));
    }
    Ok(())
}

fn ensure_active(shipment: &Shipment, message: &'static str) -> AppResult<()> {
    if shipment.status != ShipmentStatus::Active.as_ref() {
        return Err(AppError::bad_request(message));
    }
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub(crate) fn page_bounds(page: Option<i64>, page_size: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    (page, page_size)
}

/// Rows to skip before `page`. Saturates so absurd page numbers yield an
/// empty page.
pub(crate) fn page_offset(page: i64, page_size: i64) -> i64 {
    page.saturating_sub(1).saturating_mul(page_size)
}

/// `YN-<year>-<six upper-case hex digits>`.
pub fn generate_tracking_number(year: i32) -> String {
    let mut bytes = [0u8; 3];
    OsRng.fill_bytes(&mut bytes);
    format!("YN-{year}-{}", hex::encode_upper(bytes))
}

fn unique_tracking_number(conn: &mut PgConnection) -> AppResult<String> {
    let year = Utc::now().year();
    for _ in 0..8 {
        let candidate = generate_tracking_number(year);
        let taken: i64 = shipments::table
            .filter(shipments::tracking_number.eq(&candidate))
            .count()
            .get_result(conn)?;
        if taken == 0 {
            return Ok(candidate);
        }
    }
    Err(AppError::internal("could not allocate a tracking number"))
}
