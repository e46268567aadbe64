use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    escrow::split_amount,
    extract::ValidatedJson,
    models::{Bid, BidComment, NewBid, NewBidComment, NewPayment, Payment, Shipment, User},
    routes::{
        payments::PaymentResponse,
        profiles::load_profile,
        shipments::{find_by_tracking_number, open_bid_statuses, refresh_bid_count},
        tracking::append_timeline,
    },
    schema::{bid_comments, bids, payments, shipments, users},
    state::AppState,
    status::{BidStatus, ShipmentStatus, TrackingStatus},
};

#[derive(Deserialize, Validate)]
pub struct SubmitBidRequest {
    pub offered_price: BigDecimal,
    #[validate(range(min = 1, message = "estimated_delivery_days must be at least 1"))]
    pub estimated_delivery_days: i32,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub message: String,
}

#[derive(Deserialize, Default)]
pub struct AcceptBidRequest {
    pub shipper_comment: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct CounterOfferRequest {
    pub counter_offer_price: Option<BigDecimal>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub counter_offer_message: String,
}

#[derive(Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub comment: String,
}

/// Shipment fields shown next to a carrier's bid.
#[derive(Serialize)]
pub struct ShipmentSummary {
    pub id: Uuid,
    pub tracking_number: String,
    pub title: String,
    pub from_city: String,
    pub to_city: String,
    pub pickup_date: NaiveDate,
    pub status: String,
    pub status_display: &'static str,
}

impl From<&Shipment> for ShipmentSummary {
    fn from(shipment: &Shipment) -> Self {
        Self {
            id: shipment.id,
            tracking_number: shipment.tracking_number.clone(),
            title: shipment.title.clone(),
            from_city: shipment.from_city.clone(),
            to_city: shipment.to_city.clone(),
            pickup_date: shipment.pickup_date,
            status: shipment.status.clone(),
            status_display: super::shipments::status_label(&shipment.status),
        }
    }
}

#[derive(Serialize)]
pub struct CarrierBid {
    #[serde(flatten)]
    pub bid: Bid,
    pub shipment: ShipmentSummary,
    pub payment: Option<PaymentResponse>,
}

pub async fn submit_bid(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(tracking_number): Path<String>,
    ValidatedJson(payload): ValidatedJson<SubmitBidRequest>,
) -> AppResult<(StatusCode, Json<Bid>)> {
    let mut conn = state.db()?;
    let profile = load_profile(&mut conn, user.user_id)?;
    if !profile.is_carrier() || !profile.profile_completed {
        return Err(AppError::forbidden(
            "complete your carrier profile before bidding",
        ));
    }

    let shipment = find_by_tracking_number(&mut conn, &tracking_number)?;
    if shipment.status != ShipmentStatus::Active.as_ref() {
        return Err(AppError::bad_request("this shipment is no longer accepting bids"));
    }
    if shipment.shipper_id == user.user_id {
        return Err(AppError::forbidden("you cannot bid on your own shipment"));
    }
    if payload.offered_price <= BigDecimal::from(0) {
        return Err(AppError::bad_request("offered_price must be greater than zero"));
    }

    let carrier: User = users::table.find(user.user_id).first(&mut conn)?;
    let new_bid = NewBid {
        id: Uuid::new_v4(),
        shipment_id: shipment.id,
        tracking_number: shipment.tracking_number.clone(),
        carrier_id: user.user_id,
        carrier_email: carrier.email.clone(),
        carrier_name: carrier.display_name(),
        carrier_phone: profile.phone_number.clone(),
        carrier_verified: profile.documents_verified,
        shipper_email: shipment.shipper_email.clone(),
        offered_price: payload.offered_price,
        estimated_delivery_days: payload.estimated_delivery_days,
        message: payload.message.trim().to_string(),
    };

    let (bid, bid_count) = conn.transaction::<_, AppError, _>(|conn| {
        let already_bid: i64 = bids::table
            .filter(bids::shipment_id.eq(shipment.id))
            .filter(bids::carrier_id.eq(user.user_id))
            .count()
            .get_result(conn)?;
        if already_bid > 0 {
            return Err(AppError::conflict("you have already bid on this shipment"));
        }

        let bid: Bid = diesel::insert_into(bids::table)
            .values(&new_bid)
            .get_result(conn)?;
        let bid_count = refresh_bid_count(conn, shipment.id)?;
        Ok((bid, bid_count))
    })?;

    tracing::info!(
        bid_id = %bid.id,
        tracking_number = %bid.tracking_number,
        carrier_id = %user.user_id,
        offered_price = %bid.offered_price,
        bid_count,
        notify = %bid.shipper_email,
        "new bid submitted"
    );
    Ok((StatusCode::CREATED, Json(bid)))
}

pub async fn list_shipment_bids(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(tracking_number): Path<String>,
) -> AppResult<Json<Vec<Bid>>> {
    let mut conn = state.db()?;
    let shipment = find_by_tracking_number(&mut conn, &tracking_number)?;

    let mut statement = bids::table
        .filter(bids::shipment_id.eq(shipment.id))
        .into_boxed();
    if shipment.shipper_id != user.user_id {
        statement = statement.filter(bids::carrier_id.eq(user.user_id));
    }

    let rows = statement.order(bids::created_at.desc()).load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn list_my_bids(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<CarrierBid>>> {
    let mut conn = state.db()?;
    Ok(Json(load_carrier_bids(&mut conn, user.user_id)?))
}

pub async fn get_bid(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(bid_id): Path<Uuid>,
) -> AppResult<Json<Bid>> {
    let mut conn = state.db()?;
    let (bid, shipment) = load_bid(&mut conn, bid_id)?;
    ensure_participant(&bid, &shipment, &user)?;
    Ok(Json(bid))
}

/// Accepts a bid, assigns the shipment and opens the escrow payment.
pub async fn accept_bid(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(bid_id): Path<Uuid>,
    payload: Option<Json<AcceptBidRequest>>,
) -> AppResult<Json<PaymentResponse>> {
    let shipper_comment = payload
        .and_then(|Json(body)| body.shipper_comment)
        .map(|comment| comment.trim().to_string());
    let fee_percent = state.config.platform_fee_percent.clone();
    let mut conn = state.db()?;

    let (bid, payment, rejected) = conn.transaction::<_, AppError, _>(|conn| {
        let (bid, shipment) = lock_bid(conn, bid_id)?;

        ensure_shipment_owner(&shipment, &user)?;
        if !bid_status(&bid).is_open() {
            return Err(AppError::bad_request("this bid is no longer pending"));
        }
        if shipment.status != ShipmentStatus::Active.as_ref() {
            return Err(AppError::bad_request("this shipment already has a carrier"));
        }

        let now = Utc::now().naive_utc();
        let agreed_price = bid.agreed_price();
        let split = split_amount(&agreed_price, &fee_percent)?;

        let bid: Bid = diesel::update(bids::table.find(bid.id))
            .set((
                bids::status.eq(BidStatus::Accepted.as_ref()),
                bids::accepted_at.eq(now),
                bids::updated_at.eq(now),
                shipper_comment
                    .as_deref()
                    .map(|comment| bids::shipper_comment.eq(comment)),
            ))
            .get_result(conn)?;

        let rejected = diesel::update(
            bids::table
                .filter(bids::shipment_id.eq(shipment.id))
                .filter(bids::id.ne(bid.id))
                .filter(bids::status.eq_any(open_bid_statuses())),
        )
        .set((
            bids::status.eq(BidStatus::Rejected.as_ref()),
            bids::rejected_at.eq(now),
            bids::updated_at.eq(now),
        ))
        .execute(conn)?;

        let shipment: Shipment = diesel::update(shipments::table.find(shipment.id))
            .set((
                shipments::status.eq(ShipmentStatus::Assigned.as_ref()),
                shipments::assigned_bid_id.eq(bid.id),
                shipments::final_price.eq(&agreed_price),
                shipments::updated_at.eq(now),
            ))
            .get_result(conn)?;

        let payment: Payment = diesel::insert_into(payments::table)
            .values(&NewPayment {
                id: Uuid::new_v4(),
                shipment_id: shipment.id,
                bid_id: bid.id,
                shipper_id: shipment.shipper_id,
                carrier_id: bid.carrier_id,
                amount: agreed_price,
                platform_fee: split.platform_fee,
                carrier_amount: split.carrier_amount,
            })
            .get_result(conn)?;

        append_timeline(
            conn,
            &shipment,
            TrackingStatus::Assigned,
            "",
            "",
            Some(user.user_id),
            true,
        )?;

        Ok((bid, payment, rejected))
    })?;

    tracing::info!(
        bid_id = %bid.id,
        tracking_number = %bid.tracking_number,
        payment_id = %payment.id,
        amount = %payment.amount,
        rejected_bids = rejected,
        notify = %bid.carrier_email,
        "bid accepted"
    );
    Ok(Json(PaymentResponse::from(payment)))
}

pub async fn reject_bid(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(bid_id): Path<Uuid>,
) -> AppResult<Json<Bid>> {
    let mut conn = state.db()?;
    let bid = conn.transaction::<_, AppError, _>(|conn| {
        let (bid, shipment) = lock_bid(conn, bid_id)?;
        ensure_shipment_owner(&shipment, &user)?;
        if !bid_status(&bid).is_open() {
            return Err(AppError::bad_request("this bid is no longer pending"));
        }

        let now = Utc::now().naive_utc();
        let bid: Bid = diesel::update(bids::table.find(bid.id))
            .set((
                bids::status.eq(BidStatus::Rejected.as_ref()),
                bids::rejected_at.eq(now),
                bids::updated_at.eq(now),
            ))
            .get_result(conn)?;
        Ok(bid)
    })?;

    tracing::info!(bid_id = %bid.id, notify = %bid.carrier_email, "bid rejected");
    Ok(Json(bid))
}

pub async fn counter_offer(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(bid_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CounterOfferRequest>,
) -> AppResult<Json<Bid>> {
    let price = counter_offer_price(payload.counter_offer_price)?;

    let mut conn = state.db()?;
    let bid = conn.transaction::<_, AppError, _>(|conn| {
        let (bid, shipment) = lock_bid(conn, bid_id)?;
        ensure_shipment_owner(&shipment, &user)?;
        if bid_status(&bid) != BidStatus::Pending {
            return Err(AppError::bad_request("only pending bids can receive a counter offer"));
        }

        let now = Utc::now().naive_utc();
        let bid: Bid = diesel::update(bids::table.find(bid.id))
            .set((
                bids::status.eq(BidStatus::CounterOffered.as_ref()),
                bids::counter_offer_price.eq(price),
                bids::counter_offer_message.eq(payload.counter_offer_message.trim()),
                bids::counter_offered_at.eq(now),
                bids::updated_at.eq(now),
            ))
            .get_result(conn)?;
        Ok(bid)
    })?;

    tracing::info!(
        bid_id = %bid.id,
        counter_offer_price = ?bid.counter_offer_price,
        notify = %bid.carrier_email,
        "counter offer sent"
    );
    Ok(Json(bid))
}

pub async fn withdraw_bid(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(bid_id): Path<Uuid>,
) -> AppResult<Json<Bid>> {
    let mut conn = state.db()?;
    let bid = conn.transaction::<_, AppError, _>(|conn| {
        let (bid, _) = lock_bid(conn, bid_id)?;
        if bid.carrier_id != user.user_id {
            return Err(AppError::forbidden("you can only withdraw your own bids"));
        }
        if bid_status(&bid) != BidStatus::Pending {
            return Err(AppError::bad_request(format!(
                "cannot withdraw a bid with status {}",
                bid.status
            )));
        }

        let bid: Bid = diesel::update(bids::table.find(bid.id))
            .set((
                bids::status.eq(BidStatus::Withdrawn.as_ref()),
                bids::updated_at.eq(diesel::dsl::now),
            ))
            .get_result(conn)?;
        refresh_bid_count(conn, bid.shipment_id)?;
        Ok(bid)
    })?;

    tracing::info!(bid_id = %bid.id, tracking_number = %bid.tracking_number, "bid withdrawn");
    Ok(Json(bid))
}

pub async fn list_comments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(bid_id): Path<Uuid>,
) -> AppResult<Json<Vec<BidComment>>> {
    let mut conn = state.db()?;
    let (bid, shipment) = load_bid(&mut conn, bid_id)?;
    ensure_participant(&bid, &shipment, &user)?;

    let comments = bid_comments::table
        .filter(bid_comments::bid_id.eq(bid.id))
        .order(bid_comments::created_at.asc())
        .load(&mut conn)?;
    Ok(Json(comments))
}

pub async fn add_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(bid_id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> AppResult<(StatusCode, Json<BidComment>)> {
    let text = payload.comment.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("comment must not be empty"));
    }

    let mut conn = state.db()?;
    let (bid, shipment) = load_bid(&mut conn, bid_id)?;
    ensure_participant(&bid, &shipment, &user)?;
    let author: User = users::table.find(user.user_id).first(&mut conn)?;

    let comment: BidComment = diesel::insert_into(bid_comments::table)
        .values(&NewBidComment {
            id: Uuid::new_v4(),
            bid_id: bid.id,
            author_id: author.id,
            author_email: author.email.clone(),
            author_name: author.display_name(),
            is_shipper: shipment.shipper_id == user.user_id,
            comment: text.to_string(),
        })
        .get_result(&mut conn)?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// A carrier's bids, newest first, with shipment and payment context.
pub(crate) fn load_carrier_bids(
    conn: &mut PgConnection,
    carrier_id: Uuid,
) -> AppResult<Vec<CarrierBid>> {
    let rows: Vec<(Bid, Shipment)> = bids::table
        .inner_join(shipments::table)
        .filter(bids::carrier_id.eq(carrier_id))
        .order(bids::created_at.desc())
        .load(conn)?;

    let bid_ids: Vec<Uuid> = rows.iter().map(|(bid, _)| bid.id).collect();
    let mut payments_by_bid: HashMap<Uuid, Payment> = payments::table
        .filter(payments::bid_id.eq_any(&bid_ids))
        .load::<Payment>(conn)?
        .into_iter()
        .map(|payment| (payment.bid_id, payment))
        .collect();

    Ok(rows
        .into_iter()
        .map(|(bid, shipment)| CarrierBid {
            payment: payments_by_bid.remove(&bid.id).map(PaymentResponse::from),
            shipment: ShipmentSummary::from(&shipment),
            bid,
        })
        .collect())
}

fn load_bid(conn: &mut PgConnection, bid_id: Uuid) -> AppResult<(Bid, Shipment)> {
    Ok(bids::table
        .inner_join(shipments::table)
        .filter(bids::id.eq(bid_id))
        .first(conn)?)
}

/// Locks the shipment and then the bid. Every bid transition takes the locks
/// in this order.
fn lock_bid(conn: &mut PgConnection, bid_id: Uuid) -> AppResult<(Bid, Shipment)> {
    let shipment_id: Uuid = bids::table
        .find(bid_id)
        .select(bids::shipment_id)
        .first(conn)?;
    let shipment: Shipment = shipments::table.find(shipment_id).for_update().first(conn)?;
    let bid: Bid = bids::table.find(bid_id).for_update().first(conn)?;
    Ok((bid, shipment))
}

fn counter_offer_price(price: Option<BigDecimal>) -> AppResult<BigDecimal> {
    price
        .filter(|price| price > &BigDecimal::from(0))
        .ok_or_else(|| AppError::bad_request("counter_offer_price must be greater than zero"))
}

fn bid_status(bid: &Bid) -> BidStatus {
    BidStatus::from_str(&bid.status).unwrap_or(BidStatus::Rejected)
}

fn ensure_shipment_owner(shipment: &Shipment, user: &AuthenticatedUser) -> AppResult<()> {
    if shipment.shipper_id != user.user_id {
        return Err(AppError::forbidden("only the shipment owner can manage its bids"));
    }
    Ok(())
}

fn ensure_participant(bid: &Bid, shipment: &Shipment, user: &AuthenticatedUser) -> AppResult<()> {
    if bid.carrier_id != user.user_id && shipment.shipper_id != user.user_id {
        return Err(AppError::forbidden("you are not a party to this bid"));
    }
    Ok(())
}
