use std::str::FromStr;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{NaiveDateTime, Utc};
use diesel::{dsl::avg, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    extract::{read_upload_form, ValidatedJson},
    models::{
        Bid, DeliveryProof, NewDeliveryProof, NewReview, NewTrackingEntry, Payment, Review,
        Shipment, TrackingEntry,
    },
    routes::shipments::{find_by_tracking_number, status_label},
    schema::{bids, delivery_proofs, payments, reviews, shipment_tracking, shipments, user_profiles},
    state::AppState,
    status::{PaymentStatus, ShipmentStatus, TrackingStatus},
    storage::{object_key, NewObject, ObjectStorage, PRESIGN_TTL},
};

#[derive(Serialize)]
pub struct ProofResponse {
    pub id: Uuid,
    pub uploaded_by: Uuid,
    pub original_name: String,
    pub content_type: Option<String>,
    pub note: String,
    pub created_at: NaiveDateTime,
    pub url: Option<String>,
}

impl ProofResponse {
    async fn build(storage: &dyn ObjectStorage, proof: DeliveryProof) -> Self {
        let url = match storage.download_url(&proof.s3_key, PRESIGN_TTL).await {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(proof_id = %proof.id, error = %err, "failed to presign delivery proof");
                None
            }
        };
        Self {
            id: proof.id,
            uploaded_by: proof.uploaded_by,
            original_name: proof.original_name,
            content_type: proof.content_type,
            note: proof.note,
            created_at: proof.created_at,
            url,
        }
    }
}

#[derive(Serialize)]
pub struct TrackingView {
    pub shipment: Shipment,
    pub status_display: &'static str,
    pub timeline: Vec<TrackingEntry>,
    pub delivery_proofs: Vec<ProofResponse>,
    pub assigned_bid: Option<Bid>,
}

#[derive(Deserialize, Validate)]
pub struct TrackingUpdateRequest {
    pub status: TrackingStatus,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub location: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Deserialize, Validate)]
pub struct ReviewRequest {
    #[serde(default = "default_rating")]
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[serde(default = "default_rating")]
    #[validate(range(min = 1, max = 5))]
    pub communication_rating: i16,
    #[serde(default = "default_rating")]
    #[validate(range(min = 1, max = 5))]
    pub professionalism_rating: i16,
    #[serde(default = "default_rating")]
    #[validate(range(min = 1, max = 5))]
    pub punctuality_rating: i16,
    #[serde(default)]
    pub comment: String,
}

fn default_rating() -> i16 {
    5
}

pub async fn get_tracking(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> AppResult<Json<TrackingView>> {
    let mut conn = state.db()?;
    let shipment = find_by_tracking_number(&mut conn, &tracking_number)?;

    let timeline = shipment_tracking::table
        .filter(shipment_tracking::shipment_id.eq(shipment.id))
        .order(shipment_tracking::created_at.desc())
        .load(&mut conn)?;
    let proofs: Vec<DeliveryProof> = delivery_proofs::table
        .filter(delivery_proofs::shipment_id.eq(shipment.id))
        .order(delivery_proofs::created_at.desc())
        .load(&mut conn)?;
    let assigned_bid = assigned_bid(&mut conn, &shipment)?;
    drop(conn);

    let mut delivery_proofs = Vec::with_capacity(proofs.len());
    for proof in proofs {
        delivery_proofs.push(ProofResponse::build(state.storage.as_ref(), proof).await);
    }

    Ok(Json(TrackingView {
        status_display: status_label(&shipment.status),
        shipment,
        timeline,
        delivery_proofs,
        assigned_bid,
    }))
}

pub async fn post_update(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(tracking_number): Path<String>,
    ValidatedJson(payload): ValidatedJson<TrackingUpdateRequest>,
) -> AppResult<(StatusCode, Json<TrackingEntry>)> {
    if payload.status == TrackingStatus::Completed {
        return Err(AppError::bad_request(
            "only the shipper can mark a shipment completed",
        ));
    }

    let mut conn = state.db()?;
    let entry = conn.transaction::<_, AppError, _>(|conn| {
        let shipment: Shipment = shipments::table
            .filter(shipments::tracking_number.eq(&tracking_number))
            .for_update()
            .first(conn)?;
        ensure_assigned_carrier(conn, &shipment, &user)?;
        if !in_progress(&shipment) {
            return Err(AppError::bad_request("this shipment is not in progress"));
        }

        if payload.status == TrackingStatus::Delivered {
            let payment: Option<Payment> = payments::table
                .filter(payments::shipment_id.eq(shipment.id))
                .first(conn)
                .optional()?;
            let funded = payment
                .and_then(|payment| PaymentStatus::from_str(&payment.status).ok())
                .is_some_and(PaymentStatus::is_funded);
            if !funded {
                return Err(AppError::bad_request(
                    "the shipper has not paid yet; delivery cannot be recorded",
                ));
            }
        }

        let shipment: Shipment = diesel::update(shipments::table.find(shipment.id))
            .set((
                shipments::status.eq(payload.status.shipment_status().as_ref()),
                shipments::updated_at.eq(diesel::dsl::now),
            ))
            .get_result(conn)?;

        Ok(append_timeline(
            conn,
            &shipment,
            payload.status,
            payload.location.trim(),
            payload.note.trim(),
            Some(user.user_id),
            false,
        )?)
    })?;

    info!(
        tracking_number = %tracking_number,
        status = %entry.status,
        carrier_id = %user.user_id,
        "tracking updated"
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn upload_proof(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(tracking_number): Path<String>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ProofResponse>)> {
    let mut form = read_upload_form(multipart).await?;
    let note = form.text("note").unwrap_or_default().to_string();
    let file = form.require_file()?;

    let shipment = {
        let mut conn = state.db()?;
        let shipment = find_by_tracking_number(&mut conn, &tracking_number)?;
        ensure_assigned_carrier(&mut conn, &shipment, &user)?;
        shipment
    };

    let key = object_key(
        &format!("delivery-proofs/{}", shipment.tracking_number),
        user.user_id,
        &file.original_name,
    );
    state
        .storage
        .store(NewObject::new(
            key.clone(),
            file.bytes,
            file.content_type.as_deref(),
            &file.original_name,
        ))
        .await?;

    let mut conn = state.db()?;
    let proof: DeliveryProof = diesel::insert_into(delivery_proofs::table)
        .values(&NewDeliveryProof {
            id: Uuid::new_v4(),
            shipment_id: shipment.id,
            uploaded_by: user.user_id,
            s3_key: key,
            original_name: file.original_name,
            content_type: file.content_type,
            note,
        })
        .get_result(&mut conn)?;
    drop(conn);

    info!(proof_id = %proof.id, tracking_number = %shipment.tracking_number, "delivery proof uploaded");
    Ok((
        StatusCode::CREATED,
        Json(ProofResponse::build(state.storage.as_ref(), proof).await),
    ))
}

/// The shipper closes out a delivered shipment.
pub async fn complete_shipment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(tracking_number): Path<String>,
) -> AppResult<Json<Shipment>> {
    let mut conn = state.db()?;
    let shipment = conn.transaction::<_, AppError, _>(|conn| {
        let shipment: Shipment = shipments::table
            .filter(shipments::tracking_number.eq(&tracking_number))
            .for_update()
            .first(conn)?;
        if shipment.shipper_id != user.user_id {
            return Err(AppError::forbidden("only the shipper can confirm completion"));
        }
        if shipment.status != ShipmentStatus::Delivered.as_ref() {
            return Err(AppError::bad_request("the shipment has not been delivered yet"));
        }

        let now = Utc::now().naive_utc();
        let shipment: Shipment = diesel::update(shipments::table.find(shipment.id))
            .set((
                shipments::status.eq(ShipmentStatus::Completed.as_ref()),
                shipments::completed_at.eq(now),
                shipments::updated_at.eq(now),
            ))
            .get_result(conn)?;
        append_timeline(
            conn,
            &shipment,
            TrackingStatus::Completed,
            "",
            "Yük sahibi teslimatı onayladı",
            Some(user.user_id),
            false,
        )?;
        Ok(shipment)
    })?;

    info!(tracking_number = %shipment.tracking_number, "shipment completed");
    Ok(Json(shipment))
}

pub async fn create_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(tracking_number): Path<String>,
    ValidatedJson(payload): ValidatedJson<ReviewRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let mut conn = state.db()?;
    let review = conn.transaction::<_, AppError, _>(|conn| {
        let shipment = find_by_tracking_number(conn, &tracking_number)?;
        let bid = assigned_bid(conn, &shipment)?
            .ok_or_else(|| AppError::bad_request("this shipment has no assigned carrier"))?;

        let is_shipper = shipment.shipper_id == user.user_id;
        let reviewed_id = if is_shipper {
            bid.carrier_id
        } else if bid.carrier_id == user.user_id {
            shipment.shipper_id
        } else {
            return Err(AppError::forbidden("only the shipper or carrier can review"));
        };

        let reviewable = [ShipmentStatus::Delivered, ShipmentStatus::Completed]
            .iter()
            .any(|status| shipment.status == status.as_ref());
        if !reviewable {
            return Err(AppError::bad_request("reviews open once the shipment is delivered"));
        }

        let existing: i64 = reviews::table
            .filter(reviews::shipment_id.eq(shipment.id))
            .filter(reviews::reviewer_id.eq(user.user_id))
            .count()
            .get_result(conn)?;
        if existing > 0 {
            return Err(AppError::conflict("you have already reviewed this shipment"));
        }

        let review: Review = diesel::insert_into(reviews::table)
            .values(&NewReview {
                id: Uuid::new_v4(),
                shipment_id: shipment.id,
                bid_id: bid.id,
                reviewer_id: user.user_id,
                reviewed_id,
                rating: payload.rating,
                communication_rating: payload.communication_rating,
                professionalism_rating: payload.professionalism_rating,
                punctuality_rating: payload.punctuality_rating,
                comment: payload.comment.trim().to_string(),
                is_shipper_review: is_shipper,
            })
            .get_result(conn)?;

        refresh_rating(conn, reviewed_id)?;
        Ok(review)
    })?;

    info!(
        review_id = %review.id,
        reviewed_id = %review.reviewed_id,
        rating = review.rating,
        "review recorded"
    );
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> AppResult<Json<Vec<Review>>> {
    let mut conn = state.db()?;
    let shipment = find_by_tracking_number(&mut conn, &tracking_number)?;
    let rows = reviews::table
        .filter(reviews::shipment_id.eq(shipment.id))
        .order(reviews::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(rows))
}

/// Appends a timeline entry whose text is derived from the status.
pub(crate) fn append_timeline(
    conn: &mut PgConnection,
    shipment: &Shipment,
    status: TrackingStatus,
    location: &str,
    note: &str,
    updated_by: Option<Uuid>,
    is_automatic: bool,
) -> QueryResult<TrackingEntry> {
    diesel::insert_into(shipment_tracking::table)
        .values(&NewTrackingEntry {
            id: Uuid::new_v4(),
            shipment_id: shipment.id,
            status: status.to_string(),
            status_display: status.describe(&shipment.from_city, &shipment.to_city),
            location: location.to_string(),
            note: note.to_string(),
            updated_by,
            is_automatic,
        })
        .get_result(conn)
}

fn assigned_bid(conn: &mut PgConnection, shipment: &Shipment) -> QueryResult<Option<Bid>> {
    match shipment.assigned_bid_id {
        Some(bid_id) => bids::table.find(bid_id).first(conn).optional(),
        None => Ok(None),
    }
}

fn ensure_assigned_carrier(
    conn: &mut PgConnection,
    shipment: &Shipment,
    user: &AuthenticatedUser,
) -> AppResult<()> {
    match assigned_bid(conn, shipment)? {
        Some(bid) if bid.carrier_id == user.user_id => Ok(()),
        _ => Err(AppError::forbidden("only the assigned carrier can do this")),
    }
}

fn in_progress(shipment: &Shipment) -> bool {
    [
        ShipmentStatus::Assigned,
        ShipmentStatus::InTransit,
        ShipmentStatus::Delivered,
    ]
    .iter()
    .any(|status| shipment.status == status.as_ref())
}

/// Recomputes a user's average rating from every review they received.
fn refresh_rating(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<()> {
    let average: Option<BigDecimal> = reviews::table
        .filter(reviews::reviewed_id.eq(user_id))
        .select(avg(reviews::rating))
        .first(conn)?;
    let count: i64 = reviews::table
        .filter(reviews::reviewed_id.eq(user_id))
        .count()
        .get_result(conn)?;

    diesel::update(user_profiles::table.filter(user_profiles::user_id.eq(user_id)))
        .set((
            user_profiles::rating_avg.eq(average.unwrap_or_default().round(2)),
            user_profiles::rating_count.eq(i32::try_from(count).unwrap_or(i32::MAX)),
        ))
        .execute(conn)?;
    Ok(())
}
