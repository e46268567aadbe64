use std::str::FromStr;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    escrow::{self, Confirmations, Party},
    models::{Payment, Shipment},
    routes::tracking::append_timeline,
    schema::{payments, shipments},
    state::AppState,
    status::{PaymentStatus, ShipmentStatus, TrackingStatus},
};

#[derive(Serialize)]
pub struct PaymentResponse {
    #[serde(flatten)]
    pub payment: Payment,
    pub status_display: &'static str,
    pub can_transfer_to_carrier: bool,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        let status = payment_status(&payment);
        Self {
            status_display: status.map(PaymentStatus::label).unwrap_or(""),
            can_transfer_to_carrier: status.is_some_and(|status| {
                escrow::can_transfer_to_carrier(
                    status,
                    payment.shipper_confirmed_delivery,
                    payment.carrier_confirmed_delivery,
                    payment.admin_transferred,
                )
            }),
            payment,
        }
    }
}

#[derive(Serialize)]
pub struct ConfirmationResponse {
    #[serde(flatten)]
    pub payment: PaymentResponse,
    pub newly_confirmed: bool,
    pub fully_confirmed: bool,
}

#[derive(Deserialize, Default)]
pub struct PayRequest {
    pub payment_method: Option<String>,
}

pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<PaymentResponse>> {
    let mut conn = state.db()?;
    let payment: Payment = payments::table.find(payment_id).first(&mut conn)?;
    if payment.shipper_id != user.user_id && payment.carrier_id != user.user_id {
        return Err(AppError::forbidden("you are not a party to this payment"));
    }
    Ok(Json(PaymentResponse::from(payment)))
}

/// Simulated virtual-POS capture: the shipper's money is now held.
pub async fn pay(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(payment_id): Path<Uuid>,
    payload: Option<Json<PayRequest>>,
) -> AppResult<Json<PaymentResponse>> {
    let method = payload
        .and_then(|Json(body)| body.payment_method)
        .map(|method| method.trim().to_string())
        .filter(|method| !method.is_empty());
    let provider = state.config.payment_provider.clone();
    let mut conn = state.db()?;

    let payment = conn.transaction::<_, AppError, _>(|conn| {
        let payment: Payment = payments::table.find(payment_id).for_update().first(conn)?;
        if payment.shipper_id != user.user_id {
            return Err(AppError::forbidden("only the shipper can pay for this shipment"));
        }
        escrow::ensure_payable(current_status(&payment)?)?;

        let now = Utc::now().naive_utc();
        let payment: Payment = diesel::update(payments::table.find(payment.id))
            .set((
                payments::status.eq(PaymentStatus::Paid.as_ref()),
                payments::paid_at.eq(now),
                payments::transaction_id.eq(escrow::transaction_id()),
                payments::payment_provider.eq(&provider),
                method
                    .as_deref()
                    .map(|method| payments::payment_method.eq(method)),
                payments::updated_at.eq(now),
            ))
            .get_result(conn)?;
        Ok(payment)
    })?;

    tracing::info!(
        payment_id = %payment.id,
        amount = %payment.amount,
        transaction_id = ?payment.transaction_id,
        "payment captured into escrow"
    );
    Ok(Json(PaymentResponse::from(payment)))
}

pub async fn confirm_delivery(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<ConfirmationResponse>> {
    let mut conn = state.db()?;

    let (payment, outcome) = conn.transaction::<_, AppError, _>(|conn| {
        let payment: Payment = payments::table.find(payment_id).for_update().first(conn)?;
        let party = if payment.shipper_id == user.user_id {
            Party::Shipper
        } else if payment.carrier_id == user.user_id {
            Party::Carrier
        } else {
            return Err(AppError::forbidden("you are not a party to this payment"));
        };
        let shipment: Shipment = shipments::table
            .find(payment.shipment_id)
            .for_update()
            .first(conn)?;

        let current = Confirmations {
            payment_status: current_status(&payment)?,
            shipment_status: ShipmentStatus::from_str(&shipment.status).map_err(|_| {
                AppError::internal(format!("unknown shipment status {}", shipment.status))
            })?,
            shipper_confirmed: payment.shipper_confirmed_delivery,
            carrier_confirmed: payment.carrier_confirmed_delivery,
        };
        let outcome = escrow::confirm_delivery(current, party)?;
        let next = outcome.next;
        let now = Utc::now().naive_utc();

        let payment: Payment = diesel::update(payments::table.find(payment.id))
            .set((
                payments::status.eq(next.payment_status.as_ref()),
                payments::shipper_confirmed_delivery.eq(next.shipper_confirmed),
                payments::carrier_confirmed_delivery.eq(next.carrier_confirmed),
                (outcome.newly_confirmed && party == Party::Shipper)
                    .then(|| payments::shipper_confirmed_at.eq(now)),
                (outcome.newly_confirmed && party == Party::Carrier)
                    .then(|| payments::carrier_confirmed_at.eq(now)),
                payments::updated_at.eq(now),
            ))
            .get_result(conn)?;

        if next.shipment_status != current.shipment_status {
            let shipment: Shipment = diesel::update(shipments::table.find(shipment.id))
                .set((
                    shipments::status.eq(next.shipment_status.as_ref()),
                    outcome
                        .fully_confirmed
                        .then(|| shipments::completed_at.eq(now)),
                    shipments::updated_at.eq(now),
                ))
                .get_result(conn)?;

            let milestone = if outcome.fully_confirmed {
                TrackingStatus::Delivered
            } else {
                TrackingStatus::InTransit
            };
            append_timeline(conn, &shipment, milestone, "", "", Some(user.user_id), true)?;
        }

        Ok((payment, outcome))
    })?;

    tracing::info!(
        payment_id = %payment.id,
        confirmed_by = %user.user_id,
        newly_confirmed = outcome.newly_confirmed,
        fully_confirmed = outcome.fully_confirmed,
        status = %payment.status,
        "delivery confirmation recorded"
    );
    Ok(Json(ConfirmationResponse {
        payment: PaymentResponse::from(payment),
        newly_confirmed: outcome.newly_confirmed,
        fully_confirmed: outcome.fully_confirmed,
    }))
}

pub(crate) fn payment_status(payment: &Payment) -> Option<PaymentStatus> {
    PaymentStatus::from_str(&payment.status).ok()
}

fn current_status(payment: &Payment) -> AppResult<PaymentStatus> {
    payment_status(payment)
        .ok_or_else(|| AppError::internal(format!("unknown payment status {}", payment.status)))
}
