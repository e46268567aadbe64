use axum::{extract::State, Json};
use diesel::prelude::*;
use serde::Serialize;

use crate::{
    auth::AuthenticatedUser,
    error::AppResult,
    models::{Bid, Shipment},
    routes::{
        bids::{load_carrier_bids, CarrierBid},
        profiles::load_profile,
    },
    schema::{bids, shipments},
    state::AppState,
    status::{BidStatus, ShipmentStatus},
};

#[derive(Serialize)]
#[serde(tag = "user_type", rename_all = "snake_case")]
pub enum Dashboard {
    Shipper {
        shipments: Vec<ShipmentWithBids>,
        stats: ShipperStats,
    },
    Carrier {
        bids: Vec<CarrierBid>,
        stats: CarrierStats,
    },
}

#[derive(Serialize)]
pub struct ShipmentWithBids {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub bids: Vec<Bid>,
    pub pending_bids: usize,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ShipperStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub total_bids: i64,
    pub total_views: i64,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct CarrierStats {
    pub total: usize,
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Dashboard>> {
    let mut conn = state.db()?;
    let profile = load_profile(&mut conn, user.user_id)?;

    if profile.is_carrier() {
        let bids = load_carrier_bids(&mut conn, user.user_id)?;
        let stats = carrier_stats(bids.iter().map(|entry| entry.bid.status.as_str()));
        return Ok(Json(Dashboard::Carrier { bids, stats }));
    }

    let owned: Vec<Shipment> = shipments::table
        .filter(shipments::shipper_id.eq(user.user_id))
        .order(shipments::created_at.desc())
        .load(&mut conn)?;
    let all_bids: Vec<Bid> = Bid::belonging_to(&owned)
        .order(bids::created_at.desc())
        .load(&mut conn)?;
    let grouped = all_bids.grouped_by(&owned);

    let stats = shipper_stats(&owned);
    let shipments = owned
        .into_iter()
        .zip(grouped)
        .map(|(shipment, bids)| ShipmentWithBids {
            pending_bids: bids
                .iter()
                .filter(|bid| bid.status == BidStatus::Pending.as_ref())
                .count(),
            shipment,
            bids,
        })
        .collect();

    Ok(Json(Dashboard::Shipper { shipments, stats }))
}

fn shipper_stats(shipments: &[Shipment]) -> ShipperStats {
    let count_status = |status: ShipmentStatus| {
        shipments
            .iter()
            .filter(|shipment| shipment.status == status.as_ref())
            .count()
    };
    ShipperStats {
        total: shipments.len(),
        active: count_status(ShipmentStatus::Active),
        completed: count_status(ShipmentStatus::Completed),
        total_bids: shipments.iter().map(|s| i64::from(s.bid_count)).sum(),
        total_views: shipments.iter().map(|s| i64::from(s.view_count)).sum(),
    }
}

fn carrier_stats<'a>(statuses: impl Iterator<Item = &'a str>) -> CarrierStats {
    let mut stats = CarrierStats::default();
    for status in statuses {
        stats.total += 1;
        if status == BidStatus::Pending.as_ref() {
            stats.pending += 1;
        } else if status == BidStatus::Accepted.as_ref() {
            stats.accepted += 1;
        } else if status == BidStatus::Rejected.as_ref() {
            stats.rejected += 1;
        }
    }
    stats
}
