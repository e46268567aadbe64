use axum::{
    extract::{Path, State},
    Json,
};
use bigdecimal::{BigDecimal, ToPrimitive};
use diesel::prelude::*;
use serde::Serialize;

use crate::{
    error::AppResult,
    models::Shipment,
    schema::{shipments, user_profiles},
    seo::city_display_name,
    state::AppState,
    status::{ShipmentStatus, UserType},
    utils::text::contains_pattern,
};

const RECENT_LIMIT: i64 = 6;
const DEFAULT_SAVINGS_PERCENT: i64 = 30;

#[derive(Serialize)]
pub struct HomePage {
    pub title: &'static str,
    pub description: &'static str,
    pub recent_shipments: Vec<Shipment>,
    pub stats: HomeStats,
}

#[derive(Serialize)]
pub struct HomeStats {
    pub active_shipments: i64,
    pub completed_shipments: i64,
    pub total_users: i64,
    pub verified_carriers: i64,
}

#[derive(Serialize)]
pub struct CityPage {
    pub slug: String,
    pub city: String,
    pub title: String,
    pub description: String,
    pub recent_shipments: Vec<Shipment>,
    pub stats: CityStats,
}

#[derive(Serialize)]
pub struct CityStats {
    pub active_shipments: i64,
    pub verified_carriers: i64,
    pub avg_savings: i64,
}

pub async fn home(State(state): State<AppState>) -> AppResult<Json<HomePage>> {
    let mut conn = state.db()?;

    let recent_shipments = shipments::table
        .filter(shipments::status.eq(ShipmentStatus::Active.as_ref()))
        .order(shipments::created_at.desc())
        .limit(RECENT_LIMIT)
        .load(&mut conn)?;

    let stats = HomeStats {
        active_shipments: count_with_status(&mut conn, ShipmentStatus::Active)?,
        completed_shipments: count_with_status(&mut conn, ShipmentStatus::Completed)?,
        total_users: user_profiles::table.count().get_result(&mut conn)?,
        verified_carriers: verified_carriers(&mut conn)?,
    };

    Ok(Json(HomePage {
        title: "NAKLIYE NET - Türkiye'nin Dijital Yük Pazaryeri",
        description: "Yük gönderin, teklif alın, güvenle taşıyın. Türkiye'nin nakliye ve taşımacılık platformu.",
        recent_shipments,
        stats,
    }))
}

pub async fn city(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<CityPage>> {
    let city = city_display_name(&slug);
    let pattern = contains_pattern(&city);
    let mut conn = state.db()?;

    let recent_shipments = shipments::table
        .filter(
            shipments::from_city
                .ilike(pattern.clone())
                .or(shipments::to_city.ilike(pattern.clone())),
        )
        .filter(shipments::status.eq(ShipmentStatus::Active.as_ref()))
        .order(shipments::created_at.desc())
        .limit(RECENT_LIMIT)
        .load(&mut conn)?;
    let active_shipments = shipments::table
        .filter(
            shipments::from_city
                .ilike(pattern.clone())
                .or(shipments::to_city.ilike(pattern)),
        )
        .filter(shipments::status.eq(ShipmentStatus::Active.as_ref()))
        .count()
        .get_result(&mut conn)?;

    let priced: Vec<(BigDecimal, Option<BigDecimal>)> = shipments::table
        .filter(shipments::status.eq(ShipmentStatus::Completed.as_ref()))
        .filter(shipments::final_price.is_not_null())
        .filter(shipments::suggested_price.gt(BigDecimal::from(0)))
        .select((shipments::suggested_price, shipments::final_price))
        .load(&mut conn)?;
    let priced: Vec<(BigDecimal, BigDecimal)> = priced
        .into_iter()
        .filter_map(|(suggested, final_price)| final_price.map(|price| (suggested, price)))
        .collect();

    let stats = CityStats {
        active_shipments,
        verified_carriers: verified_carriers(&mut conn)?,
        avg_savings: average_savings(&priced),
    };

    Ok(Json(CityPage {
        title: format!("{city} Nakliye - Ev ve Yük Taşıma | NAKLIYE NET"),
        description: format!(
            "{city} nakliye ilanları. Doğrulanmış taşıyıcılardan teklif alın, {city} içi ve şehirler arası yük taşıyın."
        ),
        slug: slug.to_lowercase(),
        city,
        recent_shipments,
        stats,
    }))
}

fn count_with_status(conn: &mut PgConnection, status: ShipmentStatus) -> QueryResult<i64> {
    shipments::table
        .filter(shipments::status.eq(status.as_ref()))
        .count()
        .get_result(conn)
}

fn verified_carriers(conn: &mut PgConnection) -> QueryResult<i64> {
    user_profiles::table
        .filter(user_profiles::user_type.eq(UserType::Carrier.as_ref()))
        .filter(user_profiles::documents_verified.eq(true))
        .count()
        .get_result(conn)
}

/// Mean percentage saved against the suggested price, counting only
/// shipments that closed below it. Falls back to 30 when nothing qualifies.
pub(crate) fn average_savings(priced: &[(BigDecimal, BigDecimal)]) -> i64 {
    let zero = BigDecimal::from(0);
    let savings: Vec<BigDecimal> = priced
        .iter()
        .filter(|(suggested, _)| suggested > &zero)
        .map(|(suggested, final_price)| (suggested - final_price) / suggested * BigDecimal::from(100))
        .filter(|percent| percent > &zero)
        .collect();
    if savings.is_empty() {
        return DEFAULT_SAVINGS_PERCENT;
    }

    let count = BigDecimal::from(savings.len() as i64);
    let total: BigDecimal = savings.iter().sum();
    let average = (total / count).with_scale(0).to_i64().unwrap_or(0);
    if average > 0 {
        average
    } else {
        DEFAULT_SAVINGS_PERCENT
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    #[test]
    fn savings_average_truncates_and_skips_losses() {
        let priced = vec![
            (dec("1000"), dec("800")),
            (dec("1000"), dec("750")),
            (dec("500"), dec("600")),
        ];
        assert_eq!(average_savings(&priced), 22);
    }

    #[test]
    fn savings_default_without_data() {
        assert_eq!(average_savings(&[]), 30);
        assert_eq!(average_savings(&[(dec("100"), dec("100"))]), 30);
    }
}
