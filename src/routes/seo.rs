use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::{
    error::{AppError, AppResult},
    schema::{blog_posts, shipments},
    seo::{render_robots, render_sitemap, SitemapEntry, SITEMAP_CITIES, STATIC_PAGES},
    state::AppState,
    status::ShipmentStatus,
};

const SITEMAP_SHIPMENT_LIMIT: i64 = 1000;

pub async fn sitemap(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let listings: Vec<(String, NaiveDateTime)> = shipments::table
        .filter(shipments::status.eq(ShipmentStatus::Active.as_ref()))
        .order(shipments::created_at.desc())
        .limit(SITEMAP_SHIPMENT_LIMIT)
        .select((shipments::tracking_number, shipments::updated_at))
        .load(&mut conn)?;
    let posts: Vec<(String, NaiveDateTime)> = blog_posts::table
        .filter(blog_posts::is_published.eq(true))
        .order(blog_posts::created_at.desc())
        .select((blog_posts::slug, blog_posts::updated_at))
        .load(&mut conn)?;
    drop(conn);

    let mut entries: Vec<SitemapEntry> = STATIC_PAGES
        .iter()
        .map(|path| SitemapEntry::new(*path, "weekly", "0.7"))
        .collect();
    entries.extend(listings.into_iter().map(|(tracking_number, updated_at)| {
        SitemapEntry::new(format!("/ilan/{tracking_number}/"), "daily", "0.9").modified_at(updated_at)
    }));
    entries.extend(
        SITEMAP_CITIES
            .iter()
            .map(|slug| SitemapEntry::new(format!("/nakliye/{slug}/"), "daily", "0.8")),
    );
    entries.extend(posts.into_iter().map(|(slug, updated_at)| {
        SitemapEntry::new(format!("/blog/{slug}/"), "weekly", "0.6").modified_at(updated_at)
    }));

    let body = render_sitemap(&state.config.site_base_url, &entries).map_err(AppError::internal)?;
    Ok(([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], body))
}

pub async fn robots(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_robots(&state.config.site_base_url),
    )
}
