use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, extract::MAX_UPLOAD_BYTES, state::AppState};

pub mod admin;
pub mod auth;
pub mod bids;
pub mod blog;
pub mod dashboard;
pub mod documents;
pub mod health;
pub mod oauth;
pub mod payments;
pub mod profiles;
pub mod public;
pub mod seo;
pub mod shipments;
pub mod tracking;
pub mod vehicles;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .filter_map(|value| match value.parse::<HeaderValue>() {
                Ok(header) => Some(header),
                Err(_) => {
                    tracing::warn!(origin = value, "ignoring invalid CORS allowed origin");
                    None
                }
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/check-email", post(auth::check_email))
        .route("/me", get(auth::me));

    let oauth_routes = Router::new()
        .route("/google/login", get(oauth::google_login))
        .route("/google/callback", get(oauth::google_callback));

    // Listings mix public reads with authenticated writes; handlers extract the user.
    let profile_routes = Router::new()
        .route("/", get(profiles::list_verified_carriers))
        .route(
            "/me",
            get(profiles::get_my_profile).patch(profiles::update_my_profile),
        )
        .route("/:id", get(profiles::get_profile));

    let vehicle_routes = Router::new()
        .route(
            "/",
            get(vehicles::list_vehicles).post(vehicles::create_vehicle),
        )
        .route("/mine", get(vehicles::list_my_vehicles))
        .route(
            "/:id",
            get(vehicles::get_vehicle)
                .patch(vehicles::update_vehicle)
                .delete(vehicles::delete_vehicle),
        );

    let shipment_routes = Router::new()
        .route(
            "/",
            get(shipments::list_shipments).post(shipments::create_shipment),
        )
        .route("/mine", get(shipments::list_my_shipments))
        .route(
            "/:tracking_number",
            get(shipments::get_shipment).patch(shipments::update_shipment),
        )
        .route("/:tracking_number/cancel", post(shipments::cancel_shipment))
        .route(
            "/:tracking_number/bids",
            get(bids::list_shipment_bids).post(bids::submit_bid),
        );

    let tracking_routes = Router::new()
        .route("/:tracking_number", get(tracking::get_tracking))
        .route("/:tracking_number/updates", post(tracking::post_update))
        .route("/:tracking_number/proofs", post(tracking::upload_proof))
        .route("/:tracking_number/complete", post(tracking::complete_shipment))
        .route(
            "/:tracking_number/reviews",
            get(tracking::list_reviews).post(tracking::create_review),
        );

    let bid_routes = Router::new()
        .route("/mine", get(bids::list_my_bids))
        .route("/:id", get(bids::get_bid))
        .route("/:id/accept", post(bids::accept_bid))
        .route("/:id/reject", post(bids::reject_bid))
        .route("/:id/counter-offer", post(bids::counter_offer))
        .route("/:id/withdraw", post(bids::withdraw_bid))
        .route(
            "/:id/comments",
            get(bids::list_comments).post(bids::add_comment),
        );

    let payment_routes = Router::new()
        .route("/:id", get(payments::get_payment))
        .route("/:id/pay", post(payments::pay))
        .route("/:id/confirm-delivery", post(payments::confirm_delivery));

    let document_routes = Router::new().route(
        "/",
        get(documents::list_my_documents).post(documents::upload_document),
    );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/bids", bid_routes)
        .nest("/api/payments", payment_routes)
        .nest("/api/documents", document_routes)
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    let admin_routes = Router::new()
        .route("/stats", get(admin::stats))
        .route("/documents", get(admin::list_documents))
        .route("/documents/approve", post(admin::approve_documents))
        .route("/documents/reject", post(admin::reject_documents))
        .route("/payments/transfer", post(admin::transfer_payments))
        .route("/shipments/status", post(admin::update_shipment_status))
        .route("/users/:id/suspend", post(admin::suspend_user))
        .route("/users/:id/activate", post(admin::activate_user))
        .route("/activities", get(admin::list_activities))
        .route("/blog", post(admin::create_blog_post))
        .route("/blog/:id", axum::routing::patch(admin::update_blog_post));

    let public_routes = Router::new()
        .route("/home", get(public::home))
        .route("/cities/:slug", get(public::city));

    let blog_routes = Router::new()
        .route("/", get(blog::list_posts))
        .route("/:slug", get(blog::get_post));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .nest("/oauth", oauth_routes)
        .nest("/api/profiles", profile_routes)
        .nest("/api/vehicles", vehicle_routes)
        .nest("/api/shipments", shipment_routes)
        .nest("/api/tracking", tracking_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/public", public_routes)
        .nest("/api/blog", blog_routes)
        .route("/sitemap.xml", get(seo::sitemap))
        .route("/robots.txt", get(seo::robots))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
