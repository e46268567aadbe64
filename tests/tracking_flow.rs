mod common;

use std::str::FromStr;

use anyhow::Result;
use axum::http::StatusCode;
use bigdecimal::BigDecimal;
use common::{acquire_db_lock, json_body, TestApp, TestUser};
use serde_json::{json, Value};

struct Deal {
    shipper: TestUser,
    carrier: TestUser,
    tracking_number: String,
    payment_id: String,
}

async fn accepted_deal(app: &TestApp) -> Result<Deal> {
    let shipper = app.shipper("yuk@example.com").await?;
    let carrier = app.verified_carrier("tasiyici@example.com").await?;

    let shipment: Value = json_body(
        app.post_json(
            "/api/shipments",
            &json!({
                "title": "İzmir - Bursa beyaz eşya",
                "cargo_type": "beyaz_esya",
                "from_city": "İzmir",
                "from_address": "Bornova",
                "to_city": "Bursa",
                "to_address": "Nilüfer",
                "weight_kg": "120",
                "suggested_price": "800",
                "pickup_date": "2030-06-01",
            }),
            Some(&shipper.token),
        )
        .await?,
    )
    .await?;
    let tracking_number = shipment["tracking_number"].as_str().unwrap_or_default().to_string();

    let bid: Value = json_body(
        app.post_json(
            &format!("/api/shipments/{tracking_number}/bids"),
            &json!({ "offered_price": "700", "estimated_delivery_days": 1 }),
            Some(&carrier.token),
        )
        .await?,
    )
    .await?;
    let payment: Value = json_body(
        app.post_empty(
            &format!("/api/bids/{}/accept", bid["id"].as_str().unwrap_or_default()),
            Some(&shipper.token),
        )
        .await?,
    )
    .await?;

    Ok(Deal {
        shipper,
        carrier,
        tracking_number,
        payment_id: payment["id"].as_str().unwrap_or_default().to_string(),
    })
}

#[tokio::test]
async fn carrier_updates_build_the_timeline() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let Deal {
        shipper,
        carrier,
        tracking_number,
        payment_id,
    } = accepted_deal(&app).await?;
    let updates = format!("/api/tracking/{tracking_number}/updates");

    let response = app
        .post_json(&updates, &json!({ "status": "picked_up" }), Some(&shipper.token))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_json(&updates, &json!({ "status": "completed" }), Some(&carrier.token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            &updates,
            &json!({ "status": "picked_up", "location": "Bornova depo" }),
            Some(&carrier.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let entry: Value = json_body(response).await?;
    assert_eq!(entry["status_display"], "Yük İzmir lokasyonundan toplandı");
    assert_eq!(entry["is_automatic"], false);

    let response = app
        .post_json(&updates, &json!({ "status": "delivered" }), Some(&carrier.token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_empty(&format!("/api/payments/{payment_id}/pay"), Some(&shipper.token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post_json(&updates, &json!({ "status": "delivered" }), Some(&carrier.token))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .upload(
            &format!("/api/tracking/{tracking_number}/proofs"),
            &[("note", "Teslim tutanağı")],
            "tutanak.pdf",
            "application/pdf",
            b"%PDF-1.4 teslim",
            &carrier.token,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let proof: Value = json_body(response).await?;
    assert_eq!(proof["note"], "Teslim tutanağı");
    assert!(proof["url"].as_str().is_some());
    assert_eq!(app.storage().object_count().await, 1);

    let response = app
        .post_empty(&format!("/api/tracking/{tracking_number}/complete"), Some(&carrier.token))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app
        .post_empty(&format!("/api/tracking/{tracking_number}/complete"), Some(&shipper.token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let completed: Value = json_body(response).await?;
    assert_eq!(completed["status"], "completed");

    let view: Value = json_body(app.get(&format!("/api/tracking/{tracking_number}"), None).await?).await?;
    let timeline = view["timeline"].as_array().cloned().unwrap_or_default();
    let statuses: Vec<&str> = timeline
        .iter()
        .filter_map(|entry| entry["status"].as_str())
        .collect();
    assert_eq!(statuses.len(), 4);
    for expected in ["assigned", "picked_up", "delivered", "completed"] {
        assert!(statuses.contains(&expected), "missing {expected} in {statuses:?}");
    }
    assert_eq!(view["delivery_proofs"].as_array().map(Vec::len), Some(1));

    let response = app.get("/api/tracking/YN-1999-000000", None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn reviews_open_after_delivery_and_update_ratings() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let Deal {
        shipper,
        carrier,
        tracking_number,
        payment_id,
    } = accepted_deal(&app).await?;
    let reviews = format!("/api/tracking/{tracking_number}/reviews");

    let response = app
        .post_json(&reviews, &json!({ "rating": 4 }), Some(&shipper.token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.post_empty(&format!("/api/payments/{payment_id}/pay"), Some(&shipper.token))
        .await?;
    for token in [carrier.token.as_str(), shipper.token.as_str()] {
        let response = app
            .post_empty(&format!("/api/payments/{payment_id}/confirm-delivery"), Some(token))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .post_json(&reviews, &json!({ "rating": 6 }), Some(&shipper.token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            &reviews,
            &json!({ "rating": 4, "comment": "Zamanında geldi" }),
            Some(&shipper.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let review: Value = json_body(response).await?;
    assert_eq!(review["reviewed_id"], carrier.id.to_string());
    assert_eq!(review["is_shipper_review"], true);
    assert_eq!(review["punctuality_rating"], 5);

    let response = app
        .post_json(&reviews, &json!({ "rating": 2 }), Some(&shipper.token))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .post_json(&reviews, &json!({ "rating": 5 }), Some(&carrier.token))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let profile: Value = json_body(app.get("/api/profiles/me", Some(&carrier.token)).await?).await?;
    assert_eq!(profile["rating_count"], 1);
    let rating = profile["rating_avg"]
        .as_str()
        .and_then(|raw| BigDecimal::from_str(raw).ok());
    assert_eq!(rating, Some(BigDecimal::from(4)));

    let listed: Vec<Value> = json_body(app.get(&reviews, None).await?).await?;
    assert_eq!(listed.len(), 2);

    app.cleanup().await?;
    Ok(())
}
