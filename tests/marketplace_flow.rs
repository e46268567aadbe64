mod common;

use std::str::FromStr;

use anyhow::{anyhow, Result};
use axum::http::StatusCode;
use bigdecimal::BigDecimal;
use common::{acquire_db_lock, json_body, TestApp, TestUser, PASSWORD};
use nakliyenet::status::UserType;
use serde_json::{json, Value};

fn dec(value: &Value) -> BigDecimal {
    value
        .as_str()
        .and_then(|raw| BigDecimal::from_str(raw).ok())
        .or_else(|| value.as_f64().and_then(|raw| BigDecimal::try_from(raw).ok()))
        .unwrap_or_else(|| panic!("not a decimal: {value}"))
}

fn shipment_payload() -> Value {
    json!({
        "title": "İstanbul - Ankara ev eşyası",
        "cargo_type": "evden_eve",
        "from_city": "İstanbul",
        "from_address": "Kadıköy, Moda Cd. 12",
        "to_city": "Ankara",
        "to_address": "Çankaya, Tunalı Hilmi Cd. 40",
        "weight_kg": "850",
        "suggested_price": "1500",
        "pickup_date": "2030-05-10",
        "delivery_date": "2030-05-12",
    })
}

async fn post_shipment(app: &TestApp, shipper: &TestUser) -> Result<String> {
    let response = app
        .post_json("/api/shipments", &shipment_payload(), Some(&shipper.token))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = json_body(response).await?;
    body["tracking_number"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("shipment response carried no tracking_number"))
}

async fn bid(app: &TestApp, carrier: &TestUser, tracking_number: &str, price: &str) -> Result<Value> {
    let response = app
        .post_json(
            &format!("/api/shipments/{tracking_number}/bids"),
            &json!({
                "offered_price": price,
                "estimated_delivery_days": 2,
                "message": "Sigortalı taşıma",
            }),
            Some(&carrier.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

struct Assigned {
    shipper: TestUser,
    carrier: TestUser,
    tracking_number: String,
    payment_id: String,
}

async fn assigned_shipment(app: &TestApp) -> Result<Assigned> {
    let shipper = app.shipper("yuk@example.com").await?;
    let carrier = app.verified_carrier("tasiyici@example.com").await?;
    let tracking_number = post_shipment(app, &shipper).await?;
    let bid = bid(app, &carrier, &tracking_number, "1000").await?;

    let response = app
        .post_json(
            &format!("/api/bids/{}/accept", bid["id"].as_str().unwrap_or_default()),
            &json!({ "shipper_comment": "Anlaştık" }),
            Some(&shipper.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let payment: Value = json_body(response).await?;

    Ok(Assigned {
        shipper,
        carrier,
        tracking_number,
        payment_id: payment["id"].as_str().unwrap_or_default().to_string(),
    })
}

#[tokio::test]
async fn bids_are_counted_and_acceptance_assigns_the_shipment() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let shipper = app.shipper("yuk@example.com").await?;
    let first = app.verified_carrier("birinci@example.com").await?;
    let second = app.verified_carrier("ikinci@example.com").await?;

    let tracking_number = post_shipment(&app, &shipper).await?;
    assert!(tracking_number.starts_with("YN-"));

    let winning = bid(&app, &first, &tracking_number, "1000").await?;
    let losing = bid(&app, &second, &tracking_number, "1200").await?;
    assert_eq!(winning["status"], "pending");

    let detail: Value = json_body(app.get(&format!("/api/shipments/{tracking_number}"), None).await?).await?;
    assert_eq!(detail["bid_count"], 2);
    assert_eq!(detail["status"], "active");
    assert_eq!(detail["is_owner"], false);

    let response = app
        .post_json(
            &format!("/api/shipments/{tracking_number}/bids"),
            &json!({ "offered_price": "900", "estimated_delivery_days": 1 }),
            Some(&first.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let shipper_view: Vec<Value> = json_body(
        app.get(&format!("/api/shipments/{tracking_number}/bids"), Some(&shipper.token))
            .await?,
    )
    .await?;
    assert_eq!(shipper_view.len(), 2);
    let carrier_view: Vec<Value> = json_body(
        app.get(&format!("/api/shipments/{tracking_number}/bids"), Some(&second.token))
            .await?,
    )
    .await?;
    assert_eq!(carrier_view.len(), 1);

    let accept_path = format!("/api/bids/{}/accept", winning["id"].as_str().unwrap_or_default());
    let response = app.post_empty(&accept_path, Some(&second.token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post_empty(&accept_path, Some(&shipper.token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let payment: Value = json_body(response).await?;
    assert_eq!(payment["status"], "pending");
    assert_eq!(dec(&payment["amount"]), BigDecimal::from(1000));
    assert_eq!(dec(&payment["platform_fee"]), BigDecimal::from(100));
    assert_eq!(dec(&payment["carrier_amount"]), BigDecimal::from(900));
    assert_eq!(payment["can_transfer_to_carrier"], false);

    let rejected: Value = json_body(
        app.get(
            &format!("/api/bids/{}", losing["id"].as_str().unwrap_or_default()),
            Some(&second.token),
        )
        .await?,
    )
    .await?;
    assert_eq!(rejected["status"], "rejected");

    let detail: Value = json_body(
        app.get(&format!("/api/shipments/{tracking_number}"), Some(&shipper.token))
            .await?,
    )
    .await?;
    assert_eq!(detail["status"], "assigned");
    assert_eq!(detail["is_owner"], true);
    assert_eq!(dec(&detail["final_price"]), BigDecimal::from(1000));
    assert_eq!(detail["assigned_bid"]["carrier_id"], first.id.to_string());

    let third = app.verified_carrier("ucuncu@example.com").await?;
    let response = app
        .post_json(
            &format!("/api/shipments/{tracking_number}/bids"),
            &json!({ "offered_price": "800", "estimated_delivery_days": 1 }),
            Some(&third.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn only_completed_carrier_profiles_may_bid() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let shipper = app.shipper("yuk@example.com").await?;
    let tracking_number = post_shipment(&app, &shipper).await?;
    app.insert_user("eksik@example.com", UserType::Carrier, false)
        .await?;
    let incomplete = app.login_token("eksik@example.com", PASSWORD).await?;

    let payload = json!({ "offered_price": "900", "estimated_delivery_days": 1 });
    let path = format!("/api/shipments/{tracking_number}/bids");
    let response = app.post_json(&path, &payload, Some(&incomplete)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post_json(&path, &payload, Some(&shipper.token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post_json(&path, &payload, None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn withdrawn_bids_drop_out_of_the_count() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let shipper = app.shipper("yuk@example.com").await?;
    let carrier = app.verified_carrier("tasiyici@example.com").await?;
    let tracking_number = post_shipment(&app, &shipper).await?;
    let placed = bid(&app, &carrier, &tracking_number, "1100").await?;
    let bid_path = format!("/api/bids/{}", placed["id"].as_str().unwrap_or_default());

    let response = app
        .post_json(
            &format!("{bid_path}/counter-offer"),
            &json!({ "counter_offer_price": "950", "counter_offer_message": "Biraz indirim?" }),
            Some(&shipper.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let countered: Value = json_body(response).await?;
    assert_eq!(countered["status"], "counter_offered");

    // Only pending bids can be withdrawn.
    let response = app
        .post_empty(&format!("{bid_path}/withdraw"), Some(&carrier.token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let other = app.verified_carrier("diger@example.com").await?;
    let second = bid(&app, &other, &tracking_number, "1300").await?;
    let response = app
        .post_empty(
            &format!("/api/bids/{}/withdraw", second["id"].as_str().unwrap_or_default()),
            Some(&other.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let detail: Value = json_body(app.get(&format!("/api/shipments/{tracking_number}"), None).await?).await?;
    assert_eq!(detail["bid_count"], 1);

    let response = app
        .post_json(
            &format!("{bid_path}/comments"),
            &json!({ "comment": "Yükleme sabah 8'de" }),
            Some(&shipper.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let comments: Vec<Value> = json_body(
        app.get(&format!("{bid_path}/comments"), Some(&carrier.token))
            .await?,
    )
    .await?;
    assert_eq!(comments.len(), 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn accepting_a_counter_offer_uses_the_counter_price() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let shipper = app.shipper("yuk@example.com").await?;
    let carrier = app.verified_carrier("tasiyici@example.com").await?;
    let quitter = app.verified_carrier("vazgecen@example.com").await?;
    let tracking_number = post_shipment(&app, &shipper).await?;
    let placed = bid(&app, &carrier, &tracking_number, "1000").await?;
    let withdrawn = bid(&app, &quitter, &tracking_number, "800").await?;
    let bid_path = format!("/api/bids/{}", placed["id"].as_str().unwrap_or_default());
    let withdrawn_path = format!("/api/bids/{}", withdrawn["id"].as_str().unwrap_or_default());

    let response = app
        .post_empty(&format!("{withdrawn_path}/withdraw"), Some(&quitter.token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .post_empty(&format!("{withdrawn_path}/accept"), Some(&shipper.token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            &format!("{bid_path}/counter-offer"),
            &json!({ "counter_offer_price": "900", "counter_offer_message": "900 olursa anlaşalım" }),
            Some(&shipper.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post_empty(&format!("{bid_path}/accept"), Some(&shipper.token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let payment: Value = json_body(response).await?;
    assert_eq!(dec(&payment["amount"]), BigDecimal::from(900));
    assert_eq!(dec(&payment["platform_fee"]), BigDecimal::from_str("90.00")?);
    assert_eq!(dec(&payment["carrier_amount"]), BigDecimal::from_str("810.00")?);

    let detail: Value = json_body(app.get(&format!("/api/shipments/{tracking_number}"), None).await?).await?;
    assert_eq!(detail["status"], "assigned");
    assert_eq!(dec(&detail["final_price"]), BigDecimal::from(900));
    assert_eq!(detail["assigned_bid"]["status"], "accepted");
    assert_eq!(dec(&detail["assigned_bid"]["offered_price"]), BigDecimal::from(1000));

    let quitter_bid: Value = json_body(app.get(&withdrawn_path, Some(&quitter.token)).await?).await?;
    assert_eq!(quitter_bid["status"], "withdrawn");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn cancelling_a_shipment_rejects_its_open_bids() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let shipper = app.shipper("yuk@example.com").await?;
    let carrier = app.verified_carrier("tasiyici@example.com").await?;
    let tracking_number = post_shipment(&app, &shipper).await?;
    let untouched = post_shipment(&app, &shipper).await?;
    let placed = bid(&app, &carrier, &tracking_number, "1000").await?;

    let cancel_path = format!("/api/shipments/{tracking_number}/cancel");
    let response = app
        .post_json(&cancel_path, &json!({ "reason": "Vazgeçtim" }), Some(&carrier.token))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_json(&cancel_path, &json!({ "reason": "Vazgeçtim" }), Some(&shipper.token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cancelled: Value = json_body(response).await?;
    assert_eq!(cancelled["status"], "cancelled");

    let rejected: Value = json_body(
        app.get(
            &format!("/api/bids/{}", placed["id"].as_str().unwrap_or_default()),
            Some(&carrier.token),
        )
        .await?,
    )
    .await?;
    assert_eq!(rejected["status"], "rejected");

    let response = app.post_empty(&cancel_path, Some(&shipper.token)).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let listing: Value = json_body(app.get("/api/shipments", None).await?).await?;
    assert_eq!(listing["total_count"], 1);
    assert_eq!(listing["results"][0]["tracking_number"], untouched);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn escrow_release_waits_for_both_confirmations() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let Assigned {
        shipper,
        carrier,
        tracking_number,
        payment_id,
    } = assigned_shipment(&app).await?;
    let admin = app.admin("yonetici@example.com").await?;
    let payment_path = format!("/api/payments/{payment_id}");

    let response = app
        .post_empty(&format!("{payment_path}/confirm-delivery"), Some(&carrier.token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_empty(&format!("{payment_path}/pay"), Some(&carrier.token))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_json(
            &format!("{payment_path}/pay"),
            &json!({ "payment_method": "credit_card" }),
            Some(&shipper.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let paid: Value = json_body(response).await?;
    assert_eq!(paid["status"], "paid");
    assert!(paid["transaction_id"]
        .as_str()
        .is_some_and(|id| id.starts_with("TXN-")));

    let response = app
        .post_empty(&format!("{payment_path}/pay"), Some(&shipper.token))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .post_empty(&format!("{payment_path}/confirm-delivery"), Some(&carrier.token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let confirmed: Value = json_body(response).await?;
    assert_eq!(confirmed["status"], "in_transit");
    assert_eq!(confirmed["newly_confirmed"], true);
    assert_eq!(confirmed["fully_confirmed"], false);

    let transfer = json!({ "ids": [payment_id] });
    let report: Value = json_body(
        app.post_json("/api/admin/payments/transfer", &transfer, Some(&admin.token))
            .await?,
    )
    .await?;
    assert_eq!(report["transferred"], 0);
    assert_eq!(report["results"][0]["transferred"], false);

    let response = app
        .post_empty(&format!("{payment_path}/confirm-delivery"), Some(&shipper.token))
        .await?;
    let confirmed: Value = json_body(response).await?;
    assert_eq!(confirmed["status"], "delivered");
    assert_eq!(confirmed["fully_confirmed"], true);
    assert_eq!(confirmed["can_transfer_to_carrier"], true);

    let tracking: Value = json_body(app.get(&format!("/api/tracking/{tracking_number}"), None).await?).await?;
    assert_eq!(tracking["shipment"]["status"], "delivered");

    let response = app
        .post_json("/api/admin/payments/transfer", &transfer, Some(&shipper.token))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let report: Value = json_body(
        app.post_json("/api/admin/payments/transfer", &transfer, Some(&admin.token))
            .await?,
    )
    .await?;
    assert_eq!(report["transferred"], 1);

    let settled: Value = json_body(app.get(&payment_path, Some(&carrier.token)).await?).await?;
    assert_eq!(settled["status"], "completed");
    assert_eq!(settled["admin_transferred"], true);

    let report: Value = json_body(
        app.post_json("/api/admin/payments/transfer", &transfer, Some(&admin.token))
            .await?,
    )
    .await?;
    assert_eq!(report["transferred"], 0);

    let outsider = app.shipper("merakli@example.com").await?;
    let response = app.get(&payment_path, Some(&outsider.token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn dashboards_reflect_the_user_type() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let Assigned {
        shipper, carrier, ..
    } = assigned_shipment(&app).await?;

    let dashboard: Value = json_body(app.get("/api/dashboard", Some(&shipper.token)).await?).await?;
    assert_eq!(dashboard["user_type"], "shipper");
    assert_eq!(dashboard["stats"]["total"], 1);
    assert_eq!(dashboard["stats"]["total_bids"], 1);

    let dashboard: Value = json_body(app.get("/api/dashboard", Some(&carrier.token)).await?).await?;
    assert_eq!(dashboard["user_type"], "carrier");
    assert_eq!(dashboard["stats"]["accepted"], 1);
    assert_eq!(dashboard["bids"][0]["payment"]["status"], "pending");

    app.cleanup().await?;
    Ok(())
}
