mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, json_body, TestApp, PASSWORD, TEST_IBAN};
use nakliyenet::status::UserType;
use serde_json::{json, Value};

#[tokio::test]
async fn health_and_robots_are_public() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let health: Value = json_body(app.get("/api/health", None).await?).await?;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["service"], "nakliyenet");

    let response = app.get("/robots.txt", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let robots = String::from_utf8(body_to_vec(response.into_body()).await?)?;
    assert!(robots.contains("Sitemap: https://nakliyenet.test/sitemap.xml"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn listings_feed_home_city_and_sitemap() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let shipper = app.shipper("yuk@example.com").await?;
    app.verified_carrier("tasiyici@example.com").await?;

    let shipment: Value = json_body(
        app.post_json(
            "/api/shipments",
            &json!({
                "title": "Ankara - Eskişehir mobilya",
                "cargo_type": "mobilya",
                "from_city": "Ankara",
                "from_address": "Keçiören",
                "to_city": "Eskişehir",
                "to_address": "Tepebaşı",
                "weight_kg": "300",
                "suggested_price": "1200",
                "pickup_date": "2030-08-15",
            }),
            Some(&shipper.token),
        )
        .await?,
    )
    .await?;
    let tracking_number = shipment["tracking_number"].as_str().unwrap_or_default().to_string();

    let home: Value = json_body(app.get("/api/public/home", None).await?).await?;
    assert_eq!(home["stats"]["active_shipments"], 1);
    assert_eq!(home["stats"]["total_users"], 2);
    assert_eq!(home["stats"]["verified_carriers"], 1);
    assert_eq!(home["recent_shipments"][0]["tracking_number"], tracking_number);

    let city: Value = json_body(app.get("/api/public/cities/ankara", None).await?).await?;
    assert_eq!(city["city"], "Ankara");
    assert_eq!(city["stats"]["active_shipments"], 1);
    assert_eq!(city["stats"]["avg_savings"], 30);
    let elsewhere: Value = json_body(app.get("/api/public/cities/trabzon", None).await?).await?;
    assert_eq!(elsewhere["stats"]["active_shipments"], 0);

    let filtered: Value = json_body(app.get("/api/shipments?city=eski&ordering=-suggested_price", None).await?).await?;
    assert_eq!(filtered["total_count"], 1);
    let response = app.get("/api/shipments?ordering=random", None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/sitemap.xml", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/xml")));
    let sitemap = String::from_utf8(body_to_vec(response.into_body()).await?)?;
    assert!(sitemap.contains(&format!("<loc>https://nakliyenet.test/ilan/{tracking_number}/</loc>")));
    assert!(sitemap.contains("<loc>https://nakliyenet.test/nakliye/istanbul/</loc>"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn far_pages_are_empty_and_search_wildcards_are_literal() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let shipper = app.shipper("yuk@example.com").await?;
    let admin = app.admin("yonetici@example.com").await?;
    app.verified_carrier("tasiyici@example.com").await?;

    let response = app
        .post_json(
            "/api/shipments",
            &json!({
                "title": "İzmir - Manisa beyaz eşya",
                "from_city": "İzmir",
                "from_address": "Bornova",
                "to_city": "Manisa",
                "to_address": "Yunusemre",
                "weight_kg": "80",
                "suggested_price": "900",
                "pickup_date": "2030-10-01",
            }),
            Some(&shipper.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let far = "page=9223372036854775807";
    let listing: Value = json_body(app.get(&format!("/api/shipments?{far}"), None).await?).await?;
    assert_eq!(listing["total_count"], 1);
    assert_eq!(listing["results"].as_array().map(Vec::len), Some(0));

    let response = app.get(&format!("/api/blog?{far}"), None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .get(&format!("/api/admin/activities?{far}&page_size=100"), Some(&admin.token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    for query in ["search=%25", "search=_", "city=%25", "from_city=_", "to_city=%5C"] {
        let listing: Value =
            json_body(app.get(&format!("/api/shipments?{query}"), None).await?).await?;
        assert_eq!(listing["total_count"], 0, "{query}");
    }
    let listing: Value = json_body(app.get("/api/shipments?search=beyaz", None).await?).await?;
    assert_eq!(listing["total_count"], 1);

    let carriers: Value = json_body(app.get("/api/profiles?search=%25", None).await?).await?;
    assert_eq!(carriers.as_array().map(Vec::len), Some(0));
    let carriers: Value = json_body(app.get("/api/profiles?search=tasiyici", None).await?).await?;
    assert_eq!(carriers.as_array().map(Vec::len), Some(1));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn listing_owner_can_edit_while_active() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let shipper = app.shipper("yuk@example.com").await?;
    let stranger = app.shipper("baska@example.com").await?;

    let shipment: Value = json_body(
        app.post_json(
            "/api/shipments",
            &json!({
                "title": "Koli gönderisi",
                "from_city": "Bursa",
                "from_address": "Osmangazi",
                "to_city": "İstanbul",
                "to_address": "Şişli",
                "weight_kg": "15",
                "suggested_price": "250",
                "pickup_date": "2030-09-01",
                "delivery_date": "2030-09-03",
            }),
            Some(&shipper.token),
        )
        .await?,
    )
    .await?;
    assert_eq!(shipment["cargo_type"], "diger");
    assert_eq!(shipment["loading_responsibility"], "shipper");
    let path = format!(
        "/api/shipments/{}",
        shipment["tracking_number"].as_str().unwrap_or_default()
    );

    let response = app
        .patch_json(&path, &json!({ "title": "Başkasının ilanı" }), Some(&stranger.token))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let updated: Value = json_body(
        app.patch_json(
            &path,
            &json!({ "title": "Koli gönderisi (acil)", "delivery_date": null, "suggested_price": "300" }),
            Some(&shipper.token),
        )
        .await?,
    )
    .await?;
    assert_eq!(updated["title"], "Koli gönderisi (acil)");
    assert!(updated["delivery_date"].is_null());

    let response = app
        .post_json(
            "/api/shipments",
            &json!({
                "title": "Geçersiz tarih",
                "from_city": "Bursa",
                "from_address": "Osmangazi",
                "to_city": "İstanbul",
                "to_address": "Şişli",
                "weight_kg": "15",
                "suggested_price": "250",
                "pickup_date": "2030-09-05",
                "delivery_date": "2030-09-01",
            }),
            Some(&shipper.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mine: Vec<Value> = json_body(app.get("/api/shipments/mine", Some(&shipper.token)).await?).await?;
    assert_eq!(mine.len(), 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn profile_completion_tracks_phone_and_iban() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    app.insert_user("sofor@example.com", UserType::Carrier, false)
        .await?;
    let token = app.login_token("sofor@example.com", PASSWORD).await?;

    let response = app
        .patch_json("/api/profiles/me", &json!({ "iban": "DE89370400440532013000" }), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let profile: Value = json_body(
        app.patch_json(
            "/api/profiles/me",
            &json!({
                "iban": TEST_IBAN.to_lowercase(),
                "bio": "10 yıllık tecrübe",
                "company_name": "yok sayılır",
                "first_name": "Ali",
            }),
            Some(&token),
        )
        .await?,
    )
    .await?;
    assert_eq!(profile["iban"], TEST_IBAN);
    assert_eq!(profile["profile_completed"], true);
    assert_eq!(profile["bio"], "10 yıllık tecrübe");
    assert_eq!(profile["company_name"], "");
    assert_eq!(profile["first_name"], "Ali");

    let public: Value = json_body(
        app.get(
            &format!("/api/profiles/{}", profile["id"].as_str().unwrap_or_default()),
            None,
        )
        .await?,
    )
    .await?;
    assert!(public.get("iban").is_none());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn carriers_manage_their_fleet() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let carrier = app.verified_carrier("sofor@example.com").await?;
    let other = app.verified_carrier("diger@example.com").await?;
    let shipper = app.shipper("yuk@example.com").await?;

    let vehicle = json!({
        "plate_number": " 34  abc 123 ",
        "brand": "Ford",
        "model": "Transit",
        "year": 2020,
        "vehicle_type": "kamyonet",
        "max_weight_kg": 1500,
        "max_volume_m3": "12.5",
    });

    let response = app.post_json("/api/vehicles", &vehicle, Some(&shipper.token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post_json("/api/vehicles", &vehicle, Some(&carrier.token)).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = json_body(response).await?;
    assert_eq!(created["plate_number"], "34 ABC 123");
    let path = format!("/api/vehicles/{}", created["id"].as_str().unwrap_or_default());

    let response = app.post_json("/api/vehicles", &vehicle, Some(&other.token)).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .patch_json(&path, &json!({ "year": 2021 }), Some(&other.token))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let updated: Value = json_body(
        app.patch_json(&path, &json!({ "year": 2021, "has_cargo_insurance": true }), Some(&carrier.token))
            .await?,
    )
    .await?;
    assert_eq!(updated["year"], 2021);
    assert_eq!(updated["has_cargo_insurance"], true);

    let listed: Vec<Value> = json_body(
        app.get(&format!("/api/vehicles?carrier_id={}", carrier.id), None)
            .await?,
    )
    .await?;
    assert_eq!(listed.len(), 1);

    let response = app.delete(&path, Some(&carrier.token)).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.get(&path, None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
