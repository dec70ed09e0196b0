mod common;

use axum::http::Method;
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn mount_cart_resolves_products_and_skips_unknown_ids() {
    let app = TestApp::new().await;
    let shirt = app.seed_product("Camiseta", dec!(79.90)).await;
    let mug = app.seed_product("Caneca", dec!(25.00)).await;

    let response = app
        .request(
            Method::POST,
            "/cart/mount",
            Some(json!({ "ids": [shirt, 9999, mug] })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    let lines = body["data"].as_array().expect("cart lines");
    assert_eq!(lines.len(), 2, "unknown ids are skipped, not errors");
    assert_eq!(lines[0]["label"], "Camiseta");
    assert_eq!(decimal(&lines[0]["price"]), dec!(79.90));
    assert_eq!(lines[1]["label"], "Caneca");
}

#[tokio::test]
async fn mount_cart_rejects_an_empty_id_list() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::POST, "/cart/mount", Some(json!({ "ids": [] })), None)
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn shipping_quote_for_a_southeast_zipcode() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/cart/shipping?zipcode=01001-000", None, None)
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["data"]["cost"], "7");
    assert_eq!(body["data"]["days"], 3);
    assert_eq!(body["data"]["state"], "SP");
}

#[tokio::test]
async fn shipping_quote_for_a_north_zipcode() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/cart/shipping?zipcode=69900100", None, None)
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["data"]["cost"], "20");
    assert_eq!(body["data"]["days"], 10);
}

#[tokio::test]
async fn malformed_zipcode_is_a_client_error() {
    let app = TestApp::new().await;

    for bad in ["123", "123456789", "abcdefgh"] {
        let response = app
            .request(
                Method::GET,
                &format!("/cart/shipping?zipcode={}", bad),
                None,
                None,
            )
            .await;
        assert_eq!(response.status(), 400, "zipcode {:?} should be rejected", bad);
    }
}

#[tokio::test]
async fn unknown_zipcode_reads_as_quote_unavailable() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/cart/shipping?zipcode=99999999", None, None)
        .await;
    assert_eq!(response.status(), 503);
}
