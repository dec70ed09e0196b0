mod common;

use axum::http::Method;
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn finish_cart_creates_a_pending_order_with_shipping_in_the_total() {
    let app = TestApp::new().await;
    let token = app.register_user("Ana", "ana@example.com").await;
    let address_id = app.seed_address(&token, "01001-000").await;
    let shirt = app.seed_product("Camiseta", dec!(79.90)).await;

    // 2 x 79.90 + 7.00 zone-1 shipping = 166.80
    let response = app
        .request(
            Method::POST,
            "/cart/finish",
            Some(json!({
                "cart": [{ "productId": shirt, "quantity": 2 }],
                "addressId": address_id
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 201);

    let body = response_json(response).await;
    let order_id = body["data"]["orderId"].as_i64().expect("order id");
    assert_eq!(body["data"]["droppedItems"], 0);
    assert!(body["data"]["url"]
        .as_str()
        .unwrap()
        .starts_with("https://checkout.test/pay/"));

    let response = app
        .request(
            Method::GET,
            &format!("/orders/{}", order_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(decimal(&body["data"]["total"]), dec!(166.80));
    assert_eq!(decimal(&body["data"]["shipping_cost"]), dec!(7));
    assert_eq!(body["data"]["shipping_days"], 3);

    let items = body["data"]["items"].as_array().expect("order items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["label"], "Camiseta");
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(decimal(&items[0]["price"]), dec!(79.90));
}

#[tokio::test]
async fn unresolvable_cart_lines_are_dropped_and_counted() {
    let app = TestApp::new().await;
    let token = app.register_user("Bia", "bia@example.com").await;
    let address_id = app.seed_address(&token, "01001000").await;
    let mug = app.seed_product("Caneca", dec!(25.00)).await;

    let response = app
        .request(
            Method::POST,
            "/cart/finish",
            Some(json!({
                "cart": [
                    { "productId": mug, "quantity": 1 },
                    { "productId": 40404, "quantity": 3 }
                ],
                "addressId": address_id
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 201);

    let body = response_json(response).await;
    assert_eq!(body["data"]["droppedItems"], 1);
}

#[tokio::test]
async fn a_cart_with_no_resolvable_lines_is_rejected() {
    let app = TestApp::new().await;
    let token = app.register_user("Caio", "caio@example.com").await;
    let address_id = app.seed_address(&token, "01001000").await;

    let response = app
        .request(
            Method::POST,
            "/cart/finish",
            Some(json!({
                "cart": [{ "productId":40404, "quantity": 1 }],
                "addressId": address_id
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn a_foreign_address_reads_as_not_found() {
    let app = TestApp::new().await;
    let owner_token = app.register_user("Dona", "dona@example.com").await;
    let address_id = app.seed_address(&owner_token, "01001000").await;
    let other_token = app.register_user("Eve", "eve@example.com").await;
    let shirt = app.seed_product("Camiseta", dec!(79.90)).await;

    let response = app
        .request(
            Method::POST,
            "/cart/finish",
            Some(json!({
                "cart": [{ "productId": shirt, "quantity": 1 }],
                "addressId": address_id
            })),
            Some(&other_token),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn checkout_fails_when_no_shipping_quote_exists() {
    let app = TestApp::new().await;
    let token = app.register_user("Fab", "fab@example.com").await;
    // Address with a zipcode the postal registry does not know.
    let address_id = app.seed_address(&token, "88888888").await;
    let shirt = app.seed_product("Camiseta", dec!(79.90)).await;

    let response = app
        .request(
            Method::POST,
            "/cart/finish",
            Some(json!({
                "cart": [{ "productId": shirt, "quantity": 1 }],
                "addressId": address_id
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn gateway_failure_leaves_the_pending_order_behind() {
    let app = TestApp::new().await;
    let token = app.register_user("Gil", "gil@example.com").await;
    let address_id = app.seed_address(&token, "01001000").await;
    let shirt = app.seed_product("Camiseta", dec!(79.90)).await;
    app.gateway.set_failing(true);

    let response = app
        .request(
            Method::POST,
            "/cart/finish",
            Some(json!({
                "cart": [{ "productId": shirt, "quantity": 1 }],
                "addressId": address_id
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 402);

    // The order was persisted before the gateway call and stays pending,
    // ready for a retry.
    let response = app.request(Method::GET, "/orders", None, Some(&token)).await;
    let body = response_json(response).await;
    let orders = body["data"].as_array().expect("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], "pending");

    app.gateway.set_failing(false);
    let order_id = orders[0]["id"].as_i64().unwrap();
    let response = app
        .request(
            Method::POST,
            &format!("/orders/{}/retry", order_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["orderId"], order_id);
}

#[tokio::test]
async fn order_snapshots_survive_catalog_price_changes() {
    let app = TestApp::new().await;
    let token = app.register_user("Ana", "ana@example.com").await;
    let address_id = app.seed_address(&token, "01001000").await;
    let shirt = app.seed_product("Camiseta", dec!(79.90)).await;

    let response = app
        .request(
            Method::POST,
            "/cart/finish",
            Some(json!({
                "cart": [{ "productId": shirt, "quantity": 2 }],
                "addressId": address_id
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 201);
    let order_id = response_json(response).await["data"]["orderId"]
        .as_i64()
        .expect("order id");

    app.set_product_price(shirt, dec!(129.90)).await;

    // The stored total and item prices keep what the buyer saw at checkout.
    let response = app
        .request(
            Method::GET,
            &format!("/orders/{}", order_id),
            None,
            Some(&token),
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(decimal(&body["data"]["total"]), dec!(166.80));
    let items = body["data"]["items"].as_array().expect("order items");
    assert_eq!(decimal(&items[0]["price"]), dec!(79.90));

    // Retrying payment bills the snapshot, not the live catalog.
    let response = app
        .request(
            Method::POST,
            &format!("/orders/{}/retry", order_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let lines = app.gateway.last_session_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].price, dec!(79.90));
    assert_eq!(lines[0].quantity, 2);
}

#[tokio::test]
async fn order_is_resolvable_by_its_payment_session() {
    let app = TestApp::new().await;
    let token = app.register_user("Hugo", "hugo@example.com").await;
    let address_id = app.seed_address(&token, "01001000").await;
    let shirt = app.seed_product("Camiseta", dec!(79.90)).await;

    let response = app
        .request(
            Method::POST,
            "/cart/finish",
            Some(json!({
                "cart": [{ "productId": shirt, "quantity": 1 }],
                "addressId": address_id
            })),
            Some(&token),
        )
        .await;
    let body = response_json(response).await;
    let order_id = body["data"]["orderId"].as_i64().unwrap();
    let session_id = body["data"]["url"]
        .as_str()
        .unwrap()
        .rsplit('/')
        .next()
        .unwrap()
        .to_string();

    let response = app
        .request(
            Method::GET,
            &format!("/orders/session?session_id={}", session_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["orderId"], order_id);
}
