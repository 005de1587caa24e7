use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use poolsplit::auth::{sign_user_token, AuthKeys};
use poolsplit::cache::NoopCache;
use poolsplit::handlers::configure_routes;
use poolsplit::notify::NullNotifier;
use poolsplit::service::{PoolService, ServiceOptions};
use poolsplit::store::InMemoryStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

const SERVICE_TOKEN: &str = "svc-token";
const SECRET: &str = "signing-secret";

fn keys() -> AuthKeys {
    AuthKeys {
        service_token: SERVICE_TOKEN.to_string(),
        signing_secret: SECRET.to_string(),
    }
}

fn bearer(user: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", sign_user_token(user, SECRET)))
}

fn service() -> web::Data<PoolService> {
    web::Data::new(PoolService::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(NoopCache),
        Arc::new(NullNotifier),
        ServiceOptions::default(),
    ))
}

macro_rules! app {
    () => {
        test::init_service(
            App::new()
                .app_data(service())
                .app_data(web::Data::new(keys()))
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn pool_flow_over_http() {
    let app = app!();

    let request = test::TestRequest::put()
        .uri("/pools/trip")
        .insert_header(bearer("ann"))
        .set_json(json!({ "name": "Goa" }))
        .to_request();
    assert_eq!(test::call_service(&app, request).await.status(), StatusCode::CREATED);

    let request = test::TestRequest::post()
        .uri("/pools/trip/members")
        .insert_header(bearer("ann"))
        .set_json(json!({ "user_id": "bob", "email": null, "upi_id": "bob.k@okaxis" }))
        .to_request();
    assert_eq!(test::call_service(&app, request).await.status(), StatusCode::CREATED);

    let request = test::TestRequest::post()
        .uri("/pools/trip/expenses")
        .insert_header(bearer("bob"))
        .set_json(json!({ "title": "Dinner", "amount": "80.00", "paid_by": "bob" }))
        .to_request();
    assert_eq!(test::call_service(&app, request).await.status(), StatusCode::CREATED);

    let request = test::TestRequest::get()
        .uri("/pools/trip/balance")
        .insert_header(bearer("ann"))
        .to_request();
    let balances: Value = test::call_and_read_body_json(&app, request).await;
    let net = |user: &str| balances[user]["net"].as_str().unwrap().parse::<Decimal>().unwrap();
    assert_eq!(net("bob"), dec!(40));
    assert_eq!(net("ann"), dec!(-40));

    let request = test::TestRequest::post()
        .uri("/pools/trip/settle")
        .insert_header(bearer("ann"))
        .to_request();
    let settlements: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(settlements[0]["from_user"], "ann");
    assert_eq!(settlements[0]["to_user"], "bob");
    let transaction_id = settlements[0]["transaction_id"].as_str().unwrap().to_string();

    let request = test::TestRequest::get()
        .uri(&format!("/transactions/{transaction_id}/payment-link"))
        .insert_header(bearer("ann"))
        .to_request();
    let payment: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(payment["recipient_upi"], "bob.k@okaxis");

    // The debtor cannot confirm receipt.
    let request = test::TestRequest::post()
        .uri(&format!("/transactions/{transaction_id}/settle"))
        .insert_header(bearer("ann"))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["error"]["type"], "authorization_error");

    let request = test::TestRequest::post()
        .uri(&format!("/transactions/{transaction_id}/settle"))
        .insert_header(bearer("bob"))
        .to_request();
    let settled: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(settled["status"], "completed");
    assert_eq!(settled["is_settled"], true);

    let request = test::TestRequest::post()
        .uri(&format!("/transactions/{transaction_id}/complete"))
        .insert_header(("Authorization", SERVICE_TOKEN))
        .to_request();
    assert_eq!(test::call_service(&app, request).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn rejects_missing_or_forged_tokens() {
    let app = app!();

    let request = test::TestRequest::get().uri("/pools/trip/balance").to_request();
    assert_eq!(test::call_service(&app, request).await.status(), StatusCode::UNAUTHORIZED);

    let request = test::TestRequest::get()
        .uri("/pools/trip/balance")
        .insert_header(("Authorization", "ann:00ff"))
        .to_request();
    assert_eq!(test::call_service(&app, request).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn unknown_pools_and_bad_bodies() {
    let app = app!();

    let request = test::TestRequest::get()
        .uri("/pools/nowhere/balance")
        .insert_header(("Authorization", SERVICE_TOKEN))
        .to_request();
    assert_eq!(test::call_service(&app, request).await.status(), StatusCode::NOT_FOUND);

    let request = test::TestRequest::put()
        .uri("/pools/trip")
        .insert_header(bearer("ann"))
        .set_json(json!({ "title": "missing name" }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["error"]["type"], "validation_error");

    let request = test::TestRequest::put()
        .uri("/pools/trip")
        .insert_header(("Authorization", SERVICE_TOKEN))
        .set_json(json!({ "name": "Goa" }))
        .to_request();
    assert_eq!(test::call_service(&app, request).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn validates_upi_ids() {
    let app = app!();

    let request = test::TestRequest::post()
        .uri("/upi/validate")
        .insert_header(bearer("ann"))
        .set_json(json!({ "upi_id": "ravi@paytm" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(body["upi_id"]["provider_name"], "Paytm");
    assert_eq!(body["provider"]["is_wallet"], true);

    let request = test::TestRequest::post()
        .uri("/upi/validate")
        .insert_header(bearer("ann"))
        .set_json(json!({ "upi_id": "not-an-id" }))
        .to_request();
    assert_eq!(test::call_service(&app, request).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn pool_edits_and_personal_views() {
    let app = app!();

    let request = test::TestRequest::put()
        .uri("/pools/flat")
        .insert_header(bearer("ann"))
        .set_json(json!({ "name": "Flat" }))
        .to_request();
    assert_eq!(test::call_service(&app, request).await.status(), StatusCode::CREATED);

    let request = test::TestRequest::patch()
        .uri("/pools/flat")
        .insert_header(bearer("ann"))
        .set_json(json!({ "description": "Rent and bills" }))
        .to_request();
    let pool: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(pool["name"], "Flat");
    assert_eq!(pool["description"], "Rent and bills");

    let request = test::TestRequest::post()
        .uri("/pools/flat/expenses")
        .insert_header(bearer("ann"))
        .set_json(json!({ "title": "Rent", "amount": "900.00", "paid_by": "ann" }))
        .to_request();
    let expense: Value = test::call_and_read_body_json(&app, request).await;
    let expense_id = expense["id"].as_str().unwrap().to_string();

    let request = test::TestRequest::patch()
        .uri(&format!("/expenses/{expense_id}"))
        .insert_header(bearer("ann"))
        .set_json(json!({ "title": "March rent" }))
        .to_request();
    let edited: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(edited["title"], "March rent");

    let request = test::TestRequest::post()
        .uri("/pools/flat/invite")
        .insert_header(bearer("ann"))
        .set_json(json!({ "email": "dan@mail.test" }))
        .to_request();
    assert_eq!(test::call_service(&app, request).await.status(), StatusCode::ACCEPTED);

    let request = test::TestRequest::get()
        .uri("/me/pools")
        .insert_header(bearer("ann"))
        .to_request();
    let pools: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(pools[0]["id"], "flat");

    let request = test::TestRequest::get()
        .uri("/me/dashboard")
        .insert_header(bearer("ann"))
        .to_request();
    let dashboard: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(dashboard["recent_expenses"][0]["title"], "March rent");
    assert_eq!(dashboard["pending_transactions"], json!([]));

    let request = test::TestRequest::get()
        .uri("/me/pools")
        .insert_header(("Authorization", SERVICE_TOKEN))
        .to_request();
    assert_eq!(test::call_service(&app, request).await.status(), StatusCode::FORBIDDEN);
}
