use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use ride_dispatch::api::rest::router;
use ride_dispatch::config::DispatchConfig;
use ride_dispatch::external::{StubGateway, StubInvoices, StubLedger, StubMessenger};
use ride_dispatch::notify::EventKind;
use ride_dispatch::state::AppState;

const PICKUP: [f64; 2] = [76.687173, 30.706533];
const DROPOFF: [f64; 2] = [76.7688704, 30.7068928];

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(DispatchConfig::default(), 1024));
    (router(state.clone()), state)
}

fn setup_with_gateway() -> (axum::Router, Arc<AppState>, Arc<StubGateway>) {
    let gateway = Arc::new(StubGateway::new());
    let state = Arc::new(AppState::with_collaborators(
        DispatchConfig::default(),
        1024,
        gateway.clone(),
        Arc::new(StubLedger::new(90)),
        Arc::new(StubInvoices),
        Arc::new(StubMessenger),
    ));
    (router(state.clone()), state, gateway)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn register_driver(app: &axum::Router, lat: f64, lng: f64, vehicle_type: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "name": "Ravi",
                "location": { "lat": lat, "lng": lng },
                "vehicle_type": vehicle_type,
                "vehicle_model": "Splendor Plus",
                "number_plate": "CH01-4821"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rides"], 0);
    assert_eq!(body["drivers"], 0);
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("connected_clients"));
}

#[tokio::test]
async fn create_driver_validates_payload() {
    let (app, _state) = setup();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "name": "  ",
                "location": { "lat": 30.7, "lng": 76.7 },
                "vehicle_type": "bike",
                "vehicle_model": "Splendor Plus",
                "number_plate": "CH01-4821"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "name": "Ravi",
                "location": { "lat": 30.7, "lng": 76.7 },
                "vehicle_type": "bike",
                "vehicle_model": "Splendor Plus",
                "number_plate": ""
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_ride_rejects_malformed_coordinates() {
    let (app, _state) = setup();

    let response = app
        .oneshot(json_request(
            "POST",
            "/rides",
            json!({
                "rider": Uuid::new_v4(),
                "pickup": [76.687173],
                "dropoff": DROPOFF,
                "vehicle_type": "bike",
                "payment_mode": "cash"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_ride_without_drivers_returns_503() {
    let (app, _state) = setup();

    let response = app
        .oneshot(json_request(
            "POST",
            "/rides",
            json!({
                "rider": Uuid::new_v4(),
                "pickup": PICKUP,
                "dropoff": DROPOFF,
                "vehicle_type": "bike",
                "payment_mode": "cash"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn get_nonexistent_ride_returns_404() {
    let (app, _state) = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";

    let response = app
        .oneshot(get_request(&format!("/rides/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_cash_ride_lifecycle() {
    let (app, state) = setup();
    let driver_id = register_driver(&app, PICKUP[1] + 0.01, PICKUP[0], "bike").await;
    let rider = Uuid::new_v4();

    let (_, mut rider_rx) = state.notifier.register(rider);
    let (_, mut driver_rx) = state
        .notifier
        .register(driver_id.parse::<Uuid>().unwrap());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/rides",
            json!({
                "rider": rider,
                "pickup": PICKUP,
                "dropoff": DROPOFF,
                "vehicle_type": "bike",
                "payment_mode": "cash"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let ride = &body["ride"];
    let ride_id = ride["id"].as_str().unwrap().to_string();
    assert_eq!(ride["status"], "processing");
    assert_eq!(ride["fare"], 99); // ~7.81 km: ceil(20 + 78.1)
    assert!(ride.get("otp").is_none());

    assert_eq!(rider_rx.recv().await.unwrap().kind, EventKind::RideConfirmed);
    assert_eq!(driver_rx.recv().await.unwrap().kind, EventKind::RideRequest);

    // Accept: the rider learns the OTP over the live channel.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/rides/{ride_id}/accept"),
            json!({ "driver": driver_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let accepted = body_json(response).await;
    assert_eq!(accepted["status"], "accepted");
    assert!(accepted.get("otp").is_none());

    let accepted_event = rider_rx.recv().await.unwrap();
    assert_eq!(accepted_event.kind, EventKind::RideAccepted);
    let otp = accepted_event.ride.otp.unwrap();
    assert!(accepted_event.driver.is_some());

    // A second driver loses the race.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/rides/{ride_id}/accept"),
            json!({ "driver": driver_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Wrong OTP cannot start the ride.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/rides/{ride_id}/start"),
            json!({ "driver": driver_id, "otp": 10000 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/rides/{ride_id}/start"),
            json!({ "driver": driver_id, "otp": otp }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The rider hands over the rotated OTP for completion; the
    // deterministic stale-OTP checks live in the store unit tests.
    let started_event = rider_rx.recv().await.unwrap();
    assert_eq!(started_event.kind, EventKind::RideStarted);
    let rotated_otp = started_event.ride.otp.unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/rides/{ride_id}/complete"),
            json!({ "driver": driver_id, "otp": rotated_otp }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(rider_rx.recv().await.unwrap().kind, EventKind::RideCompleted);

    let response = app
        .oneshot(get_request(&format!("/rides/{ride_id}")))
        .await
        .unwrap();
    let final_ride = body_json(response).await;
    assert_eq!(final_ride["status"], "completed");
}

#[tokio::test]
async fn online_ride_confirms_through_the_webhook() {
    let (app, _state) = setup();
    register_driver(&app, PICKUP[1] + 0.01, PICKUP[0], "car").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/rides",
            json!({
                "rider": Uuid::new_v4(),
                "pickup": PICKUP,
                "dropoff": DROPOFF,
                "vehicle_type": "car",
                "payment_mode": "online"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let ride_id = body["ride_id"].as_str().unwrap().to_string();
    let session_id = body["session_id"].as_str().unwrap().to_string();
    assert!(body["checkout_url"].as_str().unwrap().len() > 0);

    // Nothing dispatched until the payment lands.
    let response = app
        .clone()
        .oneshot(get_request(&format!("/rides/{ride_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/payments/webhook",
            json!({
                "session_id": session_id,
                "intent_id": "pi_web_1",
                "amount": body["charged_total"].as_u64().unwrap() * 100,
                "currency": "inr",
                "method": "card",
                "status": "paid"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert_eq!(ack["received"], true);

    let response = app
        .oneshot(get_request(&format!("/rides/{ride_id}")))
        .await
        .unwrap();
    let ride = body_json(response).await;
    assert_eq!(ride["status"], "processing");
}

#[tokio::test]
async fn webhook_with_no_remaining_drivers_fails_the_ride_and_refunds() {
    let (app, _state, gateway) = setup_with_gateway();
    let driver_id = register_driver(&app, PICKUP[1] + 0.01, PICKUP[0], "bike").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/rides",
            json!({
                "rider": Uuid::new_v4(),
                "pickup": PICKUP,
                "dropoff": DROPOFF,
                "vehicle_type": "bike",
                "payment_mode": "online"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let ride_id = body["ride_id"].as_str().unwrap().to_string();
    let session_id = body["session_id"].as_str().unwrap().to_string();

    // The driver leaves town between checkout and payment.
    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{driver_id}/location"),
            json!({ "location": { "lat": 51.5074, "lng": -0.1278 } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/payments/webhook",
            json!({
                "session_id": session_id,
                "intent_id": "pi_gone_1",
                "amount": 6200,
                "currency": "inr",
                "method": "card",
                "status": "paid"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_request(&format!("/rides/{ride_id}")))
        .await
        .unwrap();
    let ride = body_json(response).await;
    assert_eq!(ride["status"], "failed");
    assert_eq!(gateway.refunds(), vec!["pi_gone_1".to_string()]);
}

#[tokio::test]
async fn rider_can_cancel_before_acceptance() {
    let (app, _state) = setup();
    register_driver(&app, PICKUP[1] + 0.01, PICKUP[0], "bike").await;
    let rider = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/rides",
            json!({
                "rider": rider,
                "pickup": PICKUP,
                "dropoff": DROPOFF,
                "vehicle_type": "bike",
                "payment_mode": "cash"
            }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let ride_id = body["ride"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/rides/{ride_id}/cancel"),
            json!({ "actor": "rider", "actor_id": rider }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cancelled = body_json(response).await;
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancelled_by"], "rider");

    // Terminal: nothing else applies.
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/rides/{ride_id}/cancel"),
            json!({ "actor": "rider", "actor_id": rider }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn stranger_cannot_cancel_someone_elses_ride() {
    let (app, _state) = setup();
    register_driver(&app, PICKUP[1] + 0.01, PICKUP[0], "bike").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/rides",
            json!({
                "rider": Uuid::new_v4(),
                "pickup": PICKUP,
                "dropoff": DROPOFF,
                "vehicle_type": "bike",
                "payment_mode": "cash"
            }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let ride_id = body["ride"]["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/rides/{ride_id}/cancel"),
            json!({ "actor": "rider", "actor_id": Uuid::new_v4() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
