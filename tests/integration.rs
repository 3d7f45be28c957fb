use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use rider_dispatch::api::rest::router;
use rider_dispatch::auth::{Operator, Role};
use rider_dispatch::engine::service::{self, CreateAssignment};
use rider_dispatch::models::assignment::Priority;
use rider_dispatch::models::order::{Order, OrderStatus};
use rider_dispatch::models::rider::{Rider, RiderStatus, VehicleType};
use rider_dispatch::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn operators() -> Vec<(String, Operator)> {
    vec![
        (
            "admin-token".to_string(),
            Operator {
                name: "maria".to_string(),
                role: Role::Admin,
            },
        ),
        (
            "staff-token".to_string(),
            Operator {
                name: "tom".to_string(),
                role: Role::Staff,
            },
        ),
    ]
}

fn setup() -> axum::Router {
    router(Arc::new(AppState::new(64, false, operators())))
}

fn setup_strict() -> axum::Router {
    router(Arc::new(AppState::new(64, true, operators())))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", "Bearer admin-token")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", "Bearer admin-token")
        .body(Body::empty())
        .unwrap()
}

fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("authorization", "Bearer admin-token")
        .body(Body::empty())
        .unwrap()
}

fn unauthenticated_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
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

async fn seed_rider(app: &axum::Router, full_name: &str) -> String {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/riders",
            json!({
                "full_name": full_name,
                "phone": "+49-170-555-0101",
                "vehicle_type": "motorcycle"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

async fn seed_order(app: &axum::Router) -> String {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "customer_name": "Lena Krause",
                "shipping_address": "Bergstrasse 12, 10115 Berlin",
                "contact_phone": "+49-30-555-0177"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

async fn seed_assignment(app: &axum::Router, order_id: &str, rider_id: &str) -> String {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/assignments",
            json!({ "order_id": order_id, "rider_id": rider_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await["assignment"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app
        .oneshot(unauthenticated_request("GET", "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["riders"], 0);
    assert_eq!(body["orders"], 0);
    assert_eq!(body["assignments"], 0);
    assert_eq!(body["history_entries"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app
        .oneshot(unauthenticated_request("GET", "/metrics"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("active_assignments"));
}

#[tokio::test]
async fn missing_token_returns_401() {
    let app = setup();
    let response = app
        .oneshot(unauthenticated_request("GET", "/assignments"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_token_returns_401() {
    let app = setup();
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/assignments")
                .header("authorization", "Bearer wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn staff_token_is_accepted() {
    let app = setup();
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/assignments")
                .header("authorization", "Bearer staff-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_assignment_dispatches_the_order() {
    let app = setup();
    let rider_id = seed_rider(&app, "Sam Porter").await;
    let order_id = seed_order(&app).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/assignments",
            json!({
                "order_id": order_id,
                "rider_id": rider_id,
                "priority": "high",
                "delivery_notes": "ring twice"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let body = body_json(res).await;
    let assignment = &body["assignment"];
    assert_eq!(assignment["status"], "assigned");
    assert_eq!(assignment["priority"], "high");
    assert_eq!(assignment["assigned_by"], "maria");
    assert!(assignment["picked_up_at"].is_null());
    let assignment_id = assignment["id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(get_request(&format!("/orders/{order_id}")))
        .await
        .unwrap();
    let order = body_json(res).await;
    assert_eq!(order["status"], "dispatched_to_rider");

    let res = app
        .oneshot(get_request(&format!(
            "/assignments/history?assignment_id={assignment_id}"
        )))
        .await
        .unwrap();
    let trail = body_json(res).await;
    let trail = trail.as_array().unwrap();
    assert_eq!(trail.len(), 1);
    assert!(trail[0]["old_status"].is_null());
    assert_eq!(trail[0]["new_status"], "assigned");
    assert_eq!(trail[0]["changed_by"], "maria");
}

#[tokio::test]
async fn second_create_for_same_order_conflicts() {
    let app = setup();
    let first_rider = seed_rider(&app, "Sam Porter").await;
    let second_rider = seed_rider(&app, "Ada Brandt").await;
    let order_id = seed_order(&app).await;

    seed_assignment(&app, &order_id, &first_rider).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/assignments",
            json!({ "order_id": order_id, "rider_id": second_rider }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app.oneshot(get_request("/assignments")).await.unwrap();
    let body = body_json(res).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn delivered_completes_order_and_extends_history() {
    let app = setup();
    let rider_id = seed_rider(&app, "Sam Porter").await;
    let order_id = seed_order(&app).await;
    let assignment_id = seed_assignment(&app, &order_id, &rider_id).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/assignments",
            json!({
                "id": assignment_id,
                "status": "delivered",
                "proof_of_delivery": "signature on file"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    let assignment = &body["assignment"];
    assert_eq!(assignment["status"], "delivered");
    assert!(!assignment["delivered_at"].is_null());
    assert_eq!(assignment["proof_of_delivery"], "signature on file");

    let res = app
        .clone()
        .oneshot(get_request(&format!("/orders/{order_id}")))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["status"], "delivered");

    let res = app
        .oneshot(get_request(&format!(
            "/assignments/history?assignment_id={assignment_id}"
        )))
        .await
        .unwrap();
    let trail = body_json(res).await;
    let trail = trail.as_array().unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[1]["old_status"], "assigned");
    assert_eq!(trail[1]["new_status"], "delivered");
}

#[tokio::test]
async fn failure_sends_order_back_to_triage() {
    let app = setup();
    let rider_id = seed_rider(&app, "Sam Porter").await;
    let order_id = seed_order(&app).await;
    let assignment_id = seed_assignment(&app, &order_id, &rider_id).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/assignments",
            json!({
                "id": assignment_id,
                "status": "failed",
                "failure_reason": "rider unreachable"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    let assignment = &body["assignment"];
    assert_eq!(assignment["failure_reason"], "rider unreachable");
    assert!(!assignment["failed_at"].is_null());

    let res = app
        .clone()
        .oneshot(get_request(&format!("/orders/{order_id}")))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["status"], "processing");

    // A failed attempt frees the order for another rider.
    let replacement_rider = seed_rider(&app, "Ada Brandt").await;
    let res = app
        .oneshot(json_request(
            "POST",
            "/assignments",
            json!({ "order_id": order_id, "rider_id": replacement_rider }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn off_duty_rider_is_rejected_by_name() {
    let app = setup();
    let rider_id = seed_rider(&app, "Milo Hartmann").await;
    let order_id = seed_order(&app).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/riders/{rider_id}/status"),
            json!({ "status": "off_duty" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(json_request(
            "POST",
            "/assignments",
            json!({ "order_id": order_id, "rider_id": rider_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = body_json(res).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("Milo Hartmann"));
    assert!(message.contains("off_duty"));
}

#[tokio::test]
async fn unknown_rider_returns_404() {
    let app = setup();
    let order_id = seed_order(&app).await;

    let res = app
        .oneshot(json_request(
            "POST",
            "/assignments",
            json!({ "order_id": order_id, "rider_id": Uuid::new_v4() }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_order_returns_404() {
    let app = setup();
    let rider_id = seed_rider(&app, "Sam Porter").await;

    let res = app
        .oneshot(json_request(
            "POST",
            "/assignments",
            json!({ "order_id": Uuid::new_v4(), "rider_id": rider_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stage_timestamps_survive_later_updates() {
    let app = setup();
    let rider_id = seed_rider(&app, "Sam Porter").await;
    let order_id = seed_order(&app).await;
    let assignment_id = seed_assignment(&app, &order_id, &rider_id).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/assignments",
            json!({ "id": assignment_id, "status": "delivered" }),
        ))
        .await
        .unwrap();
    let delivered_at = body_json(res).await["assignment"]["delivered_at"]
        .as_str()
        .unwrap()
        .to_string();

    // Permissive mode accepts a late correction, but the original
    // delivery timestamp stays.
    let res = app
        .oneshot(json_request(
            "PATCH",
            "/assignments",
            json!({ "id": assignment_id, "status": "failed" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["assignment"]["delivered_at"], delivered_at.as_str());
    assert!(!body["assignment"]["failed_at"].is_null());
}

#[tokio::test]
async fn delete_guards_in_progress_and_reverts_order() {
    let app = setup();
    let rider_id = seed_rider(&app, "Sam Porter").await;
    let order_id = seed_order(&app).await;
    let assignment_id = seed_assignment(&app, &order_id, &rider_id).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/assignments",
            json!({ "id": assignment_id, "status": "in_transit" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(delete_request(&format!("/assignments?id={assignment_id}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Second order/assignment that never got past `assigned` can go.
    let second_order = seed_order(&app).await;
    let second_rider = seed_rider(&app, "Ada Brandt").await;
    let second_assignment = seed_assignment(&app, &second_order, &second_rider).await;

    let res = app
        .clone()
        .oneshot(delete_request(&format!(
            "/assignments?id={second_assignment}"
        )))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["success"], true);

    let res = app
        .clone()
        .oneshot(get_request(&format!("/orders/{second_order}")))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["status"], "processing");

    // The audit trail of the deleted assignment survives.
    let res = app
        .oneshot(get_request(&format!(
            "/assignments/history?assignment_id={second_assignment}"
        )))
        .await
        .unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_unknown_assignment_returns_404() {
    let app = setup();
    let res = app
        .oneshot(delete_request(&format!("/assignments?id={}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_status_value_is_rejected() {
    let app = setup();
    let rider_id = seed_rider(&app, "Sam Porter").await;
    let order_id = seed_order(&app).await;
    let assignment_id = seed_assignment(&app, &order_id, &rider_id).await;

    let res = app
        .oneshot(json_request(
            "PATCH",
            "/assignments",
            json!({ "id": assignment_id, "status": "teleported" }),
        ))
        .await
        .unwrap();
    assert!(res.status().is_client_error());
}

#[tokio::test]
async fn listing_filters_and_paginates() {
    let app = setup();
    let first_rider = seed_rider(&app, "Sam Porter").await;
    let second_rider = seed_rider(&app, "Ada Brandt").await;

    let first_order = seed_order(&app).await;
    let second_order = seed_order(&app).await;
    let third_order = seed_order(&app).await;

    let first_assignment = seed_assignment(&app, &first_order, &first_rider).await;
    seed_assignment(&app, &second_order, &first_rider).await;
    seed_assignment(&app, &third_order, &second_rider).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/assignments",
            json!({ "id": first_assignment, "status": "picked_up" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(get_request(&format!("/assignments?rider_id={first_rider}")))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body["total"], 2);

    let res = app
        .clone()
        .oneshot(get_request("/assignments?status=picked_up"))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["assignments"][0]["id"], first_assignment.as_str());
    assert_eq!(body["assignments"][0]["rider"]["full_name"], "Sam Porter");
    assert!(body["assignments"][0]["order"]["order_number"]
        .as_str()
        .unwrap()
        .starts_with("ORD-"));

    let res = app
        .clone()
        .oneshot(get_request("/assignments?page=2&limit=2"))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["assignments"].as_array().unwrap().len(), 1);
    assert_eq!(body["page"], 2);

    let res = app
        .oneshot(get_request("/assignments?limit=500"))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body["limit"], 100);
}

#[tokio::test]
async fn strict_mode_rejects_status_jumps() {
    let app = setup_strict();
    let rider_id = seed_rider(&app, "Sam Porter").await;
    let order_id = seed_order(&app).await;
    let assignment_id = seed_assignment(&app, &order_id, &rider_id).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/assignments",
            json!({ "id": assignment_id, "status": "delivered" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .oneshot(json_request(
            "PATCH",
            "/assignments",
            json!({ "id": assignment_id, "status": "picked_up" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn concurrent_creates_for_one_order_yield_one_assignment() {
    let state = Arc::new(AppState::new(64, false, Vec::new()));
    let now = Utc::now();

    let order_id = Uuid::new_v4();
    state.orders.insert(
        order_id,
        Order {
            id: order_id,
            order_number: state.next_order_number(),
            status: OrderStatus::Processing,
            customer_name: "Lena Krause".to_string(),
            shipping_address: "Bergstrasse 12, 10115 Berlin".to_string(),
            contact_phone: "+49-30-555-0177".to_string(),
            created_at: now,
            updated_at: now,
        },
    );

    let rider_id = Uuid::new_v4();
    state.riders.insert(
        rider_id,
        Rider {
            id: rider_id,
            full_name: "Sam Porter".to_string(),
            phone: "+49-170-555-0101".to_string(),
            vehicle_type: VehicleType::Motorcycle,
            status: RiderStatus::Active,
            created_at: now,
            updated_at: now,
        },
    );

    let operator = Operator {
        name: "maria".to_string(),
        role: Role::Admin,
    };

    let mut handles = Vec::new();
    for _ in 0..16 {
        let state = state.clone();
        let operator = operator.clone();
        handles.push(tokio::spawn(async move {
            service::create_assignment(
                &state,
                &operator,
                CreateAssignment {
                    order_id,
                    rider_id,
                    priority: Priority::Normal,
                    delivery_notes: None,
                    estimated_delivery: None,
                    delivery_fee: None,
                },
            )
            .is_ok()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(state.assignments.len(), 1);
    assert_eq!(state.history.len(), 1);
}
