use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod auth_routes;
pub mod booking_routes;
pub mod home_routes;
pub mod patient_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest(
            "/api/v1",
            appointment_routes::router()
                .merge(booking_routes::router())
                .merge(patient_routes::router()),
        )
        .merge(home_routes::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{generate_session_token, hash_password, hash_session_token};
    use crate::models::NewAdmin;
    use crate::store::{AdminStore, MemoryStore};

    async fn test_state() -> (AppState, String) {
        let store = MemoryStore::new();
        let admin = store
            .insert_admin(NewAdmin {
                username: "desk".into(),
                display_name: "Front Desk".into(),
                password_hash: "unused".into(),
            })
            .await
            .unwrap();
        let token = generate_session_token();
        store
            .create_session(
                admin.admin_id,
                &hash_session_token(&token),
                Utc::now() + Duration::hours(1),
            )
            .await
            .unwrap();

        let state = AppState {
            store: Arc::new(store),
            session_ttl_hours: 24,
        };
        (state, token)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut b = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            b = b.header("Authorization", format!("Bearer {t}"));
        }
        match body {
            Some(v) => b
                .header("Content-Type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => b.body(Body::empty()).unwrap(),
        }
    }

    async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
        let response = router(state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn walk_in(name: &str, time: &str) -> Value {
        json!({
            "patientName": name,
            "phone": "0712 345 678",
            "appointmentDate": "2030-01-15",
            "appointmentTime": time,
            "serviceType": "consultation",
            "healthConcern": "headache"
        })
    }

    #[tokio::test]
    async fn health_is_public() {
        let (state, _) = test_state().await;
        let (status, body) = send(&state, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn admin_routes_require_session() {
        let (state, _) = test_state().await;

        let (status, body) = send(&state, request("GET", "/api/v1/appointments", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "SESSION_EXPIRED");

        let (status, _) = send(
            &state,
            request("GET", "/api/v1/appointments", Some("forged"), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn double_booking_returns_409_naming_holder() {
        let (state, token) = test_state().await;

        let (status, body) = send(
            &state,
            request("POST", "/api/v1/appointments", Some(&token), Some(walk_in("Patient X", "10:00"))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "scheduled");

        let (status, body) = send(
            &state,
            request("POST", "/api/v1/appointments", Some(&token), Some(walk_in("Patient Y", "10:00"))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "SLOT_CONFLICT");
        assert_eq!(body["error"]["conflict"]["patientName"], "Patient X");

        let (_, body) = send(
            &state,
            request(
                "GET",
                "/api/v1/appointments/conflicts?date=2030-01-15&time=10:00",
                Some(&token),
                None,
            ),
        )
        .await;
        assert_eq!(body["data"]["conflict"], true);
    }

    #[tokio::test]
    async fn status_endpoint_enforces_transitions() {
        let (state, token) = test_state().await;
        let (_, body) = send(
            &state,
            request("POST", "/api/v1/appointments", Some(&token), Some(walk_in("Ada", "09:00"))),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/appointments/{id}/status");

        let (status, body) = send(
            &state,
            request("POST", &uri, Some(&token), Some(json!({ "status": "completed" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["completedAt"].is_string());

        let (status, body) = send(
            &state,
            request("POST", &uri, Some(&token), Some(json!({ "status": "scheduled" }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "cannot change a completed appointment");
    }

    #[tokio::test]
    async fn bulk_status_reports_skips() {
        let (state, token) = test_state().await;
        let mut ids = Vec::new();
        for (name, time) in [("A", "09:00"), ("B", "10:00"), ("C", "11:00")] {
            let (_, body) = send(
                &state,
                request("POST", "/api/v1/appointments", Some(&token), Some(walk_in(name, time))),
            )
            .await;
            ids.push(body["data"]["id"].as_str().unwrap().to_string());
        }
        send(
            &state,
            request(
                "POST",
                &format!("/api/v1/appointments/{}/status", ids[0]),
                Some(&token),
                Some(json!({ "status": "completed" })),
            ),
        )
        .await;

        let (status, body) = send(
            &state,
            request(
                "POST",
                "/api/v1/appointments/bulk-status",
                Some(&token),
                Some(json!({ "appointmentIds": &ids, "status": "cancelled" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updatedCount"], 2);
        assert_eq!(body["skipped"], json!([ids[0]]));

        let (status, _) = send(
            &state,
            request(
                "POST",
                "/api/v1/appointments/bulk-status",
                Some(&token),
                Some(json!({ "appointmentIds": ["nope"], "status": "cancelled" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn public_booking_then_admin_conversion() {
        let (state, token) = test_state().await;

        let (status, body) = send(
            &state,
            request(
                "POST",
                "/api/v1/bookings",
                None,
                Some(json!({
                    "name": "Grace",
                    "phone": "+44 20 7946 0000",
                    "preferredDate": "2030-02-01",
                    "preferredTime": "3:00 PM",
                    "serviceType": "counselling",
                    "healthConcern": "stress",
                    "requestCallback": false
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "pending");
        let booking_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &state,
            request(
                "PATCH",
                &format!("/api/v1/bookings/{booking_id}"),
                Some(&token),
                Some(json!({ "convert": true })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let appointment_id = body["data"]["appointment"]["id"].as_str().unwrap();
        assert_eq!(body["data"]["booking"]["appointmentId"], appointment_id);
        assert_eq!(body["data"]["appointment"]["bookingId"], booking_id.as_str());
        assert_eq!(body["data"]["booking"]["status"], "confirmed");

        let (status, body) = send(
            &state,
            request("GET", "/api/v1/patients/lookup?phone=%2B442079460000", Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["stats"]["total"], 1);
        assert_eq!(body["data"]["stats"]["upcoming"], 1);
        assert_eq!(body["data"]["bookings"].as_array().unwrap().len(), 1);
    }

    async fn submit_public_booking(state: &AppState, time: &str) -> String {
        let (status, body) = send(
            state,
            request(
                "POST",
                "/api/v1/bookings",
                None,
                Some(json!({
                    "name": "Hana",
                    "phone": "0712 000 111",
                    "preferredDate": "2030-03-04",
                    "preferredTime": time,
                    "serviceType": "physiotherapy",
                    "requestCallback": true
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn convert_endpoint_accepts_missing_body_and_overrides() {
        let (state, token) = test_state().await;

        let plain = submit_public_booking(&state, "09:00").await;
        let uri = format!("/api/v1/bookings/{plain}/convert");
        let (status, body) = send(&state, request("POST", &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["appointment"]["appointmentTime"], "09:00");
        assert_eq!(body["data"]["appointment"]["status"], "scheduled");
        assert_eq!(body["data"]["booking"]["status"], "confirmed");

        // linked bookings cannot be converted twice
        let (status, body) = send(&state, request("POST", &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let moved = submit_public_booking(&state, "09:00").await;
        let (status, body) = send(
            &state,
            request(
                "POST",
                &format!("/api/v1/bookings/{moved}/convert"),
                Some(&token),
                Some(json!({ "appointmentTime": "11:30" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["appointment"]["appointmentTime"], "11:30");
        assert_eq!(body["data"]["appointment"]["appointmentDate"], "2030-03-04");
    }

    #[tokio::test]
    async fn convert_into_taken_slot_is_409() {
        let (state, token) = test_state().await;
        let first = submit_public_booking(&state, "10:00").await;
        let second = submit_public_booking(&state, "10:00").await;

        let (status, _) = send(
            &state,
            request("POST", &format!("/api/v1/bookings/{first}/convert"), Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &state,
            request("POST", &format!("/api/v1/bookings/{second}/convert"), Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["conflict"]["patientName"], "Hana");
    }

    #[tokio::test]
    async fn unknown_appointment_is_404() {
        let (state, token) = test_state().await;
        let (status, body) = send(
            &state,
            request(
                "GET",
                &format!("/api/v1/appointments/{}", uuid::Uuid::new_v4()),
                Some(&token),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn login_me_logout() {
        let (state, _) = test_state().await;
        state
            .store
            .insert_admin(NewAdmin {
                username: "director".into(),
                display_name: "Director".into(),
                password_hash: hash_password("open-sesame").unwrap(),
            })
            .await
            .unwrap();

        let (status, _) = send(
            &state,
            request(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": "director", "password": "wrong" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &state,
            request(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": "director", "password": "open-sesame" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["access_token"].as_str().unwrap().to_string();

        let (status, body) = send(&state, request("GET", "/api/v1/auth/me", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["admin"]["username"], "director");
        assert!(body["data"]["session_expires_at"].is_string());

        let (status, _) = send(&state, request("POST", "/api/v1/auth/logout", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&state, request("GET", "/api/v1/auth/me", Some(&token), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
