//! services/api/src/web/router.rs
//!
//! Assembles the public, portal and admin routes into one router.

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::web::{
    appointments::{
        create_appointment_handler, delete_appointment_handler, list_appointments_handler,
        update_appointment_handler,
    },
    auth::{login_handler, logout_handler, me_handler},
    middleware::{require_admin, require_auth},
    patients::{
        create_patient_handler, get_patient_handler, list_patients_handler,
        update_patient_handler,
    },
    portal::{dashboard_handler, portal_appointments_handler, portal_prescriptions_handler},
    prescriptions::{
        create_prescription_handler, delete_prescription_handler, list_prescriptions_handler,
        update_prescription_handler,
    },
    state::AppState,
};

pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Patient portal (session cookie required)
    let portal_routes = Router::new()
        .route("/auth/me", get(me_handler))
        .route("/portal/dashboard", get(dashboard_handler))
        .route("/portal/appointments", get(portal_appointments_handler))
        .route("/portal/prescriptions", get(portal_prescriptions_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Admin console (bearer token required)
    let admin_routes = Router::new()
        .route(
            "/admin/patients",
            get(list_patients_handler).post(create_patient_handler),
        )
        .route(
            "/admin/patients/{id}",
            get(get_patient_handler).put(update_patient_handler),
        )
        .route(
            "/admin/patients/{id}/appointments",
            get(list_appointments_handler).post(create_appointment_handler),
        )
        .route(
            "/admin/appointments/{id}",
            put(update_appointment_handler).delete(delete_appointment_handler),
        )
        .route(
            "/admin/patients/{id}/prescriptions",
            get(list_prescriptions_handler).post(create_prescription_handler),
        )
        .route(
            "/admin/prescriptions/{id}",
            put(update_prescription_handler).delete(delete_prescription_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ));

    Router::new()
        .merge(public_routes)
        .merge(portal_routes)
        .merge(admin_routes)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::config::Config;
    use crate::web::auth::hash_password;
    use axum::body::Body;
    use axum::http::{header, HeaderMap, Request, StatusCode};
    use chrono::{DateTime, Duration, NaiveDate, Utc};
    use emr_core::domain::{
        AppointmentDetails, AuthSession, NewPatient, Patient, PrescriptionDetails, RefillSchedule,
        RepeatSchedule,
    };
    use emr_core::ports::{AppointmentStore, PatientDirectory, PrescriptionStore};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const ADMIN_TOKEN: &str = "test-admin-token";

    fn test_config(admin_token: Option<&str>) -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: "postgres://unused".to_string(),
            db_max_connections: 1,
            log_level: tracing::Level::INFO,
            admin_token: admin_token.map(str::to_string),
            session_ttl_days: 7,
            cookie_secure: false,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }

    fn test_app_with(admin_token: Option<&str>) -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_store(store.clone(), Arc::new(test_config(admin_token)));
        (build_router(Arc::new(state)), store)
    }

    fn test_app() -> (Router, Arc<MemoryStore>) {
        test_app_with(Some(ADMIN_TOKEN))
    }

    async fn add_patient(store: &MemoryStore, first: &str, email: &str) -> Patient {
        store
            .create_patient(NewPatient {
                first_name: first.to_string(),
                last_name: "Doe".to_string(),
                email: email.to_string(),
                hashed_password: hash_password("password123").unwrap(),
                date_of_birth: NaiveDate::from_ymd_opt(1985, 5, 15).unwrap(),
                phone: "555-0101".to_string(),
                address: "123 Main St".to_string(),
            })
            .await
            .unwrap()
    }

    async fn session_for(store: &MemoryStore, patient: &Patient, expires_at: DateTime<Utc>) -> String {
        let id = format!("session-{}", patient.id);
        store
            .insert_session(AuthSession {
                id: id.clone(),
                patient_id: patient.id,
                expires_at,
            })
            .await;
        format!("session={}", id)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, headers, body)
    }

    fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    fn admin(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_TOKEN));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    fn login(email: &str, password: &str) -> Request<Body> {
        Request::post("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "email": email, "password": password }).to_string()))
            .unwrap()
    }

    //-------------------------------------------------------------------------------------
    // Authentication
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn login_sets_cookie_that_opens_the_portal() {
        let (app, store) = test_app();
        let patient = add_patient(&store, "John", "john.doe@example.com").await;

        let (status, headers, body) = send(&app, login("John.Doe@example.com", "password123")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], json!(patient.id));

        let set_cookie = headers[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Max-Age=604800"));
        let cookie = set_cookie.split(';').next().unwrap().to_string();

        let (status, _, body) = send(&app, get_with_cookie("/auth/me", &cookie)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "john.doe@example.com");
        assert!(body.get("password").is_none());
        assert!(body.get("hashed_password").is_none());
    }

    #[tokio::test]
    async fn bad_password_and_unknown_email_are_indistinguishable() {
        let (app, store) = test_app();
        add_patient(&store, "John", "john.doe@example.com").await;

        let wrong_password = send(&app, login("john.doe@example.com", "nope-nope")).await;
        let unknown_email = send(&app, login("nobody@example.com", "password123")).await;
        assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_email.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.2, unknown_email.2);
    }

    #[tokio::test]
    async fn portal_rejects_missing_and_expired_sessions() {
        let (app, store) = test_app();
        let patient = add_patient(&store, "John", "john.doe@example.com").await;

        let req = Request::get("/portal/dashboard").body(Body::empty()).unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

        let cookie = session_for(&store, &patient, Utc::now() - Duration::minutes(1)).await;
        let (status, _, _) = send(&app, get_with_cookie("/portal/dashboard", &cookie)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn using_a_session_slides_its_expiry() {
        let (app, store) = test_app();
        let patient = add_patient(&store, "John", "john.doe@example.com").await;
        let cookie = session_for(&store, &patient, Utc::now() + Duration::hours(1)).await;

        let (status, headers, _) = send(&app, get_with_cookie("/auth/me", &cookie)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::SET_COOKIE].to_str().unwrap().starts_with(&cookie));

        let expiry = store
            .session_expiry(&format!("session-{}", patient.id))
            .await
            .unwrap();
        assert!(expiry > Utc::now() + Duration::days(6));
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let (app, store) = test_app();
        let patient = add_patient(&store, "John", "john.doe@example.com").await;
        let cookie = session_for(&store, &patient, Utc::now() + Duration::days(1)).await;

        let req = Request::post("/auth/logout")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));

        let (status, _, _) = send(&app, get_with_cookie("/auth/me", &cookie)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    //-------------------------------------------------------------------------------------
    // Portal schedule views
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn dashboard_shows_repeats_of_past_anchors() {
        let (app, store) = test_app();
        let patient = add_patient(&store, "John", "john.doe@example.com").await;
        let now = Utc::now();

        let weekly = store
            .create_appointment(
                patient.id,
                AppointmentDetails {
                    provider_name: "Dr. Emily Brown".to_string(),
                    date_time: now - Duration::days(10),
                    repeat_schedule: Some(RepeatSchedule::Weekly),
                    end_date: None,
                },
            )
            .await
            .unwrap();
        store
            .create_appointment(
                patient.id,
                AppointmentDetails {
                    provider_name: "Dr. Michael Chen".to_string(),
                    date_time: now - Duration::days(2),
                    repeat_schedule: None,
                    end_date: None,
                },
            )
            .await
            .unwrap();
        store
            .create_prescription(
                patient.id,
                PrescriptionDetails {
                    medication_name: "Lisinopril".to_string(),
                    dosage: "10mg".to_string(),
                    quantity: 30,
                    refill_date: now + Duration::days(5),
                    refill_schedule: RefillSchedule::Monthly,
                },
            )
            .await
            .unwrap();

        let cookie = session_for(&store, &patient, now + Duration::days(1)).await;
        let (status, _, body) = send(&app, get_with_cookie("/portal/dashboard", &cookie)).await;
        assert_eq!(status, StatusCode::OK);

        let appointments = body["appointments"].as_array().unwrap();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0]["appointment_id"], json!(weekly.id));
        assert_eq!(appointments[0]["repeat_schedule"], "weekly");
        assert_eq!(appointments[0]["days_away"], 4);

        let refills = body["refills"].as_array().unwrap();
        assert_eq!(refills.len(), 1);
        assert_eq!(refills[0]["medication_name"], "Lisinopril");
        assert_eq!(refills[0]["days_away"], 5);
    }

    #[tokio::test]
    async fn list_views_honour_the_requested_horizon() {
        let (app, store) = test_app();
        let patient = add_patient(&store, "John", "john.doe@example.com").await;
        let now = Utc::now();
        store
            .create_appointment(
                patient.id,
                AppointmentDetails {
                    provider_name: "Dr. Sarah Johnson".to_string(),
                    date_time: now + Duration::days(1),
                    repeat_schedule: Some(RepeatSchedule::Daily),
                    end_date: Some(now + Duration::days(10)),
                },
            )
            .await
            .unwrap();
        let cookie = session_for(&store, &patient, now + Duration::days(1)).await;

        let (_, _, body) = send(&app, get_with_cookie("/portal/appointments", &cookie)).await;
        assert_eq!(body["occurrences"].as_array().unwrap().len(), 10);

        let (_, _, body) = send(&app, get_with_cookie("/portal/appointments?days=5", &cookie)).await;
        let occurrences = body["occurrences"].as_array().unwrap();
        assert_eq!(occurrences.len(), 5);
        let dates: Vec<&str> = occurrences
            .iter()
            .map(|o| o["occurs_at"].as_str().unwrap())
            .collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);

        let (status, _, _) = send(&app, get_with_cookie("/portal/prescriptions?days=400", &cookie)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn portal_only_sees_its_own_records() {
        let (app, store) = test_app();
        let john = add_patient(&store, "John", "john.doe@example.com").await;
        let jane = add_patient(&store, "Jane", "jane.smith@example.com").await;
        store
            .create_prescription(
                jane.id,
                PrescriptionDetails {
                    medication_name: "Atorvastatin".to_string(),
                    dosage: "20mg".to_string(),
                    quantity: 30,
                    refill_date: Utc::now() + Duration::days(4),
                    refill_schedule: RefillSchedule::Monthly,
                },
            )
            .await
            .unwrap();

        let cookie = session_for(&store, &john, Utc::now() + Duration::days(1)).await;
        let (_, _, body) = send(&app, get_with_cookie("/portal/prescriptions", &cookie)).await;
        assert!(body["occurrences"].as_array().unwrap().is_empty());
    }

    //-------------------------------------------------------------------------------------
    // Admin console
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn login_discards_expired_sessions() {
        let (app, store) = test_app();
        let patient = add_patient(&store, "John", "john.doe@example.com").await;
        session_for(&store, &patient, Utc::now() - Duration::days(1)).await;
        let stale = format!("session-{}", patient.id);
        assert!(store.session_expiry(&stale).await.is_some());

        let (status, _, _) = send(&app, login("john.doe@example.com", "password123")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(store.session_expiry(&stale).await.is_none());
    }

    #[tokio::test]
    async fn admin_console_requires_the_configured_token() {
        let (app, _) = test_app();
        let req = Request::get("/admin/patients").body(Body::empty()).unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

        let req = Request::get("/admin/patients")
            .header(header::AUTHORIZATION, "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

        let req = Request::get("/admin/patients")
            .header(header::AUTHORIZATION, format!("Bearer {} ", ADMIN_TOKEN))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

        let (closed, _) = test_app_with(None);
        assert_eq!(
            send(&closed, admin("GET", "/admin/patients", None)).await.0,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn admin_manages_patients() {
        let (app, _) = test_app();
        let new_patient = json!({
            "first_name": "Jane",
            "last_name": "Smith",
            "email": "jane.smith@example.com",
            "password": "password123",
            "date_of_birth": "1990-08-22",
            "phone": "555-0102",
            "address": "456 Oak Ave"
        });

        let (status, _, created) = send(&app, admin("POST", "/admin/patients", Some(new_patient.clone()))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, _, _) = send(&app, admin("POST", "/admin/patients", Some(new_patient))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _, updated) = send(
            &app,
            admin("PUT", &format!("/admin/patients/{}", id), Some(json!({ "phone": "555-9999" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["phone"], "555-9999");
        assert_eq!(updated["last_name"], "Smith");

        let (status, _, list) = send(&app, admin("GET", "/admin/patients", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["appointment_count"], 0);

        let (status, _, _) = send(
            &app,
            admin("GET", &format!("/admin/patients/{}", uuid::Uuid::new_v4()), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn changed_password_works_exactly_as_typed() {
        let (app, store) = test_app();
        let patient = add_patient(&store, "John", "john.doe@example.com").await;

        let (status, _, _) = send(
            &app,
            admin(
                "PUT",
                &format!("/admin/patients/{}", patient.id),
                Some(json!({ "password": " other pw1 " })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = send(&app, login("john.doe@example.com", " other pw1 ")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = send(&app, login("john.doe@example.com", "password123")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn record_lists_of_unknown_patients_are_not_found() {
        let (app, _) = test_app();
        let unknown = uuid::Uuid::new_v4();
        for kind in ["appointments", "prescriptions"] {
            let uri = format!("/admin/patients/{}/{}", unknown, kind);
            let (status, _, _) = send(&app, admin("GET", &uri, None)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{kind}");
        }
    }

    #[tokio::test]
    async fn admin_manages_appointments() {
        let (app, store) = test_app();
        let patient = add_patient(&store, "John", "john.doe@example.com").await;
        let base = format!("/admin/patients/{}/appointments", patient.id);

        let bad = json!({
            "provider_name": "Dr. Sarah Johnson",
            "date_time": "2030-01-10T09:00",
            "repeat_schedule": "weekly",
            "end_date": "2030-01-01"
        });
        let (status, _, message) = send(&app, admin("POST", &base, Some(bad))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "end_date: must not be before date_time");

        let good = json!({
            "provider_name": "Dr. Sarah Johnson",
            "date_time": "2030-01-10T09:00",
            "repeat_schedule": "weekly",
            "end_date": "2030-03-01"
        });
        let (status, _, created) = send(&app, admin("POST", &base, Some(good))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (_, _, record) = send(&app, admin("GET", &format!("/admin/patients/{}", patient.id), None)).await;
        assert_eq!(record["appointments"].as_array().unwrap().len(), 1);

        let replacement = json!({
            "provider_name": "Dr. Michael Chen",
            "date_time": "2030-02-01T10:30:00Z"
        });
        let (status, _, updated) = send(
            &app,
            admin("PUT", &format!("/admin/appointments/{}", id), Some(replacement)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["provider_name"], "Dr. Michael Chen");
        assert_eq!(updated["repeat_schedule"], Value::Null);

        let delete = format!("/admin/appointments/{}", id);
        assert_eq!(send(&app, admin("DELETE", &delete, None)).await.0, StatusCode::OK);
        assert_eq!(send(&app, admin("DELETE", &delete, None)).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn appointments_need_an_existing_patient() {
        let (app, _) = test_app();
        let uri = format!("/admin/patients/{}/appointments", uuid::Uuid::new_v4());
        let body = json!({ "provider_name": "Dr. Chen", "date_time": "2030-01-10T09:00" });
        assert_eq!(send(&app, admin("POST", &uri, Some(body))).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_manages_prescriptions() {
        let (app, store) = test_app();
        let patient = add_patient(&store, "John", "john.doe@example.com").await;
        let base = format!("/admin/patients/{}/prescriptions", patient.id);

        let bad = json!({
            "medication_name": "Metformin",
            "dosage": "500mg",
            "quantity": -60,
            "refill_date": "2030-01-10",
            "refill_schedule": "monthly"
        });
        assert_eq!(send(&app, admin("POST", &base, Some(bad))).await.0, StatusCode::BAD_REQUEST);

        let good = json!({
            "medication_name": "Metformin",
            "dosage": "500mg",
            "quantity": 60,
            "refill_date": "2030-01-10",
            "refill_schedule": "quarterly"
        });
        let (status, _, created) = send(&app, admin("POST", &base, Some(good))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["refill_schedule"], "quarterly");

        let (_, _, list) = send(&app, admin("GET", &base, None)).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let id = created["id"].as_str().unwrap();
        let delete = format!("/admin/prescriptions/{}", id);
        assert_eq!(send(&app, admin("DELETE", &delete, None)).await.0, StatusCode::OK);
        let (_, _, list) = send(&app, admin("GET", &base, None)).await;
        assert!(list.as_array().unwrap().is_empty());
    }
}
