//! Shared fixtures: an in-process router over the in-memory store

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use libtwin_server::{
    create_router, realtime::RealtimeHub, repository::Repository,
    services::{notifications::LogNotifier, Services},
    AppConfig, AppState,
};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let services = Services::new(Repository::in_memory(), &config, Arc::new(LogNotifier));
        let state = AppState::new(config, services, RealtimeHub::new());
        Self {
            router: create_router(state.clone()),
            state,
        }
    }

    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(format!("/api/v1{}", uri));
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, None).await
    }

    /// Enroll a student with the given PRN and card UID; returns the student JSON
    pub async fn student(&self, prn: &str, hex: &str) -> Value {
        let (status, body) = self
            .post(
                "/student/create",
                json!({
                    "prn_number": prn,
                    "name": format!("Student {}", prn),
                    "class": "TE",
                    "section": "A",
                    "gender": "Female",
                    "contact_number": "9876543210",
                    "email": format!("{}@campus.edu", prn.to_lowercase()),
                    "rfid": { "hex": hex }
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    pub async fn book(&self, title: &str, section: &str, total_copies: i32) -> Value {
        let (status, body) = self
            .post(
                "/book",
                json!({
                    "title": title,
                    "author": "A. Writer",
                    "isbn": "9780306406157",
                    "section": section,
                    "total_copies": total_copies
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    /// Short-term request due tomorrow
    pub async fn request(&self, student: &Value, book: &Value) -> (StatusCode, Value) {
        let due = Utc::now() + Duration::days(1);
        self.post(
            "/issue",
            json!({
                "student_id": student["id"],
                "book_id": book["id"],
                "long_term": false,
                "expected_return_date": due.to_rfc3339()
            }),
        )
        .await
    }
}
