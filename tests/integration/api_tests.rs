//! API integration tests over the in-memory store

mod helpers;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use helpers::TestApp;

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new();

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_student_enrollment_and_lookup() {
    let app = TestApp::new();
    let student = app.student("prn001", "a1b2c3d4").await;

    assert_eq!(student["prn_number"], "PRN001");
    assert_eq!(student["credits"], 6);
    assert_eq!(student["rfid"]["hex"], "A1B2C3D4");
    assert_eq!(student["rfid"]["decimal"], "2712847316");
    assert!(student.get("version").is_none());

    let (status, found) = app.post("/student/verify", json!({ "id": "PRN001" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], student["id"]);

    let (status, found) = app.post("/student/verify", json!({ "rfid": " a1b2 c3d4 " })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], student["id"]);

    let (status, _) = app.post("/student/verify", json!({ "id": "NOPE" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_prn_conflicts() {
    let app = TestApp::new();
    app.student("PRN001", "A1B2C3D4").await;

    let (status, body) = app
        .post(
            "/student/create",
            json!({
                "prn_number": "PRN001",
                "name": "Someone Else",
                "class": "TE",
                "section": "B",
                "gender": "Male",
                "contact_number": "9123456780",
                "email": "else@campus.edu",
                "rfid": { "decimal": "12345" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_student_with_bad_contact_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/student/create",
            json!({
                "prn_number": "PRN009",
                "name": "Short Phone",
                "class": "SE",
                "section": "A",
                "gender": "Other",
                "contact_number": "12345",
                "email": "phone@campus.edu",
                "rfid": { "hex": "FF" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_book_ids_follow_section_initials() {
    let app = TestApp::new();
    app.book("Compilers", "Computer Science", 1).await;
    app.book("Medieval Europe", "History", 1).await;
    app.book("Operating Systems", "Computer Science", 1).await;
    let third = app.book("Networks", "computer science", 1).await;

    assert_eq!(third["book_id"], "CS-0003");
    assert_eq!(third["language"], "English");
    assert_eq!(third["status"], "Available");

    let (status, found) = app.get("/book/CS-0003").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["title"], "Networks");

    let (status, found) = app.get(&format!("/book/{}", third["id"].as_str().unwrap())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["book_id"], "CS-0003");
}

#[tokio::test]
async fn test_book_with_bad_isbn_is_rejected() {
    let app = TestApp::new();
    let (status, _) = app
        .post(
            "/book",
            json!({
                "title": "Broken",
                "author": "Nobody",
                "isbn": "12-34",
                "section": "History"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, books) = app.get("/book").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_short_term_request_without_date_writes_nothing() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;

    let (status, body) = app
        .post(
            "/issue",
            json!({
                "student_id": student["id"],
                "book_id": book["id"],
                "long_term": false
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, after) = app.get(&format!("/student/{}", student["id"].as_str().unwrap())).await;
    assert_eq!(after["credits"], 6);

    let (_, requests) = app.get("/issue").await;
    assert!(requests.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_each_request_costs_one_credit() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 5).await;

    for _ in 0..3 {
        let (status, created) = app.request(&student, &book).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "Pending");
    }

    let (_, after) = app.get(&format!("/student/{}", student["id"].as_str().unwrap())).await;
    assert_eq!(after["credits"], 3);
}

#[tokio::test]
async fn test_credits_do_not_go_negative() {
    let mut config = libtwin_server::AppConfig::default();
    config.borrowing.max_credits = 1;
    let app = TestApp::with_config(config);
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 5).await;

    let (status, _) = app.request(&student, &book).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.request(&student, &book).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "RuleViolation");
}

#[tokio::test]
async fn test_borrow_scenario_request_approve_verify() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;

    let (status, created) = app.request(&student, &book).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "Pending");

    let student_uri = format!("/student/{}", student["id"].as_str().unwrap());
    let (_, after) = app.get(&student_uri).await;
    assert_eq!(after["credits"], 5);

    let request_id = created["id"].as_str().unwrap();
    let (status, approved) = app.patch(&format!("/issue/approve/{}", request_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "Approved");
    assert!(approved["approved_at"].is_string());
    assert_eq!(approved["student"]["prn_number"], "PRN001");
    assert_eq!(approved["book"]["book_id"], "H-0001");

    let (status, outcome) = app
        .post(
            "/issue/verify",
            json!({ "studentId": student["id"], "bookId": book["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["data"]["id"], request_id);
}

#[tokio::test]
async fn test_approve_is_guarded() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;
    let (_, created) = app.request(&student, &book).await;
    let request_id = created["id"].as_str().unwrap();

    let (status, first) = app.patch(&format!("/issue/approve/{}", request_id)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.patch(&format!("/issue/approve/{}", request_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InvalidTransition");

    let (status, _) = app.patch(&format!("/issue/reject/{}", request_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The first approval stamp is untouched
    let (_, current) = app.get(&format!("/issue/{}", request_id)).await;
    assert_eq!(current["approved_at"], first["approved_at"]);
    assert_eq!(current["status"], "Approved");
}

#[tokio::test]
async fn test_reject_then_list_by_status() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;
    let (_, first) = app.request(&student, &book).await;
    app.request(&student, &book).await;

    let (status, rejected) = app
        .patch(&format!("/issue/reject/{}", first["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(rejected["rejected_at"].is_string());

    let (_, rejected_list) = app.get("/issue/status/rejected").await;
    assert_eq!(rejected_list.as_array().unwrap().len(), 1);

    let (_, pending) = app.get("/issue?status=Pending").await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (status, _) = app.get("/issue/status/lost").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_return_requires_an_approved_request() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;
    let (_, created) = app.request(&student, &book).await;
    let request_id = created["id"].as_str().unwrap();

    let (status, _) = app.patch(&format!("/issue/return/{}", request_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.patch(&format!("/issue/approve/{}", request_id)).await;
    let (status, returned) = app.patch(&format!("/issue/return/{}", request_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "Approved");
    assert!(returned["return_date"].is_string());

    let (status, _) = app.patch(&format!("/issue/return/{}", request_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_student_fallback_listing() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;
    app.request(&student, &book).await;

    let (status, body) = app
        .get(&format!("/issue/student/{}", student["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["student"]["prn_number"], "PRN001");
    assert_eq!(body["requests"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_fine_sweep_charges_once() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;

    // Just under three days late by the time the sweep runs
    let due = Utc::now() - Duration::days(3) + Duration::minutes(30);
    let (status, _) = app
        .post(
            "/issue",
            json!({
                "student_id": student["id"],
                "book_id": book["id"],
                "expected_return_date": due.to_rfc3339()
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, report) = app.post("/fines/calculate", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["fined"], 1);
    app.post("/fines/calculate", json!({})).await;

    let (_, fines) = app.get("/fines").await;
    let fines = fines.as_array().unwrap();
    assert_eq!(fines.len(), 1);
    assert_eq!(fines[0]["amount"], 15);
    assert_eq!(fines[0]["reason"], "Overdue by 3 day(s)");
    assert_eq!(fines[0]["paid"], false);

    let fine_id = fines[0]["id"].as_str().unwrap();
    let (status, paid) = app.patch(&format!("/fines/{}/paid", fine_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["paid"], true);

    let (status, _) = app.patch(&format!("/fines/{}/paid", fine_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, unpaid) = app.get("/fines?paid=false").await;
    assert!(unpaid.as_array().unwrap().is_empty());

    let (_, mine) = app
        .get(&format!("/fines/student/{}", student["id"].as_str().unwrap()))
        .await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stock_analytics_scores_stay_in_range() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let popular = app.book("Medieval Europe", "History", 3).await;
    app.book("Compilers", "Computer Science", 1).await;

    for _ in 0..2 {
        let (_, created) = app.request(&student, &popular).await;
        app.patch(&format!("/issue/approve/{}", created["id"].as_str().unwrap()))
            .await;
    }
    app.post("/pir/scan", json!({ "sectionName": "history" })).await;

    let (status, report) = app.get("/book/analytics/stock").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["success"], true);

    let books = report["books"].as_array().unwrap();
    assert_eq!(books.len(), 2);
    for book in books {
        let score = book["demand_score"].as_u64().unwrap();
        assert!(score <= 100);
    }

    let top = books
        .iter()
        .find(|b| b["book_id"] == "H-0001")
        .unwrap();
    assert_eq!(top["times_issued"], 2);
    assert_eq!(top["shelf_visits"], 1);
    assert_eq!(top["demand_score"], 100);
    assert_eq!(top["demand_status"], "hot");
}

#[tokio::test]
async fn test_section_counters_upsert() {
    let app = TestApp::new();
    app.post("/pir/scan", json!({ "section_name": "fiction" })).await;
    let (status, section) = app.post("/pir/scan", json!({ "section_name": "Fiction " })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(section["section_name"], "FICTION");
    assert_eq!(section["visit_count"], 2);

    let (_, section) = app.post("/pir/book", json!({ "section_name": "fiction" })).await;
    assert_eq!(section["books_bought_count"], 1);

    let (status, _) = app.post("/pir/scan", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, sections) = app.get("/pir").await;
    assert_eq!(sections.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rfid_scan_and_presence() {
    let app = TestApp::new();
    app.student("PRN001", "A1B2C3D4").await;

    let (status, scan) = app.post("/rfid/scan", json!({ "uid_hex": "a1 b2 c3 d4" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scan["student"]["prn_number"], "PRN001");
    assert_eq!(scan["scan"]["scan_type"], "in");

    let (status, presence) = app.post("/rfid/is-active", json!({ "prn_number": "PRN001" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(presence["isActive"], true);
    assert!(presence["latestScan"].is_object());

    // Readers may send the decimal UID as a number
    let (status, _) = app
        .post("/rfid/scan", json!({ "uid_dec": 2712847316u64, "scan_type": "out" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, presence) = app.post("/rfid/is-active", json!({ "prn_number": "PRN001" })).await;
    assert_eq!(presence["isActive"], false);

    let (status, latest) = app.get("/rfid/get-scanned").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["scan_type"], "out");
}

#[tokio::test]
async fn test_rfid_unknown_card_and_missing_prn() {
    let app = TestApp::new();

    let (status, _) = app.post("/rfid/scan", json!({ "uid_hex": "DEADBEEF" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.post("/rfid/scan", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/rfid/is-active", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/rfid/get-scanned").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_uses_error_shape() {
    let app = TestApp::new();
    let (status, body) = app.post("/issue", json!({ "student_id": "not-a-uuid" })).await;
    assert!(status.is_client_error());
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_far_page_is_empty() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;
    app.request(&student, &book).await;

    let (status, body) = app
        .get("/issue?page=9223372036854775807&per_page=200")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_verify_names_missing_student_or_book() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;
    let unknown = uuid::Uuid::new_v4().to_string();

    let (status, body) = app
        .post("/issue/verify", json!({ "studentId": unknown, "bookId": book["id"] }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Student not found");

    let (status, body) = app
        .post("/issue/verify", json!({ "studentId": student["id"], "bookId": unknown }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Book not found");

    let (status, body) = app
        .post("/issue/verify", json!({ "studentId": student["id"], "bookId": book["id"] }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No borrow request found for this student and book");
}

#[tokio::test]
async fn test_responses_are_gzipped_on_request() {
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use tower::ServiceExt;

    let app = TestApp::new();
    for n in 0..5 {
        app.book(&format!("Volume {}", n), "History", 1).await;
    }

    let request = Request::builder()
        .uri("/api/v1/book")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
}
