//! Real-time channel tests: command dispatch and HTTP-triggered emissions

mod helpers;

use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_test::assert_ok;
use uuid::Uuid;

use helpers::TestApp;
use libtwin_server::{
    realtime::{handlers::dispatch, ClientEvent},
    AppConfig,
};

fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(assert_ok!(serde_json::from_str::<Value>(&frame)));
    }
    frames
}

fn events(frames: &[Value]) -> Vec<&str> {
    frames.iter().filter_map(|f| f["event"].as_str()).collect()
}

fn uuid_of(value: &Value) -> Uuid {
    Uuid::parse_str(value["id"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_my_requests_need_a_student() {
    let app = TestApp::new();
    let hub = app.state.hub.clone();
    let (conn, mut rx) = hub.register();

    dispatch(&app.state, conn, ClientEvent::GetMyBorrowRequests).await;

    let frames = drain(&mut rx);
    assert_eq!(events(&frames), vec!["myBorrowRequestsError"]);
    assert!(frames[0]["data"]["message"]
        .as_str()
        .unwrap()
        .contains("Student ID required"));
}

#[tokio::test]
async fn test_identified_student_gets_their_requests() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;
    app.request(&student, &book).await;

    let hub = app.state.hub.clone();
    let (conn, mut rx) = hub.register();
    dispatch(&app.state, conn, ClientEvent::Identify(uuid_of(&student))).await;
    dispatch(&app.state, conn, ClientEvent::GetMyBorrowRequests).await;

    let frames = drain(&mut rx);
    assert_eq!(events(&frames), vec!["identified", "myBorrowRequests"]);
    assert_eq!(frames[0]["data"]["studentId"], student["id"]);
    assert_eq!(frames[1]["data"]["requests"].as_array().unwrap().len(), 1);
    assert_eq!(frames[1]["data"]["student"]["credits"], 5);
}

#[tokio::test]
async fn test_http_lifecycle_reaches_admins_and_student() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;

    let hub = app.state.hub.clone();
    let (admin, mut admin_rx) = hub.register();
    let (phone, mut phone_rx) = hub.register();
    dispatch(&app.state, admin, ClientEvent::GetBorrowRequests).await;
    hub.bind_student(phone, uuid_of(&student));
    assert_eq!(events(&drain(&mut admin_rx)), vec!["borrowRequests"]);

    let (_, created) = app.request(&student, &book).await;
    assert_eq!(events(&drain(&mut admin_rx)), vec!["newBorrowRequest"]);

    app.patch(&format!("/issue/approve/{}", created["id"].as_str().unwrap()))
        .await;

    let admin_frames = drain(&mut admin_rx);
    assert_eq!(events(&admin_frames), vec!["borrowRequestsUpdated"]);
    assert_eq!(admin_frames[0]["data"]["status"], "Approved");

    let phone_frames = drain(&mut phone_rx);
    assert_eq!(events(&phone_frames), vec!["myBorrowRequestUpdated"]);
    assert_eq!(phone_frames[0]["data"]["id"], created["id"]);
}

#[tokio::test]
async fn test_socket_approval_notifies_issuer_once() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;
    let (_, created) = app.request(&student, &book).await;

    let hub = app.state.hub.clone();
    let (issuer, mut issuer_rx) = hub.register();
    let (peer, mut peer_rx) = hub.register();
    dispatch(&app.state, peer, ClientEvent::GetBorrowRequests).await;
    drain(&mut peer_rx);

    dispatch(&app.state, issuer, ClientEvent::ApproveBorrowRequest(uuid_of(&created))).await;

    assert_eq!(events(&drain(&mut issuer_rx)), vec!["borrowRequestsUpdated"]);
    assert_eq!(events(&drain(&mut peer_rx)), vec!["borrowRequestsUpdated"]);

    // A second approval is refused and only the issuer hears about it
    dispatch(&app.state, issuer, ClientEvent::ApproveBorrowRequest(uuid_of(&created))).await;
    assert_eq!(events(&drain(&mut issuer_rx)), vec!["error"]);
    assert!(drain(&mut peer_rx).is_empty());
}

#[tokio::test]
async fn test_scan_is_broadcast_to_everyone() {
    let app = TestApp::new();
    app.student("PRN001", "A1B2C3D4").await;

    let hub = app.state.hub.clone();
    let (_a, mut a_rx) = hub.register();
    let (_b, mut b_rx) = hub.register();

    app.post("/rfid/scan", json!({ "uid_hex": "A1B2C3D4" })).await;

    let frames = drain(&mut a_rx);
    assert_eq!(events(&frames), vec!["new-scan"]);
    assert_eq!(frames[0]["data"]["student"]["prn_number"], "PRN001");
    assert_eq!(events(&drain(&mut b_rx)), vec!["new-scan"]);
}

#[tokio::test]
async fn test_search_and_book_details() {
    let app = TestApp::new();
    let student = app.student("PRN001", "A1B2C3D4").await;
    app.book("Medieval Europe", "History", 2).await;
    app.book("Compilers", "Computer Science", 1).await;

    let hub = app.state.hub.clone();
    let (conn, mut rx) = hub.register();
    hub.bind_student(conn, uuid_of(&student));

    dispatch(&app.state, conn, ClientEvent::SearchBooks("medieval".to_string())).await;
    dispatch(&app.state, conn, ClientEvent::GetBookDetails("CS-0001".to_string())).await;
    dispatch(&app.state, conn, ClientEvent::GetBookDetails("CS-9999".to_string())).await;

    let frames = drain(&mut rx);
    assert_eq!(events(&frames), vec!["searchResults", "bookDetails", "bookDetails"]);
    assert_eq!(frames[0]["data"]["books"].as_array().unwrap().len(), 1);
    assert_eq!(frames[0]["data"]["student"]["prn_number"], "PRN001");
    assert_eq!(frames[1]["data"]["title"], "Compilers");
    assert_eq!(frames[2]["data"]["error"], "Book not found");
}

#[tokio::test]
async fn test_section_stats_filter_by_name() {
    let app = TestApp::new();
    app.post("/pir/scan", json!({ "section_name": "History" })).await;
    app.post("/pir/scan", json!({ "section_name": "Fiction" })).await;

    let hub = app.state.hub.clone();
    let (conn, mut rx) = hub.register();
    dispatch(&app.state, conn, ClientEvent::GetSectionStats(Some("history".to_string()))).await;
    dispatch(&app.state, conn, ClientEvent::GetSectionStats(None)).await;

    let frames = drain(&mut rx);
    assert_eq!(events(&frames), vec!["sectionStats", "sectionStats"]);
    assert_eq!(frames[0]["data"].as_array().unwrap().len(), 1);
    assert_eq!(frames[0]["data"][0]["section_name"], "HISTORY");
    assert_eq!(frames[1]["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_list_is_not_cut_at_page_size() {
    let mut config = AppConfig::default();
    config.borrowing.max_page_size = 3;
    let app = TestApp::with_config(config);
    let first = app.student("PRN001", "A1B2C3D4").await;
    let second = app.student("PRN002", "B1B2C3D4").await;
    let book = app.book("Medieval Europe", "History", 2).await;
    for _ in 0..4 {
        app.request(&first, &book).await;
        app.request(&second, &book).await;
    }

    let hub = app.state.hub.clone();
    let (admin, mut admin_rx) = hub.register();
    let (phone, mut phone_rx) = hub.register();
    dispatch(&app.state, admin, ClientEvent::GetBorrowRequests).await;
    hub.bind_student(phone, uuid_of(&first));
    dispatch(&app.state, phone, ClientEvent::GetMyBorrowRequests).await;

    let admin_frames = drain(&mut admin_rx);
    assert_eq!(admin_frames[0]["data"].as_array().unwrap().len(), 8);
    let phone_frames = drain(&mut phone_rx);
    assert_eq!(phone_frames[0]["data"]["requests"].as_array().unwrap().len(), 4);

    let (_, body) = app
        .get(&format!("/issue/student/{}", first["id"].as_str().unwrap()))
        .await;
    assert_eq!(body["requests"].as_array().unwrap().len(), 4);
}
