//! Real-time command handlers
//!
//! Failures never close the connection: they come back as error-shaped events.

use super::{
    events::{BookLookup, ClientEvent, ErrorPayload, ServerEvent},
    hub::{Channel, ConnectionId, RealtimeHub},
};
use crate::{
    error::{AppError, AppResult},
    models::{BorrowRequestDetails, ScanDetails},
    AppState,
};

/// Execute one client command and emit its results
pub async fn dispatch(state: &AppState, conn: ConnectionId, event: ClientEvent) {
    let hub = &state.hub;
    let services = &state.services;

    match event {
        ClientEvent::GetBorrowRequests => {
            hub.join(conn, Channel::Admins);
            match services.borrows.list_all().await {
                Ok(requests) => {
                    tracing::debug!(count = requests.len(), "Sent borrow requests to admin");
                    hub.emit_to(conn, &ServerEvent::BorrowRequests(requests));
                }
                Err(e) => hub.emit_to(conn, &ServerEvent::BorrowRequestsError(payload(&e))),
            }
        }

        ClientEvent::ApproveBorrowRequest(id) => {
            hub.join(conn, Channel::Admins);
            match services.borrows.approve(id).await {
                Ok(details) => publish_request_update(hub, &details, Some(conn)),
                Err(e) => hub.emit_to(conn, &ServerEvent::Error(payload(&e))),
            }
        }

        ClientEvent::RejectBorrowRequest(id) => {
            hub.join(conn, Channel::Admins);
            match services.borrows.reject(id).await {
                Ok(details) => publish_request_update(hub, &details, Some(conn)),
                Err(e) => hub.emit_to(conn, &ServerEvent::Error(payload(&e))),
            }
        }

        ClientEvent::GetMyBorrowRequests => {
            let Some(student_id) = hub.student_of(conn) else {
                tracing::warn!(connection = %conn, "getMyBorrowRequests without a student id");
                hub.emit_to(
                    conn,
                    &ServerEvent::MyBorrowRequestsError(ErrorPayload::new(
                        "Student ID required. Please reconnect with studentId.",
                    )),
                );
                return;
            };
            match services.borrows.list_for_student(student_id).await {
                Ok((student, requests)) => {
                    hub.join(conn, Channel::Student(student_id));
                    hub.emit_to(
                        conn,
                        &ServerEvent::MyBorrowRequests {
                            requests,
                            student: Box::new(student),
                        },
                    );
                }
                Err(e) => hub.emit_to(conn, &ServerEvent::MyBorrowRequestsError(payload(&e))),
            }
        }

        ClientEvent::Identify(student_id) => match services.students.get(student_id).await {
            Ok(_) => {
                hub.bind_student(conn, student_id);
                hub.emit_to(conn, &ServerEvent::Identified { student_id });
            }
            Err(e) => hub.emit_to(conn, &ServerEvent::Error(payload(&e))),
        },

        ClientEvent::SearchBooks(query) => {
            let limit = state.config.realtime.search_limit;
            let result = search(state, conn, &query, limit).await;
            let event = result.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Book search failed");
                ServerEvent::SearchResults {
                    books: Vec::new(),
                    student: None,
                }
            });
            hub.emit_to(conn, &event);
        }

        ClientEvent::GetBookDetails(key) => {
            let lookup = match services.catalog.get_book(&key).await {
                Ok(book) => BookLookup::Found(Box::new(book)),
                Err(AppError::NotFound(_)) => BookLookup::Missing {
                    error: "Book not found".to_string(),
                },
                Err(e) => {
                    tracing::error!(error = %e, "Book lookup failed");
                    BookLookup::Missing {
                        error: "Failed to fetch book details".to_string(),
                    }
                }
            };
            hub.emit_to(conn, &ServerEvent::BookDetails(lookup));
        }

        ClientEvent::GetSectionStats(name) => match services.sections.stats(name.as_deref()).await {
            Ok(sections) => hub.emit_to(conn, &ServerEvent::SectionStats(sections)),
            Err(e) => hub.emit_to(conn, &ServerEvent::SectionStatsError(payload(&e))),
        },
    }
}

async fn search(
    state: &AppState,
    conn: ConnectionId,
    query: &str,
    limit: i64,
) -> AppResult<ServerEvent> {
    let books = state.services.catalog.search(query, limit).await?;
    let student = match state.hub.student_of(conn) {
        Some(id) => state.services.students.get(id).await.ok().map(Box::new),
        None => None,
    };
    Ok(ServerEvent::SearchResults { books, student })
}

fn payload(err: &AppError) -> ErrorPayload {
    ErrorPayload::new(err.public_message())
}

/// Send a status change to its issuer, then to the student and admin channels
pub fn publish_request_update(
    hub: &RealtimeHub,
    details: &BorrowRequestDetails,
    issuer: Option<ConnectionId>,
) {
    let boxed = Box::new(details.clone());
    if let Some(conn) = issuer {
        hub.emit_to(conn, &ServerEvent::BorrowRequestsUpdated(boxed.clone()));
    }
    hub.emit_to_channel(
        &Channel::Student(details.request.student_id),
        &ServerEvent::MyBorrowRequestUpdated(boxed.clone()),
        None,
    );
    hub.emit_to_channel(
        &Channel::Admins,
        &ServerEvent::BorrowRequestsUpdated(boxed),
        issuer,
    );
}

/// Tell admins about a freshly created request
pub fn publish_new_request(hub: &RealtimeHub, details: &BorrowRequestDetails) {
    hub.emit_to_channel(
        &Channel::Admins,
        &ServerEvent::NewBorrowRequest(Box::new(details.clone())),
        None,
    );
}

/// Every connected client sees gate scans
pub fn publish_scan(hub: &RealtimeHub, scan: &ScanDetails) {
    hub.broadcast(&ServerEvent::NewScan(Box::new(scan.clone())));
}
