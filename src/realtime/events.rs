//! Wire contracts of the real-time channel
//!
//! Every frame is a JSON text message `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{Book, BorrowRequestDetails, ScanDetails, Section, Student};

/// Raw inbound frame before the payload is interpreted
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Commands a client can send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Admin: list every request; also subscribes the connection to admin updates
    GetBorrowRequests,
    ApproveBorrowRequest(Uuid),
    RejectBorrowRequest(Uuid),
    /// Student: list own requests; needs a bound student id
    GetMyBorrowRequests,
    /// Bind the connection to a student after connecting
    Identify(Uuid),
    SearchBooks(String),
    /// Internal UUID or generated book identifier
    GetBookDetails(String),
    GetSectionStats(Option<String>),
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, String> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| format!("Malformed frame: {}", e))?;
        let data = envelope.data;

        match envelope.event.as_str() {
            "getBorrowRequests" => Ok(Self::GetBorrowRequests),
            "approveBorrowRequest" => id_field(&data, &["requestId", "id"]).map(Self::ApproveBorrowRequest),
            "rejectBorrowRequest" => id_field(&data, &["requestId", "id"]).map(Self::RejectBorrowRequest),
            "getMyBorrowRequests" => Ok(Self::GetMyBorrowRequests),
            "identify" => id_field(&data, &["studentId", "id"]).map(Self::Identify),
            "searchBooks" => Ok(Self::SearchBooks(
                text_field(&data, &["query", "q"]).unwrap_or_default(),
            )),
            "getBookDetails" => text_field(&data, &["bookId", "id"])
                .filter(|s| !s.trim().is_empty())
                .map(Self::GetBookDetails)
                .ok_or_else(|| "getBookDetails requires a book id".to_string()),
            "getSectionStats" => Ok(Self::GetSectionStats(text_field(
                &data,
                &["sectionName", "section_name", "section"],
            ))),
            other => Err(format!("Unknown event: {}", other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetBorrowRequests => "getBorrowRequests",
            Self::ApproveBorrowRequest(_) => "approveBorrowRequest",
            Self::RejectBorrowRequest(_) => "rejectBorrowRequest",
            Self::GetMyBorrowRequests => "getMyBorrowRequests",
            Self::Identify(_) => "identify",
            Self::SearchBooks(_) => "searchBooks",
            Self::GetBookDetails(_) => "getBookDetails",
            Self::GetSectionStats(_) => "getSectionStats",
        }
    }
}

/// Payload is either a bare string or an object carrying one of `keys`
fn text_field(data: &Value, keys: &[&str]) -> Option<String> {
    match data {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => keys
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

fn id_field(data: &Value, keys: &[&str]) -> Result<Uuid, String> {
    let raw = text_field(data, keys).ok_or_else(|| format!("Missing {}", keys[0]))?;
    Uuid::parse_str(raw.trim()).map_err(|_| format!("Invalid {}: {}", keys[0], raw))
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `bookDetails` carries the book, or `{error}` on a miss
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BookLookup {
    Found(Box<Book>),
    Missing { error: String },
}

/// Events the server emits
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    BorrowRequests(Vec<BorrowRequestDetails>),
    BorrowRequestsError(ErrorPayload),
    BorrowRequestsUpdated(Box<BorrowRequestDetails>),
    MyBorrowRequests {
        requests: Vec<BorrowRequestDetails>,
        student: Box<Student>,
    },
    MyBorrowRequestsError(ErrorPayload),
    MyBorrowRequestUpdated(Box<BorrowRequestDetails>),
    NewBorrowRequest(Box<BorrowRequestDetails>),
    SearchResults {
        books: Vec<Book>,
        student: Option<Box<Student>>,
    },
    BookDetails(BookLookup),
    SectionStats(Vec<Section>),
    SectionStatsError(ErrorPayload),
    #[serde(rename = "new-scan")]
    NewScan(Box<ScanDetails>),
    Identified {
        #[serde(rename = "studentId")]
        student_id: Uuid,
    },
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
