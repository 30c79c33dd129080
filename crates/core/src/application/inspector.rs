// Message Inspector - renders messages for display
//
// Never fails: anything that is not JSON is shown as lossy UTF-8 text.

use crate::domain::Message;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

const KB: f64 = 1024.0;
const MB: f64 = 1024.0 * 1024.0;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Detail view of one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFields {
    pub id: String,
    pub label: Option<String>,
    pub size_display: String,
    pub body_display: String,
    pub extension_display: String,
    pub response_queue: Option<String>,
    pub response_queue_created: Option<String>,
    pub arrived_at: Option<String>,
}

/// One row of the message list view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub size_display: String,
    pub response_queue_created: Option<String>,
    pub response_queue: Option<String>,
    pub body: String,
}

pub fn describe(message: &Message) -> DisplayFields {
    let response_queue = message.response_queue.as_ref();
    DisplayFields {
        id: message.id.clone(),
        label: message.label.clone(),
        size_display: format_size(message.body_size()),
        body_display: prettify(&decode_text(&message.body)),
        extension_display: decode_text(&message.extension)
            .trim_end_matches('\0')
            .to_string(),
        response_queue: response_queue.map(|r| r.name.clone()),
        response_queue_created: response_queue
            .and_then(|r| r.created_at)
            .and_then(format_timestamp),
        arrived_at: format_timestamp(message.arrived_at),
    }
}

pub fn summarize(message: &Message) -> MessageRow {
    let response_queue = message.response_queue.as_ref();
    MessageRow {
        id: message.id.clone(),
        size_display: format_size(message.body_size()),
        response_queue_created: response_queue
            .and_then(|r| r.created_at)
            .and_then(format_timestamp),
        response_queue: response_queue.map(|r| r.name.clone()),
        body: decode_text(&message.body),
    }
}

/// `512 B`, `1.5 KB`, `2.0 MB`
pub fn format_size(bytes: usize) -> String {
    let size = bytes as f64;
    if size < KB {
        format!("{} B", bytes)
    } else if size < MB {
        format!("{:.1} KB", size / KB)
    } else {
        format!("{:.1} MB", size / MB)
    }
}

/// Pretty-print JSON objects and arrays, return anything else unchanged
pub fn prettify(text: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(text.trim()) {
        Ok(value) if value.is_object() || value.is_array() => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string())
        }
        _ => text.to_string(),
    }
}

fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

fn format_timestamp(epoch_ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(epoch_ms).map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}
