//! JSON report types printed by the command-line harness.

use chrono::{DateTime, Utc};
use serde::Serialize;

use wolfgate_engine::{AccountValue, EngineError, Position};

/// Envelope around every report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
}

impl<T: Serialize> Report<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error_code: None,
        }
    }
}

impl Report<()> {
    /// Server errors keep their code; everything else reports none.
    pub fn failure(context: &str, err: &EngineError) -> Self {
        let error_code = match err {
            EngineError::Server { code, .. } => Some(*code),
            _ => None,
        };
        Self {
            success: false,
            message: format!("{context}: {err}"),
            data: None,
            error_code,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub address: String,
    pub server_version: i32,
    pub server_time: String,
    pub client_id: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTimeReport {
    pub session: Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsReport {
    pub session: Session,
    pub updates: usize,
    pub count: usize,
    pub positions: Vec<Position>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummaryReport {
    pub session: Session,
    pub updates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_id: Option<i64>,
    pub values: Vec<AccountValue>,
}
