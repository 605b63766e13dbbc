//! Backend API wire types.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mintflow_protocols::{TaskKind, TaskPayload, TaskStatus};

/// Voucher as issued on the wire; the issuance signature travels as a
/// sibling field of the voucher object.
#[derive(Debug, Deserialize)]
pub struct VoucherBody {
    pub recipient: String,
    pub amount: u64,
    pub nonce: String,
    pub deadline: DateTime<Utc>,
}

/// `POST /claim/request` response.
#[derive(Debug, Deserialize)]
pub struct ClaimRequestResponse {
    pub voucher: VoucherBody,
    pub signature: String,
    pub claimed_amount: u64,
}

/// `POST /claim/cancel` request.
#[derive(Debug, Serialize)]
pub struct ClaimCancelRequest<'a> {
    pub nonce: &'a str,
}

/// `POST /claim/cancel` response.
#[derive(Debug, Deserialize)]
pub struct ClaimCancelResponse {
    pub ok: bool,
}

/// `POST /claim/confirm` request.
#[derive(Debug, Serialize)]
pub struct ClaimConfirmRequest<'a> {
    pub nonce: &'a str,
    pub tx_id: &'a str,
}

/// `POST /claim/confirm` response.
#[derive(Debug, Deserialize)]
pub struct ClaimConfirmResponse {
    pub status: String,
}

/// `GET /claim/status` response.
#[derive(Debug, Deserialize)]
pub struct ClaimStatusResponse {
    pub can_claim: bool,
    pub pending_amount: u64,
}

/// `POST /purchase/initiate` request.
#[derive(Debug, Serialize)]
pub struct PurchaseInitiateRequest {
    pub amount: u64,
}

/// `POST /purchase/initiate` response.
#[derive(Debug, Deserialize)]
pub struct PurchaseInitiateResponse {
    pub reference: String,
    pub price: u64,
    #[serde(default)]
    pub credit_amount: u64,
}

/// `POST /purchase/confirm` request.
#[derive(Debug, Serialize)]
pub struct PurchaseConfirmRequest<'a> {
    pub reference: &'a str,
    pub tx_id: &'a str,
}

/// `POST /purchase/confirm` response. `status` defaults to confirmed
/// when the backend answers with a credit balance alone.
#[derive(Debug, Deserialize)]
pub struct PurchaseConfirmResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub credits: Option<u64>,
}

/// `POST /task` request.
#[derive(Debug, Serialize)]
pub struct TaskSubmitRequest<'a> {
    pub kind: TaskKind,
    pub payload: &'a TaskPayload,
}

/// `POST /task` response.
#[derive(Debug, Deserialize)]
pub struct TaskSubmitResponse {
    pub id: Uuid,
}

/// `GET /task/{id}/status` response.
#[derive(Debug, Deserialize)]
pub struct TaskStatusResponse {
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Error body the backend attaches to non-success responses.
#[derive(Debug, Deserialize, Default)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
