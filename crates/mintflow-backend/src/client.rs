//! HTTP backend client.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use mintflow_protocols::{
    BackendError, ClaimGrant, ClaimStatus, ConfirmState, JobBackend, PurchaseConfirm,
    PurchaseReference, Session, SettlementBackend, TaskKind, TaskPayload, TaskStatusReport,
    Voucher,
};

use crate::api;

/// Backend authority client over JSON HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    session: Session,
    client: Client,
}

impl HttpBackend {
    /// Create a client for `base_url` acting as `session`.
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        Self {
            base_url: base_url.into(),
            session,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.session.auth_token)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Self::decode(path, response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.session.auth_token)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Self::decode(path, response).await
    }

    async fn decode<T: DeserializeOwned>(
        path: &str,
        response: Response,
    ) -> Result<T, BackendError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| BackendError::Decode(format!("{}: {}", path, e)));
        }

        let body: api::ApiErrorBody = response.json().await.unwrap_or_default();
        let message = body.message.unwrap_or_else(|| status.to_string());
        debug!("Backend {} returned {}: {}", path, status, message);

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Auth(message),
            StatusCode::CONFLICT => BackendError::Conflict {
                code: body.code.unwrap_or_else(|| "conflict".to_string()),
                message,
            },
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                BackendError::Validation(message)
            }
            other => BackendError::Api {
                status: other.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl SettlementBackend for HttpBackend {
    async fn claim_status(&self) -> Result<ClaimStatus, BackendError> {
        let response: api::ClaimStatusResponse = self.get_json("/claim/status").await?;
        Ok(ClaimStatus {
            can_claim: response.can_claim,
            pending_amount: response.pending_amount,
        })
    }

    async fn request_voucher(&self) -> Result<ClaimGrant, BackendError> {
        let response: api::ClaimRequestResponse = self
            .post_json("/claim/request", &serde_json::json!({}))
            .await?;
        Ok(ClaimGrant {
            voucher: Voucher {
                recipient: response.voucher.recipient,
                amount: response.voucher.amount,
                nonce: response.voucher.nonce,
                deadline: response.voucher.deadline,
                signature: response.signature,
            },
            claimed_amount: response.claimed_amount,
        })
    }

    async fn cancel_voucher(&self, nonce: &str) -> Result<(), BackendError> {
        let response: api::ClaimCancelResponse = self
            .post_json("/claim/cancel", &api::ClaimCancelRequest { nonce })
            .await?;
        if !response.ok {
            return Err(BackendError::Api {
                status: 200,
                message: format!("cancel for nonce {} not acknowledged", nonce),
            });
        }
        Ok(())
    }

    async fn confirm_claim(&self, nonce: &str, tx_id: &str) -> Result<ConfirmState, BackendError> {
        let response: api::ClaimConfirmResponse = self
            .post_json("/claim/confirm", &api::ClaimConfirmRequest { nonce, tx_id })
            .await?;
        Ok(ConfirmState::parse(&response.status))
    }

    async fn initiate_purchase(
        &self,
        credit_amount: u64,
    ) -> Result<PurchaseReference, BackendError> {
        let response: api::PurchaseInitiateResponse = self
            .post_json(
                "/purchase/initiate",
                &api::PurchaseInitiateRequest {
                    amount: credit_amount,
                },
            )
            .await?;
        Ok(PurchaseReference {
            reference: response.reference,
            price: response.price,
            credit_amount: if response.credit_amount > 0 {
                response.credit_amount
            } else {
                credit_amount
            },
        })
    }

    async fn confirm_purchase(
        &self,
        reference: &str,
        tx_id: &str,
    ) -> Result<PurchaseConfirm, BackendError> {
        let response: api::PurchaseConfirmResponse = self
            .post_json(
                "/purchase/confirm",
                &api::PurchaseConfirmRequest { reference, tx_id },
            )
            .await?;
        let state = match response.status.as_deref() {
            Some(s) => ConfirmState::parse(s),
            // A bare credit balance means the purchase confirmed.
            None if response.credits.is_some() => ConfirmState::Confirmed,
            None => ConfirmState::Pending,
        };
        Ok(PurchaseConfirm {
            state,
            credits: response.credits,
        })
    }
}

#[async_trait]
impl JobBackend for HttpBackend {
    async fn submit_task(
        &self,
        kind: TaskKind,
        payload: &TaskPayload,
    ) -> Result<Uuid, BackendError> {
        let response: api::TaskSubmitResponse = self
            .post_json("/task", &api::TaskSubmitRequest { kind, payload })
            .await?;
        Ok(response.id)
    }

    async fn task_status(&self, id: Uuid) -> Result<TaskStatusReport, BackendError> {
        let response: api::TaskStatusResponse =
            self.get_json(&format!("/task/{}/status", id)).await?;
        Ok(TaskStatusReport {
            status: response.status,
            progress: response.progress,
            result: response.result,
            error: response.error,
        })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
