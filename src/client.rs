//! HTTP client for the actions the store pages trigger: deleting a delivery, handing out
//! a promotion bottle and submitting a finished sale. Sign in with [`PosClient::login`]
//! first; the session token then rides on every request.
//!
//! Each call is a single request. Failures are logged and handed back as an
//! [`ActionOutcome`]; nothing is retried.

use crate::csrf;
use crate::ledger::SaleSubmission;
use crate::models::{LoginResponse, PromoDecrementResponse, SaleReceipt};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use serde::de::DeserializeOwned;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome<T> {
    Ok(T),
    /// The request never got an HTTP answer.
    NetworkError(String),
    ServerError { status: u16, message: String },
}

impl<T> ActionOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, ActionOutcome::Ok(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            ActionOutcome::Ok(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PosClient {
    http: Client,
    base_url: String,
    csrf_token: String,
    access_token: Option<String>,
}

impl PosClient {
    pub fn new(base_url: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            csrf_token: csrf_token.into(),
            access_token: None,
        }
    }

    /// Signs in and keeps the session token for the calls that follow.
    pub async fn login(&mut self, username: &str, password: &str) -> ActionOutcome<LoginResponse> {
        let url = format!("{}/api/login", self.base_url);
        let sent = self
            .http
            .post(&url)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await;
        let outcome = json_outcome::<LoginResponse>(&url, sent).await;
        if let ActionOutcome::Ok(session) = &outcome {
            self.access_token = Some(session.access_token.clone());
        }
        outcome
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn delete_delivery(&self, id: u64) -> ActionOutcome<()> {
        let url = format!("{}/delete-delivery/{id}/", self.base_url);
        let sent = self
            .authorized(self.http.post(&url))
            .header(csrf::HEADER_NAME, &self.csrf_token)
            .send()
            .await;
        match check(&url, sent).await {
            ActionOutcome::Ok(_) => ActionOutcome::Ok(()),
            ActionOutcome::NetworkError(message) => ActionOutcome::NetworkError(message),
            ActionOutcome::ServerError { status, message } => ActionOutcome::ServerError { status, message },
        }
    }

    /// A promotion with nothing pending still answers 200, with `success: false`.
    pub async fn decrement_promo(&self, id: u64) -> ActionOutcome<PromoDecrementResponse> {
        let url = format!("{}/promos/restar/{id}/", self.base_url);
        let sent = self
            .authorized(self.http.post(&url))
            .header(csrf::HEADER_NAME, &self.csrf_token)
            .send()
            .await;
        let outcome = json_outcome(&url, sent).await;
        if let ActionOutcome::Ok(PromoDecrementResponse {
            success: false,
            error: Some(message),
            ..
        }) = &outcome
        {
            warn!(promo_id = id, "bottle not handed out: {message}");
        }
        outcome
    }

    pub async fn submit_sale(&self, submission: &SaleSubmission) -> ActionOutcome<SaleReceipt> {
        let url = format!("{}/ventas/", self.base_url);
        let form = [
            ("items", submission.items.as_str()),
            ("pagos", submission.pagos.as_str()),
            (csrf::FORM_FIELD, self.csrf_token.as_str()),
        ];
        let sent = self.authorized(self.http.post(&url)).form(&form).send().await;
        json_outcome(&url, sent).await
    }
}

async fn check(url: &str, sent: reqwest::Result<Response>) -> ActionOutcome<Response> {
    let response = match sent {
        Ok(response) => response,
        Err(err) => {
            error!(url, "request failed: {err}");
            return ActionOutcome::NetworkError(err.to_string());
        }
    };
    let status = response.status();
    if status.is_success() {
        return ActionOutcome::Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    warn!(url, status = status.as_u16(), "server rejected request: {message}");
    ActionOutcome::ServerError {
        status: status.as_u16(),
        message,
    }
}

async fn json_outcome<T: DeserializeOwned>(url: &str, sent: reqwest::Result<Response>) -> ActionOutcome<T> {
    let response = match check(url, sent).await {
        ActionOutcome::Ok(response) => response,
        ActionOutcome::NetworkError(message) => return ActionOutcome::NetworkError(message),
        ActionOutcome::ServerError { status, message } => return ActionOutcome::ServerError { status, message },
    };
    let status = response.status().as_u16();
    match response.json::<T>().await {
        Ok(body) => ActionOutcome::Ok(body),
        Err(err) => {
            error!(url, "unexpected response body: {err}");
            ActionOutcome::ServerError {
                status,
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_loses_trailing_slash() {
        let client = PosClient::new("http://127.0.0.1:8080/", "tok");
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
        assert_eq!(client.access_token(), None);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = PosClient::new(format!("http://127.0.0.1:{port}"), "tok");
        let outcome = client.delete_delivery(1).await;
        assert!(matches!(outcome, ActionOutcome::NetworkError(_)));
        assert!(outcome.ok().is_none());
    }
}
