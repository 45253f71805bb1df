// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod error;

pub use error::ClientError;

use ereg_app::{Account, AccountDraft, AccountId, FetchQuery};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://oncore-ontrack.umms.umm.edu:8000";
pub const BASE_URL_ENV: &str = "EREG_BASE_URL";

/// Operations the UI needs from an accounts service.
pub trait AccountsApi {
    /// Rows in the order the service returns them.
    fn list_accounts(&self, query: &FetchQuery) -> Result<Vec<Account>, ClientError>;
    fn create_account(&self, draft: &AccountDraft) -> Result<(), ClientError>;
    fn update_account(&self, id: AccountId, draft: &AccountDraft) -> Result<(), ClientError>;
    fn delete_account(&self, id: AccountId) -> Result<(), ClientError>;
}

/// Blocking HTTP adapter for the accounts REST service.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = parse_base_url(base_url)?;
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ClientError::Setup(error.to_string()))?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `{base}/accounts/{key}%20{direction}?filter={field}`
    pub fn list_url(&self, query: &FetchQuery) -> Result<Url, ClientError> {
        let sort = query.sort_segment();
        let mut url = self.endpoint(&["accounts", &sort])?;
        url.query_pairs_mut()
            .append_pair("filter", query.filter_param());
        Ok(url)
    }

    pub fn create_url(&self) -> Result<Url, ClientError> {
        self.endpoint(&["accounts", ""])
    }

    pub fn update_url(&self, id: AccountId) -> Result<Url, ClientError> {
        self.endpoint(&["account", &id.to_string(), ""])
    }

    pub fn delete_url(&self, id: AccountId) -> Result<Url, ClientError> {
        self.endpoint(&["account", &id.to_string()])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "URL cannot carry a path".to_owned(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, what: &'static str, request: RequestBuilder) -> Result<String, ClientError> {
        let response = request.send().map_err(|error| {
            warn!(what, error = %error, "accounts service unreachable");
            ClientError::Unreachable {
                base_url: self.base_url().to_owned(),
                detail: error.to_string(),
            }
        })?;

        let status = response.status();
        let body = response.text().map_err(|error| ClientError::Decode {
            what,
            detail: error.to_string(),
        })?;
        if !status.is_success() {
            let error = ClientError::from_response(status.as_u16(), &body);
            warn!(what, status = status.as_u16(), error = %error, "accounts request failed");
            return Err(error);
        }
        debug!(what, status = status.as_u16(), bytes = body.len(), "accounts request done");
        Ok(body)
    }
}

impl AccountsApi for Client {
    fn list_accounts(&self, query: &FetchQuery) -> Result<Vec<Account>, ClientError> {
        let url = self.list_url(query)?;
        debug!(url = %url, "list accounts");
        let body = self.send("account list", self.http.get(url))?;
        serde_json::from_str(&body).map_err(|error| ClientError::Decode {
            what: "account list",
            detail: error.to_string(),
        })
    }

    fn create_account(&self, draft: &AccountDraft) -> Result<(), ClientError> {
        let url = self.create_url()?;
        debug!(url = %url, username = %draft.username, "create account");
        let body = AccountDraft {
            id: None,
            ..draft.clone()
        };
        self.send("create account", self.http.post(url).json(&body))?;
        Ok(())
    }

    fn update_account(&self, id: AccountId, draft: &AccountDraft) -> Result<(), ClientError> {
        let url = self.update_url(id)?;
        debug!(url = %url, "update account");
        let body = AccountDraft {
            id: Some(id),
            ..draft.clone()
        };
        self.send("update account", self.http.put(url).json(&body))?;
        Ok(())
    }

    fn delete_account(&self, id: AccountId) -> Result<(), ClientError> {
        let url = self.delete_url(id)?;
        debug!(url = %url, "delete account");
        self.send("delete account", self.http.delete(url))?;
        Ok(())
    }
}

/// Validates a service base URL: http or https, trailing slashes trimmed.
pub fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: &str| ClientError::InvalidBaseUrl {
        url: raw.to_owned(),
        reason: reason.to_owned(),
    };
    if trimmed.is_empty() {
        return Err(invalid("must not be empty"));
    }
    let url = Url::parse(trimmed).map_err(|error| invalid(&error.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot carry a path"));
    }
    Ok(url)
}
