use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::time::Duration;

/// Lists are fetched one page at a time; the portal never pages past the
/// first `MAX_LISTS_PER_FETCH` entries.
pub const MAX_LISTS_PER_FETCH: usize = 100;

const API_KEY_HEADER: &str = "x-api-key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Membership state as reported by the remote list service. Unknown
/// strings are carried through verbatim rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    NotSubscribed,
    Pending,
    Unsubscribed,
    Subscribed,
    Other(String),
}

impl SubscriptionStatus {
    pub fn from_remote(raw: &str) -> Self {
        match raw {
            "notexists" => SubscriptionStatus::NotSubscribed,
            "pending" => SubscriptionStatus::Pending,
            "unsubscribed" => SubscriptionStatus::Unsubscribed,
            "subscribed" => SubscriptionStatus::Subscribed,
            other => SubscriptionStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionStatus::NotSubscribed => "notexists",
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Unsubscribed => "unsubscribed",
            SubscriptionStatus::Subscribed => "subscribed",
            SubscriptionStatus::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SubscriptionStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("list service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("list service returned {0}")]
    Status(StatusCode),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListsPage {
    pub total: usize,
    #[serde(default)]
    pub data: Vec<ListInfo>,
}

/// Merge attributes attached to a subscription, keyed the way the remote
/// service expects them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeVars {
    #[serde(rename = "FNAME")]
    pub first_name: String,
    #[serde(rename = "LNAME")]
    pub last_name: String,
}

#[derive(Serialize)]
struct SubscribeRequest<'a> {
    email: &'a str,
    merge: &'a MergeVars,
    email_type: &'a str,
    double_optin: bool,
    update_existing: bool,
    send_welcome: bool,
}

#[derive(Serialize)]
struct UnsubscribeRequest<'a> {
    email: &'a str,
    delete_member: bool,
    send_goodbye: bool,
    send_notify: bool,
}

#[derive(Serialize)]
struct MemberInfoRequest<'a> {
    emails: &'a [&'a str],
}

#[derive(Deserialize)]
struct CompleteResponse {
    complete: bool,
}

#[derive(Debug, Deserialize)]
pub struct MemberInfo {
    pub success: u32,
    pub errors: u32,
    #[serde(default)]
    pub data: Vec<MemberRecord>,
}

#[derive(Debug, Deserialize)]
pub struct MemberRecord {
    pub email: String,
    pub status: String,
}

/// Thin client for the remote list-management API. The base URL is
/// injectable so tests can point it at a local mock server.
#[derive(Clone)]
pub struct ListClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ListClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ListError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub async fn lists(&self, offset: usize, limit: usize) -> Result<ListsPage, ListError> {
        let url = format!("{}/lists", self.base_url);
        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;
        parse_json(response).await
    }

    pub async fn subscribe(
        &self,
        list_id: &str,
        email: &str,
        merge: &MergeVars,
    ) -> Result<bool, ListError> {
        let url = format!("{}/lists/{list_id}/members", self.base_url);
        let request = SubscribeRequest {
            email,
            merge,
            email_type: "html",
            double_optin: false,
            update_existing: true,
            send_welcome: false,
        };
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;
        let body: CompleteResponse = parse_json(response).await?;
        Ok(body.complete)
    }

    pub async fn unsubscribe(&self, list_id: &str, email: &str) -> Result<bool, ListError> {
        let url = format!("{}/lists/{list_id}/unsubscribe", self.base_url);
        let request = UnsubscribeRequest {
            email,
            delete_member: false,
            send_goodbye: false,
            send_notify: false,
        };
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;
        let body: CompleteResponse = parse_json(response).await?;
        Ok(body.complete)
    }

    pub async fn member_info(
        &self,
        list_id: &str,
        emails: &[&str],
    ) -> Result<MemberInfo, ListError> {
        let url = format!("{}/lists/{list_id}/members/info", self.base_url);
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&MemberInfoRequest { emails })
            .send()
            .await?;
        parse_json(response).await
    }
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ListError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ListError::Status(status));
    }
    Ok(response.json().await?)
}
