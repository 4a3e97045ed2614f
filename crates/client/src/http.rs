//! Authenticated HTTP access to the portal API.
//!
//! Every call carries the session's bearer token. A `401` triggers exactly one
//! forced silent refresh and one retry with the new token; if the refresh
//! itself fails the call surfaces [`ClientError::SessionExpired`] so the
//! caller can send the user back to sign-in.

use std::sync::Arc;

use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use careportal_core::{RoleSet, SubjectId};

use crate::config::ClientConfig;
use crate::session::{CredentialProvider, SessionError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    /// The server kept rejecting the credential and a silent refresh was not
    /// possible.
    #[error("session expired")]
    SessionExpired(#[source] SessionError),

    #[error("{0}")]
    Validation(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCatalogEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeRequest<'a> {
    pub admin_user_id: &'a SubjectId,
    pub target_user_id: &'a SubjectId,
    pub new_roles: &'a RoleSet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeResponse {
    pub message: String,
    pub applied_roles: RoleSet,
    #[serde(default)]
    pub session_affected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub sub: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSelection {
    pub patient_id: String,
    pub provider_id: String,
}

#[derive(Deserialize)]
struct RolesEnvelope<T> {
    roles: T,
}

#[derive(Deserialize)]
struct SelectionEnvelope {
    selection: Option<ProviderSelection>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct PortalClient {
    http: reqwest::Client,
    base: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl PortalClient {
    pub fn new(config: &ClientConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self, ClientError> {
        let base = Url::parse(&config.base_url).map_err(|e| ClientError::InvalidBaseUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(config.base_url.clone()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            credentials,
        })
    }

    pub async fn list_roles(&self) -> Result<Vec<RoleCatalogEntry>, ClientError> {
        let env: RolesEnvelope<Vec<RoleCatalogEntry>> =
            self.call(Method::GET, &["api", "user-roles"], &[], None::<&()>).await?;
        Ok(env.roles)
    }

    pub async fn user_roles(&self, user: &SubjectId) -> Result<RoleSet, ClientError> {
        let env: RolesEnvelope<RoleSet> = self
            .call(Method::GET, &["api", "user-roles", user.as_str()], &[], None::<&()>)
            .await?;
        Ok(env.roles)
    }

    pub async fn change_roles(&self, request: &RoleChangeRequest<'_>) -> Result<RoleChangeResponse, ClientError> {
        self.call(Method::POST, &["api", "user-roles"], &[], Some(request)).await
    }

    pub async fn search_users(&self, search: &str, role: Option<&str>) -> Result<Vec<UserSummary>, ClientError> {
        let mut query = vec![("search", search)];
        if let Some(role) = role {
            query.push(("role", role));
        }
        self.call(Method::GET, &["api", "search-users"], &query, None::<&()>).await
    }

    pub async fn provider_selection(&self, patient: &SubjectId) -> Result<Option<ProviderSelection>, ClientError> {
        let env: SelectionEnvelope = self
            .call(Method::GET, &["api", "provider"], &[("user", patient.as_str())], None::<&()>)
            .await?;
        Ok(env.selection)
    }

    pub async fn select_provider(&self, patient: &SubjectId, provider: &SubjectId) -> Result<(), ClientError> {
        let body = serde_json::json!({ "userId": patient, "providerId": provider });
        let _: serde_json::Value = self.call(Method::POST, &["api", "provider"], &[], Some(&body)).await?;
        Ok(())
    }

    pub async fn clear_provider(&self, patient: &SubjectId) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .call(Method::DELETE, &["api", "provider"], &[("user", patient.as_str())], None::<&()>)
            .await?;
        Ok(())
    }

    async fn call<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(segments)?;
        let token = match self.credentials.token().await {
            Ok(token) => token,
            Err(err) => {
                tracing::debug!(error = %err, "no current credential; sending unauthenticated");
                None
            }
        };

        let response = self.send(method.clone(), url.clone(), query, body, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return decode(response).await;
        }

        tracing::info!(%url, "credential rejected; forcing one silent refresh");
        let fresh = self
            .credentials
            .refresh_silently()
            .await
            .map_err(ClientError::SessionExpired)?;
        let retried = self.send(method, url, query, body, Some(&fresh)).await?;
        decode(retried).await
    }

    async fn send<B>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
