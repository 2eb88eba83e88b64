//! Wikidata API client
//!
//! Signs and issues requests against a single API endpoint and classifies
//! write responses as created / lag-throttled / rejected. Transport failures
//! are returned to the caller for retry; nothing is retried here.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, UploadError};
use crate::services::oauth::Credentials;

const USER_AGENT: &str = "lux-uploader/0.1.0 (LUX identifier batch upload)";

/// Classified result of a `wbcreateclaim` write.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimResult {
    /// Server created the claim
    Created { claim_id: String },
    /// Server is behind replication and asked the caller to back off
    LagThrottled { lag_seconds: f64 },
    /// Structured refusal or malformed body; retrying the same payload
    /// will not help
    Rejected { reason: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    query: Option<TokenQuery>,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    tokens: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    csrftoken: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    info: Option<String>,
    lag: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ClaimResponse {
    error: Option<ApiErrorBody>,
    claim: Option<ClaimBody>,
}

#[derive(Debug, Deserialize)]
struct ClaimBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct EntityResponse {
    redirects: Option<Vec<RedirectEntry>>,
}

#[derive(Debug, Deserialize)]
struct RedirectEntry {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct ClaimsLookupResponse {
    entities: Option<HashMap<String, EntityClaims>>,
}

#[derive(Debug, Deserialize)]
struct EntityClaims {
    #[serde(default)]
    claims: HashMap<String, Vec<ClaimEntry>>,
}

#[derive(Debug, Deserialize)]
struct ClaimEntry {
    mainsnak: Option<MainSnak>,
}

#[derive(Debug, Deserialize)]
struct MainSnak {
    datavalue: Option<DataValue>,
}

#[derive(Debug, Deserialize)]
struct DataValue {
    value: Option<serde_json::Value>,
}

/// Authenticated client for the knowledge-base API.
pub struct WikidataClient {
    http: reqwest::Client,
    api_url: String,
    credentials: Credentials,
}

impl WikidataClient {
    pub fn new(api_url: String, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url,
            credentials,
        })
    }

    /// Fetch the CSRF-equivalent edit token for this run. Any failure here
    /// is an `Auth` error and fatal to the whole run.
    pub async fn fetch_edit_token(&self) -> Result<String> {
        let params = [("action", "query"), ("meta", "tokens"), ("format", "json")];
        let auth = self.credentials.authorization("GET", &self.api_url, &params);

        let response = self
            .http
            .get(&self.api_url)
            .query(&params)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| UploadError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Auth(format!(
                "token request returned {}",
                status
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Auth(format!("malformed token response: {}", e)))?;

        body.query
            .and_then(|q| q.tokens.csrftoken)
            .ok_or_else(|| UploadError::Auth("token response missing csrftoken".to_string()))
    }

    /// Issue one `wbcreateclaim` write, declaring the acceptable replication
    /// lag ceiling so the server can refuse under load instead of queuing.
    pub async fn create_claim(
        &self,
        entity_id: &str,
        property_id: &str,
        value: &str,
        token: &str,
        maxlag: u32,
    ) -> Result<ClaimResult> {
        // The claim value is a JSON string literal inside the form field.
        let quoted = serde_json::Value::String(value.to_string()).to_string();
        let maxlag = maxlag.to_string();
        let params = [
            ("action", "wbcreateclaim"),
            ("entity", entity_id),
            ("snaktype", "value"),
            ("property", property_id),
            ("value", quoted.as_str()),
            ("format", "json"),
            ("token", token),
            ("maxlag", maxlag.as_str()),
            ("bot", "1"),
        ];
        let auth = self.credentials.authorization("POST", &self.api_url, &params);

        tracing::debug!(entity_id, property_id, "issuing claim write");

        let response = self
            .http
            .post(&self.api_url)
            .form(&params)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Transport(format!(
                "write returned {}",
                status
            )));
        }

        match response.json::<ClaimResponse>().await {
            Ok(body) => Ok(classify_claim(body)),
            Err(e) => Ok(ClaimResult::Rejected {
                reason: format!("malformed response: {}", e),
            }),
        }
    }

    /// Look up whether `entity_id` has been merged into another entity.
    pub async fn entity_redirect(&self, entity_id: &str) -> Result<Option<String>> {
        let params = [
            ("action", "wbgetentities"),
            ("ids", entity_id),
            ("format", "json"),
        ];
        let auth = self.credentials.authorization("GET", &self.api_url, &params);

        let response = self
            .http
            .get(&self.api_url)
            .query(&params)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Transport(format!(
                "entity lookup returned {}",
                status
            )));
        }

        let body: EntityResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Transport(format!("malformed entity response: {}", e)))?;

        Ok(body
            .redirects
            .unwrap_or_default()
            .into_iter()
            .find(|r| r.from == entity_id)
            .map(|r| r.to))
    }

    /// Batched lookup of the string values already claimed for `property_id`
    /// on each entity. Used by the optional prefetch phase.
    pub async fn existing_claims(
        &self,
        entity_ids: &[String],
        property_id: &str,
    ) -> Result<HashMap<String, Vec<String>>> {
        let ids = entity_ids.join("|");
        let params = [
            ("action", "wbgetentities"),
            ("ids", ids.as_str()),
            ("props", "claims"),
            ("format", "json"),
        ];
        let auth = self.credentials.authorization("GET", &self.api_url, &params);

        let response = self
            .http
            .get(&self.api_url)
            .query(&params)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Transport(format!(
                "claims lookup returned {}",
                status
            )));
        }

        let body: ClaimsLookupResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Transport(format!("malformed claims response: {}", e)))?;

        let entities = body.entities.unwrap_or_default();
        let mut existing = HashMap::new();
        for entity_id in entity_ids {
            let values = entities
                .get(entity_id)
                .and_then(|entity| entity.claims.get(property_id))
                .map(|claims| {
                    claims
                        .iter()
                        .filter_map(|claim| {
                            claim
                                .mainsnak
                                .as_ref()?
                                .datavalue
                                .as_ref()?
                                .value
                                .as_ref()?
                                .as_str()
                                .map(str::to_string)
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            existing.insert(entity_id.clone(), values);
        }

        Ok(existing)
    }
}

fn classify_claim(body: ClaimResponse) -> ClaimResult {
    if let Some(error) = body.error {
        if error.code == "maxlag" {
            return ClaimResult::LagThrottled {
                lag_seconds: error.lag.unwrap_or(5.0),
            };
        }
        return ClaimResult::Rejected {
            reason: error.info.unwrap_or(error.code),
        };
    }

    match body.claim {
        Some(claim) => ClaimResult::Created { claim_id: claim.id },
        None => ClaimResult::Rejected {
            reason: "no claim in response".to_string(),
        },
    }
}
