//! ConoHa (OpenStack-compatible) HTTP client.
//!
//! Implements [`ComputeProvider`] against the Keystone v3 identity service
//! and the Nova compute service. All requests carry a bounded timeout; this
//! client never retries — the refresh-on-401 policy lives in the controller.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{ActionResponse, ComputeProvider, ProviderError};
use crate::config::Credentials;
use crate::constants::{compute_endpoint, identity_endpoint, REJECTION_DETAIL_LEN};
use crate::models::{ActionKind, PowerStatus, ServerAddress, ServerDetail};
use crate::utils::truncate_str;

/// Response header carrying the session token on a successful identity
/// exchange (the body only holds the token metadata).
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// HTTP client for one managed server on one ConoHa tenant.
pub struct ConohaClient {
    client: Client,
    credentials: Credentials,
    auth_url: String,
    server_url: String,
    action_url: String,
}

impl ConohaClient {
    /// Build a client for the given credentials and region.
    pub fn new(
        credentials: Credentials,
        region: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        let compute = compute_endpoint(region, &credentials.tenant_id);
        let server_url = format!("{}/servers/{}", compute, credentials.server_id);
        let action_url = format!("{}/action", server_url);
        Ok(Self {
            client,
            auth_url: identity_endpoint(region),
            credentials,
            server_url,
            action_url,
        })
    }

    /// Keystone v3 password-grant request body, scoped to the project.
    fn auth_body(&self) -> serde_json::Value {
        json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.credentials.username,
                            "password": self.credentials.password,
                            "domain": { "name": "default" }
                        }
                    }
                },
                "scope": {
                    "project": { "id": self.credentials.tenant_id }
                }
            }
        })
    }

    /// Provider-specific payload for an action. No body data beyond the
    /// action tag; reboot is always soft.
    fn action_body(kind: ActionKind) -> serde_json::Value {
        match kind {
            ActionKind::Start => json!({ "os-start": null }),
            ActionKind::Stop => json!({ "os-stop": null }),
            ActionKind::Reboot => json!({ "reboot": { "type": "SOFT" } }),
        }
    }
}

impl ComputeProvider for ConohaClient {
    async fn authenticate(&self) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(&self.auth_url)
            .header("Content-Type", "application/json")
            .json(&self.auth_body())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Auth(status.as_u16()));
        }

        // Keystone returns the token in a header, not the body.
        match response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(ProviderError::Unexpected {
                status: status.as_u16(),
                detail: format!("missing {} header", SUBJECT_TOKEN_HEADER),
            }),
        }
    }

    async fn read_status(&self, token: &str) -> Result<ServerDetail, ProviderError> {
        let response = self
            .client
            .get(&self.server_url)
            .header("X-Auth-Token", token)
            .send()
            .await?;

        let status = response.status().as_u16();
        match status {
            200 => {
                let document: ServerDocument = response.json().await?;
                Ok(document.server.into_detail())
            }
            401 | 403 => Err(ProviderError::Unauthorized),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::Unexpected {
                    status,
                    detail: truncate_str(&body, REJECTION_DETAIL_LEN),
                })
            }
        }
    }

    async fn send_action(
        &self,
        kind: ActionKind,
        token: &str,
    ) -> Result<ActionResponse, ProviderError> {
        let response = self
            .client
            .post(&self.action_url)
            .header("X-Auth-Token", token)
            .json(&Self::action_body(kind))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(ActionResponse { status, body })
    }
}

// ── Wire format ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct ServerDocument {
    server: WireServer,
}

/// The subset of the Nova server document we consume. The `OS-EXT-STS`
/// fields are extension attributes and may be absent on older API versions.
#[derive(Deserialize)]
struct WireServer {
    #[serde(default)]
    name: Option<String>,
    status: String,
    #[serde(rename = "OS-EXT-STS:task_state", default)]
    task_state: Option<String>,
    #[serde(rename = "OS-EXT-STS:power_state", default)]
    power_state: Option<i64>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    addresses: HashMap<String, Vec<ServerAddress>>,
}

impl WireServer {
    fn into_detail(self) -> ServerDetail {
        ServerDetail {
            name: self.name.unwrap_or_else(|| "Unknown".to_string()),
            status: PowerStatus::from_provider(&self.status),
            task_state: self.task_state,
            power_state: self.power_state.unwrap_or(0),
            created: self.created.unwrap_or_default(),
            addresses: self.addresses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ConohaClient {
        ConohaClient::new(
            Credentials {
                username: "gncu123".to_string(),
                password: "secret".to_string(),
                tenant_id: "tenant-1".to_string(),
                server_id: "srv-1".to_string(),
            },
            "c3j1",
            Duration::from_secs(10),
        )
        .expect("client builds")
    }

    #[test]
    fn urls_are_derived_from_region_and_ids() {
        let c = client();
        assert_eq!(c.auth_url, "https://identity.c3j1.conoha.io/v3/auth/tokens");
        assert_eq!(
            c.server_url,
            "https://compute.c3j1.conoha.io/v2.1/tenant-1/servers/srv-1"
        );
        assert!(c.action_url.ends_with("/servers/srv-1/action"));
    }

    #[test]
    fn auth_body_is_password_grant_scoped_to_project() {
        let body = client().auth_body();
        assert_eq!(body["auth"]["identity"]["methods"][0], "password");
        assert_eq!(
            body["auth"]["identity"]["password"]["user"]["name"],
            "gncu123"
        );
        assert_eq!(body["auth"]["scope"]["project"]["id"], "tenant-1");
    }

    #[test]
    fn action_bodies_match_provider_contract() {
        assert_eq!(
            ConohaClient::action_body(ActionKind::Start),
            json!({ "os-start": null })
        );
        assert_eq!(
            ConohaClient::action_body(ActionKind::Stop),
            json!({ "os-stop": null })
        );
        assert_eq!(
            ConohaClient::action_body(ActionKind::Reboot),
            json!({ "reboot": { "type": "SOFT" } })
        );
    }

    #[test]
    fn server_document_parses_extension_fields() {
        let raw = r#"{
            "server": {
                "name": "ark-vps",
                "status": "ACTIVE",
                "OS-EXT-STS:task_state": "powering-off",
                "OS-EXT-STS:power_state": 1,
                "created": "2024-05-01T12:00:00Z",
                "addresses": {
                    "ext-shared": [
                        { "addr": "163.44.119.3", "version": 4 }
                    ]
                }
            }
        }"#;
        let doc: ServerDocument = serde_json::from_str(raw).expect("parses");
        let detail = doc.server.into_detail();
        assert_eq!(detail.name, "ark-vps");
        assert_eq!(detail.status, PowerStatus::Active);
        assert_eq!(detail.task_state.as_deref(), Some("powering-off"));
        assert_eq!(detail.power_state, 1);
        assert_eq!(detail.addresses["ext-shared"][0].addr, "163.44.119.3");
    }

    #[test]
    fn server_document_tolerates_missing_extensions() {
        let raw = r#"{ "server": { "status": "SHUTOFF", "OS-EXT-STS:task_state": null } }"#;
        let doc: ServerDocument = serde_json::from_str(raw).expect("parses");
        let detail = doc.server.into_detail();
        assert_eq!(detail.status, PowerStatus::ShutOff);
        assert!(detail.is_quiescent());
        assert_eq!(detail.name, "Unknown");
        assert_eq!(detail.power_state, 0);
    }
}
