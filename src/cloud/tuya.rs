use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::traits::{CloudApi, Credentials, TokenSet};
use crate::error::DashboardError;
use crate::store::{Device, DeviceState};

const UNKNOWN_LOGIN_ERROR: &str = "Unknown authentication error";

/// Client for the Tuya "homeassistant" cloud API.
///
/// Quirks:
/// - Login and refresh are form-encoded; the device channel ("skill") is JSON.
/// - Login failures come back as HTTP 200 with `responseStatus: "error"`.
/// - Skill responses report success in `header.code`, not the HTTP status.
pub struct TuyaClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "responseStatus")]
    response_status: Option<String>,
    #[serde(rename = "errorMsg")]
    error_msg: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
}

impl TokenResponse {
    fn is_error(&self) -> bool {
        self.response_status.as_deref() == Some("error")
            || !matches!(self.access_token.as_deref(), Some(token) if !token.is_empty())
    }

    /// Returns the token set, or the name of the first missing field.
    fn into_token_set(self) -> Result<TokenSet, &'static str> {
        Ok(TokenSet {
            access_token: self.access_token.ok_or("access_token")?,
            refresh_token: self.refresh_token.ok_or("refresh_token")?,
            token_type: self.token_type.ok_or("token_type")?,
            expires_in: self.expires_in.ok_or("expires_in")?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct SkillHeader {
    code: Option<String>,
    msg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscoveryPayload {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    #[serde(default)]
    header: SkillHeader,
    #[serde(default)]
    payload: DiscoveryPayload,
}

impl TuyaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DashboardError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DashboardError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl CloudApi for TuyaClient {
    async fn login(&self, credentials: Credentials<'_>) -> Result<TokenSet, DashboardError> {
        let resp = self
            .http
            .post(self.endpoint("auth.do"))
            .form(&[
                ("userName", credentials.username),
                ("password", credentials.password),
                ("countryCode", credentials.country_code),
                ("bizType", credentials.biz_type),
                ("from", credentials.from),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DashboardError::LoginFailed(e.to_string()))?;

        let token_resp: TokenResponse = resp
            .json()
            .await
            .map_err(|e| DashboardError::LoginFailed(e.to_string()))?;

        if token_resp.is_error() {
            return Err(DashboardError::LoginRejected(
                token_resp
                    .error_msg
                    .unwrap_or_else(|| UNKNOWN_LOGIN_ERROR.to_string()),
            ));
        }

        token_resp.into_token_set().map_err(|field| {
            DashboardError::LoginFailed(format!("token response is missing {field}"))
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, DashboardError> {
        let resp = self
            .http
            .post(self.endpoint("access.do"))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DashboardError::Remote(format!("Refresh request failed: {e}")))?;

        let token_resp: TokenResponse = resp.json().await.map_err(|e| {
            DashboardError::Remote(format!("Failed to parse refresh response: {e}"))
        })?;

        token_resp.into_token_set().map_err(|field| {
            DashboardError::Remote(format!("Refresh response is missing {field}"))
        })
    }

    async fn discover(&self, access_token: &str) -> Result<Vec<Device>, DashboardError> {
        let body = json!({
            "header": {
                "name": "Discovery",
                "namespace": "discovery",
                "payloadVersion": 1,
            },
            "payload": {
                "accessToken": access_token,
            },
        });

        let resp = self
            .http
            .post(self.endpoint("skill"))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DashboardError::Remote(format!("Discovery request failed: {e}")))?;

        let discovery: DiscoveryResponse = resp.json().await.map_err(|e| {
            DashboardError::Remote(format!("Failed to parse discovery response: {e}"))
        })?;

        if discovery.header.code.as_deref() != Some("SUCCESS") {
            return Err(DashboardError::Remote(format!(
                "Discovery returned {}: {}",
                discovery.header.code.as_deref().unwrap_or("no code"),
                discovery.header.msg.as_deref().unwrap_or_default(),
            )));
        }

        Ok(discovery.payload.devices)
    }

    async fn control(
        &self,
        access_token: &str,
        device_id: &str,
        state: DeviceState,
    ) -> Result<(), DashboardError> {
        let body = json!({
            "header": {
                "name": "turnOnOff",
                "namespace": "control",
                "payloadVersion": 1,
            },
            "payload": {
                "accessToken": access_token,
                "devId": device_id,
                "value": state.value(),
            },
        });

        self.http
            .post(self.endpoint("skill"))
            .json(&body)
            .send()
            .await
            .map_err(|e| DashboardError::Remote(format!("Control request failed: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TuyaClient {
        TuyaClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn credentials() -> Credentials<'static> {
        Credentials {
            username: "alice@example.com",
            password: "hunter2",
            country_code: "95",
            biz_type: "tuya",
            from: "tuya",
        }
    }

    #[tokio::test]
    async fn test_login_posts_form_and_returns_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.do"))
            .and(body_string_contains("userName=alice%40example.com"))
            .and(body_string_contains("countryCode=95"))
            .and(body_string_contains("bizType=tuya"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "acc",
                "refresh_token": "ref",
                "token_type": "bearer",
                "expires_in": 864000,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client(&server).login(credentials()).await.unwrap();
        assert_eq!(tokens.access_token, "acc");
        assert_eq!(tokens.refresh_token, "ref");
        assert_eq!(tokens.expires_in, 864000);
    }

    #[tokio::test]
    async fn test_login_error_status_uses_remote_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.do"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responseStatus": "error",
                "errorMsg": "Incorrect account or password",
            })))
            .mount(&server)
            .await;

        let err = client(&server).login(credentials()).await.unwrap_err();
        assert!(matches!(err, DashboardError::LoginRejected(_)));
        assert_eq!(err.to_string(), "Incorrect account or password");
    }

    #[tokio::test]
    async fn test_login_without_token_falls_back_to_generic_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.do"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = client(&server).login(credentials()).await.unwrap_err();
        assert_eq!(err.to_string(), UNKNOWN_LOGIN_ERROR);
    }

    #[tokio::test]
    async fn test_login_http_error_is_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.do"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).login(credentials()).await.unwrap_err();
        assert!(matches!(err, DashboardError::LoginFailed(_)));
        assert!(err.to_string().starts_with("Login failed:"));
    }

    #[tokio::test]
    async fn test_refresh_sends_grant_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access.do"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=ref-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "acc-2",
                "refresh_token": "ref-2",
                "token_type": "bearer",
                "expires_in": 3600,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client(&server).refresh("ref-1").await.unwrap();
        assert_eq!(tokens.access_token, "acc-2");
        assert_eq!(tokens.refresh_token, "ref-2");
    }

    #[tokio::test]
    async fn test_refresh_without_access_token_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access.do"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "msg": "invalid refresh token" })),
            )
            .mount(&server)
            .await;

        assert!(client(&server).refresh("stale").await.is_err());
    }

    #[tokio::test]
    async fn test_discover_returns_devices_on_success_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/skill"))
            .and(body_partial_json(json!({
                "header": { "name": "Discovery", "namespace": "discovery", "payloadVersion": 1 },
                "payload": { "accessToken": "acc" },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "header": { "code": "SUCCESS" },
                "payload": {
                    "devices": [
                        { "id": "dev1", "name": "Lamp", "dev_type": "switch" },
                        { "id": "dev2", "name": "Heater", "dev_type": "switch" },
                    ]
                },
            })))
            .mount(&server)
            .await;

        let devices = client(&server).discover("acc").await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id(), Some("dev1"));
        assert_eq!(devices[1].get("name"), Some(&json!("Heater")));
    }

    #[tokio::test]
    async fn test_discover_rejects_non_success_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/skill"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "header": { "code": "FrequentlyInvoke", "msg": "you cannot auth exceed once in 180 seconds" },
            })))
            .mount(&server)
            .await;

        let err = client(&server).discover("acc").await.unwrap_err();
        assert!(err.to_string().contains("FrequentlyInvoke"));
    }

    #[tokio::test]
    async fn test_discover_rejects_non_object_device() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/skill"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "header": { "code": "SUCCESS" },
                "payload": { "devices": [{ "id": "dev1" }, null] },
            })))
            .mount(&server)
            .await;

        assert!(client(&server).discover("acc").await.is_err());
    }

    #[tokio::test]
    async fn test_control_sends_turn_on_off() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/skill"))
            .and(body_partial_json(json!({
                "header": { "name": "turnOnOff", "namespace": "control" },
                "payload": { "accessToken": "acc", "devId": "dev1", "value": 1 },
            })))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        // Response status is not inspected.
        client(&server)
            .control("acc", "dev1", DeviceState::On)
            .await
            .unwrap();
    }
}
