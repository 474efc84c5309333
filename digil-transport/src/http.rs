//! HTTP gateway for the DIGIL backend
//!
//! Endpoints used (relative to the base URL):
//! - `POST /api/v1/digils/{id}/command` - maintenance and `set_value` commands
//! - `GET /api/v1/digils/{id}` - device document with `diags`/`measures`
//! - `GET /api/v1/digils/{id}/configuration` - `application.maintenanceMode`
//! - `GET /api/v1/digils/{id}/commands-log` - pending and sent commands
//!
//! Tokens come from an OAuth2 `client_credentials` endpoint. A token
//! rejected with 401/403 is dropped and the call retried once.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use digil_core::constants::{DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS};
use digil_core::{
    Command, Credentials, RegisterName, Registers, TokenSession, command_log, register,
};
use digil_types::{CommandLog, DeviceId, MaintenanceMode};

use crate::Gateway;
use crate::error::Error;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

/// Builder for [`HttpGateway`]
#[derive(Debug)]
pub struct HttpGatewayBuilder {
    base_url: String,
    credentials: Credentials,
    command_timeout: Duration,
    read_timeout: Duration,
    accept_invalid_certs: bool,
    session: TokenSession,
}

impl HttpGatewayBuilder {
    /// Set timeout for command requests
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set timeout for read and token requests
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Accept the backend's internal certificate
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Use a session with a custom refresh margin
    pub fn with_session(mut self, session: TokenSession) -> Self {
        self.session = session;
        self
    }

    pub fn build(self) -> crate::Result<HttpGateway> {
        let base = self.base_url.trim_end_matches('/').to_string();
        Url::parse(&base).map_err(|e| Error::InvalidUrl(format!("{}: {}", base, e)))?;
        Url::parse(&self.credentials.auth_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", self.credentials.auth_url, e)))?;

        let client = Client::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(Error::Http)?;

        Ok(HttpGateway {
            client,
            base_url: base,
            credentials: self.credentials,
            session: self.session,
            refresh_gate: Mutex::new(()),
            command_timeout: self.command_timeout,
            read_timeout: self.read_timeout,
        })
    }
}

/// HTTP implementation of [`Gateway`]
///
/// The token session is shared by every caller; at most one token
/// request is in flight at any time.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    credentials: Credentials,
    session: TokenSession,
    refresh_gate: Mutex<()>,
    command_timeout: Duration,
    read_timeout: Duration,
}

impl HttpGateway {
    pub fn builder(base_url: impl Into<String>, credentials: Credentials) -> HttpGatewayBuilder {
        HttpGatewayBuilder {
            base_url: base_url.into(),
            credentials,
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            accept_invalid_certs: false,
            session: TokenSession::new(),
        }
    }

    pub fn session(&self) -> &TokenSession {
        &self.session
    }

    fn device_url(&self, device: &DeviceId) -> String {
        format!("{}/api/v1/digils/{}", self.base_url, device)
    }

    /// Cached token, refreshing it if needed
    async fn token(&self) -> digil_core::Result<String> {
        if let Some(token) = self.session.valid_token() {
            return Ok(token);
        }

        let _gate = self.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(token) = self.session.valid_token() {
            return Ok(token);
        }

        self.fetch_token().await
    }

    /// Request a new token; caller holds the refresh gate
    async fn fetch_token(&self) -> digil_core::Result<String> {
        debug!("Requesting token from {}", self.credentials.auth_url);

        let response = self
            .client
            .post(&self.credentials.auth_url)
            .form(&self.credentials.form()[..])
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|e| digil_core::Error::Auth(Error::from_reqwest(e).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(digil_core::Error::Auth(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| digil_core::Error::Auth(format!("invalid token response: {}", e)))?;

        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| digil_core::Error::Auth("no access token received".into()))?;

        self.session
            .store(token.clone(), body.expires_in.map(Duration::from_secs));

        info!(
            "Token obtained (refresh #{})",
            self.session.refresh_count()
        );

        Ok(token)
    }

    /// Send with a bearer token; a rejected token is refreshed once
    async fn send<F>(&self, build: F, timeout: Duration) -> digil_core::Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut refreshed = false;

        loop {
            let token = self.token().await?;

            let response = build(&self.client)
                .bearer_auth(&token)
                .timeout(timeout)
                .send()
                .await
                .map_err(Error::from_reqwest)?;

            let status = response.status();

            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) && !refreshed {
                warn!("Token rejected (HTTP {}), refreshing", status.as_u16());
                self.session.invalidate_token(&token);
                refreshed = true;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::status(status, &body).into());
            }

            return Ok(response);
        }
    }

    async fn send_command(&self, device: &DeviceId, command: Command) -> digil_core::Result<()> {
        let url = format!("{}/command", self.device_url(device));
        let payload = command.to_payload();

        debug!(device = %device, "Sending {}", command);
        trace!(device = %device, "Payload: {}", payload);

        self.send(|client| client.post(&url).json(&payload), self.command_timeout)
            .await?;

        debug!(device = %device, "{} accepted", command);
        Ok(())
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> digil_core::Result<Value> {
        let response = self
            .send(|client| client.get(url).query(query), self.read_timeout)
            .await?;

        let document = response.json::<Value>().await.map_err(Error::from_reqwest)?;
        Ok(document)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn authenticate(&self) -> digil_core::Result<TokenSession> {
        let _gate = self.refresh_gate.lock().await;
        self.fetch_token().await?;
        Ok(self.session.clone())
    }

    async fn set_maintenance_mode(&self, device: &DeviceId, enabled: bool) -> digil_core::Result<()> {
        self.send_command(device, Command::maintenance(enabled)).await
    }

    async fn set_register_value(
        &self,
        device: &DeviceId,
        register: &str,
        value: &str,
    ) -> digil_core::Result<()> {
        self.send_command(device, Command::set_value(register, value))
            .await
    }

    async fn read_registers(
        &self,
        device: &DeviceId,
        names: &[RegisterName],
    ) -> digil_core::Result<Registers> {
        let document = self.get_json(&self.device_url(device), &[]).await?;
        let registers = register::extract_all(&document, names);

        debug!(
            device = %device,
            "Read {}/{} registers",
            registers.len(),
            names.len()
        );

        Ok(registers)
    }

    async fn maintenance_status(&self, device: &DeviceId) -> digil_core::Result<Option<MaintenanceMode>> {
        let url = format!("{}/configuration", self.device_url(device));
        let document = self.get_json(&url, &[]).await?;

        Ok(document
            .pointer("/application/maintenanceMode")
            .and_then(Value::as_str)
            .map(MaintenanceMode::from_reported))
    }

    async fn commands_log(
        &self,
        device: &DeviceId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> digil_core::Result<CommandLog> {
        let url = format!("{}/commands-log", self.device_url(device));
        let (start, end) = command_log::window_bounds(since, until);
        let document = self
            .get_json(&url, &[("startDate", start), ("endDate", end)])
            .await?;

        let log = command_log::parse(&document);
        debug!(
            device = %device,
            "{} pending, {} sent commands",
            log.pending.len(),
            log.sent.len()
        );
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn device() -> DeviceId {
        DeviceId::parse("1121621_0436").unwrap()
    }

    fn gateway(server: &MockServer) -> HttpGateway {
        let credentials = Credentials::new(format!("{}/token", server.uri()), "client", "secret");
        HttpGateway::builder(server.uri(), credentials)
            .with_read_timeout(Duration::from_millis(500))
            .with_command_timeout(Duration::from_millis(500))
            .build()
            .unwrap()
    }

    async fn mount_token(server: &MockServer, token: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": token, "expires_in": 300})),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_authenticate_caches_token() {
        let server = MockServer::start().await;
        mount_token(&server, "tok-1", 1).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/digils/1121621_0436/command"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let gw = gateway(&server);
        let session = gw.authenticate().await.unwrap();
        assert_eq!(session.valid_token().as_deref(), Some("tok-1"));

        gw.set_maintenance_mode(&device(), true).await.unwrap();
        gw.set_maintenance_mode(&device(), false).await.unwrap();
    }

    #[tokio::test]
    async fn test_command_payloads() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/digils/1121621_0436/command"))
            .and(body_json(json!({
                "name": "maintenance",
                "params": {"status": {"values": ["ON"]}}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/v1/digils/1121621_0436/command"))
            .and(body_json(json!({
                "name": "set_value",
                "params": {
                    "peripheral": {"values": ["sjb"]},
                    "param": {"values": ["COM_Digil2_Conf_Incl_Taratura"]},
                    "value": {"values": ["1"]}
                }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let gw = gateway(&server);
        gw.set_maintenance_mode(&device(), true).await.unwrap();
        gw.set_register_value(&device(), "COM_Digil2_Conf_Incl_Taratura", "1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_token_refreshed_once() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 2).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/digils/1121621_0436/command"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/v1/digils/1121621_0436/command"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let gw = gateway(&server);
        gw.set_maintenance_mode(&device(), true).await.unwrap();
        assert_eq!(gw.session().refresh_count(), 2);
    }

    #[tokio::test]
    async fn test_persistent_forbidden_is_api_error() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 2).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/digils/1121621_0436/command"))
            .respond_with(ResponseTemplate::new(403))
            .expect(2)
            .mount(&server)
            .await;

        let err = gateway(&server)
            .set_maintenance_mode(&device(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, digil_core::Error::Api { status: Some(403), .. }));
    }

    #[tokio::test]
    async fn test_error_classification() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/digils/1121621_0436/command"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/v1/digils/1121525_0103/command"))
            .respond_with(ResponseTemplate::new(400).set_body_string("unknown param"))
            .mount(&server)
            .await;

        let gw = gateway(&server);

        let err = gw.set_maintenance_mode(&device(), true).await.unwrap_err();
        assert!(err.is_recoverable());

        let other = DeviceId::parse("1121525_0103").unwrap();
        let err = gw.set_maintenance_mode(&other, true).await.unwrap_err();
        assert!(!err.is_recoverable());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("unknown param"));
    }

    #[tokio::test]
    async fn test_slow_device_is_unreachable() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/digils/1121621_0436/command"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .set_maintenance_mode(&device(), true)
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_token_endpoint_failure_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let gw = gateway(&server);
        assert!(gw.authenticate().await.unwrap_err().is_fatal());
        assert!(
            gw.set_maintenance_mode(&device(), true)
                .await
                .unwrap_err()
                .is_fatal()
        );
    }

    #[tokio::test]
    async fn test_read_registers() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/digils/1121621_0436"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "diags": {
                    "ALG_Digil2_Alm_Incl": {"value": false, "timestamp": 2_000}
                },
                "measures": {
                    "SENS_Digil2_Inc_X": {"avg": 0.05, "timestamp": 2_000},
                    "SENS_Digil2_Inc_Y": {"avg": -0.10, "timestamp": 1_990}
                }
            })))
            .mount(&server)
            .await;

        let names: Vec<RegisterName> = ["ALG_Digil2_Alm_Incl", "SENS_Digil2_Inc_X.avg", "SENS_Digil2_Inc_Y.avg"]
            .iter()
            .map(|n| RegisterName::parse(n).unwrap())
            .collect();

        let registers = gateway(&server)
            .read_registers(&device(), &names)
            .await
            .unwrap();

        assert_eq!(registers.len(), 3);
        assert_eq!(registers[&names[0]].value.as_bool(), Some(false));
        assert_eq!(registers[&names[2]].value.as_f64(), Some(-0.10));
        assert_eq!(registers[&names[2]].timestamp, Some(1_990));
    }

    #[tokio::test]
    async fn test_maintenance_status() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/digils/1121621_0436/configuration"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"application": {"maintenanceMode": "ON"}})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/digils/1121525_0103/configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"application": {}})))
            .mount(&server)
            .await;

        let gw = gateway(&server);
        assert_eq!(
            gw.maintenance_status(&device()).await.unwrap(),
            Some(MaintenanceMode::On)
        );

        let other = DeviceId::parse("1121525_0103").unwrap();
        assert_eq!(gw.maintenance_status(&other).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_commands_log() {
        use chrono::TimeZone;
        use wiremock::matchers::query_param;

        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/digils/1121621_0436/commands-log"))
            .and(query_param("startDate", "2026-10-15T08:00:00.000000000Z"))
            .and(query_param("endDate", "2026-10-16T08:00:00.999999999Z"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pendingCommands": [
                    {"name": "maintenance", "payload": "{\"status\": \"OFF\"}"}
                ],
                "sentCommands": [
                    {"name": "set_value", "payload": {"param": "COM_Digil2_Conf_Incl_Taratura"}},
                    {"name": "maintenance", "payload": {"status": "ON"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let since = Utc.with_ymd_and_hms(2026, 10, 15, 8, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();

        let log = gateway(&server)
            .commands_log(&device(), since, until)
            .await
            .unwrap();

        assert_eq!(log.pending, vec!["maintenance OFF"]);
        assert_eq!(log.sent, vec!["reset_inclinometro", "maintenance ON"]);
    }

    #[tokio::test]
    async fn test_commands_log_server_error_is_unreachable() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/digils/1121621_0436/commands-log"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let now = Utc::now();
        let err = gateway(&server)
            .commands_log(&device(), now - chrono::Duration::hours(24), now)
            .await
            .unwrap_err();

        assert!(err.is_recoverable());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/digils/1121621_0436/command"))
            .respond_with(ResponseTemplate::new(200))
            .expect(8)
            .mount(&server)
            .await;

        let gw = Arc::new(gateway(&server));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gw = Arc::clone(&gw);
                tokio::spawn(async move { gw.set_maintenance_mode(&device(), true).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(gw.session().refresh_count(), 1);
    }

    #[test]
    fn test_build_rejects_invalid_url() {
        let credentials = Credentials::new("https://auth.example/token", "client", "secret");
        assert!(HttpGateway::builder("not a url", credentials).build().is_err());
    }
}
