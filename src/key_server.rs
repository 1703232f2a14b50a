//! # Key Server Registry
//!
//! Resolves configured key servers and talks to them over HTTP.
//!
//! ## Endpoints
//!
//! | Method | Path          | Purpose                                      |
//! |--------|---------------|----------------------------------------------|
//! | GET    | `/service`    | Liveness probe, valid only on a 2xx status   |
//! | POST   | `/v1/keys`    | Derived keys for `{ids, request}`            |
//!
//! Both requests carry the optional API-key header configured for the
//! server. The network layer sits behind [`KeyServerTransport`] so the
//! client can be driven by any transport; [`HttpTransport`] is the
//! `reqwest` implementation.
//!
//! Verification is liveness-only: the probe does not cross-check the
//! server's protocol version or public key.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session_key::{RequestParams, SessionKey};
use crate::utils::hex_to_bytes;

/// Static description of a key server, as supplied by the caller
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyServerConfig {
    /// On-chain object id of the server
    pub object_id: String,
    /// Base URL of an independent server
    #[serde(default)]
    pub url: String,
    /// Number of shares / votes the server holds
    pub weight: usize,
    /// Header name for the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_name: Option<String>,
    /// API key value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Aggregator URL; set for committee-operated servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator_url: Option<String>,
    /// Hex-encoded public key, `0x` optional
    #[serde(default)]
    pub public_key_hex: String,
}

/// An API-key header pair
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    /// Header name
    pub name: String,
    /// Header value
    pub value: String,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// How a key server is operated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerType {
    /// A single operator answering at its own URL
    #[default]
    Independent,
    /// A committee reached through an aggregator
    Committee,
}

/// A resolved key server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyServer {
    /// On-chain object id
    pub object_id: String,
    /// URL requests are sent to
    pub url: String,
    /// Shares / votes held
    pub weight: usize,
    /// Decoded public key
    pub public_key: Vec<u8>,
    /// Operating mode
    pub server_type: ServerType,
    /// Optional API-key header
    pub api_key: Option<ApiKey>,
}

/// A key returned by one server for one identity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedKey {
    /// Server that produced the key
    pub object_id: String,
    /// Full id the key belongs to
    pub id: String,
    /// Raw key bytes
    pub key: Vec<u8>,
}

/// Body of `POST /v1/keys`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchKeysRequest {
    /// Full ids requested
    pub ids: Vec<String>,
    /// Session-signed authorization
    pub request: RequestParams,
}

/// Response of `POST /v1/keys`: base64 key per full id
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FetchKeysResponse {
    /// Keys by full id
    #[serde(default)]
    pub keys: HashMap<String, String>,
}

/// Resolve configs into key servers, sorted by object id.
pub fn retrieve_key_servers(configs: &[KeyServerConfig]) -> Result<Vec<KeyServer>> {
    if configs.is_empty() {
        return Err(Error::InvalidKeyServer("no key servers found".into()));
    }

    let mut servers = configs
        .iter()
        .map(resolve_key_server)
        .collect::<Result<Vec<_>>>()?;
    servers.sort_by(|a, b| a.object_id.cmp(&b.object_id));
    Ok(servers)
}

fn resolve_key_server(config: &KeyServerConfig) -> Result<KeyServer> {
    let public_key = if config.public_key_hex.trim().is_empty() {
        Vec::new()
    } else {
        hex_to_bytes(&config.public_key_hex).map_err(|e| {
            Error::InvalidKeyServer(format!(
                "key server {} has an invalid public key: {}",
                config.object_id, e
            ))
        })?
    };

    let (url, server_type) = match &config.aggregator_url {
        Some(aggregator) => (aggregator.clone(), ServerType::Committee),
        None => (config.url.clone(), ServerType::Independent),
    };

    let api_key = match (&config.api_key_name, &config.api_key) {
        (Some(name), Some(value)) => Some(ApiKey {
            name: name.clone(),
            value: value.clone(),
        }),
        _ => None,
    };

    Ok(KeyServer {
        object_id: config.object_id.clone(),
        url: url.trim_end_matches('/').to_string(),
        weight: config.weight,
        public_key,
        server_type,
        api_key,
    })
}

// ============================================================================
// TRANSPORT
// ============================================================================

/// Network access to key servers
#[async_trait]
pub trait KeyServerTransport: Send + Sync {
    /// `GET {url}/service`; `Ok` only on a 2xx response
    async fn check_service(&self, server: &KeyServer) -> Result<()>;

    /// `POST {url}/v1/keys`
    async fn fetch_keys(
        &self,
        server: &KeyServer,
        request: &FetchKeysRequest,
    ) -> Result<FetchKeysResponse>;
}

/// `reqwest`-backed transport with a per-request timeout
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    fn with_api_key(
        request: reqwest::RequestBuilder,
        server: &KeyServer,
    ) -> reqwest::RequestBuilder {
        match &server.api_key {
            Some(key) => request.header(key.name.as_str(), key.value.as_str()),
            None => request,
        }
    }

    async fn api_error(response: reqwest::Response) -> Error {
        let status = response.status();
        let message = response
            .text()
            .await
            .ok()
            .filter(|body| !body.is_empty())
            .unwrap_or_else(|| status.to_string());
        Error::KeyServerApi {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl KeyServerTransport for HttpTransport {
    async fn check_service(&self, server: &KeyServer) -> Result<()> {
        let request = self.http.get(format!("{}/service", server.url));
        let response = Self::with_api_key(request, server).send().await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    async fn fetch_keys(
        &self,
        server: &KeyServer,
        request: &FetchKeysRequest,
    ) -> Result<FetchKeysResponse> {
        let builder = self
            .http
            .post(format!("{}/v1/keys", server.url))
            .json(request);
        let response = Self::with_api_key(builder, server).send().await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json::<FetchKeysResponse>().await?)
    }
}

/// Liveness check of one server
pub async fn verify_key_server(transport: &dyn KeyServerTransport, server: &KeyServer) -> bool {
    if server.url.is_empty() {
        return false;
    }
    match transport.check_service(server).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Key server {} failed liveness check: {}", server.object_id, e);
            false
        }
    }
}

/// Fetch keys for every id in `full_ids` from a single server.
///
/// Keys that are not valid base64 are skipped. A response that leaves any
/// requested id without a key is a failure for this server.
pub async fn fetch_keys_for_all_ids(
    transport: &dyn KeyServerTransport,
    server: &KeyServer,
    full_ids: &[String],
    tx_bytes: &[u8],
    session_key: &SessionKey,
) -> Result<Vec<DerivedKey>> {
    let request = FetchKeysRequest {
        ids: full_ids.to_vec(),
        request: session_key.create_request_params(tx_bytes)?,
    };
    let response = transport.fetch_keys(server, &request).await?;

    let mut derived = Vec::with_capacity(full_ids.len());
    for full_id in full_ids {
        let Some(encoded) = response.keys.get(full_id) else {
            return Err(Error::InvalidKeyServer(format!(
                "key server {} returned no key for {}",
                server.object_id, full_id
            )));
        };
        match STANDARD.decode(encoded) {
            Ok(key) => derived.push(DerivedKey {
                object_id: server.object_id.clone(),
                id: full_id.clone(),
                key,
            }),
            Err(e) => {
                tracing::warn!(
                    "Skipping undecodable key for {} from {}: {}",
                    full_id,
                    server.object_id,
                    e
                );
            }
        }
    }

    if derived.len() < full_ids.len() {
        return Err(Error::InvalidKeyServer(format!(
            "key server {} returned {} usable keys for {} ids",
            server.object_id,
            derived.len(),
            full_ids.len()
        )));
    }
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn config(object_id: &str, weight: usize) -> KeyServerConfig {
        KeyServerConfig {
            object_id: object_id.into(),
            url: format!("https://{}.example/", object_id),
            weight,
            public_key_hex: "0xAB01".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_retrieve_sorts_and_decodes() {
        let servers = retrieve_key_servers(&[config("0xb", 1), config("0xa", 2)]).unwrap();
        assert_eq!(servers[0].object_id, "0xa");
        assert_eq!(servers[0].public_key, vec![0xab, 0x01]);
        assert_eq!(servers[0].url, "https://0xa.example");
        assert_eq!(servers[0].server_type, ServerType::Independent);
        assert_eq!(servers[1].object_id, "0xb");
    }

    #[test]
    fn test_retrieve_empty_fails() {
        assert!(matches!(
            retrieve_key_servers(&[]),
            Err(Error::InvalidKeyServer(_))
        ));
    }

    #[test]
    fn test_bad_public_key_rejected() {
        let mut cfg = config("0xa", 1);
        cfg.public_key_hex = "zz".into();
        assert!(matches!(
            retrieve_key_servers(&[cfg]),
            Err(Error::InvalidKeyServer(_))
        ));
    }

    #[test]
    fn test_aggregator_makes_committee() {
        let mut cfg = config("0xa", 1);
        cfg.aggregator_url = Some("https://agg.example".into());
        cfg.api_key_name = Some("x-api-key".into());
        cfg.api_key = Some("secret".into());

        let server = &retrieve_key_servers(&[cfg]).unwrap()[0];
        assert_eq!(server.server_type, ServerType::Committee);
        assert_eq!(server.url, "https://agg.example");
        assert_eq!(server.api_key.as_ref().unwrap().name, "x-api-key");
        assert!(!format!("{:?}", server).contains("secret"));
    }

    #[test]
    fn test_config_json_field_names() {
        let cfg: KeyServerConfig = serde_json::from_str(
            r#"{"objectId":"0xa","url":"https://a","weight":2,"publicKeyHex":"00"}"#,
        )
        .unwrap();
        assert_eq!(cfg.object_id, "0xa");
        assert_eq!(cfg.weight, 2);
        assert_eq!(cfg.api_key, None);
    }

    struct FixedTransport {
        keys: HashMap<String, String>,
        seen: Mutex<Vec<FetchKeysRequest>>,
    }

    #[async_trait]
    impl KeyServerTransport for FixedTransport {
        async fn check_service(&self, _server: &KeyServer) -> Result<()> {
            Ok(())
        }

        async fn fetch_keys(
            &self,
            _server: &KeyServer,
            request: &FetchKeysRequest,
        ) -> Result<FetchKeysResponse> {
            self.seen.lock().push(request.clone());
            Ok(FetchKeysResponse {
                keys: self.keys.clone(),
            })
        }
    }

    fn session() -> SessionKey {
        SessionKey::new("0x2", "0xabc", Duration::from_secs(600)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_keys_for_all_ids() {
        let transport = FixedTransport {
            keys: HashMap::from([
                ("2:a".to_string(), STANDARD.encode([1u8, 2])),
                ("2:other".to_string(), STANDARD.encode([9u8])),
            ]),
            seen: Mutex::new(Vec::new()),
        };
        let server = &retrieve_key_servers(&[config("0xa", 1)]).unwrap()[0];

        let keys = fetch_keys_for_all_ids(&transport, server, &["2:a".into()], b"tx", &session())
            .await
            .unwrap();
        assert_eq!(
            keys,
            vec![DerivedKey {
                object_id: "0xa".into(),
                id: "2:a".into(),
                key: vec![1, 2],
            }]
        );

        let seen = transport.seen.lock();
        assert_eq!(seen[0].ids, vec!["2:a".to_string()]);
        assert_eq!(seen[0].request.tx_bytes, b"tx");
    }

    #[tokio::test]
    async fn test_missing_or_undecodable_key_fails_server() {
        let transport = FixedTransport {
            keys: HashMap::from([("2:a".to_string(), "!!not base64!!".to_string())]),
            seen: Mutex::new(Vec::new()),
        };
        let server = &retrieve_key_servers(&[config("0xa", 1)]).unwrap()[0];

        let undecodable =
            fetch_keys_for_all_ids(&transport, server, &["2:a".into()], b"tx", &session()).await;
        assert!(matches!(undecodable, Err(Error::InvalidKeyServer(_))));

        let missing =
            fetch_keys_for_all_ids(&transport, server, &["2:b".into()], b"tx", &session()).await;
        assert!(matches!(missing, Err(Error::InvalidKeyServer(_))));
    }

    #[tokio::test]
    async fn test_verify_requires_url() {
        let transport = FixedTransport {
            keys: HashMap::new(),
            seen: Mutex::new(Vec::new()),
        };
        let mut server = retrieve_key_servers(&[config("0xa", 1)]).unwrap().remove(0);
        assert!(verify_key_server(&transport, &server).await);

        server.url.clear();
        assert!(!verify_key_server(&transport, &server).await);
    }
}
