//! # Seal Client
//!
//! Quorum orchestration over a set of weighted key servers.
//!
//! ## Fetch Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          FETCH KEYS                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  1. 1 ≤ threshold ≤ total_weight                                       │
//! │  2. Resolve + verify servers (once per client)                         │
//! │  3. Weight of servers already holding keys for every id                │
//! │        ≥ threshold ──► done, no network                                │
//! │  4. Visit remaining servers in ascending object-id order               │
//! │        ok   ──► cache keys, add weight, stop at threshold              │
//! │        fail ──► record error, continue                                 │
//! │  5. Exhausted ──► majority error among the failures                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `decrypt` runs the same loop but credits each server listed in the object
//! once, since a server's key unmasks a single share whatever its weight.
//!
//! Fetches are serialized by a lock so concurrent calls never interleave
//! their cache read-modify-write. Every network call is bounded by
//! [`ClientConfig::timeout`].

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::cache::KeyCache;
use crate::config::{ClientConfig, ClientOptions};
use crate::crypto::dem::{DemStrategy, DemType};
use crate::engine::{self, DecryptChecks};
use crate::error::{majority_error, Error, Result};
use crate::key_server::{
    fetch_keys_for_all_ids, retrieve_key_servers, verify_key_server, HttpTransport,
    KeyServer, KeyServerConfig, KeyServerTransport,
};
use crate::object::EncryptedObject;
use crate::session_key::SessionKey;
use crate::utils::create_full_id;

/// Parameters for [`SealClient::encrypt`]
#[derive(Clone, Copy, Debug)]
pub struct EncryptOptions<'a> {
    /// Payload cipher
    pub dem_type: DemType,
    /// Shares needed to decrypt
    pub threshold: usize,
    /// Package the identity belongs to
    pub package_id: &'a str,
    /// Inner identity
    pub id: &'a str,
    /// Plaintext
    pub data: &'a [u8],
    /// Additional authenticated data, may be empty
    pub aad: &'a [u8],
}

/// Parameters for [`SealClient::fetch_keys`]
#[derive(Clone, Copy, Debug)]
pub struct FetchKeysOptions<'a> {
    /// Inner ids to fetch keys for
    pub ids: &'a [String],
    /// Opaque authorization bytes
    pub tx_bytes: &'a [u8],
    /// Session authorizing the request
    pub session_key: &'a SessionKey,
    /// Weight that must be reached
    pub threshold: usize,
}

/// Parameters for [`SealClient::decrypt`]
#[derive(Clone, Copy, Debug)]
pub struct DecryptOptions<'a> {
    /// Serialized encrypted object
    pub data: &'a [u8],
    /// Session authorizing the key fetch
    pub session_key: &'a SessionKey,
    /// Opaque authorization bytes
    pub tx_bytes: &'a [u8],
    /// Verify every recoverable share, not only the first `threshold`
    pub check_share_consistency: bool,
    /// Accepted for API parity, no effect on hash-masked shares
    pub check_le_encoding: bool,
}

/// Parameters for [`SealClient::get_derived_keys`]
#[derive(Clone, Copy, Debug)]
pub struct GetDerivedKeysOptions<'a> {
    /// Inner id
    pub id: &'a str,
    /// Opaque authorization bytes
    pub tx_bytes: &'a [u8],
    /// Session authorizing the request
    pub session_key: &'a SessionKey,
    /// Weight that must be reached
    pub threshold: usize,
}

/// Threshold encryption client
pub struct SealClient {
    /// Sorted by object id
    configs: Vec<KeyServerConfig>,
    config: ClientConfig,
    transport: Arc<dyn KeyServerTransport>,
    key_servers: OnceCell<Vec<KeyServer>>,
    cache: KeyCache,
    fetch_lock: Mutex<()>,
    total_weight: usize,
}

impl SealClient {
    /// Build a client that talks HTTP
    pub fn new(options: ClientOptions) -> Result<Self> {
        let transport = HttpTransport::new(options.config.timeout)?;
        Self::with_transport(options, Arc::new(transport))
    }

    /// Build a client on top of a custom transport
    pub fn with_transport(
        options: ClientOptions,
        transport: Arc<dyn KeyServerTransport>,
    ) -> Result<Self> {
        let ClientOptions {
            server_configs,
            config,
        } = options;
        if server_configs.is_empty() {
            return Err(Error::InvalidClientOptions(
                "serverConfigs is required".into(),
            ));
        }

        let mut seen = HashSet::new();
        let mut configs = Vec::with_capacity(server_configs.len());
        for mut cfg in server_configs {
            if !seen.insert(cfg.object_id.clone()) {
                return Err(Error::InvalidClientOptions(format!(
                    "duplicate object id {}",
                    cfg.object_id
                )));
            }
            cfg.api_key_name = cfg.api_key_name.filter(|s| !s.is_empty());
            cfg.api_key = cfg.api_key.filter(|s| !s.is_empty());
            if cfg.api_key_name.is_some() != cfg.api_key.is_some() {
                return Err(Error::InvalidClientOptions(
                    "apiKeyName and apiKey must be set together".into(),
                ));
            }
            if cfg.weight == 0 {
                return Err(Error::InvalidClientOptions(format!(
                    "key server {} has zero weight",
                    cfg.object_id
                )));
            }
            configs.push(cfg);
        }
        configs.sort_by(|a, b| a.object_id.cmp(&b.object_id));
        let total_weight = configs.iter().map(|c| c.weight).sum();

        tracing::debug!(
            "Seal client configured with {} key servers, total weight {}",
            configs.len(),
            total_weight
        );
        Ok(Self {
            configs,
            config,
            transport,
            key_servers: OnceCell::new(),
            cache: KeyCache::new(),
            fetch_lock: Mutex::new(()),
            total_weight,
        })
    }

    /// Sum of configured weights
    pub fn total_weight(&self) -> usize {
        self.total_weight
    }

    /// Recovered keys held by this client
    pub fn cache(&self) -> &KeyCache {
        &self.cache
    }

    /// Active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolved servers, sorted by object id.
    ///
    /// Resolution and verification run once; later calls reuse the result.
    pub async fn get_key_servers(&self) -> Result<&[KeyServer]> {
        let servers = self
            .key_servers
            .get_or_try_init(|| self.resolve_key_servers())
            .await?;
        Ok(servers.as_slice())
    }

    async fn resolve_key_servers(&self) -> Result<Vec<KeyServer>> {
        let servers = retrieve_key_servers(&self.configs)?;
        if self.config.verify_key_servers {
            for server in &servers {
                let valid = tokio::time::timeout(
                    self.config.timeout,
                    verify_key_server(self.transport.as_ref(), server),
                )
                .await
                .unwrap_or(false);
                if !valid {
                    return Err(Error::InvalidKeyServer(format!(
                        "key server {} is not valid",
                        server.object_id
                    )));
                }
            }
        }
        tracing::info!("Resolved {} key servers", servers.len());
        Ok(servers)
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.config.timeout, fut)
            .await
            .map_err(|_| {
                Error::Timeout(format!("no response within {:?}", self.config.timeout))
            })?
    }

    /// Visit servers in order until the credit of servers holding keys
    /// for every id reaches `options.threshold`.
    async fn fetch_until<F>(&self, options: &FetchKeysOptions<'_>, credit: F) -> Result<()>
    where
        F: Fn(&KeyServer) -> usize,
    {
        let servers = self.get_key_servers().await?;
        let package_id = options.session_key.package_id();
        let full_ids: Vec<String> = options
            .ids
            .iter()
            .map(|id| create_full_id(package_id, id))
            .collect();

        let _guard = self.fetch_lock.lock().await;

        let (complete, pending): (Vec<&KeyServer>, Vec<&KeyServer>) = servers
            .iter()
            .partition(|s| self.cache.has_all(&full_ids, &s.object_id));
        let mut completed: usize = complete.iter().map(|s| credit(s)).sum();
        if completed >= options.threshold {
            tracing::debug!(
                "Cached weight {} already meets threshold {}",
                completed,
                options.threshold
            );
            return Ok(());
        }

        if options.session_key.is_expired() {
            return Err(Error::ExpiredSessionKey);
        }

        let mut errors = Vec::new();
        for server in pending.into_iter().filter(|s| credit(s) > 0) {
            let fetched = self
                .bounded(fetch_keys_for_all_ids(
                    self.transport.as_ref(),
                    server,
                    &full_ids,
                    options.tx_bytes,
                    options.session_key,
                ))
                .await;

            match fetched {
                Ok(keys) => {
                    for key in keys {
                        self.cache.insert(&key.id, &key.object_id, key.key);
                    }
                    completed += credit(server);
                    tracing::info!(
                        "Fetched {} keys from {} ({}/{})",
                        full_ids.len(),
                        server.object_id,
                        completed,
                        options.threshold
                    );
                    if completed >= options.threshold {
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::warn!("Key fetch from {} failed: {}", server.object_id, e);
                    errors.push(e);
                }
            }
        }

        let message = majority_error(&errors)
            .map(|e| e.to_string())
            .unwrap_or_else(|| "threshold not reached".to_string());
        Err(Error::TooManyFailedFetchKeyRequests(message))
    }

    /// Encrypt `data` so that `threshold` shares are needed to decrypt it.
    ///
    /// A server of weight `w` holds `w` shares. Returns the serialized
    /// object and the DEM key.
    pub async fn encrypt(&self, options: EncryptOptions<'_>) -> Result<(Vec<u8>, [u8; 32])> {
        let servers = self.get_key_servers().await?;
        let weighted: Vec<KeyServer> = servers
            .iter()
            .flat_map(|s| std::iter::repeat(s.clone()).take(s.weight))
            .collect();

        let dem = DemStrategy::new(options.dem_type, options.data, options.aad);
        engine::encrypt(
            &weighted,
            options.threshold,
            options.package_id,
            options.id,
            dem,
        )
    }

    /// Make sure servers with combined weight `threshold` have returned
    /// keys for every id.
    pub async fn fetch_keys(&self, options: FetchKeysOptions<'_>) -> Result<()> {
        if options.threshold < 1 || options.threshold > self.total_weight {
            return Err(Error::InvalidThreshold(format!(
                "invalid threshold {} for total weight {}",
                options.threshold, self.total_weight
            )));
        }
        self.fetch_until(&options, |server| server.weight).await
    }

    /// Fetch keys for the object's id until `threshold` distinct servers
    /// listed in it have answered, then decrypt.
    pub async fn decrypt(&self, options: DecryptOptions<'_>) -> Result<Vec<u8>> {
        let object = EncryptedObject::from_bytes(options.data)?;

        let listed: HashSet<&str> = object.services.iter().map(|(id, _)| id.as_str()).collect();
        let servers = self.get_key_servers().await?;
        let reachable = servers
            .iter()
            .filter(|s| listed.contains(s.object_id.as_str()))
            .count();
        let threshold = usize::from(object.threshold);
        if reachable < threshold {
            return Err(Error::InvalidThreshold(format!(
                "object needs {} key servers, {} configured",
                threshold, reachable
            )));
        }

        // A server's key unmasks one share however many it holds
        let fetch = FetchKeysOptions {
            ids: std::slice::from_ref(&object.id),
            tx_bytes: options.tx_bytes,
            session_key: options.session_key,
            threshold,
        };
        self.fetch_until(&fetch, |server| {
            usize::from(listed.contains(server.object_id.as_str()))
        })
        .await?;

        let checks = DecryptChecks {
            check_share_consistency: options.check_share_consistency,
            check_le_encoding: options.check_le_encoding,
        };
        engine::decrypt(&object, &self.cache, checks)
    }

    /// Per-server keys for one id, without combining them.
    pub async fn get_derived_keys(
        &self,
        options: GetDerivedKeysOptions<'_>,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let ids = [options.id.to_string()];
        self.fetch_keys(FetchKeysOptions {
            ids: &ids,
            tx_bytes: options.tx_bytes,
            session_key: options.session_key,
            threshold: options.threshold,
        })
        .await?;

        let full_id = create_full_id(options.session_key.package_id(), options.id);
        Ok(self
            .configs
            .iter()
            .filter_map(|cfg| {
                self.cache
                    .get(&full_id, &cfg.object_id)
                    .map(|key| (cfg.object_id.clone(), key))
            })
            .collect())
    }
}

impl std::fmt::Debug for SealClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealClient")
            .field("configs", &self.configs)
            .field("config", &self.config)
            .field("cached_keys", &self.cache.len())
            .field("total_weight", &self.total_weight)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::share_mask;
    use crate::key_server::{FetchKeysRequest, FetchKeysResponse};
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Key servers that answer with share masks, counting every call
    #[derive(Default)]
    struct MockTransport {
        /// Share index each server is responsible for
        indexes: HashMap<String, u8>,
        failures: HashMap<String, Error>,
        dead: HashSet<String>,
        delay: Option<Duration>,
        fetch_calls: AtomicUsize,
        service_calls: AtomicUsize,
    }

    impl MockTransport {
        fn new(object_ids: &[&str]) -> Self {
            Self {
                indexes: object_ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| (id.to_string(), i as u8 + 1))
                    .collect(),
                ..Default::default()
            }
        }

        fn failing(mut self, object_id: &str, err: Error) -> Self {
            self.failures.insert(object_id.to_string(), err);
            self
        }

        fn fetches(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeyServerTransport for MockTransport {
        async fn check_service(&self, server: &KeyServer) -> Result<()> {
            self.service_calls.fetch_add(1, Ordering::SeqCst);
            if self.dead.contains(&server.object_id) {
                return Err(Error::KeyServerApi {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            Ok(())
        }

        async fn fetch_keys(
            &self,
            server: &KeyServer,
            request: &FetchKeysRequest,
        ) -> Result<FetchKeysResponse> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = self.failures.get(&server.object_id) {
                return Err(err.clone());
            }
            let index = self.indexes[&server.object_id];
            let keys = request
                .ids
                .iter()
                .map(|id| {
                    let mask = share_mask(&server.public_key, id, index);
                    (id.clone(), STANDARD.encode(mask))
                })
                .collect();
            Ok(FetchKeysResponse { keys })
        }
    }

    const IDS: [&str; 3] = ["0x01", "0x02", "0x03"];

    fn configs(object_ids: &[&str]) -> Vec<KeyServerConfig> {
        object_ids
            .iter()
            .enumerate()
            .map(|(i, id)| KeyServerConfig {
                object_id: id.to_string(),
                url: format!("https://ks{}.example", i),
                weight: 1,
                public_key_hex: hex::encode([i as u8 + 1; 48]),
                ..Default::default()
            })
            .collect()
    }

    fn client(transport: Arc<MockTransport>) -> SealClient {
        SealClient::with_transport(ClientOptions::new(configs(&IDS)), transport).unwrap()
    }

    fn session() -> SessionKey {
        SessionKey::new("0x2", "0xabc", Duration::from_secs(600)).unwrap()
    }

    fn hello_options(threshold: usize) -> EncryptOptions<'static> {
        EncryptOptions {
            dem_type: DemType::Aes256Gcm,
            threshold,
            package_id: "0x2",
            id: "obj-1",
            data: b"hello seal",
            aad: b"",
        }
    }

    fn decrypt_options<'a>(data: &'a [u8], session_key: &'a SessionKey) -> DecryptOptions<'a> {
        DecryptOptions {
            data,
            session_key,
            tx_bytes: b"ptb",
            check_share_consistency: false,
            check_le_encoding: false,
        }
    }

    #[tokio::test]
    async fn test_encrypt_fetch_decrypt() {
        init_tracing();
        let transport = Arc::new(MockTransport::new(&IDS).failing(
            "0x02",
            Error::Transport("connection refused".into()),
        ));
        let client = client(transport.clone());
        let session = session();

        let (bytes, _) = client.encrypt(hello_options(2)).await.unwrap();
        let plaintext = client.decrypt(decrypt_options(&bytes, &session)).await.unwrap();

        assert_eq!(plaintext, b"hello seal");
        assert_eq!(transport.fetches(), 3);
        assert_eq!(client.cache().len(), 2);
        assert!(client.cache().get("2:obj-1", "0x02").is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_makes_no_network_calls() {
        let transport = Arc::new(MockTransport::new(&IDS));
        let client = client(transport.clone());
        let session = session();
        let ids = vec!["obj-1".to_string()];
        let options = FetchKeysOptions {
            ids: &ids,
            tx_bytes: b"ptb",
            session_key: &session,
            threshold: 2,
        };

        client.fetch_keys(options).await.unwrap();
        let after_first = transport.fetches();
        assert_eq!(after_first, 2);

        client.fetch_keys(options).await.unwrap();
        assert_eq!(transport.fetches(), after_first);
    }

    #[tokio::test]
    async fn test_servers_resolved_once() {
        let transport = Arc::new(MockTransport::new(&IDS));
        let client = client(transport.clone());

        client.get_key_servers().await.unwrap();
        client.encrypt(hello_options(2)).await.unwrap();
        assert_eq!(transport.service_calls.load(Ordering::SeqCst), 3);

        let servers = client.get_key_servers().await.unwrap();
        let ordered: Vec<&str> = servers.iter().map(|s| s.object_id.as_str()).collect();
        assert_eq!(ordered, IDS);
    }

    #[tokio::test]
    async fn test_dead_server_fails_verification() {
        let mut transport = MockTransport::new(&IDS);
        transport.dead.insert("0x03".into());
        let client = client(Arc::new(transport));

        assert!(matches!(
            client.get_key_servers().await,
            Err(Error::InvalidKeyServer(_))
        ));
    }

    #[tokio::test]
    async fn test_verification_can_be_disabled() {
        let mut transport = MockTransport::new(&IDS);
        transport.dead.insert("0x03".into());
        let transport = Arc::new(transport);
        let mut options = ClientOptions::new(configs(&IDS));
        options.config.verify_key_servers = false;
        let client = SealClient::with_transport(options, transport.clone()).unwrap();

        assert_eq!(client.get_key_servers().await.unwrap().len(), 3);
        assert_eq!(transport.service_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_majority_error_reported() {
        let transport = Arc::new(
            MockTransport::new(&IDS)
                .failing("0x01", Error::Transport("A".into()))
                .failing("0x02", Error::Transport("A".into()))
                .failing("0x03", Error::Transport("B".into())),
        );
        let client = client(transport);
        let session = session();
        let ids = vec!["obj-1".to_string()];

        let err = client
            .fetch_keys(FetchKeysOptions {
                ids: &ids,
                tx_bytes: b"ptb",
                session_key: &session,
                threshold: 2,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::TooManyFailedFetchKeyRequests(Error::Transport("A".into()).to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_threshold_validation() {
        let client = client(Arc::new(MockTransport::new(&IDS)));
        let session = session();
        let ids = vec!["obj-1".to_string()];

        for threshold in [0, 4] {
            let result = client
                .fetch_keys(FetchKeysOptions {
                    ids: &ids,
                    tx_bytes: b"ptb",
                    session_key: &session,
                    threshold,
                })
                .await;
            assert!(matches!(result, Err(Error::InvalidThreshold(_))));
        }
    }

    #[tokio::test]
    async fn test_encrypt_threshold_validation() {
        let client = client(Arc::new(MockTransport::new(&IDS)));
        for threshold in [0, 3, 255] {
            assert!(matches!(
                client.encrypt(hello_options(threshold)).await,
                Err(Error::InvalidThreshold(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_weight_expands_shares() {
        let mut cfgs = configs(&IDS);
        cfgs[0].weight = 2;
        let client = SealClient::with_transport(
            ClientOptions::new(cfgs),
            Arc::new(MockTransport::new(&IDS)),
        )
        .unwrap();
        assert_eq!(client.total_weight(), 4);

        let (bytes, _) = client.encrypt(hello_options(3)).await.unwrap();
        let object = EncryptedObject::from_bytes(&bytes).unwrap();
        let services: Vec<&str> = object.services.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(services, ["0x01", "0x01", "0x02", "0x03"]);
    }

    #[tokio::test]
    async fn test_weighted_round_trip() {
        let mut cfgs = configs(&IDS);
        cfgs[0].weight = 2;
        // 0x01 answers for its first share, the others follow it
        let mut transport = MockTransport::new(&IDS);
        transport.indexes = [("0x01", 1), ("0x02", 3), ("0x03", 4)]
            .into_iter()
            .map(|(id, index)| (id.to_string(), index))
            .collect();
        let transport = Arc::new(transport);
        let client =
            SealClient::with_transport(ClientOptions::new(cfgs), transport.clone()).unwrap();
        let session = session();

        let (bytes, _) = client.encrypt(hello_options(3)).await.unwrap();
        let plaintext = client.decrypt(decrypt_options(&bytes, &session)).await.unwrap();
        assert_eq!(plaintext, b"hello seal");
        assert_eq!(transport.fetches(), 3);

        // Weight 5 over three servers still caps the threshold at 3
        let mut heavy = configs(&IDS);
        heavy[0].weight = 3;
        let client = SealClient::with_transport(ClientOptions::new(heavy), transport).unwrap();
        assert_eq!(client.total_weight(), 5);
        assert!(matches!(
            client.encrypt(hello_options(4)).await,
            Err(Error::InvalidThreshold(_))
        ));
    }

    #[tokio::test]
    async fn test_weighted_decrypt_needs_distinct_servers() {
        let mut cfgs = configs(&IDS);
        cfgs[0].weight = 2;
        let transport = Arc::new(
            MockTransport::new(&IDS).failing("0x03", Error::Transport("down".into())),
        );
        let client = SealClient::with_transport(ClientOptions::new(cfgs), transport.clone())
            .unwrap();
        let session = session();

        // Weight 3 is reached after 0x02, but only two servers can unmask
        let (bytes, _) = client.encrypt(hello_options(3)).await.unwrap();
        let err = client
            .decrypt(decrypt_options(&bytes, &session))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooManyFailedFetchKeyRequests(_)));
        assert_eq!(transport.fetches(), 3);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let mut transport = MockTransport::new(&IDS);
        transport.delay = Some(Duration::from_secs(5));
        let mut options = ClientOptions::new(configs(&IDS));
        options.config.timeout = Duration::from_millis(20);
        options.config.verify_key_servers = false;
        let client = SealClient::with_transport(options, Arc::new(transport)).unwrap();
        let session = session();
        let ids = vec!["obj-1".to_string()];

        let err = client
            .fetch_keys(FetchKeysOptions {
                ids: &ids,
                tx_bytes: b"ptb",
                session_key: &session,
                threshold: 1,
            })
            .await
            .unwrap_err();
        match err {
            Error::TooManyFailedFetchKeyRequests(message) => {
                assert!(message.contains("timed out"), "{}", message)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_session_rejected_before_fetch() {
        let transport = Arc::new(MockTransport::new(&IDS));
        let client = client(transport.clone());
        let expired = SessionKey::new("0x2", "0xabc", Duration::from_secs(0)).unwrap();
        let ids = vec!["obj-1".to_string()];

        let result = client
            .fetch_keys(FetchKeysOptions {
                ids: &ids,
                tx_bytes: b"ptb",
                session_key: &expired,
                threshold: 1,
            })
            .await;
        assert_eq!(result, Err(Error::ExpiredSessionKey));
        assert_eq!(transport.fetches(), 0);
    }

    #[tokio::test]
    async fn test_get_derived_keys() {
        let client = client(Arc::new(MockTransport::new(&IDS)));
        let session = session();

        let keys = client
            .get_derived_keys(GetDerivedKeysOptions {
                id: "obj-1",
                tx_bytes: b"ptb",
                session_key: &session,
                threshold: 2,
            })
            .await
            .unwrap();

        assert_eq!(keys.keys().collect::<Vec<_>>(), ["0x01", "0x02"]);
        assert_eq!(keys["0x01"].len(), 32);
    }

    #[test]
    fn test_options_validation() {
        let transport: Arc<dyn KeyServerTransport> = Arc::new(MockTransport::new(&IDS));
        let invalid = |cfgs: Vec<KeyServerConfig>| {
            matches!(
                SealClient::with_transport(ClientOptions::new(cfgs), transport.clone()),
                Err(Error::InvalidClientOptions(_))
            )
        };

        assert!(invalid(Vec::new()));

        let mut duplicate = configs(&IDS);
        duplicate[1].object_id = "0x01".into();
        assert!(invalid(duplicate));

        let mut half_key = configs(&IDS);
        half_key[0].api_key_name = Some("x-api-key".into());
        assert!(invalid(half_key));

        let mut zero = configs(&IDS);
        zero[2].weight = 0;
        assert!(invalid(zero));

        let mut paired = configs(&IDS);
        paired[0].api_key_name = Some("x-api-key".into());
        paired[0].api_key = Some("k".into());
        assert!(!invalid(paired));
    }
}
