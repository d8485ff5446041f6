//! # Client Identity
//!
//! Visitors are anonymous, but their stores must follow them across requests.
//! [`ClientIdentityResolver::resolve`] produces a durable client id without any
//! authentication:
//!
//! 1. **Cookie**: the request carries a well-formed identity cookie → use its
//!    value. Done. A cookie that does not look like a minted id is ignored,
//!    since the id ends up in file names and cache keys.
//! 2. **Fingerprint**: hash (user agent, accept-language, accept-encoding, ip)
//!    and look it up in the client registry. On a match, bump `last_seen` and
//!    reuse that id.
//! 3. **Mint**: otherwise create `client_` + 32 random alphanumerics from the OS
//!    RNG, record it in the registry, and use it.
//!
//! The fingerprint is a weak correlation key for cookie-less first contact, not
//! a security boundary. Two browsers behind the same proxy with identical
//! headers will share an id until one of them receives its cookie.
//!
//! ## The Cookie
//!
//! When the id did not come from the cookie, the caller should attach
//! [`ClientIdentityResolver::cookie`] to the response: 1-year `Max-Age`,
//! `Path=/`, `SameSite=Lax`, neither `Secure` nor `HttpOnly`. The id is an opaque
//! correlation token, not a secret.
//!
//! ## Cleanup
//!
//! [`ClientIdentityResolver::cleanup`] drops clients not seen within `max_age`
//! together with their `<client_id>_*.json` store files.

use crate::config::StateForgeConfig;
use crate::error::Result;
use crate::persistence::file::remove_client_files;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub mod registry;

pub use registry::{ClientRecord, ClientRegistry};

const CLIENT_ID_PREFIX: &str = "client_";
const CLIENT_ID_RANDOM_LEN: usize = 32;

/// The parts of an incoming HTTP request that identity resolution looks at.
#[derive(Debug, Clone, Default)]
pub struct ClientRequest {
    pub cookies: BTreeMap<String, String>,
    pub user_agent: Option<String>,
    pub accept_language: Option<String>,
    pub accept_encoding: Option<String>,
    pub client_ip: Option<String>,
}

impl ClientRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_agent(mut self, value: impl Into<String>) -> Self {
        self.user_agent = Some(value.into());
        self
    }

    pub fn with_accept_language(mut self, value: impl Into<String>) -> Self {
        self.accept_language = Some(value.into());
        self
    }

    pub fn with_accept_encoding(mut self, value: impl Into<String>) -> Self {
        self.accept_encoding = Some(value.into());
        self
    }

    pub fn with_client_ip(mut self, value: impl Into<String>) -> Self {
        self.client_ip = Some(value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Parses a raw `Cookie:` header (`a=1; b=2`). Malformed pairs are skipped.
    pub fn with_cookie_header(mut self, header: &str) -> Self {
        for pair in header.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    self.cookies
                        .insert(name.to_string(), value.trim().trim_matches('"').to_string());
                }
            }
        }
        self
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Deterministic hash of the request's correlation headers and ip.
    pub fn fingerprint(&self) -> String {
        let components = [
            self.user_agent.as_deref(),
            self.accept_language.as_deref(),
            self.accept_encoding.as_deref(),
            self.client_ip.as_deref(),
        ];
        let mut hasher = Sha256::new();
        for component in components {
            // Tag presence so a missing header differs from an empty one.
            match component {
                Some(value) => {
                    hasher.update([1u8]);
                    hasher.update(value.as_bytes());
                }
                None => hasher.update([0u8]),
            }
            hasher.update([0xffu8]);
        }
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityOrigin {
    Cookie,
    Fingerprint,
    Minted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientIdentity {
    pub client_id: String,
    pub origin: IdentityOrigin,
}

impl ClientIdentity {
    /// True when the response must carry the identity cookie.
    pub fn needs_cookie(&self) -> bool {
        self.origin != IdentityOrigin::Cookie
    }
}

/// The `Set-Cookie` the caller attaches when the request had no identity cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCookie {
    pub name: String,
    pub value: String,
    pub max_age: Duration,
    pub path: String,
    pub same_site: &'static str,
}

impl IdentityCookie {
    pub fn to_header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IdentityCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Max-Age={}; Path={}; SameSite={}",
            self.name,
            self.value,
            self.max_age.num_seconds(),
            self.path,
            self.same_site
        )
    }
}

pub struct ClientIdentityResolver {
    storage_dir: PathBuf,
    cookie_name: String,
    cookie_lifetime: Duration,
}

impl ClientIdentityResolver {
    pub fn new(storage_dir: PathBuf) -> Self {
        Self {
            storage_dir,
            cookie_name: "stateforge_client_id".to_string(),
            cookie_lifetime: Duration::days(365),
        }
    }

    pub fn from_config(config: &StateForgeConfig) -> Self {
        Self::new(config.storage_dir())
            .with_cookie_name(&config.client.cookie_name)
            .with_cookie_lifetime(config.cookie_lifetime())
    }

    pub fn with_cookie_name(mut self, name: &str) -> Self {
        self.cookie_name = name.to_string();
        self
    }

    pub fn with_cookie_lifetime(mut self, lifetime: Duration) -> Self {
        self.cookie_lifetime = lifetime;
        self
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn resolve(&self, request: &ClientRequest) -> Result<ClientIdentity> {
        match request.cookie(&self.cookie_name) {
            Some(client_id) if is_valid_client_id(client_id) => {
                return Ok(ClientIdentity {
                    client_id: client_id.to_string(),
                    origin: IdentityOrigin::Cookie,
                });
            }
            Some(_) => tracing::warn!("ignoring malformed identity cookie"),
            None => {}
        }

        let fingerprint = request.fingerprint();
        let mut registry = ClientRegistry::load(&self.storage_dir);
        let now = Utc::now();

        if let Some(record) = registry.find_by_fingerprint_mut(&fingerprint) {
            record.last_seen = now;
            let client_id = record.client_id.clone();
            registry.save()?;
            tracing::debug!(%client_id, "client matched by fingerprint");
            return Ok(ClientIdentity {
                client_id,
                origin: IdentityOrigin::Fingerprint,
            });
        }

        let client_id = mint_client_id();
        registry.insert(ClientRecord {
            client_id: client_id.clone(),
            fingerprint,
            created_at: now,
            last_seen: now,
            user_agent: request.user_agent.clone().unwrap_or_default(),
            client_ip: request.client_ip.clone().unwrap_or_default(),
        });
        registry.save()?;
        tracing::info!(%client_id, "new client registered");

        Ok(ClientIdentity {
            client_id,
            origin: IdentityOrigin::Minted,
        })
    }

    pub fn cookie(&self, client_id: &str) -> IdentityCookie {
        IdentityCookie {
            name: self.cookie_name.clone(),
            value: client_id.to_string(),
            max_age: self.cookie_lifetime,
            path: "/".to_string(),
            same_site: "Lax",
        }
    }

    /// Removes clients whose `last_seen` is older than `now - max_age`, along
    /// with their store files. Returns the number of clients removed.
    pub fn cleanup(&self, max_age: Duration) -> Result<usize> {
        let mut registry = ClientRegistry::load(&self.storage_dir);
        // A max age reaching past the earliest representable instant expires nothing.
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let expired = registry.remove_seen_before(cutoff);

        for record in &expired {
            let files = remove_client_files(&self.storage_dir, &record.client_id)?;
            tracing::debug!(client_id = %record.client_id, files, "removed expired client");
        }
        registry.save()?;

        tracing::info!(removed = expired.len(), "client cleanup finished");
        Ok(expired.len())
    }

    /// Snapshot of the registry, most recently seen first.
    pub fn clients(&self) -> Vec<ClientRecord> {
        let registry = ClientRegistry::load(&self.storage_dir);
        let mut records: Vec<ClientRecord> = registry.records().cloned().collect();
        records.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        records
    }
}

/// `client_` followed by exactly 32 ASCII alphanumerics, the shape of a minted id.
pub fn is_valid_client_id(client_id: &str) -> bool {
    client_id
        .strip_prefix(CLIENT_ID_PREFIX)
        .is_some_and(|token| {
            token.len() == CLIENT_ID_RANDOM_LEN && token.bytes().all(|b| b.is_ascii_alphanumeric())
        })
}

fn mint_client_id() -> String {
    let token: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(CLIENT_ID_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", CLIENT_ID_PREFIX, token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const KNOWN_ID: &str = "client_0123456789abcdefABCDEF0123456789";

    fn browser() -> ClientRequest {
        ClientRequest::new()
            .with_user_agent("Mozilla/5.0")
            .with_accept_language("en-US")
            .with_accept_encoding("gzip")
            .with_client_ip("192.0.2.1")
    }

    #[test]
    fn cookie_short_circuits() {
        let dir = tempdir().unwrap();
        let resolver = ClientIdentityResolver::new(dir.path().to_path_buf());
        let request = browser().with_cookie("stateforge_client_id", KNOWN_ID);

        let identity = resolver.resolve(&request).unwrap();
        assert_eq!(identity.client_id, KNOWN_ID);
        assert_eq!(identity.origin, IdentityOrigin::Cookie);
        assert!(!identity.needs_cookie());
        // no registry side effects
        assert!(!dir.path().join(registry::REGISTRY_FILE).exists());
    }

    #[test]
    fn same_cookie_same_id() {
        let dir = tempdir().unwrap();
        let resolver = ClientIdentityResolver::new(dir.path().to_path_buf());
        let a = resolver
            .resolve(&browser().with_cookie_header(&format!("x=1; stateforge_client_id={KNOWN_ID}")))
            .unwrap();
        let b = resolver
            .resolve(&ClientRequest::new().with_cookie("stateforge_client_id", KNOWN_ID))
            .unwrap();
        assert_eq!(a.client_id, b.client_id);
    }

    #[test]
    fn mints_well_formed_ids() {
        let dir = tempdir().unwrap();
        let resolver = ClientIdentityResolver::new(dir.path().to_path_buf());
        let identity = resolver.resolve(&browser()).unwrap();

        assert_eq!(identity.origin, IdentityOrigin::Minted);
        assert!(identity.needs_cookie());
        let token = identity.client_id.strip_prefix("client_").unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn identical_fingerprint_resolves_to_same_client() {
        let dir = tempdir().unwrap();
        let resolver = ClientIdentityResolver::new(dir.path().to_path_buf());
        let first = resolver.resolve(&browser()).unwrap();
        let second = resolver.resolve(&browser()).unwrap();

        assert_eq!(first.client_id, second.client_id);
        assert_eq!(second.origin, IdentityOrigin::Fingerprint);
        assert_eq!(ClientRegistry::load(dir.path()).len(), 1);
    }

    #[test]
    fn changing_any_component_yields_new_client() {
        let dir = tempdir().unwrap();
        let resolver = ClientIdentityResolver::new(dir.path().to_path_buf());
        let base = resolver.resolve(&browser()).unwrap();

        let variants = [
            browser().with_user_agent("curl/8"),
            browser().with_accept_language("fr"),
            browser().with_accept_encoding("br"),
            browser().with_client_ip("198.51.100.7"),
        ];
        for request in variants {
            assert_ne!(request.fingerprint(), browser().fingerprint());
            let identity = resolver.resolve(&request).unwrap();
            assert_ne!(identity.client_id, base.client_id);
            assert_eq!(identity.origin, IdentityOrigin::Minted);
        }
    }

    #[test]
    fn fingerprint_match_bumps_last_seen() {
        let dir = tempdir().unwrap();
        let resolver = ClientIdentityResolver::new(dir.path().to_path_buf());
        let identity = resolver.resolve(&browser()).unwrap();

        let mut registry = ClientRegistry::load(dir.path());
        let stale = Utc::now() - Duration::days(10);
        registry
            .find_by_fingerprint_mut(&browser().fingerprint())
            .unwrap()
            .last_seen = stale;
        registry.save().unwrap();

        resolver.resolve(&browser()).unwrap();
        let record = ClientRegistry::load(dir.path())
            .get(&identity.client_id)
            .cloned()
            .unwrap();
        assert!(record.last_seen > stale);
    }

    #[test]
    fn corrupt_registry_recovers() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(registry::REGISTRY_FILE), "not json").unwrap();
        let resolver = ClientIdentityResolver::new(dir.path().to_path_buf());

        let identity = resolver.resolve(&browser()).unwrap();
        assert_eq!(identity.origin, IdentityOrigin::Minted);
        assert_eq!(ClientRegistry::load(dir.path()).len(), 1);
    }

    #[test]
    fn cookie_header_format() {
        let resolver = ClientIdentityResolver::new(PathBuf::from("/tmp"));
        let cookie = resolver.cookie("client_abc");
        assert_eq!(
            cookie.to_header_value(),
            "stateforge_client_id=client_abc; Max-Age=31536000; Path=/; SameSite=Lax"
        );
    }

    #[test]
    fn empty_cookie_is_ignored() {
        let request = ClientRequest::new().with_cookie_header("stateforge_client_id=; other");
        assert!(request.cookie("stateforge_client_id").is_none());
    }

    #[test]
    fn path_like_cookie_is_replaced_by_a_minted_id() {
        let dir = tempdir().unwrap();
        let resolver = ClientIdentityResolver::new(dir.path().to_path_buf());
        let request = browser().with_cookie_header("stateforge_client_id=../escaped");

        let identity = resolver.resolve(&request).unwrap();
        assert_ne!(identity.client_id, "../escaped");
        assert_eq!(identity.origin, IdentityOrigin::Minted);
        assert!(identity.needs_cookie());
        assert!(is_valid_client_id(&identity.client_id));
    }

    #[test]
    fn client_id_shape() {
        assert!(is_valid_client_id(KNOWN_ID));
        assert!(is_valid_client_id(&mint_client_id()));
        assert!(!is_valid_client_id("client_abc"));
        assert!(!is_valid_client_id("../escaped"));
        assert!(!is_valid_client_id("client_0123456789abcdefABCDEF012345/../x"));
        assert!(!is_valid_client_id("client_0123456789abcdefABCDEF01234567é"));
    }

    #[test]
    fn huge_max_age_expires_nothing() {
        let dir = tempdir().unwrap();
        let resolver = ClientIdentityResolver::new(dir.path().to_path_buf());
        resolver.resolve(&browser()).unwrap();

        let removed = resolver.cleanup(Duration::days(u32::MAX.into())).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(ClientRegistry::load(dir.path()).len(), 1);
    }
}
