//! Certificate Manager (C7): a self-signed CA minted once per run, plus a concurrent,
//! read-heavy cache of per-host leaf certificates signed by that CA.
//!
//! Grounded on the self-signed cert pattern in `goose-server`'s `tls.rs`
//! (`CertificateParams` + `KeyPair::generate()` + `self_signed`/`signed_by`), extended
//! here with CA-then-leaf chaining and a hostname cache.

use crate::error::{ProxyError, ProxyResult};
use rand::RngCore;
use rcgen::{CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose, SanType};
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Minimum RSA modulus size the certificate manager will accept for user-supplied key
/// material (§4.7: "implementations must reject <2048").
pub const MIN_RSA_KEY_BITS: u32 = 2048;

const CA_VALIDITY: Duration = Duration::from_secs(365 * 24 * 3600);
const LEAF_VALIDITY: Duration = Duration::from_secs(24 * 3600);
const LEAF_REGEN_THRESHOLD: Duration = Duration::from_secs(3600);

/// Validate a caller-supplied RSA key size against the §4.7 floor.
pub fn validate_key_bits(bits: u32) -> ProxyResult<()> {
    if bits < MIN_RSA_KEY_BITS {
        return Err(ProxyError::Certificate(format!(
            "RSA key size {bits} is below the minimum of {MIN_RSA_KEY_BITS} bits"
        )));
    }
    Ok(())
}

struct CachedLeaf {
    config: Arc<ServerConfig>,
    minted_at: Instant,
}

impl CachedLeaf {
    fn is_expired(&self) -> bool {
        self.minted_at.elapsed() + LEAF_REGEN_THRESHOLD >= LEAF_VALIDITY
    }
}

/// Owns the run's CA key material, its on-disk PEM (unlinked on drop), and the
/// per-hostname leaf certificate cache.
pub struct CertificateAuthority {
    ca_cert: rcgen::Certificate,
    ca_key: KeyPair,
    pem_path: PathBuf,
    leaves: RwLock<HashMap<String, CachedLeaf>>,
}

impl CertificateAuthority {
    /// Generate a fresh CA and persist its certificate PEM to
    /// `$TMPDIR/pmg-ca-cert-<pid>.pem` with mode 0600.
    pub fn generate() -> ProxyResult<Self> {
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, "PMG Proxy CA");
        params
            .distinguished_name
            .push(DnType::OrganizationName, "SafeDep PMG");
        params.is_ca = IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.not_before = rcgen::date_time_ymd(2020, 1, 1);
        params.not_after = (std::time::SystemTime::now() + CA_VALIDITY).into();

        let ca_key = KeyPair::generate().map_err(|e| ProxyError::Certificate(e.to_string()))?;
        let ca_cert = params
            .self_signed(&ca_key)
            .map_err(|e| ProxyError::Certificate(e.to_string()))?;

        let pem_path = write_ca_pem(ca_cert.pem())?;

        Ok(Self {
            ca_cert,
            ca_key,
            pem_path,
            leaves: RwLock::new(HashMap::new()),
        })
    }

    /// Path to the CA's temp-file PEM, for injecting into child-process trust stores
    /// (e.g. `NODE_EXTRA_CA_CERTS`, `SSL_CERT_FILE`).
    pub fn ca_pem_path(&self) -> &std::path::Path {
        &self.pem_path
    }

    pub fn ca_pem(&self) -> String {
        self.ca_cert.pem()
    }

    /// Rustls server config for `hostname`, minting and caching a fresh leaf on first
    /// use and regenerating within the 1-hour-remaining window.
    pub fn tls_config_for(&self, hostname: &str) -> ProxyResult<Arc<ServerConfig>> {
        if let Some(cached) = self.leaves.read().unwrap().get(hostname) {
            if !cached.is_expired() {
                return Ok(Arc::clone(&cached.config));
            }
        }

        let config = self.mint_leaf(hostname)?;
        self.leaves.write().unwrap().insert(
            hostname.to_string(),
            CachedLeaf {
                config: Arc::clone(&config),
                minted_at: Instant::now(),
            },
        );
        debug!(hostname, "minted leaf certificate");
        Ok(config)
    }

    fn mint_leaf(&self, hostname: &str) -> ProxyResult<Arc<ServerConfig>> {
        let mut params = CertificateParams::new(vec![hostname.to_string()])
            .map_err(|e| ProxyError::Certificate(e.to_string()))?;
        params
            .distinguished_name
            .push(DnType::CommonName, hostname);
        params.subject_alt_names = vec![SanType::DnsName(
            hostname
                .to_string()
                .try_into()
                .map_err(|_| ProxyError::Certificate(format!("invalid hostname: {hostname}")))?,
        )];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        params.serial_number = Some(rcgen::SerialNumber::from_slice(&random_serial()));
        params.not_before = rcgen::date_time_ymd(2020, 1, 1);
        params.not_after = (std::time::SystemTime::now() + LEAF_VALIDITY).into();

        let leaf_key = KeyPair::generate().map_err(|e| ProxyError::Certificate(e.to_string()))?;
        let leaf_cert = params
            .signed_by(&leaf_key, &self.ca_cert, &self.ca_key)
            .map_err(|e| ProxyError::Certificate(e.to_string()))?;

        let cert_der = CertificateDer::from(leaf_cert.der().to_vec());
        let key_der = PrivatePkcs8KeyDer::from(leaf_key.serialize_der());

        let mut config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der.into())
            .map_err(|e| ProxyError::Certificate(e.to_string()))?;
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(Arc::new(config))
    }
}

impl Drop for CertificateAuthority {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.pem_path);
    }
}

fn write_ca_pem(pem: String) -> ProxyResult<PathBuf> {
    let path = std::env::temp_dir().join(format!("pmg-ca-cert-{}.pem", std::process::id()));
    fs::write(&path, pem)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    Ok(path)
}

fn random_serial() -> [u8; 16] {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
