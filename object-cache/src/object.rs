//! Repository objects held by the cache
//!
//! Provides:
//! - Content hashing (SHA-256, lowercase hex)
//! - X.509 resource certificate decoding
//! - The generic cached-object row every store persists

use crate::error::{CacheError, CacheResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

/// RFC 3779 IP address delegation extension
pub const OID_IP_ADDR_BLOCKS: &str = "1.3.6.1.5.5.7.1.7";
/// RFC 3779 AS identifier delegation extension
pub const OID_AS_IDENTIFIERS: &str = "1.3.6.1.5.5.7.1.8";
/// Subject Information Access
pub const OID_SUBJECT_INFO_ACCESS: &str = "1.3.6.1.5.5.7.1.11";
const OID_CA_REPOSITORY: &str = "1.3.6.1.5.5.7.48.5";
const OID_RPKI_MANIFEST: &str = "1.3.6.1.5.5.7.48.10";
const OID_RPKI_NOTIFY: &str = "1.3.6.1.5.5.7.48.13";

/// SHA-256 of the encoded object, hex encoded
pub fn content_hash(encoded: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(encoded);
    hex::encode(hasher.finalize())
}

/// Kind of repository object, derived from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Certificate,
    Manifest,
    Crl,
    Roa,
    Other,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Certificate => "certificate",
            ObjectKind::Manifest => "manifest",
            ObjectKind::Crl => "crl",
            ObjectKind::Roa => "roa",
            ObjectKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> CacheResult<Self> {
        match s {
            "certificate" => Ok(ObjectKind::Certificate),
            "manifest" => Ok(ObjectKind::Manifest),
            "crl" => Ok(ObjectKind::Crl),
            "roa" => Ok(ObjectKind::Roa),
            "other" => Ok(ObjectKind::Other),
            _ => Err(CacheError::Corrupt(format!("Unknown object kind: {}", s))),
        }
    }

    pub fn from_uri(uri: &str) -> Self {
        match uri.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
            Some("cer") => ObjectKind::Certificate,
            Some("mft") => ObjectKind::Manifest,
            Some("crl") => ObjectKind::Crl,
            Some("roa") => ObjectKind::Roa,
            _ => ObjectKind::Other,
        }
    }
}

/// Fields of an X.509 resource certificate the validator reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedCertificate {
    pub subject: String,
    pub issuer: String,
    /// Serial number, hex
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// DER-encoded SubjectPublicKeyInfo
    pub subject_public_key_info: Vec<u8>,
    pub is_ca: bool,
    /// Carries RFC 3779 IP or AS resource extensions
    pub has_resource_extensions: bool,
    /// SIA caRepository
    pub repository_uri: Option<String>,
    /// SIA rpkiManifest
    pub manifest_uri: Option<String>,
    /// SIA rpkiNotify (RRDP notification file)
    pub notification_uri: Option<String>,
}

impl DecodedCertificate {
    pub fn from_der(der: &[u8]) -> CacheResult<Self> {
        let (_rem, cert) = X509Certificate::from_der(der)
            .map_err(|e| CacheError::InvalidObject(format!("Failed to parse X.509 certificate: {}", e)))?;

        let not_before = DateTime::<Utc>::from_timestamp(cert.validity().not_before.to_datetime().unix_timestamp(), 0)
            .ok_or_else(|| CacheError::InvalidObject("Invalid not_before timestamp".to_string()))?;
        let not_after = DateTime::<Utc>::from_timestamp(cert.validity().not_after.to_datetime().unix_timestamp(), 0)
            .ok_or_else(|| CacheError::InvalidObject("Invalid not_after timestamp".to_string()))?;

        let has_resource_extensions = cert.extensions().iter().any(|ext| {
            let oid = ext.oid.to_id_string();
            oid == OID_IP_ADDR_BLOCKS || oid == OID_AS_IDENTIFIERS
        });

        let mut repository_uri = None;
        let mut manifest_uri = None;
        let mut notification_uri = None;
        // SIA shares the AccessDescription syntax of AIA
        for ext in cert
            .extensions()
            .iter()
            .filter(|ext| ext.oid.to_id_string() == OID_SUBJECT_INFO_ACCESS)
        {
            let (_, sia) = AuthorityInfoAccess::from_der(ext.value)
                .map_err(|e| CacheError::InvalidObject(format!("Malformed subject information access: {}", e)))?;
            for desc in &sia.accessdescs {
                if let GeneralName::URI(uri) = desc.access_location {
                    let slot = match desc.access_method.to_id_string().as_str() {
                        OID_CA_REPOSITORY => &mut repository_uri,
                        OID_RPKI_MANIFEST => &mut manifest_uri,
                        OID_RPKI_NOTIFY => &mut notification_uri,
                        _ => continue,
                    };
                    slot.get_or_insert_with(|| uri.to_string());
                }
            }
        }

        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: cert.serial.to_str_radix(16),
            not_before,
            not_after,
            subject_public_key_info: cert.public_key().raw.to_vec(),
            is_ca: cert.is_ca(),
            has_resource_extensions,
            repository_uri,
            manifest_uri,
            notification_uri,
        })
    }

    /// An RPKI resource certificate is a CA certificate carrying at least
    /// one RFC 3779 resource extension.
    pub fn is_resource_certificate(&self) -> bool {
        self.is_ca && self.has_resource_extensions
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

/// A fetched and decoded certificate repository object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateObject {
    /// Location the object was fetched from
    pub uri: String,
    pub encoded: Vec<u8>,
    pub decoded: DecodedCertificate,
    pub hash: String,
    pub fetched_at: DateTime<Utc>,
}

impl CertificateObject {
    pub fn parse(uri: impl Into<String>, encoded: Vec<u8>, fetched_at: DateTime<Utc>) -> CacheResult<Self> {
        let decoded = DecodedCertificate::from_der(&encoded)?;
        let hash = content_hash(&encoded);
        Ok(Self {
            uri: uri.into(),
            encoded,
            decoded,
            hash,
            fetched_at,
        })
    }
}

/// Row persisted by every cache implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedObject {
    pub hash: String,
    /// Trust anchor whose run last stored or refreshed the object; eviction
    /// is scoped to it
    pub trust_anchor: String,
    pub uri: String,
    pub kind: ObjectKind,
    pub encoded: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
    /// Last run in which the object was seen; drives eviction
    pub validated_at: DateTime<Utc>,
}

impl CachedObject {
    pub fn new(
        trust_anchor: impl Into<String>,
        uri: impl Into<String>,
        encoded: Vec<u8>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let uri = uri.into();
        Self {
            hash: content_hash(&encoded),
            trust_anchor: trust_anchor.into(),
            kind: ObjectKind::from_uri(&uri),
            uri,
            encoded,
            fetched_at,
            validated_at: fetched_at,
        }
    }

    pub fn from_certificate(trust_anchor: impl Into<String>, certificate: &CertificateObject) -> Self {
        Self {
            hash: certificate.hash.clone(),
            trust_anchor: trust_anchor.into(),
            uri: certificate.uri.clone(),
            kind: ObjectKind::Certificate,
            encoded: certificate.encoded.clone(),
            fetched_at: certificate.fetched_at,
            validated_at: certificate.fetched_at,
        }
    }
}
