//! Trust Anchor Locator loading
//!
//! Two on-disk formats are accepted:
//! - RFC 8630: optional `#` comment lines, one certificate URI per line, a
//!   blank line, then the base64 SubjectPublicKeyInfo (possibly wrapped)
//! - the legacy property format with `ca.name`, `certificate.location`,
//!   `public.key.info` and `prefetch.uris` keys
//!
//! Locators are loaded once at startup and are read-only afterwards.

use crate::error::{ConfigError, Result};
use base64::{engine::general_purpose, Engine as _};
use std::collections::HashMap;
use std::path::Path;
use url::Url;

const TAL_EXTENSION: &str = "tal";

/// Immutable trust anchor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchorLocator {
    /// Human-readable name, also the trust anchor's identity in the engine
    pub name: String,
    /// Candidate certificate locations, in preference order
    pub certificate_locations: Vec<Url>,
    /// DER-encoded SubjectPublicKeyInfo the certificate must carry
    pub public_key_info: Vec<u8>,
    /// Whole-repository locations fetched before the tree walk
    pub prefetch_uris: Vec<Url>,
}

impl TrustAnchorLocator {
    pub fn new(
        name: impl Into<String>,
        certificate_locations: Vec<Url>,
        public_key_info: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            certificate_locations,
            public_key_info,
            prefetch_uris: Vec::new(),
        }
    }

    pub fn with_prefetch_uris(mut self, uris: Vec<Url>) -> Self {
        self.prefetch_uris = uris;
        self
    }

    /// Parse locator text; `name` is used when the text does not carry one.
    pub fn parse(name: &str, text: &str) -> Result<Self> {
        let locator = if is_property_format(text) {
            parse_property_format(name, text)?
        } else {
            parse_rfc8630(name, text)?
        };
        locator.validate()?;
        Ok(locator)
    }

    /// Load a single `.tal` file. The file stem names the trust anchor
    /// unless the file sets `ca.name`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("trust-anchor");
        Self::parse(name, &text)
    }

    /// Load every `.tal` file in a directory, sorted by file name
    pub fn load_directory(dir: &Path) -> Result<Vec<Self>> {
        if !dir.is_dir() {
            return Err(ConfigError::SourceNotFound(dir.display().to_string()));
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(TAL_EXTENSION))
            .collect();
        paths.sort();

        let mut locators = Vec::with_capacity(paths.len());
        for path in paths {
            let locator = Self::load(&path)?;
            tracing::info!(
                name = %locator.name,
                path = %path.display(),
                locations = locator.certificate_locations.len(),
                "Loaded trust anchor locator"
            );
            locators.push(locator);
        }
        Ok(locators)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("name cannot be empty"));
        }
        if self.certificate_locations.is_empty() {
            return Err(self.invalid("no certificate location"));
        }
        if let Some(uri) = self
            .certificate_locations
            .iter()
            .chain(self.prefetch_uris.iter())
            .find(|uri| !matches!(uri.scheme(), "rsync" | "https"))
        {
            return Err(self.invalid(&format!("unsupported URI scheme in {}", uri)));
        }
        if self.public_key_info.is_empty() {
            return Err(self.invalid("public key info is empty"));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> ConfigError {
        ConfigError::InvalidLocator {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

fn is_property_format(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .any(|line| line.starts_with("certificate.location"))
}

fn parse_rfc8630(name: &str, text: &str) -> Result<TrustAnchorLocator> {
    let invalid = |reason: String| ConfigError::InvalidLocator {
        name: name.to_string(),
        reason,
    };

    let mut lines = text
        .lines()
        .map(str::trim)
        .skip_while(|line| line.starts_with('#'))
        .skip_while(|line| line.is_empty());

    let mut locations = Vec::new();
    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        let uri = Url::parse(line).map_err(|e| invalid(format!("bad URI {}: {}", line, e)))?;
        locations.push(uri);
    }

    let encoded: String = lines.collect();
    let public_key_info = decode_key(&encoded).map_err(invalid)?;

    Ok(TrustAnchorLocator::new(name, locations, public_key_info))
}

fn parse_property_format(name: &str, text: &str) -> Result<TrustAnchorLocator> {
    let invalid = |reason: String| ConfigError::InvalidLocator {
        name: name.to_string(),
        reason,
    };

    let properties: HashMap<&str, &str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect();

    let parse_list = |key: &str| -> Result<Vec<Url>> {
        properties
            .get(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| {
                        Url::parse(item).map_err(|e| invalid(format!("bad URI {}: {}", item, e)))
                    })
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    };

    let locations = parse_list("certificate.location")?;
    let prefetch = parse_list("prefetch.uris")?;
    let key = properties
        .get("public.key.info")
        .ok_or_else(|| invalid("missing public.key.info".to_string()))?;
    let public_key_info = decode_key(key).map_err(invalid)?;
    let display_name = properties.get("ca.name").copied().unwrap_or(name);

    Ok(TrustAnchorLocator::new(display_name, locations, public_key_info).with_prefetch_uris(prefetch))
}

fn decode_key(encoded: &str) -> std::result::Result<Vec<u8>, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| format!("public key is not valid base64: {}", e))
}
