//! RRDP (RFC 8182) snapshot retrieval
//!
//! Each visit reads the notification file, downloads the snapshot it points
//! to, checks the snapshot's SHA-256 against the notification and extracts
//! the published objects. Deltas are not applied.

use crate::error::{FetchError, FetchResult};
use crate::transport::https::HttpsTransport;
use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::HashMap;
use url::Url;

lazy_static! {
    static ref NOTIFICATION_REGEX: Regex = Regex::new(r"<notification\b([^>]*)>").unwrap();
    static ref SNAPSHOT_REGEX: Regex = Regex::new(r"<snapshot\b([^>]*)/?>").unwrap();
    static ref PUBLISH_REGEX: Regex = Regex::new(r"(?s)<publish\b([^>]*)>(.*?)</publish>").unwrap();
    static ref ATTRIBUTE_REGEX: Regex = Regex::new(r#"([A-Za-z_]+)\s*=\s*"([^"]*)""#).unwrap();
    static ref ENTITY_REGEX: Regex = Regex::new(r"&(amp|lt|gt|quot|apos);").unwrap();
}

/// Parsed notification file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub session_id: String,
    pub serial: u64,
    pub snapshot_uri: Url,
    /// Expected snapshot SHA-256, lowercase hex
    pub snapshot_hash: String,
}

/// Objects published in one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub session_id: String,
    pub serial: u64,
    pub objects: Vec<(String, Vec<u8>)>,
}

/// Replaces the predefined XML entities in one pass, so `&amp;lt;` stays `&lt;`.
fn unescape(value: &str) -> Cow<'_, str> {
    ENTITY_REGEX.replace_all(value, |c: &regex::Captures| match &c[1] {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        _ => "'",
    })
}

fn attributes(raw: &str) -> HashMap<&str, Cow<'_, str>> {
    ATTRIBUTE_REGEX
        .captures_iter(raw)
        .filter_map(|c| Some((c.get(1)?.as_str(), unescape(c.get(2)?.as_str()))))
        .collect()
}

pub fn parse_notification(uri: &Url, xml: &str) -> FetchResult<Notification> {
    let invalid = |message: &str| FetchError::new(uri.as_str(), format!("invalid notification: {}", message));

    let header = NOTIFICATION_REGEX
        .captures(xml)
        .and_then(|c| c.get(1))
        .ok_or_else(|| invalid("no notification element"))?;
    let header = attributes(header.as_str());

    let snapshot = SNAPSHOT_REGEX
        .captures(xml)
        .and_then(|c| c.get(1))
        .ok_or_else(|| invalid("no snapshot element"))?;
    let snapshot = attributes(snapshot.as_str());

    let session_id = header
        .get("session_id")
        .ok_or_else(|| invalid("missing session_id"))?
        .to_string();
    let serial = header
        .get("serial")
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid("missing or bad serial"))?;
    let snapshot_uri = snapshot
        .get("uri")
        .and_then(|s| Url::parse(s).ok())
        .ok_or_else(|| invalid("missing or bad snapshot uri"))?;
    let snapshot_hash = snapshot
        .get("hash")
        .ok_or_else(|| invalid("missing snapshot hash"))?
        .to_ascii_lowercase();

    Ok(Notification {
        session_id,
        serial,
        snapshot_uri,
        snapshot_hash,
    })
}

pub fn parse_snapshot(uri: &Url, xml: &str) -> FetchResult<Vec<(String, Vec<u8>)>> {
    PUBLISH_REGEX
        .captures_iter(xml)
        .map(|c| -> FetchResult<(String, Vec<u8>)> {
            let attrs = c.get(1).map(|m| attributes(m.as_str())).unwrap_or_default();
            let object_uri = attrs
                .get("uri")
                .ok_or_else(|| FetchError::new(uri.as_str(), "publish element without uri"))?;
            let body: String = c
                .get(2)
                .map(|m| m.as_str().chars().filter(|ch| !ch.is_whitespace()).collect())
                .unwrap_or_default();
            let content = general_purpose::STANDARD
                .decode(body.as_bytes())
                .map_err(|e| FetchError::new(object_uri.as_ref(), format!("bad base64 in snapshot: {}", e)))?;
            Ok((object_uri.to_string(), content))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct RrdpTransport {
    https: HttpsTransport,
}

impl RrdpTransport {
    pub fn new(https: HttpsTransport) -> Self {
        Self { https }
    }

    pub async fn fetch_snapshot(&self, notification_uri: &Url) -> FetchResult<Snapshot> {
        let body = self.https.get(notification_uri).await?;
        let xml = String::from_utf8_lossy(&body);
        let notification = parse_notification(notification_uri, &xml)?;

        let snapshot = self.https.get(&notification.snapshot_uri).await?;
        let actual = hex::encode(Sha256::digest(&snapshot));
        if actual != notification.snapshot_hash {
            return Err(FetchError::new(
                notification.snapshot_uri.as_str(),
                format!("snapshot hash mismatch: expected {}, got {}", notification.snapshot_hash, actual),
            ));
        }

        let objects = parse_snapshot(&notification.snapshot_uri, &String::from_utf8_lossy(&snapshot))?;
        tracing::info!(
            uri = %notification_uri,
            session_id = %notification.session_id,
            serial = notification.serial,
            objects = objects.len(),
            "Fetched RRDP snapshot"
        );

        Ok(Snapshot {
            session_id: notification.session_id,
            serial: notification.serial,
            objects,
        })
    }
}
