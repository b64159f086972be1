//! Asset references and their string encodings.
//!
//! A reference is stored in a snapshot as a single string whose prefix
//! names the form:
//!
//! | Form        | Encoding                                  |
//! |-------------|-------------------------------------------|
//! | `Ephemeral` | `blob:easel/<uuid>`                       |
//! | `Durable`   | `asset:<64 hex digits>`                   |
//! | `Embedded`  | `data:<media-type>;base64,<payload>`      |
//! | `Empty`     | the empty string                          |

use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::key::AssetKey;

const EPHEMERAL_PREFIX: &str = "blob:";
const DURABLE_PREFIX: &str = "asset:";
const EMBEDDED_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// Session-local handle to bytes held by an ephemeral registry.
///
/// Handles are only meaningful inside the session that minted them and stop
/// resolving once revoked or after a reload.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EphemeralHandle(String);

impl EphemeralHandle {
    /// Wrap a handle string. The string must carry the `blob:` prefix.
    pub fn new(handle: impl Into<String>) -> Result<Self, TypeError> {
        let handle = handle.into();
        if !handle.starts_with(EPHEMERAL_PREFIX) || handle.len() == EPHEMERAL_PREFIX.len() {
            return Err(TypeError::UnknownReference(handle));
        }
        Ok(Self(handle))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EphemeralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EphemeralHandle({})", self.0)
    }
}

impl fmt::Display for EphemeralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference from a scene node to binary asset data.
///
/// Persisted snapshots (history entries, catalog payloads, the autosave slot)
/// never contain `Ephemeral` references; portable export files contain only
/// `Embedded` or `Empty` ones.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AssetRef {
    /// Session-local, revocable handle.
    Ephemeral(EphemeralHandle),
    /// Stable key resolvable against the blob store.
    Durable(AssetKey),
    /// Bytes carried inline.
    Embedded { media_type: String, bytes: Vec<u8> },
    /// Unresolvable or absent asset; rendered as a blank placeholder.
    #[default]
    Empty,
}

impl AssetRef {
    /// Embed `bytes`, sniffing the media type from their leading bytes.
    pub fn embedded(bytes: Vec<u8>) -> Self {
        let media_type = sniff_media_type(&bytes).to_string();
        Self::Embedded { media_type, bytes }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Ephemeral(_))
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Durable(_))
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded { .. })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The durable key, if this is a durable reference.
    pub fn durable_key(&self) -> Option<&AssetKey> {
        match self {
            Self::Durable(key) => Some(key),
            _ => None,
        }
    }

    /// Parse a reference from its string encoding.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() {
            return Ok(Self::Empty);
        }
        if s.starts_with(EPHEMERAL_PREFIX) {
            return EphemeralHandle::new(s).map(Self::Ephemeral);
        }
        if let Some(hex) = s.strip_prefix(DURABLE_PREFIX) {
            return AssetKey::from_hex(hex).map(Self::Durable);
        }
        if let Some(rest) = s.strip_prefix(EMBEDDED_PREFIX) {
            return parse_data_url(rest);
        }
        Err(TypeError::UnknownReference(truncate(s)))
    }

    /// Render the string encoding. Embedded references render as full data URLs.
    pub fn encode(&self) -> String {
        match self {
            Self::Ephemeral(handle) => handle.0.clone(),
            Self::Durable(key) => format!("{DURABLE_PREFIX}{}", key.to_hex()),
            Self::Embedded { media_type, bytes } => format!(
                "{EMBEDDED_PREFIX}{media_type}{BASE64_MARKER},{}",
                general_purpose::STANDARD.encode(bytes)
            ),
            Self::Empty => String::new(),
        }
    }
}

fn parse_data_url(rest: &str) -> Result<AssetRef, TypeError> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| TypeError::MalformedDataUrl("missing ',' separator".into()))?;
    let media_type = header
        .strip_suffix(BASE64_MARKER)
        .ok_or_else(|| TypeError::MalformedDataUrl("only base64 payloads are supported".into()))?;
    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| TypeError::MalformedDataUrl(e.to_string()))?;
    let media_type = if media_type.is_empty() {
        sniff_media_type(&bytes).to_string()
    } else {
        media_type.to_string()
    };
    Ok(AssetRef::Embedded { media_type, bytes })
}

fn truncate(s: &str) -> String {
    s.chars().take(48).collect()
}

impl TryFrom<String> for AssetRef {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AssetRef> for String {
    fn from(value: AssetRef) -> Self {
        value.encode()
    }
}

impl From<AssetKey> for AssetRef {
    fn from(key: AssetKey) -> Self {
        Self::Durable(key)
    }
}

impl fmt::Debug for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ephemeral(handle) => write!(f, "Ephemeral({})", handle.0),
            Self::Durable(key) => write!(f, "Durable({})", key.short_hex()),
            Self::Embedded { media_type, bytes } => {
                write!(f, "Embedded({media_type}, {} bytes)", bytes.len())
            }
            Self::Empty => write!(f, "Empty"),
        }
    }
}

/// Guess the media type of image bytes from their signature.
pub fn sniff_media_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
        "image/png"
    } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if looks_like_svg(bytes) {
        "image/svg+xml"
    } else {
        "application/octet-stream"
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(256)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}
