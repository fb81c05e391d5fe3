//! Works out which replay family a resolved payload belongs to.
//!
//! Older replays are a single JSON document with the frame states embedded as a
//! base64 string. Newer ones are RFR1 containers:
//!
//! ```text
//! "RFR1" | u8 entry count | entry * count | section data...
//! entry = [u8; 4] tag | u32 LE offset | u32 LE size
//! ```
//!
//! Offsets are absolute within the file.

use std::fmt;

use reframed_logger::Log;
use serde_json::{Map, Value};

use crate::codec::{ByteOrder, ByteReader};
use crate::errors::ReplayError;
use crate::types::LegacyVersion;

pub const MODERN_MAGIC: &[u8; 4] = b"RFR1";

/// Byte order mark some editors put in front of the JSON text.
pub(crate) const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const TOC_ENTRY_LEN: usize = 12;

/// Key the legacy blob is stored under, and the keys modern sections are mounted at.
pub(crate) const PLAYER_STATES_KEY: &str = "playerstates";
pub(crate) const MAPPING_INFO_KEY: &str = "mappinginfo";
pub(crate) const VIDEO_INFO_KEY: &str = "videoinfo";

/// Section tags this decoder understands. Anything else (e.g. `VIDE`, the raw
/// video stream) is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Top level JSON fields, merged into the document root.
    Meta,
    /// Mapping tables as JSON.
    Mapi,
    /// Video metadata as JSON.
    Vidm,
    /// Compressed frame states.
    Fdat,
}

impl Tag {
    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        match &bytes {
            b"META" => Some(Self::Meta),
            b"MAPI" => Some(Self::Mapi),
            b"VIDM" => Some(Self::Vidm),
            b"FDAT" => Some(Self::Fdat),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meta => "META",
            Self::Mapi => "MAPI",
            Self::Vidm => "VIDM",
            Self::Fdat => "FDAT",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocEntry {
    pub tag: [u8; 4],
    pub offset: u32,
    pub size: u32,
}

impl TocEntry {
    fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.size as usize
    }
}

/// A validated RFR1 container. Every entry is known to lie inside `bytes`.
#[derive(Debug)]
pub struct ModernContainer<'a> {
    bytes: &'a [u8],
    entries: Vec<TocEntry>,
}

impl<'a> ModernContainer<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ReplayError> {
        if !bytes.starts_with(MODERN_MAGIC) {
            return Err(ReplayError::UnrecognizedContainer("missing RFR1 magic".into()));
        }

        let mut reader = ByteReader::new(&bytes[MODERN_MAGIC.len()..], ByteOrder::Little);
        let count = reader
            .u8()
            .map_err(|_| ReplayError::corrupt("RFR1 container has no table of contents"))?;

        let mut entries = Vec::with_capacity(count as usize);

        for index in 0..count {
            let raw = reader.take(TOC_ENTRY_LEN).map_err(|_| {
                ReplayError::corrupt(format!("table of contents declares {count} entries but ends at entry {index}"))
            })?;

            let mut entry = ByteReader::new(raw, ByteOrder::Little);
            let tag = [entry.u8()?, entry.u8()?, entry.u8()?, entry.u8()?];
            let entry = TocEntry {
                tag,
                offset: entry.u32()?,
                size: entry.u32()?,
            };

            let end = u64::from(entry.offset) + u64::from(entry.size);
            if end > bytes.len() as u64 {
                return Err(ReplayError::corrupt(format!(
                    "section {} spans {}..{end} but the file is {} bytes",
                    String::from_utf8_lossy(&entry.tag),
                    entry.offset,
                    bytes.len()
                )));
            }

            if Tag::from_bytes(tag).is_none() {
                tracing::debug!(
                    target: Log::Container,
                    tag = %String::from_utf8_lossy(&tag),
                    "Skipping unrecognized section"
                );
            }

            entries.push(entry);
        }

        Ok(Self { bytes, entries })
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    /// The bytes of the section tagged `tag`. If a tag repeats, the last entry wins.
    pub fn section(&self, tag: Tag) -> Option<&'a [u8]> {
        self.entries
            .iter()
            .rev()
            .find(|entry| Tag::from_bytes(entry.tag) == Some(tag))
            .map(|entry| &self.bytes[entry.range()])
    }

    /// Builds the JSON root the legacy format would have had: META's fields at the
    /// top level, MAPI under `mappinginfo`, VIDM under `videoinfo`.
    pub fn json_root(&self) -> Result<Map<String, Value>, ReplayError> {
        let meta = self
            .section(Tag::Meta)
            .ok_or_else(|| ReplayError::corrupt("RFR1 container has no META section"))?;
        let mapping = self
            .section(Tag::Mapi)
            .ok_or_else(|| ReplayError::corrupt("RFR1 container has no MAPI section"))?;

        let mut root: Map<String, Value> = parse_section(Tag::Meta, meta)?;
        root.insert(MAPPING_INFO_KEY.into(), parse_section(Tag::Mapi, mapping)?);

        if let Some(video) = self.section(Tag::Vidm) {
            root.insert(VIDEO_INFO_KEY.into(), parse_section(Tag::Vidm, video)?);
        }

        Ok(root)
    }
}

fn parse_section<T: serde::de::DeserializeOwned>(tag: Tag, bytes: &[u8]) -> Result<T, ReplayError> {
    serde_json::from_slice(bytes).map_err(|source| ReplayError::MalformedSection {
        section: tag.as_str(),
        source,
    })
}

/// A classified payload.
#[derive(Debug)]
pub enum Container<'a> {
    Legacy {
        version: LegacyVersion,
        root: Map<String, Value>,
        /// The base64 `playerstates` text, removed from `root`.
        encoded_states: String,
    },

    Modern(ModernContainer<'a>),
}

/// Decides between the JSON and RFR1 families.
///
/// Anything that parses as JSON is a legacy replay, and its version is checked
/// here so that unsupported files are rejected before any frame data is touched.
pub fn classify(payload: &[u8]) -> Result<Container<'_>, ReplayError> {
    let payload = payload.strip_prefix(UTF8_BOM).unwrap_or(payload);

    let json_error = match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(root)) => return classify_legacy(root),
        Ok(other) => {
            return Err(ReplayError::UnrecognizedContainer(format!(
                "top level JSON value is not an object: {}",
                json_kind(&other)
            )));
        },
        Err(error) => error,
    };

    if payload.starts_with(MODERN_MAGIC) {
        tracing::debug!(target: Log::Container, size = payload.len(), "Payload is an RFR1 container");
        return ModernContainer::parse(payload).map(Container::Modern);
    }

    Err(ReplayError::UnrecognizedContainer(format!(
        "not JSON ({json_error}) and no RFR1 magic"
    )))
}

fn classify_legacy(mut root: Map<String, Value>) -> Result<Container<'static>, ReplayError> {
    let version = match root.get("version") {
        Some(Value::String(version)) => version.clone(),
        Some(other) => other.to_string(),
        None => return Err(ReplayError::UnsupportedVersion("<missing>".into())),
    };

    let Some(version) = LegacyVersion::parse(&version) else {
        tracing::error!(target: Log::Container, ?version, "Unsupported replay version");
        return Err(ReplayError::UnsupportedVersion(version));
    };

    let encoded_states = match root.remove(PLAYER_STATES_KEY) {
        Some(Value::String(encoded)) => encoded,
        Some(other) => {
            return Err(ReplayError::corrupt(format!(
                "{PLAYER_STATES_KEY} should be a base64 string, found {}",
                json_kind(&other)
            )));
        },
        None => return Err(ReplayError::corrupt(format!("legacy replay has no {PLAYER_STATES_KEY}"))),
    };

    tracing::debug!(target: Log::Container, %version, "Payload is a legacy JSON replay");

    Ok(Container::Legacy {
        version,
        root,
        encoded_states,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
