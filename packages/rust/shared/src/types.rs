//! Core domain types shared by the asset pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::DecodeError;

/// Extension used when a media type has no entry in the table.
pub const GENERIC_EXTENSION: &str = ".bin";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one deployment run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MediaType
// ---------------------------------------------------------------------------

/// The closed set of media types an embedded reference may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "audio/mpeg")]
    AudioMpeg,
    #[serde(rename = "audio/mp3")]
    AudioMp3,
    #[serde(rename = "audio/wav")]
    AudioWav,
    #[serde(rename = "audio/ogg")]
    AudioOgg,
    #[serde(rename = "image/jpeg")]
    ImageJpeg,
    #[serde(rename = "image/jpg")]
    ImageJpg,
    #[serde(rename = "image/png")]
    ImagePng,
    #[serde(rename = "image/gif")]
    ImageGif,
    #[serde(rename = "image/webp")]
    ImageWebp,
}

impl MediaType {
    /// Every supported media type, in table order.
    pub const ALL: [MediaType; 9] = [
        MediaType::AudioMpeg,
        MediaType::AudioMp3,
        MediaType::AudioWav,
        MediaType::AudioOgg,
        MediaType::ImageJpeg,
        MediaType::ImageJpg,
        MediaType::ImagePng,
        MediaType::ImageGif,
        MediaType::ImageWebp,
    ];

    /// Canonical lowercase media type string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AudioMpeg => "audio/mpeg",
            Self::AudioMp3 => "audio/mp3",
            Self::AudioWav => "audio/wav",
            Self::AudioOgg => "audio/ogg",
            Self::ImageJpeg => "image/jpeg",
            Self::ImageJpg => "image/jpg",
            Self::ImagePng => "image/png",
            Self::ImageGif => "image/gif",
            Self::ImageWebp => "image/webp",
        }
    }

    /// File extension (with leading dot) for persisted assets.
    pub fn extension(self) -> &'static str {
        match self {
            Self::AudioMpeg | Self::AudioMp3 => ".mp3",
            Self::AudioWav => ".wav",
            Self::AudioOgg => ".ogg",
            Self::ImageJpeg | Self::ImageJpg => ".jpg",
            Self::ImagePng => ".png",
            Self::ImageGif => ".gif",
            Self::ImageWebp => ".webp",
        }
    }

    pub fn is_audio(self) -> bool {
        self.as_str().starts_with("audio/")
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaType {
    type Err = DecodeError;

    /// Media types compare ASCII case-insensitively.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mt| mt.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DecodeError::UnsupportedMediaType {
                media_type: s.to_string(),
            })
    }
}

/// Look up the extension for an arbitrary media type string.
///
/// Unknown types map to [`GENERIC_EXTENSION`]. Only reporting uses this;
/// decoding never accepts an unknown type.
pub fn extension_for_mime(mime: &str) -> &'static str {
    mime.parse::<MediaType>()
        .map(MediaType::extension)
        .unwrap_or(GENERIC_EXTENSION)
}

// ---------------------------------------------------------------------------
// AssetDigest
// ---------------------------------------------------------------------------

/// SHA-256 of an asset's decoded bytes, as 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetDigest(String);

impl AssetDigest {
    /// Full digest length in hex characters.
    pub const HEX_LEN: usize = 64;

    /// Hash a byte payload.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// The first `len` hex characters, clamped to the full digest.
    pub fn prefix(&self, len: usize) -> &str {
        &self.0[..len.min(Self::HEX_LEN)]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
