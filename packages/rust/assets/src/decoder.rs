//! Reference decoder: `data:<media-type>;base64,<payload>` → [`Asset`].

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use assetdeploy_shared::{AssetDigest, DecodeError, MediaType};

use crate::scanner::REFERENCE_PREFIX;

/// Separator between the media type and the payload.
const BASE64_DELIMITER: &str = ";base64,";

/// Decoded binary payload of a reference.
///
/// The digest is computed over the decoded bytes, so two textually different
/// encodings of the same bytes yield equal assets.
#[derive(Clone, PartialEq, Eq)]
pub struct Asset {
    bytes: Vec<u8>,
    media_type: MediaType,
    digest: AssetDigest,
}

impl Asset {
    pub fn new(bytes: Vec<u8>, media_type: MediaType) -> Self {
        let digest = AssetDigest::of(&bytes);
        Self {
            bytes,
            media_type,
            digest,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn digest(&self) -> &AssetDigest {
        &self.digest
    }

    pub fn extension(&self) -> &'static str {
        self.media_type.extension()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Asset")
            .field("media_type", &self.media_type)
            .field("digest", &self.digest)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Parse and decode a raw reference.
///
/// The grammar is strict: a `data:` prefix, a non-empty media type up to
/// `;base64,`, then a non-empty standard-alphabet base64 payload with
/// padding. Media types outside the supported table are rejected rather
/// than stored under a generic extension.
pub fn decode(raw: &str) -> Result<Asset, DecodeError> {
    let rest = raw
        .strip_prefix(REFERENCE_PREFIX)
        .ok_or_else(|| DecodeError::malformed("missing 'data:' prefix"))?;

    let (media, payload) = rest
        .split_once(BASE64_DELIMITER)
        .ok_or_else(|| DecodeError::malformed("missing ';base64,' delimiter"))?;

    if media.is_empty() {
        return Err(DecodeError::malformed("empty media type"));
    }
    if payload.is_empty() {
        return Err(DecodeError::malformed("empty payload"));
    }

    let media_type: MediaType = media.parse()?;

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| DecodeError::PayloadDecode {
            reason: e.to_string(),
        })?;

    Ok(Asset::new(bytes, media_type))
}

/// Encode bytes as a reference. Inverse of [`decode`].
pub fn encode_reference(bytes: &[u8], media_type: MediaType) -> String {
    format!(
        "{REFERENCE_PREFIX}{media_type}{BASE64_DELIMITER}{}",
        STANDARD.encode(bytes)
    )
}
