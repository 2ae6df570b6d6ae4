//! The identifier classifier.
//!
//! Board membership lists store plain strings that may be either opaque
//! record keys or self-describing references. [`classify`] answers the only
//! question most callers need ("does this need a lookup?"), and
//! [`ImageRef::classify`] converts the string once into a typed reference.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::ImageId;

const DATA_PREFIX: &str = "data:";
const BLOB_PREFIX: &str = "blob:";
const HTTP_PREFIX: &str = "http://";
const HTTPS_PREFIX: &str = "https://";
const BASE64_MARKER: &str = ";base64,";
const FALLBACK_MIME: &str = "image/png";

/// Result of classifying an identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    /// `true` when the identifier carries its own bytes or location and must
    /// never be looked up in a store.
    pub self_describing: bool,
}

fn has_prefix(id: &str, prefix: &str) -> bool {
    id.len() >= prefix.len() && id.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Classify an identifier. Pure, no I/O.
///
/// The empty string is opaque; it will simply fail resolution.
pub fn classify(id: &str) -> Classification {
    let self_describing = [DATA_PREFIX, BLOB_PREFIX, HTTP_PREFIX, HTTPS_PREFIX]
        .iter()
        .any(|prefix| has_prefix(id, prefix));
    Classification { self_describing }
}

/// Map a MIME type to the file extension used when writing image bytes.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// A parsed `data:<mime>;base64,<payload>` URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    /// MIME type, `image/png` when the URL omits it.
    pub mime: String,
    /// Base64 payload, not yet decoded.
    pub payload: String,
}

impl InlineImage {
    /// Parse a base64 data URL.
    pub fn parse(url: &str) -> Result<Self, TypeError> {
        if !has_prefix(url, DATA_PREFIX) {
            return Err(TypeError::InvalidDataUrl("missing data: scheme".into()));
        }
        let rest = &url[DATA_PREFIX.len()..];
        let (mime, payload) = rest
            .split_once(BASE64_MARKER)
            .ok_or_else(|| TypeError::InvalidDataUrl("only base64 data URLs are supported".into()))?;
        if payload.is_empty() {
            return Err(TypeError::InvalidDataUrl("empty payload".into()));
        }
        let mime = if mime.is_empty() { FALLBACK_MIME } else { mime };
        Ok(Self {
            mime: mime.to_string(),
            payload: payload.to_string(),
        })
    }

    /// Encode raw bytes as an inline image.
    pub fn from_bytes(data: &[u8], mime: &str) -> Self {
        let mime = if mime.is_empty() { FALLBACK_MIME } else { mime };
        Self {
            mime: mime.to_string(),
            payload: STANDARD.encode(data),
        }
    }

    /// Decode the payload back to bytes.
    pub fn decode(&self) -> Result<Vec<u8>, TypeError> {
        STANDARD
            .decode(self.payload.trim())
            .map_err(|e| TypeError::InvalidBase64(e.to_string()))
    }

    /// Render as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("{DATA_PREFIX}{}{BASE64_MARKER}{}", self.mime, self.payload)
    }

    /// File extension for this image's MIME type.
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime)
    }
}

/// A typed image reference.
///
/// Produced once at the boundary from a raw identifier string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageRef {
    /// Opaque record key; must be resolved through a store or the project
    /// history.
    Opaque(ImageId),
    /// Embedded base64 image data.
    Inline(InlineImage),
    /// Transient local reference (`blob:`), or a `data:` URL that does not
    /// decode. Renderable as-is, never looked up.
    Transient(String),
    /// Remote `http(s)://` URL.
    Remote(String),
}

impl ImageRef {
    pub fn classify(raw: &str) -> Self {
        if has_prefix(raw, DATA_PREFIX) {
            return match InlineImage::parse(raw) {
                Ok(inline) => ImageRef::Inline(inline),
                Err(_) => ImageRef::Transient(raw.to_string()),
            };
        }
        if has_prefix(raw, BLOB_PREFIX) {
            return ImageRef::Transient(raw.to_string());
        }
        if has_prefix(raw, HTTP_PREFIX) || has_prefix(raw, HTTPS_PREFIX) {
            return ImageRef::Remote(raw.to_string());
        }
        ImageRef::Opaque(ImageId::new(raw))
    }

    pub fn is_self_describing(&self) -> bool {
        !matches!(self, ImageRef::Opaque(_))
    }

    /// The opaque key, if this reference needs a lookup.
    pub fn as_opaque(&self) -> Option<&ImageId> {
        match self {
            ImageRef::Opaque(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_inline(&self) -> Option<&InlineImage> {
        match self {
            ImageRef::Inline(inline) => Some(inline),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn classifies_prefix_families() {
        assert!(classify("data:image/png;base64,iVBORw0KGgo=").self_describing);
        assert!(classify("blob:http://localhost:1420/9b1c").self_describing);
        assert!(classify("http://example.com/x.png").self_describing);
        assert!(classify("https://example.com/x.png").self_describing);
        assert!(classify("HTTPS://EXAMPLE.COM/X.PNG").self_describing);
    }

    #[test]
    fn opaque_ids() {
        assert!(!classify("img-1700000000000-abc").self_describing);
        assert!(!classify("").self_describing);
        assert!(!classify("httpfoo").self_describing);
        assert!(!classify("dat").self_describing);
    }

    #[test]
    fn image_ref_variants() {
        assert!(matches!(ImageRef::classify("data:image/png;base64,AAAA"), ImageRef::Inline(_)));
        assert!(matches!(ImageRef::classify("blob:x"), ImageRef::Transient(_)));
        assert!(matches!(ImageRef::classify("https://a/b"), ImageRef::Remote(_)));
        assert_eq!(
            ImageRef::classify("img-1-a").as_opaque(),
            Some(&ImageId::new("img-1-a"))
        );
    }

    #[test]
    fn malformed_data_url_is_still_self_describing() {
        let r = ImageRef::classify("data:text/plain,hello");
        assert!(matches!(r, ImageRef::Transient(_)));
        assert!(r.is_self_describing());
    }

    #[test]
    fn inline_roundtrip() {
        let bytes = [0x89, b'P', b'N', b'G', 0, 1, 2, 3];
        let inline = InlineImage::from_bytes(&bytes, "image/png");
        let url = inline.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        let parsed = InlineImage::parse(&url).unwrap();
        assert_eq!(parsed.decode().unwrap(), bytes);
    }

    #[test]
    fn missing_mime_defaults_to_png() {
        let inline = InlineImage::parse("data:;base64,AAAA").unwrap();
        assert_eq!(inline.mime, "image/png");
        assert_eq!(inline.extension(), "png");
    }

    #[test]
    fn parse_errors() {
        assert!(InlineImage::parse("blob:x").is_err());
        assert!(InlineImage::parse("data:image/png,raw").is_err());
        assert!(InlineImage::parse("data:image/png;base64,").is_err());
        let bad = InlineImage::parse("data:image/png;base64,@@@").unwrap();
        assert!(matches!(bad.decode(), Err(TypeError::InvalidBase64(_))));
    }

    #[test]
    fn mime_extensions() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("IMAGE/JPG"), "jpg");
        assert_eq!(extension_for_mime("image/webp"), "webp");
        assert_eq!(extension_for_mime("image/gif"), "gif");
        assert_eq!(extension_for_mime("image/tiff"), "png");
    }

    proptest! {
        #[test]
        fn classify_agrees_with_image_ref(raw in ".{0,40}") {
            prop_assert_eq!(
                classify(&raw).self_describing,
                ImageRef::classify(&raw).is_self_describing()
            );
        }

        #[test]
        fn inline_bytes_survive_encoding(data in proptest::collection::vec(any::<u8>(), 1..256)) {
            let url = InlineImage::from_bytes(&data, "image/webp").to_data_url();
            let decoded = InlineImage::parse(&url).unwrap().decode().unwrap();
            prop_assert_eq!(decoded, data);
        }
    }
}
