use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::image_ref::{classify, ImageRef};
use crate::temporal::now_millis;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Prefix carried by every image id minted by Atelier.
pub const MINTED_IMAGE_PREFIX: &str = "img-";

/// Prefix carried by every board id minted by Atelier.
pub const MINTED_BOARD_PREFIX: &str = "board-";

fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Parse the millisecond component out of `{prefix}{millis}-{suffix}`.
fn minted_millis(raw: &str, prefix: &str) -> Option<i64> {
    let rest = raw.strip_prefix(prefix)?;
    let (millis, suffix) = rest.split_once('-')?;
    if suffix.is_empty() {
        return None;
    }
    millis.parse().ok()
}

/// An image identifier as it appears in board membership lists.
///
/// The string is either self-describing (a `data:`, `blob:` or `http(s)://`
/// reference that carries its own location) or an opaque record key that
/// must be looked up. Use [`ImageId::to_ref`] to classify it once at the
/// boundary instead of sniffing prefixes at each call site.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// Wrap an existing identifier without validation.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Mint a fresh opaque id of the form `img-{unix_millis}-{suffix}`.
    pub fn mint() -> Self {
        Self(format!(
            "{MINTED_IMAGE_PREFIX}{}-{}",
            now_millis(),
            random_suffix(9)
        ))
    }

    /// The raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this id carries its own bytes or location.
    pub fn is_self_describing(&self) -> bool {
        classify(&self.0).self_describing
    }

    /// Returns `true` if this id was produced by [`ImageId::mint`].
    pub fn is_minted(&self) -> bool {
        self.minted_at().is_some()
    }

    /// The creation time embedded in a minted id, in Unix milliseconds.
    pub fn minted_at(&self) -> Option<i64> {
        minted_millis(&self.0, MINTED_IMAGE_PREFIX)
    }

    /// Classify this id into a typed reference.
    pub fn to_ref(&self) -> ImageRef {
        ImageRef::classify(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Inline data URLs can be megabytes long.
        match self.0.char_indices().nth(48) {
            Some((cut, _)) => write!(f, "ImageId({}…)", &self.0[..cut]),
            None => write!(f, "ImageId({})", self.0),
        }
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for ImageId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl AsRef<str> for ImageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A board identifier.
///
/// Exactly one board carries the reserved id [`BoardId::DEFAULT`]; it is
/// created at first run and can never be deleted. Minted ids never collide
/// with it because they always start with `board-`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(String);

impl BoardId {
    /// Raw value of the reserved default board id.
    pub const DEFAULT: &'static str = "default";

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The reserved default board id.
    pub fn default_board() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// Mint a fresh id of the form `board-{unix_millis}-{suffix}`.
    pub fn mint() -> Self {
        Self(format!(
            "{MINTED_BOARD_PREFIX}{}-{}",
            now_millis(),
            random_suffix(13)
        ))
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BoardId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for BoardId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}
