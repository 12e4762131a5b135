//! Request keys for cached audio

use crate::error::{AudioCacheError, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static ITEM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

static VARIANT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,32}$").unwrap());

/// A validated (source item id, format selector) pair.
///
/// Neither part may contain `.`, `/` or `%`, so the pair maps onto a single
/// file name under the storage root without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioKey {
    item_id: String,
    variant: String,
}

impl AudioKey {
    pub fn new(item_id: impl Into<String>, variant: impl Into<String>) -> Result<Self> {
        let item_id = item_id.into();
        let variant = variant.into();

        if item_id.is_empty() {
            return Err(AudioCacheError::InvalidKey("item id is empty".to_string()));
        }
        if variant.is_empty() {
            return Err(AudioCacheError::InvalidKey("variant is empty".to_string()));
        }
        if !ITEM_ID_RE.is_match(&item_id) {
            return Err(AudioCacheError::InvalidKey(format!(
                "malformed item id: {:?}",
                item_id
            )));
        }
        if !VARIANT_RE.is_match(&variant) {
            return Err(AudioCacheError::InvalidKey(format!(
                "malformed variant: {:?}",
                variant
            )));
        }

        Ok(Self { item_id, variant })
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// File name for this key: `<item>.<variant>.<extension>`
    pub fn file_name(&self, extension: &str) -> String {
        format!(
            "{}.{}.{}",
            self.item_id,
            self.variant,
            extension.trim_start_matches('.')
        )
    }
}

impl fmt::Display for AudioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.item_id, self.variant)
    }
}
