/// Parser and renderer configuration
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The fixed set of built-in extensions plus output shape.
///
/// Every field defaults to `true`, so an empty TOML file yields the same
/// behaviour as [`Options::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// GFM pipe tables.
    pub tables: bool,
    /// `~~struck~~` text.
    pub strikethrough: bool,
    /// `<https://...>` and `<user@host>` links.
    pub autolinks: bool,
    /// Wrap output in a minimal `<!doctype html>` document.
    pub document_shell: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            tables: true,
            strikethrough: true,
            autolinks: true,
            document_shell: true,
        }
    }
}

impl Options {
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let options = Self::from_toml_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded options from {}: {:?}", path.display(), options);
        Ok(options)
    }
}
