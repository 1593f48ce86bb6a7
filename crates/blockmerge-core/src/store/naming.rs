//! Key naming for merged files.
//!
//! ```text
//! {base_prefix}/{filename}{suffix}     e.g. eth/merged/0000000200.ndjson.gz
//! ```
//!
//! The merger only produces the bare 10-digit filename; prefix and suffix
//! belong to the store so one codec can be deployed under different layouts.

use object_store::path::Path;

use crate::codec::NdjsonCompression;

/// Builder for storage keys.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    /// Base prefix (e.g., "eth/merged")
    base_prefix: String,
    /// Appended to every filename (e.g., ".ndjson.gz")
    suffix: String,
}

impl KeyBuilder {
    /// Create a key builder with the given base prefix and the default
    /// codec's suffix.
    pub fn new(base_prefix: impl Into<String>) -> Self {
        let prefix = base_prefix.into().trim_matches('/').to_string();
        Self {
            base_prefix: prefix,
            suffix: NdjsonCompression::default().suffix().to_string(),
        }
    }

    /// Replace the filename suffix. An empty suffix stores bare filenames.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Key for a merged file.
    ///
    /// Returns: `{base}/{filename}{suffix}`
    pub fn object_key(&self, filename: &str) -> Path {
        let name = Self::sanitize_name(filename);
        if self.base_prefix.is_empty() {
            Path::from(format!("{}{}", name, self.suffix))
        } else {
            Path::from(format!("{}/{}{}", self.base_prefix, name, self.suffix))
        }
    }

    /// Sanitize a filename for use in keys.
    fn sanitize_name(name: &str) -> String {
        name.chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}
