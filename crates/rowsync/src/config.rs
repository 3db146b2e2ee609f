//! Repository configuration.
//!
//! `SyncConfig` holds the settings that change statement generation. It is
//! plain data (serde-enabled) so it can be embedded in an application's own
//! configuration file; the connector and debug sink are runtime objects and
//! are handed to [`RepositoryBuilder`](crate::RepositoryBuilder) instead.

use rowsync_core::ExtensionColumn;
use serde::{Deserialize, Serialize};

/// Statement generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Fold attributes without a declared column into the extension column.
    ///
    /// Only takes effect on tables that actually have that column. When off,
    /// such attributes are rejected with `ColumnNotFound`.
    pub extension_storage: bool,

    /// Name and type of the extension column.
    pub extension: ExtensionColumn,
}

impl SyncConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable extension storage.
    pub fn extension_storage(mut self, enabled: bool) -> Self {
        self.extension_storage = enabled;
        self
    }

    /// Use a different extension column.
    pub fn extension_column(mut self, name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        self.extension = ExtensionColumn {
            name: name.into(),
            sql_type: sql_type.into(),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::new();
        assert!(!config.extension_storage);
        assert_eq!(config.extension.name, "attributes");
        assert_eq!(config.extension.sql_type, "hstore");
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::new()
            .extension_storage(true)
            .extension_column("extra", "hstore");
        assert!(config.extension_storage);
        assert_eq!(config.extension.name, "extra");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"extension_storage": true}"#).expect("parse config");
        assert!(config.extension_storage);
        assert_eq!(config.extension, ExtensionColumn::default());

        let round: SyncConfig =
            serde_json::from_value(serde_json::to_value(&config).expect("serialize"))
                .expect("deserialize");
        assert_eq!(round, config);
    }
}
