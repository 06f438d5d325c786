//! Client configuration (§6): the allowlist of peripheral UUIDs a
//! `CentralManager` connects to, plus a log-level hint for the embedding
//! application. No persisted state and no I/O here — loading/saving is
//! left to the caller, same boundary as the original `SystemConfig`.

use serde::{Deserialize, Serialize};

/// Host-side configuration for the MT link client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Peripheral UUID strings the central manager scans/connects for.
    pub allowed_peripheral_uuids: Vec<String>,
    /// Hint for the embedding application's logger; the crate itself
    /// only ever calls into the `log` facade.
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            allowed_peripheral_uuids: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_allowlisted_peripherals() {
        let config = ClientConfig::default();
        assert!(config.allowed_peripheral_uuids.is_empty());
        assert_eq!(config.log_level, "info");
    }
}
