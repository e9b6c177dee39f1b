//! Configuration model.
//!
//! The persisted configuration is a flat JSON document
//! (`serde_json::Value`).  The supervisor keeps the merged document as the
//! source of truth and parses typed views out of it per pipeline generation:
//! [`DeviceConfig`] for the device/broker layer, [`LightConfig`] for one
//! light module.  Reconfiguration fragments arriving over the wire are
//! merged into the document with [`merge_document`] (new keys override old,
//! nested objects merge recursively) and written back through the
//! configuration store port.
//!
//! Every field carries a default so a bare `{}` is a valid document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::light::LightCommand;
use crate::ports::ConfigError;

// ───────────────────────────────────────────────────────────────
// Device-level view
// ───────────────────────────────────────────────────────────────

/// Device/broker layer configuration, parsed fresh each generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device identity used in topic paths.  Supplied by the outer driver;
    /// this crate never generates IDs.
    pub id: String,
    /// Protocol client identity.  Empty means "derive from `id`".
    pub client_id: String,
    /// Broker host.
    pub server: String,
    /// Broker port.
    pub port: u16,
    /// Incoming-message poll interval for the bridge.
    pub poll_interval_ms: u64,
    /// Transition engine update interval.
    pub update_interval_ms: u64,
    /// Fleet-wide reconfiguration topic, shared by every device.
    pub global_config_topic: String,
    /// Modules to instantiate, keyed by instance name.
    pub modules: BTreeMap<String, ModuleConfig>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut modules = BTreeMap::new();
        modules.insert(
            "light".to_string(),
            ModuleConfig {
                kind: "light".to_string(),
                config: Value::Object(serde_json::Map::new()),
            },
        );
        Self {
            id: "device".to_string(),
            client_id: String::new(),
            server: "localhost".to_string(),
            port: 1883,
            poll_interval_ms: 1000,
            update_interval_ms: 100,
            global_config_topic: "/light/config".to_string(),
            modules,
        }
    }
}

impl DeviceConfig {
    /// Parse a typed view out of the merged document.
    pub fn from_document(document: &Value) -> Result<Self, ConfigError> {
        serde_json::from_value(document.clone())
            .map_err(|_| ConfigError::ValidationFailed("document does not describe a device config"))
    }

    /// Effective protocol client identity.
    pub fn effective_client_id(&self) -> String {
        if self.client_id.is_empty() {
            format!("lightbridge-{}", self.id)
        } else {
            self.client_id.clone()
        }
    }

    /// Topic for one module binding: `/<id>/<module>/<suffix>`.
    pub fn module_topic(&self, module: &str, suffix: &str) -> String {
        format!("/{}/{}/{}", self.id, module, suffix)
    }

    /// This device's reconfiguration topic: `/<id>/config`.
    pub fn config_topic(&self) -> String {
        format!("/{}/config", self.id)
    }
}

/// One module entry in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Registry tag selecting the module implementation.
    pub kind: String,
    /// Module-specific configuration, parsed by the module itself.
    #[serde(default)]
    pub config: Value,
}

// ───────────────────────────────────────────────────────────────
// Light module view
// ───────────────────────────────────────────────────────────────

/// Hardware and topic configuration for one tri-color light module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub red_pin: u32,
    pub green_pin: u32,
    pub blue_pin: u32,
    pub pwm_freq_hz: u32,
    /// Pushed into the control channel at startup, as if it had arrived
    /// over the wire.  `None` leaves the light dark until commanded.
    pub default_state: Option<LightCommand>,
    pub topics: LightTopics,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            red_pin: 14,
            green_pin: 5,
            blue_pin: 12,
            pwm_freq_hz: 1000,
            default_state: None,
            topics: LightTopics::default(),
        }
    }
}

/// Topic suffixes for one light module's bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightTopics {
    pub control: String,
    pub state: String,
    pub get_state: String,
}

impl Default for LightTopics {
    fn default() -> Self {
        Self {
            control: "control".to_string(),
            state: "state".to_string(),
            get_state: "get_state".to_string(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Document merge
// ───────────────────────────────────────────────────────────────

/// Merge `fragment` into `document` in place.
///
/// Objects merge key-wise and recursively; any other value (including a
/// whole array) replaces the old value outright.
pub fn merge_document(document: &mut Value, fragment: Value) {
    match (document, fragment) {
        (Value::Object(base), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match base.get_mut(&key) {
                    Some(existing) => merge_document(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (document, fragment) => *document = fragment,
    }
}

// ── Tests ────────────────────────────────────────────────────
