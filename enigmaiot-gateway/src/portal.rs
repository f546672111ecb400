// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Provisioning portal seam
//!
//! The gateway core runs a configuration portal (a captive web page on
//! real hardware). Output adapters register the fields they need when the
//! portal opens and read the entered values back when it closes.

use std::collections::HashMap;

/// One input field on the provisioning portal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalField {
    /// Field identifier
    pub id: &'static str,
    /// Human readable label
    pub label: &'static str,
    /// Pre-filled value
    pub default: String,
    /// Maximum input length in characters
    pub max_len: usize,
}

/// Configuration portal offered by the gateway core
pub trait ConfigPortal {
    /// Register an input field
    fn add_field(&mut self, field: PortalField);

    /// Value entered for `id`, or its default if untouched
    fn field_value(&self, id: &str) -> Option<String>;
}

/// Portal backed by a map, for tests and headless provisioning
#[derive(Debug, Clone, Default)]
pub struct MemoryPortal {
    fields: Vec<PortalField>,
    values: HashMap<String, String>,
}

impl MemoryPortal {
    /// Create an empty portal
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered fields, in registration order
    pub fn fields(&self) -> &[PortalField] {
        &self.fields
    }

    /// Look up a registered field
    pub fn field(&self, id: &str) -> Option<&PortalField> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Simulate user input
    pub fn set_value(&mut self, id: &str, value: impl Into<String>) {
        self.values.insert(id.to_string(), value.into());
    }
}

impl ConfigPortal for MemoryPortal {
    fn add_field(&mut self, field: PortalField) {
        self.fields.retain(|f| f.id != field.id);
        self.fields.push(field);
    }

    fn field_value(&self, id: &str) -> Option<String> {
        self.values
            .get(id)
            .cloned()
            .or_else(|| self.field(id).map(|f| f.default.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: &'static str, default: &str) -> PortalField {
        PortalField {
            id,
            label: id,
            default: default.to_string(),
            max_len: 40,
        }
    }

    #[test]
    fn test_default_then_input() {
        let mut portal = MemoryPortal::new();
        portal.add_field(field("mqtt_server", "broker.local"));
        assert_eq!(portal.field_value("mqtt_server").as_deref(), Some("broker.local"));

        portal.set_value("mqtt_server", "10.0.0.5");
        assert_eq!(portal.field_value("mqtt_server").as_deref(), Some("10.0.0.5"));
        assert_eq!(portal.field_value("mqtt_port"), None);
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut portal = MemoryPortal::new();
        portal.add_field(field("mqtt_port", "1883"));
        portal.add_field(field("mqtt_port", "8883"));
        assert_eq!(portal.fields().len(), 1);
        assert_eq!(portal.field("mqtt_port").unwrap().default, "8883");
    }
}
