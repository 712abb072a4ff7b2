//! Device registry: discovered devices and per-device engine state

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use chrono::Utc;

use crate::models::{Device, DeviceAssignment, Rgb};

#[derive(Default)]
struct Inner {
    devices: BTreeMap<String, Device>,
    assignments: BTreeMap<String, DeviceAssignment>,
    selected: BTreeSet<String>,
    /// Last color actually sent per device, for change suppression.
    last_sent: BTreeMap<String, Rgb>,
}

/// The set of known devices plus their engine-side configuration.
///
/// All methods take short write or read locks; nothing holds a lock across
/// an await point.
#[derive(Default)]
pub struct DeviceRegistry {
    inner: RwLock<Inner>,
}

impl DeviceRegistry {
    pub fn new(selected: BTreeSet<String>, assignments: BTreeMap<String, DeviceAssignment>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                selected,
                assignments,
                ..Default::default()
            }),
        }
    }

    /// Replace the device set from a discovery run.
    ///
    /// Re-discovery is the only way devices disappear; runtime state
    /// (last-sent color) survives for ids that are still present.
    pub fn sync_discovered(&self, discovered: Vec<Device>) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let ids: BTreeSet<String> = discovered.iter().map(|d| d.id.clone()).collect();
        inner.last_sent.retain(|id, _| ids.contains(id));
        inner.devices = discovered.into_iter().map(|d| (d.id.clone(), d)).collect();
    }

    pub fn devices(&self) -> Vec<Device> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.devices.values().cloned().collect()
    }

    pub fn device(&self, id: &str) -> Option<Device> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.devices.get(id).cloned()
    }

    /// Selected devices, in stable id order.
    pub fn selected_devices(&self) -> Vec<Device> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .devices
            .values()
            .filter(|d| inner.selected.contains(&d.id))
            .cloned()
            .collect()
    }

    /// Effective assignment; presence-only when unset.
    pub fn assignment(&self, id: &str) -> DeviceAssignment {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.assignments.get(id).copied().unwrap_or_default()
    }

    pub fn set_assignment(&self, id: &str, assignment: DeviceAssignment) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.assignments.insert(id.to_string(), assignment);
    }

    /// True when `color` differs from the last color sent to `id`.
    pub fn needs_update(&self, id: &str, color: Rgb) -> bool {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.last_sent.get(id) != Some(&color)
    }

    /// Record a successful command: remember the color, mark reachable.
    pub fn record_sent(&self, id: &str, color: Rgb) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.last_sent.insert(id.to_string(), color);
        if let Some(device) = inner.devices.get_mut(id) {
            device.reachable = true;
            device.last_update = Some(Utc::now());
        }
    }

    /// Record a failed command against one device.
    pub fn record_failure(&self, id: &str) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(device) = inner.devices.get_mut(id) {
            device.reachable = false;
            device.last_update = Some(Utc::now());
        }
    }

    /// Last color actually sent, for display.
    pub fn last_sent(&self, id: &str) -> Option<Rgb> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.last_sent.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Capability;

    fn device(id: &str) -> Device {
        Device {
            id: id.to_string(),
            sku: "H6159".to_string(),
            name: format!("lamp {id}"),
            capabilities: vec![Capability::ColorRgb, Capability::Power],
            reachable: true,
            last_update: None,
        }
    }

    #[test]
    fn test_default_assignment_is_presence() {
        let registry = DeviceRegistry::default();
        assert_eq!(registry.assignment("x"), DeviceAssignment::Presence);
    }

    #[test]
    fn test_needs_update_suppresses_repeat_colors() {
        let registry = DeviceRegistry::default();
        registry.sync_discovered(vec![device("a")]);

        let red = Rgb::new(255, 0, 0);
        assert!(registry.needs_update("a", red));
        registry.record_sent("a", red);
        assert!(!registry.needs_update("a", red));
        assert!(registry.needs_update("a", Rgb::new(0, 255, 0)));
    }

    #[test]
    fn test_sync_preserves_state_for_surviving_ids() {
        let registry = DeviceRegistry::default();
        registry.sync_discovered(vec![device("a"), device("b")]);
        registry.record_sent("a", Rgb::new(1, 2, 3));
        registry.record_sent("b", Rgb::new(4, 5, 6));

        // "b" disappears on re-discovery.
        registry.sync_discovered(vec![device("a")]);
        assert_eq!(registry.last_sent("a"), Some(Rgb::new(1, 2, 3)));
        assert_eq!(registry.last_sent("b"), None);
        assert!(registry.device("b").is_none());
    }

    #[test]
    fn test_failure_marks_unreachable() {
        let registry = DeviceRegistry::default();
        registry.sync_discovered(vec![device("a")]);
        registry.record_failure("a");
        assert!(!registry.device("a").unwrap().reachable);
        registry.record_sent("a", Rgb::new(9, 9, 9));
        assert!(registry.device("a").unwrap().reachable);
    }

    #[test]
    fn test_selected_devices_filters() {
        let mut selected = BTreeSet::new();
        selected.insert("a".to_string());
        let registry = DeviceRegistry::new(selected, BTreeMap::new());
        registry.sync_discovered(vec![device("a"), device("b")]);

        let names: Vec<String> = registry
            .selected_devices()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(names, vec!["a".to_string()]);
    }
}
