//! Command dispatch: fan out color updates across devices
//!
//! One concurrent task per device, all funneled through the shared rate
//! limiter inside the controller, so parallelism is bounded by the request
//! budget rather than the device count. Outcomes are device-local; a
//! failing device never blocks its siblings, and there is no retry here --
//! the next recompute cycle is the retry.

use futures::future::BoxFuture;

use crate::error::Result;
use crate::govee::{Command, DeviceRegistry, GoveeClient};
use crate::models::{Device, Rgb};

/// Seam between the dispatcher and the vendor client.
pub trait DeviceController: Send + Sync {
    fn set_color<'a>(&'a self, device: &'a Device, color: Rgb) -> BoxFuture<'a, Result<()>>;
}

impl DeviceController for GoveeClient {
    fn set_color<'a>(&'a self, device: &'a Device, color: Rgb) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.control(&device.id, &device.sku, Command::Color(color)).await })
    }
}

/// Result of one device's update.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub device_id: String,
    pub result: Result<()>,
}

/// Push target colors to every device whose color actually changed.
///
/// Success records the sent color (suppressing the next identical send) and
/// marks the device reachable; failure marks it unreachable and is reported
/// in the outcome list.
pub async fn dispatch_colors(
    controller: &dyn DeviceController,
    registry: &DeviceRegistry,
    targets: &[(Device, Rgb)],
) -> Vec<DispatchOutcome> {
    let tasks = targets
        .iter()
        .filter(|(device, color)| registry.needs_update(&device.id, *color))
        .map(|(device, color)| async move {
            let result = controller.set_color(device, *color).await;
            match &result {
                Ok(()) => {
                    registry.record_sent(&device.id, *color);
                    tracing::debug!("Device {} -> {}", device.id, color);
                }
                Err(e) => {
                    registry.record_failure(&device.id);
                    tracing::warn!("Device {} update failed: {}", device.id, e);
                }
            }
            DispatchOutcome {
                device_id: device.id.clone(),
                result,
            }
        });

    futures::future::join_all(tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::Capability;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyController {
        fail_id: &'static str,
        calls: AtomicUsize,
    }

    impl DeviceController for FlakyController {
        fn set_color<'a>(&'a self, device: &'a Device, _color: Rgb) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if device.id == self.fail_id {
                    Err(Error::RateLimited)
                } else {
                    Ok(())
                }
            })
        }
    }

    fn device(id: &str) -> Device {
        Device {
            id: id.to_string(),
            sku: "H6159".to_string(),
            name: id.to_string(),
            capabilities: vec![Capability::ColorRgb],
            reachable: true,
            last_update: None,
        }
    }

    fn registry_with(ids: &[&str]) -> DeviceRegistry {
        let registry = DeviceRegistry::new(
            ids.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            Default::default(),
        );
        registry.sync_discovered(ids.iter().map(|id| device(id)).collect());
        registry
    }

    #[tokio::test]
    async fn test_partial_failure_is_device_local() {
        let registry = registry_with(&["a", "b", "c"]);
        let controller = FlakyController {
            fail_id: "b",
            calls: AtomicUsize::new(0),
        };
        let red = Rgb::new(255, 0, 0);
        let targets = vec![
            (device("a"), red),
            (device("b"), red),
            (device("c"), red),
        ];

        let outcomes = dispatch_colors(&controller, &registry, &targets).await;
        assert_eq!(outcomes.len(), 3);

        let ok: Vec<_> = outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.device_id.as_str())
            .collect();
        assert_eq!(ok, vec!["a", "c"]);

        assert!(registry.device("a").unwrap().reachable);
        assert!(!registry.device("b").unwrap().reachable);
        assert_eq!(registry.last_sent("a"), Some(red));
        assert_eq!(registry.last_sent("b"), None);
    }

    #[tokio::test]
    async fn test_unchanged_colors_are_suppressed() {
        let registry = registry_with(&["a", "b"]);
        let controller = FlakyController {
            fail_id: "none",
            calls: AtomicUsize::new(0),
        };
        let red = Rgb::new(255, 0, 0);
        let targets = vec![(device("a"), red), (device("b"), red)];

        let outcomes = dispatch_colors(&controller, &registry, &targets).await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(controller.calls.load(Ordering::SeqCst), 2);

        // Same targets again: nothing changed, nothing sent.
        let outcomes = dispatch_colors(&controller, &registry, &targets).await;
        assert!(outcomes.is_empty());
        assert_eq!(controller.calls.load(Ordering::SeqCst), 2);

        // A failed device is retried on the next cycle since its send was
        // never recorded.
        registry.record_failure("a");
        let targets = vec![(device("a"), Rgb::new(0, 255, 0))];
        let outcomes = dispatch_colors(&controller, &registry, &targets).await;
        assert_eq!(outcomes.len(), 1);
    }
}
