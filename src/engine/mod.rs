//! Sync engine: polling loops, recompute and dispatch
//!
//! Two independent polling loops publish the latest presence and calendar
//! snapshots into most-recent-wins watch slots. The recompute loop reacts
//! to either slot changing (plus a low-frequency safety tick), resolves a
//! target color per selected device, and fans the changes out through the
//! dispatcher. Recomputation is cheap and pure, so a slightly stale
//! snapshot mid-recompute is fine -- the next trigger repeats it.

pub mod countdown;
pub mod dispatch;
pub mod mapping;
pub mod resolver;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{self, GraphClient};
use crate::config::{Config, PollConfig};
use crate::engine::countdown::MeetingTrackerConfig;
use crate::engine::dispatch::DeviceController;
use crate::engine::mapping::ColorMapping;
use crate::error::Error;
use crate::govee::DeviceRegistry;
use crate::models::{CalendarEvent, PresenceSnapshot, Rgb};

/// How far ahead the calendar poll looks.
const CALENDAR_LOOKAHEAD_HOURS: i64 = 24;

pub struct Engine {
    graph: GraphClient,
    controller: Arc<dyn DeviceController>,
    registry: Arc<DeviceRegistry>,
    mapping: ColorMapping,
    tracker_config: MeetingTrackerConfig,
    poll: PollConfig,
    presence_tx: watch::Sender<Option<PresenceSnapshot>>,
    calendar_tx: watch::Sender<Arc<Vec<CalendarEvent>>>,
    last_error_tx: watch::Sender<Option<String>>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        graph: GraphClient,
        controller: Arc<dyn DeviceController>,
        registry: Arc<DeviceRegistry>,
        config: &Config,
    ) -> Self {
        let (presence_tx, _) = watch::channel(None);
        let (calendar_tx, _) = watch::channel(Arc::new(Vec::new()));
        let (last_error_tx, _) = watch::channel(None);
        Self {
            graph,
            controller,
            registry,
            mapping: config.colors.clone(),
            tracker_config: config.tracker.clone(),
            poll: config.poll.clone(),
            presence_tx,
            calendar_tx,
            last_error_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops all loops when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Latest presence snapshot, for display layers.
    pub fn presence(&self) -> watch::Receiver<Option<PresenceSnapshot>> {
        self.presence_tx.subscribe()
    }

    /// Latest upcoming-event collection, for display layers.
    pub fn calendar(&self) -> watch::Receiver<Arc<Vec<CalendarEvent>>> {
        self.calendar_tx.subscribe()
    }

    /// Most recent error condition, for display layers.
    pub fn last_error(&self) -> watch::Receiver<Option<String>> {
        self.last_error_tx.subscribe()
    }

    /// Current meeting tracker state, for display layers.
    pub fn tracker_state(&self) -> countdown::MeetingTrackerState {
        let events = self.calendar_tx.borrow().clone();
        countdown::evaluate(&self.tracker_config, &events, Utc::now())
    }

    fn report_error(&self, message: String) {
        tracing::warn!("{message}");
        self.last_error_tx.send_replace(Some(message));
    }

    /// Run until cancelled. Spawns the two polling loops and drives the
    /// recompute loop on this task.
    pub async fn run(self: Arc<Self>) {
        // Subscribe before the loops start so no early update is missed.
        let mut presence_rx = self.presence();
        let mut calendar_rx = self.calendar();

        let presence_loop: JoinHandle<()> = tokio::spawn(self.clone().presence_loop());
        let calendar_loop: JoinHandle<()> = tokio::spawn(self.clone().calendar_loop());
        let mut safety = tokio::time::interval(Duration::from_secs(self.poll.safety_secs.max(1)));
        safety.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                changed = presence_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.recompute_and_dispatch().await;
                }
                changed = calendar_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.recompute_and_dispatch().await;
                }
                _ = safety.tick() => {
                    self.recompute_and_dispatch().await;
                }
            }
        }

        let _ = presence_loop.await;
        let _ = calendar_loop.await;
        tracing::info!("Engine stopped");
    }

    async fn presence_loop(self: Arc<Self>) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.poll.presence_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            match api::fetch_presence(&self.graph).await {
                Ok(snapshot) => {
                    self.presence_tx.send_if_modified(|current| {
                        let same = current.as_ref().is_some_and(|c| {
                            c.availability == snapshot.availability
                                && c.activity == snapshot.activity
                        });
                        if same {
                            false
                        } else {
                            tracing::info!("Presence changed: {}", snapshot.availability);
                            *current = Some(snapshot);
                            true
                        }
                    });
                }
                Err(Error::AuthExpired) => {
                    // A cleared session cannot recover without interactive
                    // login; stop polling instead of hammering the API.
                    self.report_error("authentication expired; stopping".into());
                    self.cancel.cancel();
                }
                Err(e) => {
                    // Keep the previous snapshot on transient failures.
                    self.report_error(format!("presence poll failed: {e}"));
                }
            }
        }
    }

    async fn calendar_loop(self: Arc<Self>) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.poll.calendar_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            match api::fetch_upcoming(&self.graph, CALENDAR_LOOKAHEAD_HOURS).await {
                Ok(events) => {
                    self.calendar_tx.send_if_modified(|current| {
                        if **current == events {
                            false
                        } else {
                            tracing::info!("Calendar updated: {} upcoming events", events.len());
                            *current = Arc::new(events);
                            true
                        }
                    });
                }
                Err(Error::AuthExpired) => {
                    self.report_error("authentication expired; stopping".into());
                    self.cancel.cancel();
                }
                Err(e) => {
                    self.report_error(format!("calendar poll failed: {e}"));
                }
            }
        }
    }

    /// Resolve a target color for every selected device and dispatch the
    /// ones that changed.
    pub async fn recompute_and_dispatch(&self) {
        let now = Utc::now();
        let presence = self.presence_tx.borrow().clone();
        let events = self.calendar_tx.borrow().clone();
        let events: &[CalendarEvent] = &events;
        let tracker = countdown::evaluate(&self.tracker_config, events, now);

        let targets: Vec<_> = self
            .registry
            .selected_devices()
            .into_iter()
            .filter(|d| d.supports_color())
            .map(|device| {
                let color: Rgb = resolver::resolve_color(&resolver::ResolverInputs {
                    assignment: self.registry.assignment(&device.id),
                    presence: presence.as_ref(),
                    events,
                    tracker_config: &self.tracker_config,
                    tracker: &tracker,
                    mapping: &self.mapping,
                    now,
                });
                (device, color)
            })
            .collect();

        let outcomes =
            dispatch::dispatch_colors(self.controller.as_ref(), &self.registry, &targets).await;
        for outcome in outcomes {
            if let Err(e) = outcome.result {
                self.report_error(format!("device {} update failed: {e}", outcome.device_id));
            }
        }
    }
}
