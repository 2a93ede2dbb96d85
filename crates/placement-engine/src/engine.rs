//! Async orchestration around the placement manager
//!
//! The engine runs the paced maintenance loops and the anchor stream
//! consumers as tokio tasks. Every task mutates the [`PlacementManager`]
//! through short critical sections on the shared lock; collaborator calls
//! that await run outside the lock and their results are applied afterwards.

use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use placement_core::{FusionOutcome, PlacedInstance, PlacementResult, ReferenceAnchorUpdate};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::collaborators::{Persistence, PlaneAnchorUpdate, WorldAnchorUpdate};
use crate::config::{EngineConfig, SchedulerConfig};
use crate::fusion::consume_stream;
use crate::manager::{Collaborators, PlacementManager, SharedManager};
use crate::scheduler::{Shutdown, spawn_paced};
use crate::snapshot::SceneSnapshot;

/// Publish `snapshot` unless observers already hold an equal one
fn publish(snapshots: &watch::Sender<SceneSnapshot>, snapshot: SceneSnapshot) {
    snapshots.send_if_modified(|current| {
        if *current == snapshot {
            return false;
        }
        *current = snapshot;
        true
    });
}

pub struct Engine {
    manager: SharedManager,
    persistence: Arc<dyn Persistence>,
    scheduler: SchedulerConfig,
    shutdown: Shutdown,
    snapshots: Arc<watch::Sender<SceneSnapshot>>,
    loops: Vec<JoinHandle<PlacementResult<u64>>>,
    consumers: Vec<JoinHandle<u64>>,
    attachments: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(manager: SharedManager, scheduler: SchedulerConfig) -> Self {
        let (persistence, snapshot) = {
            let manager = manager.lock();
            (
                manager.collaborators().persistence.clone(),
                manager.snapshot(),
            )
        };
        let (snapshots, _) = watch::channel(snapshot);

        Self {
            manager,
            persistence,
            scheduler,
            shutdown: Shutdown::new(),
            snapshots: Arc::new(snapshots),
            loops: Vec::new(),
            consumers: Vec::new(),
            attachments: Mutex::new(Vec::new()),
        }
    }

    /// Build the manager from a configuration and wrap it in an engine
    pub fn from_config(config: &EngineConfig, collaborators: Collaborators) -> Self {
        let manager = PlacementManager::new(config, collaborators).into_shared();
        Self::new(manager, config.scheduler)
    }

    pub fn manager(&self) -> &SharedManager {
        &self.manager
    }

    /// Observe published scene snapshots
    pub fn subscribe(&self) -> watch::Receiver<SceneSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Run `f` against the manager and publish the resulting snapshot
    pub fn update<R>(&self, f: impl FnOnce(&mut PlacementManager) -> R) -> R {
        let (result, snapshot) = {
            let mut manager = self.manager.lock();
            let result = f(&mut manager);
            (result, manager.snapshot())
        };
        publish(&self.snapshots, snapshot);
        result
    }

    // ============== Maintenance loops ==============

    /// Start the device-pose, detach and reattach loops
    pub fn start_maintenance(&mut self) {
        if !self.loops.is_empty() {
            tracing::warn!("Maintenance loops are already running");
            return;
        }

        let device_loop = {
            let manager = self.manager.clone();
            let snapshots = self.snapshots.clone();
            spawn_paced(
                "device pose",
                self.scheduler.device_pose_hz,
                self.shutdown.subscribe(),
                move || {
                    let manager = manager.clone();
                    let snapshots = snapshots.clone();
                    async move {
                        let snapshot = {
                            let mut manager = manager.lock();
                            manager.device_tick();
                            manager.snapshot()
                        };
                        publish(&snapshots, snapshot);
                    }
                },
            )
        };

        let detach_loop = {
            let manager = self.manager.clone();
            let persistence = self.persistence.clone();
            spawn_paced(
                "detach",
                self.scheduler.detach_check_hz,
                self.shutdown.subscribe(),
                move || {
                    let manager = manager.clone();
                    let persistence = persistence.clone();
                    async move {
                        let instances = {
                            let manager = manager.lock();
                            manager.placed_instances()
                        };
                        if instances.is_empty() {
                            return;
                        }
                        let detached = persistence.detach_moved_objects(&instances).await;
                        if !detached.is_empty() {
                            let mut manager = manager.lock();
                            manager.apply_detached(&detached);
                        }
                    }
                },
            )
        };

        let reattach_loop = {
            let manager = self.manager.clone();
            let persistence = self.persistence.clone();
            spawn_paced(
                "reattach",
                self.scheduler.reattach_check_hz,
                self.shutdown.subscribe(),
                move || {
                    let manager = manager.clone();
                    let persistence = persistence.clone();
                    async move {
                        let instances = {
                            let manager = manager.lock();
                            manager.placed_instances()
                        };
                        if instances.is_empty() {
                            return;
                        }
                        let bindings = persistence.reattach_resting_objects(&instances).await;
                        if !bindings.is_empty() {
                            let mut manager = manager.lock();
                            manager.apply_reattached(&bindings);
                        }
                    }
                },
            )
        };

        self.loops.extend([device_loop, detach_loop, reattach_loop]);
        tracing::info!(
            "Started maintenance loops at {}/{}/{} Hz",
            self.scheduler.device_pose_hz,
            self.scheduler.detach_check_hz,
            self.scheduler.reattach_check_hz
        );
    }

    // ============== Anchor streams ==============

    pub fn consume_world_anchor_updates<S>(&mut self, stream: S)
    where
        S: Stream<Item = WorldAnchorUpdate> + Send + 'static,
    {
        let manager = self.manager.clone();
        let shutdown = self.shutdown.subscribe();
        self.consumers.push(tokio::spawn(async move {
            consume_stream("world anchors", stream, shutdown, |update| {
                manager.lock().reconcile_world_anchor(&update);
            })
            .await
        }));
    }

    pub fn consume_plane_updates<S>(&mut self, stream: S)
    where
        S: Stream<Item = PlaneAnchorUpdate> + Send + 'static,
    {
        let manager = self.manager.clone();
        let shutdown = self.shutdown.subscribe();
        self.consumers.push(tokio::spawn(async move {
            consume_stream("plane anchors", stream, shutdown, |update| {
                manager.lock().reconcile_plane(&update);
            })
            .await
        }));
    }

    pub fn consume_reference_updates<S>(&mut self, stream: S)
    where
        S: Stream<Item = ReferenceAnchorUpdate> + Send + 'static,
    {
        let manager = self.manager.clone();
        let snapshots = self.snapshots.clone();
        let shutdown = self.shutdown.subscribe();
        self.consumers.push(tokio::spawn(async move {
            consume_stream("reference objects", stream, shutdown, |update| {
                let (outcome, snapshot) = {
                    let mut manager = manager.lock();
                    let outcome = manager.process_reference_update(&update);
                    (outcome, manager.snapshot())
                };
                if outcome != FusionOutcome::Ignored {
                    publish(&snapshots, snapshot);
                }
            })
            .await
        }));
    }

    // ============== Placement ==============

    /// Place the selection and attach it to a world anchor in the background.
    ///
    /// Attachment failures are logged; the instance stays placed without an
    /// anchor until the reattach loop picks it up. Must be called from within
    /// a tokio runtime.
    pub fn place_selected_object(&self) -> PlacementResult<Option<PlacedInstance>> {
        let Some(instance) = self.update(|manager| manager.place_selected_object())? else {
            return Ok(None);
        };

        let manager = self.manager.clone();
        let persistence = self.persistence.clone();
        let snapshots = self.snapshots.clone();
        let attached = instance.clone();
        let handle = tokio::spawn(async move {
            match persistence.attach(&attached).await {
                Ok(anchor) => {
                    let bound = {
                        let mut manager = manager.lock();
                        manager
                            .bind_world_anchor(attached.id, anchor)
                            .then(|| manager.snapshot())
                    };
                    match bound {
                        Some(snapshot) => publish(&snapshots, snapshot),
                        // Removed while attaching: drop the anchor it no longer needs
                        None => persistence.remove(attached.id),
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to attach {} to a world anchor: {}", attached.file_name, e)
                }
            }
        });
        let mut attachments = self.attachments.lock();
        attachments.retain(|h| !h.is_finished());
        attachments.push(handle);

        Ok(Some(instance))
    }

    /// Wait until every pending world-anchor attachment finished
    pub async fn wait_for_attachments(&self) {
        let pending: Vec<JoinHandle<()>> = self.attachments.lock().drain(..).collect();
        for handle in pending {
            if let Err(e) = handle.await {
                tracing::error!("World anchor attachment task failed: {}", e);
            }
        }
    }

    // ============== Shutdown ==============

    /// Signal every task to stop and wait for them
    pub async fn shutdown(self) {
        self.shutdown.trigger();
        self.wait_for_attachments().await;

        for handle in self.loops {
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!("Maintenance loop ended with error: {}", e),
                Err(e) => tracing::error!("Maintenance loop task failed: {}", e),
            }
        }
        for handle in self.consumers {
            if let Err(e) = handle.await {
                tracing::error!("Anchor stream task failed: {}", e);
            }
        }
        tracing::info!("Engine stopped");
    }
}
