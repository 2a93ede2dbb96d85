//! End-to-end tests of the engine with in-memory collaborators

use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc;
use glam::{Mat4, Vec2, Vec3};
use placement_core::{
    AnchorEvent, InteractionMode, ModelDescriptor, Placeable, PlacementPhase,
    ReferenceAnchorUpdate, ReferenceObjectAnchor,
};
use placement_engine::{
    Collaborators, Engine, EngineConfig, MemoryMaterializer, MemoryPersistence,
    MemoryPlaneRegistry, MemoryScene, Persistence, PlaneAnchor, PlaneAnchorUpdate, PlaneRegistry,
    SimulatedDevice,
};

struct Harness {
    engine: Engine,
    device: Arc<SimulatedDevice>,
    persistence: Arc<MemoryPersistence>,
    planes: Arc<MemoryPlaneRegistry>,
}

fn harness() -> Harness {
    let planes = Arc::new(MemoryPlaneRegistry::new());
    let device = Arc::new(SimulatedDevice::new());
    device.set_pose(Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)));
    let persistence = Arc::new(MemoryPersistence::new());

    let collaborators = Collaborators {
        persistence: persistence.clone(),
        planes: planes.clone(),
        materializer: Arc::new(MemoryMaterializer::new()),
        device: device.clone(),
        scene: Arc::new(MemoryScene::new(planes.clone())),
    };
    let engine = Engine::from_config(&EngineConfig::new(), collaborators);
    engine.update(|manager| {
        manager.register_placeable(Placeable::new(
            ModelDescriptor::new("pump"),
            Vec3::splat(0.3),
        ))
    });

    Harness {
        engine,
        device,
        persistence,
        planes,
    }
}

fn floor() -> PlaneAnchorUpdate {
    PlaneAnchorUpdate {
        event: AnchorEvent::Added,
        anchor: PlaneAnchor::horizontal(Mat4::IDENTITY, Vec2::splat(10.0)),
    }
}

#[tokio::test(start_paused = true)]
async fn test_plane_stream_enables_placement() {
    let mut h = harness();
    let (tx, rx) = mpsc::unbounded();
    h.engine.consume_plane_updates(rx);
    h.engine.start_maintenance();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!h.engine.snapshot().plane_to_project_on_found);

    tx.unbounded_send(floor()).unwrap();
    h.engine.update(|m| m.select_by_file_name("pump")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = h.engine.snapshot();
    assert!(snapshot.plane_anchors_present);
    assert!(snapshot.plane_to_project_on_found);
    assert!(snapshot.should_show_preview);
    assert!(snapshot.should_show_placement_ui);
    assert_eq!(snapshot.phase, PlacementPhase::Previewing);
    assert_eq!(h.planes.planes().len(), 1);

    h.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_place_attaches_world_anchor() {
    let mut h = harness();
    let (tx, rx) = mpsc::unbounded();
    h.engine.consume_plane_updates(rx);
    tx.unbounded_send(floor()).unwrap();
    h.engine.start_maintenance();

    h.engine.update(|m| m.select_by_file_name("pump")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let placed = h.engine.place_selected_object().unwrap().unwrap();
    h.engine.wait_for_attachments().await;

    let anchor = h.persistence.anchor_for(placed.id);
    assert!(anchor.is_some());
    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.phase, PlacementPhase::Placed);
    assert_eq!(snapshot.placed.as_ref().unwrap().world_anchor, anchor);
    assert!(!snapshot.should_show_placement_ui);

    h.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_removal_before_attach_drops_anchor() {
    let h = harness();
    h.planes.reconcile(&floor());
    h.engine.update(|m| {
        m.select_by_file_name("pump")?;
        m.device_tick();
        Ok::<_, placement_core::PlacementError>(())
    })
    .unwrap();

    // The attach task has not run yet on the current-thread runtime
    let placed = h.engine.place_selected_object().unwrap().unwrap();
    h.engine.update(|m| m.remove_all_placed_objects());
    h.engine.wait_for_attachments().await;

    assert!(h.engine.snapshot().placed.is_none());
    assert!(h.persistence.anchor_for(placed.id).is_none());
    assert_eq!(h.persistence.anchor_count(), 0);
    assert!(h.persistence.lookup(placed.node).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_attach_is_recovered_by_reattach_loop() {
    let mut h = harness();
    let (tx, rx) = mpsc::unbounded();
    h.engine.consume_plane_updates(rx);
    tx.unbounded_send(floor()).unwrap();
    h.engine.start_maintenance();

    h.engine.update(|m| m.select_by_file_name("pump")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.persistence.set_available(false);
    let placed = h.engine.place_selected_object().unwrap().unwrap();
    h.engine.wait_for_attachments().await;
    assert!(h.persistence.anchor_for(placed.id).is_none());
    assert!(h.engine.snapshot().placed.is_some());

    h.persistence.set_available(true);
    // The reattach loop runs at 2 Hz
    tokio::time::sleep(Duration::from_millis(600)).await;
    let anchor = h.persistence.anchor_for(placed.id);
    assert!(anchor.is_some());
    let bound = h.engine.manager().lock().placed_instances()[0].world_anchor;
    assert_eq!(bound, anchor);

    h.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_drag_detaches_then_rest_reattaches() {
    let mut h = harness();
    let (tx, rx) = mpsc::unbounded();
    h.engine.consume_plane_updates(rx);
    tx.unbounded_send(floor()).unwrap();
    h.engine.start_maintenance();

    h.engine.update(|m| m.select_by_file_name("pump")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let placed = h.engine.place_selected_object().unwrap().unwrap();
    h.engine.wait_for_attachments().await;
    let first = h.persistence.anchor_for(placed.id);
    assert!(first.is_some());

    h.engine
        .update(|m| m.update_free_drag(placed.id, Vec3::new(0.4, 0.0, 0.0)));
    // The detach loop runs at 10 Hz
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(h.persistence.anchor_for(placed.id).is_none());
    assert!(h.engine.manager().lock().placed_instances()[0].world_anchor.is_none());

    h.engine.update(|m| m.end_drag());
    tokio::time::sleep(Duration::from_millis(600)).await;
    let second = h.persistence.anchor_for(placed.id);
    assert!(second.is_some());
    assert_ne!(first, second);

    h.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reference_stream_snaps_in_tracking_mode() {
    let mut h = harness();
    let (plane_tx, plane_rx) = mpsc::unbounded();
    let (reference_tx, reference_rx) = mpsc::unbounded();
    h.engine.consume_plane_updates(plane_rx);
    h.engine.consume_reference_updates(reference_rx);
    plane_tx.unbounded_send(floor()).unwrap();
    h.engine.start_maintenance();

    h.engine.update(|m| m.select_by_file_name("pump")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let placed = h.engine.place_selected_object().unwrap().unwrap();
    h.engine
        .update(|m| m.set_interaction_mode(Some(InteractionMode::ObjectTracking)));

    let target = placed.position() + Vec3::new(0.2, 0.0, 0.0);
    reference_tx
        .unbounded_send(ReferenceAnchorUpdate {
            event: AnchorEvent::Updated,
            anchor: ReferenceObjectAnchor {
                id: uuid::Uuid::new_v4(),
                reference_file: Some("pump.referenceobject".to_string()),
                origin_from_anchor: Mat4::from_translation(target),
            },
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let snapshot = h.engine.snapshot();
    assert!(snapshot.tracking_fix_present);
    let moved = snapshot.placed.unwrap();
    assert!(moved.position().abs_diff_eq(target, 1e-5));

    h.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_lost_tracking_keeps_last_location() {
    let mut h = harness();
    let (tx, rx) = mpsc::unbounded();
    h.engine.consume_plane_updates(rx);
    tx.unbounded_send(floor()).unwrap();
    h.engine.start_maintenance();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let before = h.engine.snapshot().placement_pose;

    h.device.lose_tracking();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.engine.snapshot().placement_pose, before);

    h.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_snapshot_updates() {
    let mut h = harness();
    let mut snapshots = h.engine.subscribe();
    let (_tx, rx) = mpsc::unbounded::<PlaneAnchorUpdate>();
    h.engine.consume_plane_updates(rx);
    h.engine.start_maintenance();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(snapshots.has_changed().unwrap());
    snapshots.borrow_and_update();

    h.engine.shutdown().await;
    assert!(snapshots.changed().await.is_err());
}
