//! Placement engine simulation entry point
//!
//! Drives the engine with in-memory collaborators: a floor plane, a device
//! walking towards it, one placement, a drag, an annotation and a tracked
//! reference object.

use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc;
use glam::{Mat4, Quat, Vec2, Vec3};
use placement_core::{
    AnchorEvent, InspectionCatalog, InteractionMode, ModelDescriptor, Placeable,
    ReferenceAnchorUpdate, ReferenceObjectAnchor, ViewMode,
};
use placement_engine::{
    Collaborators, ConfigManager, Engine, MemoryMaterializer, MemoryPersistence,
    MemoryPlaneRegistry, MemoryScene, PlaneAnchor, PlaneAnchorUpdate, SimulatedDevice,
};

#[tokio::main]
async fn main() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "placement_engine=debug,placement_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting placement simulation");

    let config = ConfigManager::new();
    tracing::info!("Using config file {:?}", config.config_file_path());

    let planes = Arc::new(MemoryPlaneRegistry::new());
    let device = Arc::new(SimulatedDevice::new());
    let persistence = Arc::new(MemoryPersistence::new());
    let collaborators = Collaborators {
        persistence: persistence.clone(),
        planes: planes.clone(),
        materializer: Arc::new(MemoryMaterializer::new()),
        device: device.clone(),
        scene: Arc::new(MemoryScene::new(planes)),
    };

    let mut engine = Engine::from_config(config.config(), collaborators);
    engine.update(|manager| {
        manager.register_placeable(Placeable::new(
            ModelDescriptor::new("pump").with_display_name("Water Pump"),
            Vec3::new(0.4, 0.5, 0.3),
        ));
        if let Some(path) = std::env::args().nth(1) {
            match InspectionCatalog::from_path(std::path::Path::new(&path)) {
                Ok(catalog) => manager.set_inspection_catalog(catalog),
                Err(e) => tracing::warn!("Ignoring inspection catalog: {}", e),
            }
        }
    });

    let (plane_tx, plane_rx) = mpsc::unbounded();
    let (reference_tx, reference_rx) = mpsc::unbounded();
    engine.consume_plane_updates(plane_rx);
    engine.consume_reference_updates(reference_rx);
    engine.start_maintenance();

    device.set_pose(Mat4::from_translation(Vec3::new(0.0, 1.6, 0.0)));
    let floor = PlaneAnchorUpdate {
        event: AnchorEvent::Added,
        anchor: PlaneAnchor::horizontal(Mat4::IDENTITY, Vec2::splat(8.0)),
    };
    if plane_tx.unbounded_send(floor).is_err() {
        tracing::error!("Plane stream closed");
    }

    // Crouch until the tilted ray finds the floor within reach
    for step in 0..=12 {
        let height = 1.6 - step as f32 * 0.1;
        device.set_pose(Mat4::from_translation(Vec3::new(0.0, height, 0.0)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        if engine.snapshot().plane_to_project_on_found {
            tracing::info!("Found a plane to place on at device height {:.1} m", height);
            break;
        }
    }

    if let Err(e) = engine.update(|manager| manager.select_by_file_name("pump")) {
        tracing::error!("{}", e);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let placed = match engine.place_selected_object() {
        Ok(Some(placed)) => placed,
        Ok(None) => {
            tracing::warn!("Nothing was placed");
            engine.shutdown().await;
            return;
        }
        Err(e) => {
            tracing::error!("Placement failed: {}", e);
            engine.shutdown().await;
            return;
        }
    };
    engine.wait_for_attachments().await;
    tracing::info!(
        "World anchor of {}: {:?}",
        placed.file_name,
        persistence.anchor_for(placed.id)
    );

    // Look at the object head-on to highlight it and drop an annotation
    let eye = placed.position() + Vec3::new(0.0, 0.0, 1.0);
    device.set_pose(Mat4::from_rotation_translation(
        Quat::from_rotation_x(15f32.to_radians()),
        eye,
    ));
    engine.update(|manager| manager.set_view_mode(ViewMode::AddAnnotation));
    tokio::time::sleep(Duration::from_millis(50)).await;
    if let Some(id) = engine.update(|manager| manager.commit_annotation()) {
        tracing::info!("Added annotation {}", id);
    }

    engine.update(|manager| {
        manager.set_interaction_mode(Some(InteractionMode::LeftRight));
        manager.update_mode_drag(Vec3::new(0.3, 0.0, 0.0));
        manager.end_drag();
    });
    tokio::time::sleep(Duration::from_millis(600)).await;

    let reference = ReferenceAnchorUpdate {
        event: AnchorEvent::Updated,
        anchor: ReferenceObjectAnchor {
            id: uuid::Uuid::new_v4(),
            reference_file: Some("pump.referenceobject".to_string()),
            origin_from_anchor: Mat4::from_translation(placed.position() + Vec3::X * 0.05),
        },
    };
    engine.update(|manager| manager.set_interaction_mode(Some(InteractionMode::ObjectTracking)));
    if reference_tx.unbounded_send(reference).is_err() {
        tracing::error!("Reference object stream closed");
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = engine.snapshot();
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to serialize snapshot: {}", e),
    }

    engine.shutdown().await;
}
