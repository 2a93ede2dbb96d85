//! Inspection points defined per object and the results recorded against them
//!
//! The catalogue is a JSON array of entries:
//!
//! ```json
//! [{ "objectName": "pump", "inspectionType": "InspectionPointForCount",
//!    "inspectionName": "Bolts", "inspectionPoint": { "x": 10, "y": 5, "z": 0 } }]
//! ```
//!
//! Points are given in centimetres in the object's local frame.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::InspectionError;
use crate::placeable::PlacedInstance;

const CENTIMETRES_PER_METRE: f32 = 100.0;

/// What an inspection point asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InspectionKind {
    #[serde(rename = "InspectionPointForCount")]
    Count,
    #[serde(rename = "InspectionPointForDescription")]
    Description,
    #[serde(rename = "InspectionPointForYesNoQuestion")]
    YesNoQuestion,
}

impl InspectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionKind::Count => "InspectionPointForCount",
            InspectionKind::Description => "InspectionPointForDescription",
            InspectionKind::YesNoQuestion => "InspectionPointForYesNoQuestion",
        }
    }
}

impl FromStr for InspectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "InspectionPointForCount" => Ok(InspectionKind::Count),
            "InspectionPointForDescription" => Ok(InspectionKind::Description),
            "InspectionPointForYesNoQuestion" => Ok(InspectionKind::YesNoQuestion),
            other => Err(format!("Invalid inspection type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectionPointRecord {
    object_name: String,
    inspection_type: String,
    inspection_name: String,
    inspection_point: PositionRecord,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct PositionRecord {
    x: f32,
    y: f32,
    z: f32,
}

/// One inspection point of an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionPoint {
    pub name: String,
    pub kind: InspectionKind,
    /// Local position in centimetres
    pub position_cm: Vec3,
}

impl InspectionPoint {
    /// Local position in metres
    pub fn local_position(&self) -> Vec3 {
        self.position_cm / CENTIMETRES_PER_METRE
    }
}

/// A marker generated for an inspection point of a placed instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionMarker {
    pub name: String,
    pub kind: InspectionKind,
    pub label: String,
    pub world_position: Vec3,
    /// Cancels the instance scale so markers keep their size
    pub scale: Vec3,
}

/// Inspection points grouped by object file name, one per kind
#[derive(Debug, Clone, Default)]
pub struct InspectionCatalog {
    by_object: BTreeMap<String, BTreeMap<InspectionKind, InspectionPoint>>,
}

impl InspectionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, InspectionError> {
        let records: Vec<InspectionPointRecord> = serde_json::from_str(json)?;
        let mut catalog = Self::new();

        for record in records {
            let kind = match record.inspection_type.parse::<InspectionKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    tracing::warn!("{}", e);
                    continue;
                }
            };
            let position = record.inspection_point;
            catalog.insert(
                record.object_name,
                InspectionPoint {
                    name: record.inspection_name,
                    kind,
                    position_cm: Vec3::new(position.x, position.y, position.z),
                },
            );
        }

        tracing::info!("Loaded inspection points for {} objects", catalog.by_object.len());
        Ok(catalog)
    }

    pub fn from_path(path: &Path) -> Result<Self, InspectionError> {
        let json = std::fs::read_to_string(path).map_err(|source| InspectionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Add a point; a later point of the same kind replaces the earlier one
    pub fn insert(&mut self, object_name: impl Into<String>, point: InspectionPoint) {
        self.by_object
            .entry(object_name.into())
            .or_default()
            .insert(point.kind, point);
    }

    pub fn points_for(&self, object_name: &str) -> Option<&BTreeMap<InspectionKind, InspectionPoint>> {
        let points = self.by_object.get(object_name);
        if points.is_none() {
            tracing::debug!("No inspection points found for object: {}", object_name);
        }
        points
    }

    pub fn is_empty(&self) -> bool {
        self.by_object.is_empty()
    }

    /// Markers for every inspection point of `instance`, in world space
    pub fn markers_for(&self, instance: &PlacedInstance) -> Vec<InspectionMarker> {
        let Some(points) = self.points_for(&instance.file_name) else {
            return Vec::new();
        };
        let scale = instance.highlight_ui().counter_scale;

        points
            .values()
            .enumerate()
            .map(|(index, point)| InspectionMarker {
                name: format!("{}_InspectionButton{}", instance.file_name, index),
                kind: point.kind,
                label: point.name.clone(),
                world_position: instance.to_world(point.local_position()),
                scale,
            })
            .collect()
    }
}

/// Values recorded by an inspector at one point
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionResult {
    pub name: String,
    pub count: Option<u32>,
    pub description: Option<String>,
    pub is_correct: Option<bool>,
}

/// Partial update of an [`InspectionResult`]; `None` fields are left as they are
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectionUpdate {
    pub count: Option<u32>,
    pub description: Option<String>,
    pub is_correct: Option<bool>,
}

/// Recorded results keyed by object file name and kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InspectionResults {
    by_object: BTreeMap<String, BTreeMap<InspectionKind, InspectionResult>>,
}

impl InspectionResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        object_name: &str,
        kind: InspectionKind,
        name: &str,
        update: InspectionUpdate,
    ) -> &InspectionResult {
        let result = self
            .by_object
            .entry(object_name.to_string())
            .or_default()
            .entry(kind)
            .or_insert_with(|| InspectionResult {
                name: name.to_string(),
                ..Default::default()
            });

        if let Some(count) = update.count {
            result.count = Some(count);
        }
        if let Some(description) = update.description {
            result.description = Some(description);
        }
        if let Some(is_correct) = update.is_correct {
            result.is_correct = Some(is_correct);
        }
        result
    }

    pub fn get(&self, object_name: &str, kind: InspectionKind) -> Option<&InspectionResult> {
        self.by_object.get(object_name)?.get(&kind)
    }

    pub fn for_object(&self, object_name: &str) -> Option<&BTreeMap<InspectionKind, InspectionResult>> {
        self.by_object.get(object_name)
    }

    pub fn clear(&mut self) {
        self.by_object.clear();
    }
}
