//! Presentation-facing projection of the object model and sync state.
//!
//! Nothing here is stored: a frame is derived on demand, so zone colours always
//! reflect the latest hazard fields.

use serde::Serialize;

use crate::geometry::{Axis, Vector3D};
use crate::model::{ObjectId, ObjectKind, ObjectModel, SpatialObject};
use crate::risk::{appearance, can_extinguish, zone_status, ZoneAppearance, ZoneStatus};
use crate::sync::{PathStatus, SyncEngine};

/// Height at which the "you are here" marker is drawn.
pub const MARKER_HEIGHT: f32 = 0.1;

/// Zones whose centres lie within this distance (m) count as nearby when
/// judging whether an extinguisher is in reach.
pub const NEARBY_RADIUS: f32 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneDrawable {
    pub name: String,
    pub people_cnt: u32,
    #[serde(flatten)]
    pub appearance: ZoneAppearance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Drawable {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub position: Vector3D,
    pub size: Vector3D,
    pub rotation: Vector3D,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<ZoneDrawable>,
}

impl Drawable {
    pub fn of(object: &SpatialObject) -> Self {
        let zone = object.zone().map(|zone| ZoneDrawable {
            name: object.display_name().unwrap_or(object.id.as_str()).to_string(),
            people_cnt: zone.people_cnt,
            appearance: appearance(zone, &object.size),
        });

        Self {
            id: object.id.clone(),
            kind: object.kind(),
            position: object.position,
            size: object.size,
            rotation: object.rotation,
            zone,
        }
    }
}

/// Everything needed to draw one frame of the viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneFrame {
    pub drawables: Vec<Drawable>,
    pub route: Vec<Vector3D>,
    pub path_status: PathStatus,
    pub current_marker: Option<Vector3D>,
}

impl SceneFrame {
    /// A frame with no sync state, as shown by the builder.
    pub fn of_model(model: &ObjectModel) -> Self {
        Self {
            drawables: model.list().iter().map(Drawable::of).collect(),
            route: Vec::new(),
            path_status: PathStatus::Unknown,
            current_marker: None,
        }
    }

    pub fn of_engine(engine: &SyncEngine) -> Self {
        let current_marker = engine
            .current_zone()
            .and_then(|zone| engine.index().get(zone))
            .map(|position| position.with(Axis::Y, MARKER_HEIGHT));

        Self {
            drawables: engine.model().list().iter().map(Drawable::of).collect(),
            route: engine.route().to_vec(),
            path_status: engine.path_status(),
            current_marker,
        }
    }
}

/// The zone details popup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneDetails {
    pub zone_id: String,
    pub name: String,
    pub status: ZoneStatus,
    pub fire_percent: f32,
    pub smoke_percent: f32,
    pub knife: bool,
    pub people_cnt: u32,
    pub congestion_label: &'static str,
    pub extinguisher: bool,
    pub stair: bool,
    pub can_extinguish: bool,
}

impl ZoneDetails {
    /// Details of the zone named `name`, or `None` if the model has no such zone.
    pub fn of(model: &ObjectModel, name: &str) -> Option<Self> {
        let object = model.zone_named(name)?;
        let zone = object.zone()?;

        let nearby = model
            .of_kind(ObjectKind::Zone)
            .filter(|other| (other.position.0 - object.position.0).norm() <= NEARBY_RADIUS)
            .filter_map(SpatialObject::zone);

        Some(Self {
            zone_id: zone.zone_id.clone(),
            name: name.to_string(),
            status: zone_status(zone),
            fire_percent: zone.fire_level * 100.0,
            smoke_percent: zone.smoke_level * 100.0,
            knife: zone.knife,
            people_cnt: zone.people_cnt,
            congestion_label: appearance(zone, &object.size).congestion_label,
            extinguisher: zone.extinguisher,
            stair: zone.stair,
            can_extinguish: can_extinguish(zone, nearby),
        })
    }
}
