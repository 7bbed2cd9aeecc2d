//! Spatial object model: the typed, addressable collection of placeable
//! entities that make up one floor-plan.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::BuildConfig;
use crate::geometry::Vector3D;

/// Stable identifier of a [`SpatialObject`] within a floor-plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh id with the kind as a readable prefix (e.g. `wall-3f2a...`).
    pub fn mint(kind: ObjectKind) -> Self {
        Self(format!("{}-{}", kind.as_str(), Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The placeable entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Wall,
    Zone,
    Extinguisher,
    Stairs,
    Elevator,
    Firehydrant,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::Wall,
        ObjectKind::Zone,
        ObjectKind::Extinguisher,
        ObjectKind::Stairs,
        ObjectKind::Elevator,
        ObjectKind::Firehydrant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Wall => "wall",
            ObjectKind::Zone => "zone",
            ObjectKind::Extinguisher => "extinguisher",
            ObjectKind::Stairs => "stairs",
            ObjectKind::Elevator => "elevator",
            ObjectKind::Firehydrant => "firehydrant",
        }
    }

    /// Human-readable label for object listings.
    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::Wall => "Wall",
            ObjectKind::Zone => "Zone",
            ObjectKind::Extinguisher => "Extinguisher",
            ObjectKind::Stairs => "Stairs (exit)",
            ObjectKind::Elevator => "Elevator",
            ObjectKind::Firehydrant => "Fire hydrant",
        }
    }

    /// Default `(position, size)` for a freshly added object of this kind.
    ///
    /// For stairs, `size` is (per-flight width, total rise, run length).
    pub fn default_geometry(self, build: &BuildConfig) -> (Vector3D, Vector3D) {
        let h = build.wall_height;
        match self {
            ObjectKind::Wall => (
                Vector3D::new(0.0, h / 2.0, 0.0),
                Vector3D::new(2.0, h, build.wall_thickness),
            ),
            ObjectKind::Zone => (
                Vector3D::new(0.0, h / 2.0, 0.0),
                Vector3D::new(2.0, h, 2.0),
            ),
            ObjectKind::Extinguisher => (Vector3D::zero(), Vector3D::new(0.5, 0.7, 0.5)),
            ObjectKind::Stairs => (Vector3D::zero(), Vector3D::new(1.0, h, 0.5)),
            ObjectKind::Elevator => (Vector3D::zero(), Vector3D::new(1.5, 2.5, 1.2)),
            ObjectKind::Firehydrant => (
                Vector3D::new(0.0, h / 2.0, 0.0),
                Vector3D::new(0.4, 0.5, 0.1),
            ),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hazard- and occupancy-bearing state of a zone object.
///
/// `fire_level`, `smoke_level`, `knife` and `people_cnt` are only ever replaced
/// wholesale by hazard sync; `extinguisher` and `stair` are authoring attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Zone {
    #[serde(rename = "zoneId", default)]
    pub zone_id: String,
    #[serde(rename = "fireLevel", default)]
    pub fire_level: f32,
    #[serde(rename = "smokeLevel", default)]
    pub smoke_level: f32,
    #[serde(default)]
    pub knife: bool,
    #[serde(default)]
    pub extinguisher: bool,
    #[serde(default)]
    pub stair: bool,
    #[serde(default)]
    pub people_cnt: u32,
}

impl Zone {
    pub fn new(zone_id: impl Into<String>) -> Self {
        Self {
            zone_id: zone_id.into(),
            ..Self::default()
        }
    }
}

/// Kind-specific payload. Fields exist only on the variant they belong to.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBody {
    Wall,
    Zone { zone: Zone, name: String },
    Extinguisher,
    /// Stairs may carry a display label used as a route landmark.
    Stairs { name: Option<String> },
    Elevator,
    Firehydrant,
}

impl ObjectBody {
    fn default_for(kind: ObjectKind, id: &ObjectId) -> Self {
        match kind {
            ObjectKind::Wall => ObjectBody::Wall,
            ObjectKind::Zone => ObjectBody::Zone {
                zone: Zone::new(id.as_str()),
                name: DEFAULT_ZONE_NAME.to_string(),
            },
            ObjectKind::Extinguisher => ObjectBody::Extinguisher,
            ObjectKind::Stairs => ObjectBody::Stairs { name: None },
            ObjectKind::Elevator => ObjectBody::Elevator,
            ObjectKind::Firehydrant => ObjectBody::Firehydrant,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectBody::Wall => ObjectKind::Wall,
            ObjectBody::Zone { .. } => ObjectKind::Zone,
            ObjectBody::Extinguisher => ObjectKind::Extinguisher,
            ObjectBody::Stairs { .. } => ObjectKind::Stairs,
            ObjectBody::Elevator => ObjectKind::Elevator,
            ObjectBody::Firehydrant => ObjectKind::Firehydrant,
        }
    }
}

/// Label given to zones created in the builder until they are renamed.
pub const DEFAULT_ZONE_NAME: &str = "New zone";

/// A placeable entity on a floor-plan.
///
/// Serializes to the persisted wire shape:
/// `{ id, type, position, size, rotation?, zone?, zoneName? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawObject", into = "RawObject")]
pub struct SpatialObject {
    pub id: ObjectId,
    pub position: Vector3D,
    pub size: Vector3D,
    /// Euler rotation in radians; only `y` is edited.
    pub rotation: Vector3D,
    pub body: ObjectBody,
}

impl SpatialObject {
    pub fn kind(&self) -> ObjectKind {
        self.body.kind()
    }

    pub fn zone(&self) -> Option<&Zone> {
        match &self.body {
            ObjectBody::Zone { zone, .. } => Some(zone),
            _ => None,
        }
    }

    pub fn zone_mut(&mut self) -> Option<&mut Zone> {
        match &mut self.body {
            ObjectBody::Zone { zone, .. } => Some(zone),
            _ => None,
        }
    }

    /// The label route lookups key on: a zone's name, or a stairs label.
    pub fn display_name(&self) -> Option<&str> {
        match &self.body {
            ObjectBody::Zone { name, .. } => Some(name.as_str()),
            ObjectBody::Stairs { name } => name.as_deref(),
            _ => None,
        }
    }

    fn apply(&mut self, patch: ObjectPatch) {
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }

        let kind = self.kind();
        match &mut self.body {
            ObjectBody::Zone { zone, name } => {
                if let Some(new_name) = patch.name {
                    *name = new_name;
                }
                if let Some(extinguisher) = patch.extinguisher {
                    zone.extinguisher = extinguisher;
                }
                if let Some(stair) = patch.stair {
                    zone.stair = stair;
                }
            }
            ObjectBody::Stairs { name } => {
                if let Some(new_name) = patch.name {
                    *name = Some(new_name).filter(|n| !n.is_empty());
                }
            }
            _ => {
                if patch.name.is_some() || patch.extinguisher.is_some() || patch.stair.is_some() {
                    debug!(id = %self.id, %kind, "ignoring attribute patch for kind");
                }
            }
        }
    }
}

/// Partial update merged into an object by [`ObjectModel::patch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPatch {
    pub position: Option<Vector3D>,
    pub size: Option<Vector3D>,
    pub rotation: Option<Vector3D>,
    /// Applies to zones and stairs.
    pub name: Option<String>,
    /// Applies to zones.
    pub extinguisher: Option<bool>,
    /// Applies to zones.
    pub stair: Option<bool>,
}

/// Persisted wire shape of a [`SpatialObject`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawObject {
    id: ObjectId,
    #[serde(rename = "type")]
    kind: ObjectKind,
    position: Vector3D,
    size: Vector3D,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rotation: Option<Vector3D>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    zone: Option<Zone>,
    #[serde(rename = "zoneName", default, skip_serializing_if = "Option::is_none")]
    zone_name: Option<String>,
}

impl From<RawObject> for SpatialObject {
    fn from(raw: RawObject) -> Self {
        let body = match raw.kind {
            ObjectKind::Zone => {
                let mut zone = raw.zone.unwrap_or_default();
                if zone.zone_id.is_empty() {
                    zone.zone_id = raw.id.as_str().to_string();
                }
                let name = raw
                    .zone_name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| raw.id.as_str().to_string());
                ObjectBody::Zone { zone, name }
            }
            ObjectKind::Stairs => ObjectBody::Stairs {
                name: raw.zone_name.filter(|n| !n.is_empty()),
            },
            kind => ObjectBody::default_for(kind, &raw.id),
        };

        Self {
            id: raw.id,
            position: raw.position,
            size: raw.size,
            rotation: raw.rotation.unwrap_or_default(),
            body,
        }
    }
}

impl From<SpatialObject> for RawObject {
    fn from(object: SpatialObject) -> Self {
        let kind = object.kind();
        let (zone, zone_name) = match object.body {
            ObjectBody::Zone { zone, name } => (Some(zone), Some(name)),
            ObjectBody::Stairs { name } => (None, name),
            _ => (None, None),
        };

        Self {
            id: object.id,
            kind,
            position: object.position,
            size: object.size,
            rotation: Some(object.rotation),
            zone,
            zone_name,
        }
    }
}

/// The authoritative, insertion-ordered object collection of the open floor-plan.
#[derive(Debug, Clone)]
pub struct ObjectModel {
    build: BuildConfig,
    objects: Vec<SpatialObject>,
}

impl ObjectModel {
    pub fn new(build: BuildConfig) -> Self {
        Self {
            build,
            objects: Vec::new(),
        }
    }

    /// Builds a model from loaded objects. Later duplicates of an id are re-minted
    /// so the uniqueness invariant holds from the start.
    pub fn from_objects(build: BuildConfig, objects: Vec<SpatialObject>) -> Self {
        let mut seen = HashSet::with_capacity(objects.len());
        let objects = objects
            .into_iter()
            .map(|mut object| {
                if !seen.insert(object.id.clone()) {
                    let fresh = ObjectId::mint(object.kind());
                    warn!(
                        duplicate = %object.id,
                        replacement = %fresh,
                        "duplicate object id in floor-plan"
                    );
                    object.id = fresh.clone();
                    seen.insert(fresh);
                }
                object
            })
            .collect();

        Self { build, objects }
    }

    pub fn build_config(&self) -> &BuildConfig {
        &self.build
    }

    /// Appends a default object of `kind` and returns it.
    pub fn add(&mut self, kind: ObjectKind) -> &SpatialObject {
        let mut id = ObjectId::mint(kind);
        while self.contains(&id) {
            id = ObjectId::mint(kind);
        }

        let (position, size) = kind.default_geometry(&self.build);
        let body = ObjectBody::default_for(kind, &id);
        debug!(%id, %kind, "object added");

        let index = self.objects.len();
        self.objects.push(SpatialObject {
            id,
            position,
            size,
            rotation: Vector3D::zero(),
            body,
        });
        &self.objects[index]
    }

    /// Removes the object with `id`. Absent ids are a no-op.
    pub fn remove(&mut self, id: &ObjectId) -> Option<SpatialObject> {
        let index = self.objects.iter().position(|o| &o.id == id)?;
        debug!(%id, "object removed");
        Some(self.objects.remove(index))
    }

    /// Merges `patch` into the object with `id`. Returns `false` if absent.
    pub fn patch(&mut self, id: &ObjectId, patch: ObjectPatch) -> bool {
        match self.get_mut(id) {
            Some(object) => {
                object.apply(patch);
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> &[SpatialObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.iter().any(|o| &o.id == id)
    }

    pub fn get(&self, id: &ObjectId) -> Option<&SpatialObject> {
        self.objects.iter().find(|o| &o.id == id)
    }

    pub fn get_mut(&mut self, id: &ObjectId) -> Option<&mut SpatialObject> {
        self.objects.iter_mut().find(|o| &o.id == id)
    }

    /// Objects of one kind, in insertion order.
    pub fn of_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &SpatialObject> {
        self.objects.iter().filter(move |o| o.kind() == kind)
    }

    /// Every zone as `(name, zone)`, in insertion order.
    pub fn zones(&self) -> impl Iterator<Item = (&str, &Zone)> {
        self.objects.iter().filter_map(|o| match &o.body {
            ObjectBody::Zone { zone, name } => Some((name.as_str(), zone)),
            _ => None,
        })
    }

    pub fn zones_mut(&mut self) -> impl Iterator<Item = (&str, &mut Zone)> {
        self.objects.iter_mut().filter_map(|o| match &mut o.body {
            ObjectBody::Zone { zone, name } => Some((name.as_str(), zone)),
            _ => None,
        })
    }

    /// Finds a zone object by its display name.
    pub fn zone_named(&self, zone_name: &str) -> Option<&SpatialObject> {
        self.objects
            .iter()
            .find(|o| matches!(&o.body, ObjectBody::Zone { name, .. } if name == zone_name))
    }

    pub fn to_vec(&self) -> Vec<SpatialObject> {
        self.objects.clone()
    }

    pub fn into_objects(self) -> Vec<SpatialObject> {
        self.objects
    }
}
