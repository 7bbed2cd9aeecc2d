//! Floor-plan persistence.
//!
//! [`FloorPlanStore`] is the narrow key-value contract the core relies on;
//! [`SledFloorPlanStore`] is the embedded implementation.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::model::SpatialObject;

const FLOOR_PLANS_TREE: &str = "floor_plans";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("floor-plan {0} already exists")]
    AlreadyExists(FloorPlanKey),

    #[error("invalid floor-plan key: {0}")]
    InvalidKey(String),

    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("failed to (de)serialize floor-plan: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Unique key of a floor-plan: building name plus signed floor number
/// (negative floors are below ground).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FloorPlanKey {
    pub building_name: String,
    pub floor: i32,
}

impl FloorPlanKey {
    pub fn new(building_name: impl Into<String>, floor: i32) -> Self {
        Self {
            building_name: building_name.into(),
            floor,
        }
    }

    /// `"3F"` above ground, `"B2"` below, `"0F"` for floor zero.
    pub fn floor_label(&self) -> String {
        floor_label(self.floor)
    }

    fn validate(&self) -> Result<(), StoreError> {
        let name = self.building_name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidKey("building name is empty".to_string()));
        }
        if self.building_name.contains('/') {
            return Err(StoreError::InvalidKey(format!(
                "building name {:?} contains '/'",
                self.building_name
            )));
        }
        Ok(())
    }

    fn storage_key(&self) -> String {
        format!("{}/{}", self.building_name, self.floor)
    }
}

impl fmt::Display for FloorPlanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.building_name, self.floor_label())
    }
}

pub fn floor_label(floor: i32) -> String {
    if floor < 0 {
        format!("B{}", floor.unsigned_abs())
    } else {
        format!("{floor}F")
    }
}

/// The persisted aggregate for one building floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorPlan {
    pub building_name: String,
    pub floor: i32,
    pub objects: Vec<SpatialObject>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FloorPlan {
    pub fn key(&self) -> FloorPlanKey {
        FloorPlanKey::new(self.building_name.clone(), self.floor)
    }
}

/// Persistence collaborator keyed by `(building_name, floor)`.
#[async_trait]
pub trait FloorPlanStore: Send + Sync {
    async fn exists(&self, key: &FloorPlanKey) -> Result<bool, StoreError>;

    /// Stores a new floor-plan. Fails with [`StoreError::AlreadyExists`] if the
    /// key is taken, leaving the stored plan untouched.
    async fn create(&self, key: &FloorPlanKey, objects: Vec<SpatialObject>)
        -> Result<(), StoreError>;

    async fn read(&self, key: &FloorPlanKey) -> Result<Option<FloorPlan>, StoreError>;

    /// Overwrites (or inserts) the objects of a floor-plan without an existence check.
    async fn update(&self, key: &FloorPlanKey, objects: Vec<SpatialObject>)
        -> Result<(), StoreError>;

    /// Floors stored for a building, ascending.
    async fn list_floors(&self, building_name: &str) -> Result<Vec<i32>, StoreError>;

    async fn list_buildings(&self) -> Result<Vec<String>, StoreError>;
}

/// Sled-backed [`FloorPlanStore`]. Plans are JSON values keyed `"{building}/{floor}"`.
pub struct SledFloorPlanStore {
    db: sled::Db,
    plans: sled::Tree,
}

impl Drop for SledFloorPlanStore {
    fn drop(&mut self) {
        // Ensure pending writes hit disk.
        if let Err(e) = self.db.flush() {
            error!(error = %e, "failed to flush floor-plan store on drop");
        }
    }
}

impl fmt::Debug for SledFloorPlanStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledFloorPlanStore")
            .field("plans_len", &self.plans.len())
            .finish()
    }
}

impl SledFloorPlanStore {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Wraps an already-open Sled handle (e.g. a temporary test database).
    pub fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let plans = db.open_tree(FLOOR_PLANS_TREE)?;
        Ok(Self { db, plans })
    }

    fn decode(bytes: &[u8]) -> Result<FloorPlan, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn write(&self, key: &FloorPlanKey, plan: &FloorPlan) -> Result<(), StoreError> {
        let value = serde_json::to_vec(plan)?;
        self.plans.insert(key.storage_key().as_bytes(), value)?;
        self.plans.flush()?;
        Ok(())
    }
}

#[async_trait]
impl FloorPlanStore for SledFloorPlanStore {
    async fn exists(&self, key: &FloorPlanKey) -> Result<bool, StoreError> {
        key.validate()?;
        Ok(self.plans.contains_key(key.storage_key().as_bytes())?)
    }

    async fn create(
        &self,
        key: &FloorPlanKey,
        objects: Vec<SpatialObject>,
    ) -> Result<(), StoreError> {
        key.validate()?;

        let now = Utc::now();
        let plan = FloorPlan {
            building_name: key.building_name.clone(),
            floor: key.floor,
            objects,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_vec(&plan)?;

        // Insert only if absent, so two racing creates cannot both win.
        let swapped = self.plans.compare_and_swap(
            key.storage_key().as_bytes(),
            None as Option<&[u8]>,
            Some(value),
        )?;
        if swapped.is_err() {
            return Err(StoreError::AlreadyExists(key.clone()));
        }
        self.plans.flush()?;

        info!(
            building = %key.building_name,
            floor = key.floor,
            objects = plan.objects.len(),
            "floor-plan created"
        );
        Ok(())
    }

    async fn read(&self, key: &FloorPlanKey) -> Result<Option<FloorPlan>, StoreError> {
        key.validate()?;
        match self.plans.get(key.storage_key().as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        key: &FloorPlanKey,
        objects: Vec<SpatialObject>,
    ) -> Result<(), StoreError> {
        key.validate()?;

        let now = Utc::now();
        let created_at = match self.plans.get(key.storage_key().as_bytes())? {
            Some(bytes) => Self::decode(&bytes).map(|p| p.created_at).unwrap_or(now),
            None => now,
        };

        let plan = FloorPlan {
            building_name: key.building_name.clone(),
            floor: key.floor,
            objects,
            created_at,
            updated_at: now,
        };
        self.write(key, &plan)?;

        info!(
            building = %key.building_name,
            floor = key.floor,
            objects = plan.objects.len(),
            "floor-plan updated"
        );
        Ok(())
    }

    async fn list_floors(&self, building_name: &str) -> Result<Vec<i32>, StoreError> {
        let prefix = format!("{building_name}/");
        let mut floors: Vec<i32> = self
            .plans
            .scan_prefix(prefix.as_bytes())
            .keys()
            .filter_map(|res| res.ok())
            .filter_map(|k| {
                let key_str = String::from_utf8(k.to_vec()).ok()?;
                key_str.strip_prefix(&prefix)?.parse::<i32>().ok()
            })
            .collect();

        floors.sort_unstable();
        Ok(floors)
    }

    async fn list_buildings(&self) -> Result<Vec<String>, StoreError> {
        let mut buildings: Vec<String> = Vec::new();

        for key in self.plans.iter().keys() {
            let key = key?;
            let Ok(key_str) = String::from_utf8(key.to_vec()) else {
                debug!("skipping non-utf8 floor-plan key");
                continue;
            };
            let Some((building, _)) = key_str.rsplit_once('/') else {
                continue;
            };
            // Keys are ordered, so repeats of a building are adjacent.
            if buildings.last().map(String::as_str) != Some(building) {
                buildings.push(building.to_string());
            }
        }

        Ok(buildings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::model::{ObjectKind, ObjectModel};

    fn temp_store() -> SledFloorPlanStore {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .expect("failed to open temporary sled db");
        SledFloorPlanStore::from_db(db).expect("failed to open floor-plan tree")
    }

    fn objects(kinds: &[ObjectKind]) -> Vec<SpatialObject> {
        let mut model = ObjectModel::new(BuildConfig::default());
        for &kind in kinds {
            model.add(kind);
        }
        model.into_objects()
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected_and_keeps_first_plan() {
        let store = temp_store();
        let key = FloorPlanKey::new("A", 1);
        let first = objects(&[ObjectKind::Wall, ObjectKind::Zone]);
        let second = objects(&[ObjectKind::Stairs]);

        store.create(&key, first.clone()).await.expect("first create");
        let err = store.create(&key, second).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(ref k) if k == &key));

        let stored = store.read(&key).await.expect("read").expect("plan exists");
        assert_eq!(stored.objects, first);
        assert_eq!(stored.building_name, "A");
        assert_eq!(stored.floor, 1);
    }

    #[tokio::test]
    async fn read_of_absent_plan_is_none() {
        let store = temp_store();
        let key = FloorPlanKey::new("A", 3);
        assert!(!store.exists(&key).await.expect("exists"));
        assert!(store.read(&key).await.expect("read").is_none());
    }

    #[tokio::test]
    async fn update_overwrites_objects_and_keeps_created_at() {
        let store = temp_store();
        let key = FloorPlanKey::new("Gwanggaeto", -1);

        store.create(&key, objects(&[ObjectKind::Wall])).await.expect("create");
        let created = store.read(&key).await.expect("read").expect("plan");

        let replacement = objects(&[ObjectKind::Zone, ObjectKind::Elevator]);
        store.update(&key, replacement.clone()).await.expect("update");
        let updated = store.read(&key).await.expect("read").expect("plan");

        assert_eq!(updated.objects, replacement);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn update_without_existing_plan_inserts() {
        let store = temp_store();
        let key = FloorPlanKey::new("Annex", 2);
        store.update(&key, objects(&[ObjectKind::Wall])).await.expect("update");
        assert!(store.exists(&key).await.expect("exists"));
    }

    #[tokio::test]
    async fn floors_are_sorted_numerically() {
        let store = temp_store();
        for floor in [10, -2, 3, 1, -1] {
            store
                .create(&FloorPlanKey::new("Main", floor), Vec::new())
                .await
                .expect("create");
        }
        store
            .create(&FloorPlanKey::new("Mainline", 7), Vec::new())
            .await
            .expect("create");

        let floors = store.list_floors("Main").await.expect("floors");
        assert_eq!(floors, vec![-2, -1, 1, 3, 10]);
        assert!(store.list_floors("Nowhere").await.expect("floors").is_empty());
    }

    #[tokio::test]
    async fn buildings_are_listed_once() {
        let store = temp_store();
        for (building, floor) in [("B", 1), ("A", 1), ("A", 2), ("C", -1)] {
            store
                .create(&FloorPlanKey::new(building, floor), Vec::new())
                .await
                .expect("create");
        }

        let buildings = store.list_buildings().await.expect("buildings");
        assert_eq!(buildings, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn invalid_building_names_are_rejected() {
        let store = temp_store();
        let blank = store.create(&FloorPlanKey::new("  ", 1), Vec::new()).await;
        assert!(matches!(blank, Err(StoreError::InvalidKey(_))));

        let slashed = store.create(&FloorPlanKey::new("a/b", 1), Vec::new()).await;
        assert!(matches!(slashed, Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn floor_labels() {
        assert_eq!(floor_label(3), "3F");
        assert_eq!(floor_label(-2), "B2");
        assert_eq!(floor_label(0), "0F");
        assert_eq!(FloorPlanKey::new("Main", -1).to_string(), "Main B1");
    }
}
