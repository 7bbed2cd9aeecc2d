//! Dappy shared core library: floor-plan modelling and live evacuation overlay.
//!
//! This crate defines:
//! - [`model::ObjectModel`]: the walls, zones, stairs and equipment on one floor.
//! - [`editor::BuilderEditor`]: selection, keyboard nudging and saving for the floor-plan builder.
//! - [`risk`]: pure hazard colour and congestion derivation for zones.
//! - [`sync::SyncEngine`] and [`runner`]: polling the hazard/route oracle and
//!   folding its answers in.
//! - [`viewer::Viewer`]: browsing stored floor-plans and picking the user's current zone.
//! - [`DappyCore`]: wires the above to a Sled store and an HTTP oracle from a
//!   [`config::DappyConfig`].

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

// Re-export so hosts can open or share the floor-plan DB without declaring a direct
// dependency on `sled`.
pub use sled;

pub mod click;
pub mod config;
pub mod editor;
pub mod geometry;
pub mod model;
pub mod oracle;
pub mod resolver;
pub mod risk;
pub mod runner;
pub mod sample;
pub mod scene;
pub mod store;
pub mod sync;
pub mod viewer;

pub use config::DappyConfig;
pub use editor::BuilderEditor;
pub use geometry::Vector3D;
pub use model::{ObjectId, ObjectKind, ObjectModel, SpatialObject, Zone};
pub use oracle::{HazardOracle, HttpOracle};
pub use store::{FloorPlan, FloorPlanKey, FloorPlanStore, SledFloorPlanStore};
pub use sync::{SyncEngine, SyncEvent};
pub use viewer::Viewer;

/// Default on-disk floor-plan database location (Sled).
pub const FLOOR_PLAN_DB_PATH: &str = "dappy_floor_plans";

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("no floor-plan stored for {key}")]
    NotFound { key: FloorPlanKey },

    #[error(transparent)]
    Store(#[from] store::StoreError),

    #[error(transparent)]
    Oracle(#[from] oracle::OracleError),
}

/// Entry point for hosts: owns the configuration and the floor-plan store, and
/// hands out builder and viewer sessions.
pub struct DappyCore {
    config: DappyConfig,
    store: Arc<SledFloorPlanStore>,
}

impl std::fmt::Debug for DappyCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DappyCore")
            .field("storage_path", &self.config.storage.path)
            .field("oracle_url", &self.config.sync.oracle_url)
            .field("store", &self.store)
            .finish()
    }
}

impl DappyCore {
    /// Opens (or creates) the floor-plan database at the configured path.
    pub fn open(config: DappyConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let store = SledFloorPlanStore::open(&config.storage.path)?;
        info!(path = %config.storage.path, "floor-plan store opened");
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    /// Creates a core from an already-open Sled DB handle.
    pub fn from_db(config: DappyConfig, db: sled::Db) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            config,
            store: Arc::new(SledFloorPlanStore::from_db(db)?),
        })
    }

    pub fn config(&self) -> &DappyConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn FloorPlanStore> {
        self.store.clone()
    }

    /// A builder session on an empty floor.
    pub fn new_floor(&self) -> BuilderEditor {
        BuilderEditor::new(self.config.geometry, self.config.editor)
    }

    /// A builder session on a stored floor-plan.
    pub async fn edit_floor(&self, key: &FloorPlanKey) -> Result<BuilderEditor, CoreError> {
        let plan = self
            .store
            .read(key)
            .await?
            .ok_or_else(|| CoreError::NotFound { key: key.clone() })?;

        let model = ObjectModel::from_objects(self.config.geometry, plan.objects);
        Ok(BuilderEditor::with_model(model, self.config.editor))
    }

    /// Starts a viewer polling the configured HTTP oracle. Must be called inside a
    /// tokio runtime.
    pub fn start_viewer(&self) -> Result<(Viewer, JoinHandle<()>), CoreError> {
        let oracle = HttpOracle::new(
            self.config.sync.oracle_url.clone(),
            self.config.sync.oracle_timeout(),
        )?;
        Ok(self.start_viewer_with(Arc::new(oracle)))
    }

    /// Starts a viewer against any oracle. The overlay begins on the built-in
    /// sample floor until a stored plan is opened.
    pub fn start_viewer_with(&self, oracle: Arc<dyn HazardOracle>) -> (Viewer, JoinHandle<()>) {
        let engine = SyncEngine::new(sample::second_floor(&self.config.geometry));
        let (handle, task) = runner::spawn(engine, oracle, &self.config.sync);

        let viewer = Viewer::new(
            self.store(),
            self.config.geometry,
            handle,
            self.config.editor.double_click_window(),
        );
        (viewer, task)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::editor::SaveTarget;
    use crate::oracle::{OracleError, OracleResponse};

    struct SilentOracle;

    #[async_trait]
    impl HazardOracle for SilentOracle {
        async fn query(&self, _current_location: &str) -> Result<OracleResponse, OracleError> {
            Ok(OracleResponse::default())
        }
    }

    fn temp_core() -> DappyCore {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .expect("failed to open temporary sled db");
        DappyCore::from_db(DappyConfig::default(), db).expect("core")
    }

    #[tokio::test]
    async fn built_floor_is_visible_in_viewer() {
        let core = temp_core();
        let key = FloorPlanKey::new("Gwanggaeto", 2);

        let mut editor = core.new_floor();
        editor.set_pending_kind(ObjectKind::Zone);
        editor.add();
        editor.set_pending_kind(ObjectKind::Stairs);
        editor.add();
        editor
            .save(core.store().as_ref(), &SaveTarget::Create(key.clone()))
            .await
            .expect("save");

        let reopened = core.edit_floor(&key).await.expect("edit");
        assert_eq!(reopened.model().list(), editor.model().list());

        let (mut viewer, task) = core.start_viewer_with(Arc::new(SilentOracle));
        assert_eq!(viewer.frame().await.expect("frame").drawables.len(), 17);

        viewer.open(&key).await.expect("open");
        let frame = viewer.frame().await.expect("frame");
        assert_eq!(frame.drawables.len(), 2);
        assert_eq!(frame.drawables[0].kind, ObjectKind::Zone);

        viewer.sync().shutdown().await.expect("shutdown");
        task.await.expect("runner task");
    }

    #[tokio::test]
    async fn editing_a_missing_floor_is_not_found() {
        let core = temp_core();
        let err = core.edit_floor(&FloorPlanKey::new("Nowhere", 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn invalid_config_is_rejected_before_anything_starts() {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .expect("failed to open temporary sled db");
        let mut config = DappyConfig::default();
        config.sync.poll_interval_ms = 0;

        let err = DappyCore::from_db(config.clone(), db).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));

        config.sync.poll_interval_ms = 1_000;
        config.geometry.wall_thickness = f32::NAN;
        let err = DappyCore::open(config).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[tokio::test]
    async fn http_viewer_uses_configured_oracle() {
        let core = temp_core();
        let (viewer, task) = core.start_viewer().expect("viewer");
        assert!(viewer.opened().is_none());

        viewer.sync().shutdown().await.expect("shutdown");
        task.await.expect("runner task");
    }
}
