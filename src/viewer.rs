//! Viewer session: browse stored floor-plans, pick the current zone and watch
//! the hazard overlay.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::click::{Click, ClickDisambiguator};
use crate::config::BuildConfig;
use crate::model::ObjectModel;
use crate::runner::{RunnerError, SyncHandle};
use crate::scene::{SceneFrame, ZoneDetails};
use crate::store::{FloorPlanKey, FloorPlanStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("no floor-plan stored for {key}")]
    NotFound { key: FloorPlanKey },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// What the host should do in response to a zone click.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerAction {
    ShowDetails(ZoneDetails),
    CurrentZoneChanged(String),
}

pub struct Viewer {
    store: Arc<dyn FloorPlanStore>,
    build: BuildConfig,
    sync: SyncHandle,
    clicks: ClickDisambiguator<String>,
    opened: Option<FloorPlanKey>,
}

impl Viewer {
    pub fn new(
        store: Arc<dyn FloorPlanStore>,
        build: BuildConfig,
        sync: SyncHandle,
        double_click_window: Duration,
    ) -> Self {
        Self {
            store,
            build,
            sync,
            clicks: ClickDisambiguator::new(double_click_window),
            opened: None,
        }
    }

    /// The floor-plan currently shown, if one was opened from the store.
    pub fn opened(&self) -> Option<&FloorPlanKey> {
        self.opened.as_ref()
    }

    pub fn sync(&self) -> &SyncHandle {
        &self.sync
    }

    pub async fn list_buildings(&self) -> Result<Vec<String>, ViewerError> {
        Ok(self.store.list_buildings().await?)
    }

    pub async fn list_floors(&self, building_name: &str) -> Result<Vec<i32>, ViewerError> {
        Ok(self.store.list_floors(building_name).await?)
    }

    /// Loads a stored floor-plan into the overlay. On any failure the objects
    /// currently shown are kept.
    pub async fn open(&mut self, key: &FloorPlanKey) -> Result<(), ViewerError> {
        let Some(plan) = self.store.read(key).await? else {
            warn!(building = %key.building_name, floor = key.floor, "floor-plan not found");
            return Err(ViewerError::NotFound { key: key.clone() });
        };

        let model = ObjectModel::from_objects(self.build, plan.objects);
        info!(
            building = %key.building_name,
            floor = key.floor,
            objects = model.len(),
            "floor-plan opened"
        );
        self.sync.load(model).await?;
        self.opened = Some(key.clone());
        Ok(())
    }

    /// Makes `zone` the user's location and polls for it right away.
    pub async fn select_current_zone(&mut self, zone: Option<String>) -> Result<(), ViewerError> {
        let polling = zone.is_some();
        self.sync.set_current_zone(zone).await?;
        if polling {
            self.sync.poll_now().await?;
        }
        Ok(())
    }

    /// Feeds a click on the zone named `zone`.
    pub async fn click_zone(
        &mut self,
        zone: impl Into<String>,
        now: Instant,
    ) -> Result<Option<ViewerAction>, ViewerError> {
        match self.clicks.click(zone.into(), now) {
            Some(click) => self.resolve(click).await,
            None => Ok(None),
        }
    }

    /// Resolves a pending single click once the double-click window has passed.
    pub async fn poll_clicks(&mut self, now: Instant) -> Result<Option<ViewerAction>, ViewerError> {
        match self.clicks.poll(now) {
            Some(click) => self.resolve(click).await,
            None => Ok(None),
        }
    }

    /// When [`Viewer::poll_clicks`] next has something to resolve.
    pub fn click_deadline(&self) -> Option<Instant> {
        self.clicks.deadline()
    }

    async fn resolve(&mut self, click: Click<String>) -> Result<Option<ViewerAction>, ViewerError> {
        match click {
            Click::Single(zone) => Ok(self
                .sync
                .zone_details(zone)
                .await?
                .map(ViewerAction::ShowDetails)),
            Click::Double(zone) => {
                self.select_current_zone(Some(zone.clone())).await?;
                Ok(Some(ViewerAction::CurrentZoneChanged(zone)))
            }
        }
    }

    pub async fn frame(&self) -> Result<SceneFrame, ViewerError> {
        Ok(self.sync.frame().await?)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::broadcast;

    use super::*;
    use crate::config::SyncConfig;
    use crate::model::ObjectKind;
    use crate::oracle::{EscapePath, HazardOracle, OracleError, OracleResponse};
    use crate::runner;
    use crate::sample::second_floor;
    use crate::store::SledFloorPlanStore;
    use crate::sync::{SyncEngine, SyncEvent};

    const WINDOW: Duration = Duration::from_millis(300);

    /// Always routes from the asked zone to the first stair landmark.
    struct StairOracle;

    #[async_trait]
    impl HazardOracle for StairOracle {
        async fn query(&self, current_location: &str) -> Result<OracleResponse, OracleError> {
            Ok(OracleResponse {
                analysis: Vec::new(),
                escape_path: Some(EscapePath {
                    path: Some(vec![current_location.to_string(), "계단1".to_string()]),
                    ..EscapePath::default()
                }),
            })
        }
    }

    fn viewer() -> (Viewer, Arc<SledFloorPlanStore>) {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .expect("failed to open temporary sled db");
        let store =
            Arc::new(SledFloorPlanStore::from_db(db).expect("failed to open floor-plan tree"));

        let build = BuildConfig::default();
        let engine = SyncEngine::new(second_floor(&build));
        let config = SyncConfig {
            poll_interval_ms: 3_600_000,
            ..SyncConfig::default()
        };
        let (handle, _task) = runner::spawn(engine, Arc::new(StairOracle), &config);

        (Viewer::new(store.clone(), build, handle, WINDOW), store)
    }

    async fn next_event(events: &mut broadcast::Receiver<SyncEvent>) -> SyncEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event within timeout")
            .expect("event channel open")
    }

    #[tokio::test]
    async fn missing_plan_keeps_current_objects() {
        let (mut viewer, _store) = viewer();
        let before = viewer.frame().await.expect("frame");

        let err = viewer.open(&FloorPlanKey::new("Main", 9)).await.unwrap_err();
        assert!(matches!(err, ViewerError::NotFound { ref key } if key.floor == 9));
        assert_eq!(viewer.frame().await.expect("frame"), before);
        assert!(viewer.opened().is_none());
    }

    #[tokio::test]
    async fn opening_a_plan_replaces_the_sample_floor() {
        let (mut viewer, store) = viewer();
        let mut model = ObjectModel::new(BuildConfig::default());
        model.add(ObjectKind::Wall);
        model.add(ObjectKind::Zone);
        let key = FloorPlanKey::new("Main", -1);
        store.create(&key, model.to_vec()).await.expect("create");
        store
            .create(&FloorPlanKey::new("Main", 2), Vec::new())
            .await
            .expect("create");

        assert_eq!(viewer.list_buildings().await.expect("buildings"), vec!["Main"]);
        assert_eq!(viewer.list_floors("Main").await.expect("floors"), vec![-1, 2]);

        viewer.open(&key).await.expect("open");
        let frame = viewer.frame().await.expect("frame");
        assert_eq!(frame.drawables.len(), 2);
        assert_eq!(viewer.opened(), Some(&key));
    }

    #[tokio::test]
    async fn double_click_sets_current_zone_and_polls() {
        let (mut viewer, _store) = viewer();
        let mut events = viewer.sync().subscribe();
        let t0 = Instant::now();

        assert_eq!(viewer.click_zone("201호", t0).await.expect("click"), None);
        let action = viewer
            .click_zone("201호", t0 + Duration::from_millis(100))
            .await
            .expect("click");
        assert_eq!(action, Some(ViewerAction::CurrentZoneChanged("201호".to_string())));

        assert_eq!(next_event(&mut events).await, SyncEvent::RouteFound);
        let frame = viewer.frame().await.expect("frame");
        assert_eq!(frame.route.len(), 2);
        assert!(frame.current_marker.is_some());
        // The resolved double click leaves nothing pending.
        assert_eq!(viewer.poll_clicks(t0 + Duration::from_secs(1)).await.expect("poll"), None);
    }

    #[tokio::test]
    async fn single_click_shows_details_after_window() {
        let (mut viewer, _store) = viewer();
        let t0 = Instant::now();

        viewer.click_zone("206호", t0).await.expect("click");
        assert_eq!(viewer.click_deadline(), Some(t0 + WINDOW));
        assert_eq!(
            viewer.poll_clicks(t0 + Duration::from_millis(100)).await.expect("poll"),
            None
        );

        let action = viewer.poll_clicks(t0 + WINDOW).await.expect("poll");
        let Some(ViewerAction::ShowDetails(details)) = action else {
            panic!("expected zone details, got {action:?}");
        };
        assert_eq!(details.name, "206호");
        assert_eq!(details.zone_id, "zone-206");
        assert!(details.knife);
        assert_eq!(details.people_cnt, 5);
    }
}
