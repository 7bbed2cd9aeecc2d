//! Hazard/route sync engine.
//!
//! Owns the viewer's copy of the object model and folds oracle responses into
//! it. Polls are split into [`SyncEngine::begin_poll`] and
//! [`SyncEngine::complete_poll`] so a scheduler can keep the oracle call in
//! flight while other commands (such as a zone change) are handled; every
//! response is tied to the zone that triggered it and discarded if that zone is
//! no longer current.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::geometry::Vector3D;
use crate::model::ObjectModel;
use crate::oracle::{AnalysisItem, HazardOracle, OracleError, OracleResponse};
use crate::resolver::PositionIndex;

/// Whether the engine is polling at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No current zone.
    Idle,
    Polling,
}

/// Route availability as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    /// Nothing has been reported for the current zone yet.
    Unknown,
    Available,
    Unavailable,
}

/// Observable outcome of a poll.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Hazard fields of this many zones were overwritten.
    HazardsUpdated { zones: usize },
    /// A route appeared after a period without one.
    RouteFound,
    /// Raised once each time the engine enters the no-route state.
    NoRouteAvailable,
    /// A route stop had no known position and was skipped.
    UnresolvedName(String),
    OracleFailed(OracleError),
    StaleResponseDiscarded { zone: String },
}

/// Correlates an oracle call with the zone selection that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTicket {
    zone: String,
    epoch: u64,
}

impl PollTicket {
    pub fn zone(&self) -> &str {
        &self.zone
    }
}

#[derive(Debug, Clone)]
pub struct SyncEngine {
    model: ObjectModel,
    index: PositionIndex,
    current_zone: Option<String>,
    /// Bumped on every current-zone change.
    epoch: u64,
    in_flight: Option<PollTicket>,
    route: Vec<Vector3D>,
    has_path: bool,
    no_route_notified: bool,
}

impl SyncEngine {
    pub fn new(model: ObjectModel) -> Self {
        let index = PositionIndex::build(model.list());
        Self {
            model,
            index,
            current_zone: None,
            epoch: 0,
            in_flight: None,
            route: Vec::new(),
            has_path: false,
            no_route_notified: false,
        }
    }

    /// Swaps in a freshly loaded floor-plan. The current zone is kept; the route
    /// and path state start over, and responses issued against the previous
    /// plan are discarded on arrival.
    pub fn load(&mut self, model: ObjectModel) {
        self.index = PositionIndex::build(model.list());
        self.model = model;
        self.epoch += 1;
        self.reset_path();
        info!(
            objects = self.model.len(),
            names = self.index.len(),
            "floor-plan loaded into sync engine"
        );
    }

    pub fn model(&self) -> &ObjectModel {
        &self.model
    }

    pub fn index(&self) -> &PositionIndex {
        &self.index
    }

    pub fn current_zone(&self) -> Option<&str> {
        self.current_zone.as_deref()
    }

    pub fn state(&self) -> SyncState {
        if self.current_zone.is_some() {
            SyncState::Polling
        } else {
            SyncState::Idle
        }
    }

    pub fn route(&self) -> &[Vector3D] {
        &self.route
    }

    pub fn has_path(&self) -> bool {
        self.has_path
    }

    pub fn path_status(&self) -> PathStatus {
        if self.has_path {
            PathStatus::Available
        } else if self.no_route_notified {
            PathStatus::Unavailable
        } else {
            PathStatus::Unknown
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|ticket| ticket.epoch == self.epoch)
    }

    /// Redirects polling to `zone` (or stops it with `None`). Any response still
    /// outstanding for the previous zone will be discarded on arrival.
    pub fn set_current_zone(&mut self, zone: Option<String>) {
        if self.current_zone == zone {
            return;
        }

        self.epoch += 1;
        info!(from = ?self.current_zone, to = ?zone, "current zone changed");
        self.current_zone = zone;
        self.reset_path();
    }

    fn reset_path(&mut self) {
        self.route.clear();
        self.has_path = false;
        self.no_route_notified = false;
    }

    /// Issues a poll for the current zone, unless one is already outstanding for it.
    pub fn begin_poll(&mut self) -> Option<PollTicket> {
        let zone = self.current_zone.clone()?;
        if self.is_in_flight() {
            debug!(zone = %zone, "previous poll still in flight, skipping tick");
            return None;
        }

        let ticket = PollTicket {
            zone,
            epoch: self.epoch,
        };
        self.in_flight = Some(ticket.clone());
        Some(ticket)
    }

    /// Applies the outcome of the poll identified by `ticket`.
    pub fn complete_poll(
        &mut self,
        ticket: PollTicket,
        result: Result<OracleResponse, OracleError>,
    ) -> Vec<SyncEvent> {
        if self.in_flight.as_ref() == Some(&ticket) {
            self.in_flight = None;
        }

        if ticket.epoch != self.epoch {
            debug!(zone = %ticket.zone, "discarding response for a zone that is no longer current");
            return vec![SyncEvent::StaleResponseDiscarded { zone: ticket.zone }];
        }

        match result {
            Ok(response) => self.apply(response),
            Err(e) => {
                warn!(zone = %ticket.zone, error = %e, "oracle poll failed");
                self.route.clear();
                vec![SyncEvent::OracleFailed(e)]
            }
        }
    }

    /// One complete poll for hosts that drive the engine sequentially.
    pub async fn poll_once(
        &mut self,
        oracle: &dyn HazardOracle,
        timeout: Duration,
    ) -> Vec<SyncEvent> {
        let Some(ticket) = self.begin_poll() else {
            return Vec::new();
        };
        let result = query_with_timeout(oracle, ticket.zone(), timeout).await;
        self.complete_poll(ticket, result)
    }

    fn apply(&mut self, response: OracleResponse) -> Vec<SyncEvent> {
        let mut events = Vec::new();

        let updated = self.merge_hazards(&response.analysis);
        if updated > 0 {
            events.push(SyncEvent::HazardsUpdated { zones: updated });
        }

        match response.usable_route() {
            Some(names) => {
                let (points, missing) = self.index.resolve_route(names.iter().map(String::as_str));
                for name in missing {
                    warn!(name = %name, "no position known for route stop");
                    events.push(SyncEvent::UnresolvedName(name.to_string()));
                }
                self.route = points;

                if !self.has_path {
                    info!(stops = self.route.len(), "evacuation route found");
                    events.push(SyncEvent::RouteFound);
                }
                self.has_path = true;
                self.no_route_notified = false;
            }
            None => {
                self.route.clear();
                if self.has_path || !self.no_route_notified {
                    info!("no evacuation route available");
                    self.has_path = false;
                    self.no_route_notified = true;
                    events.push(SyncEvent::NoRouteAvailable);
                }
            }
        }

        events
    }

    /// Overwrites fire, smoke, knife and head count of every zone whose name has an
    /// analysis item. Returns the number of zones touched.
    fn merge_hazards(&mut self, analysis: &[AnalysisItem]) -> usize {
        let mut by_name: HashMap<&str, &AnalysisItem> = HashMap::with_capacity(analysis.len());
        for item in analysis.iter().filter(|item| !item.zone_id.is_empty()) {
            by_name.entry(item.zone_id.as_str()).or_insert(item);
        }

        let mut updated = 0;
        for (name, zone) in self.model.zones_mut() {
            let Some(item) = by_name.get(name) else {
                continue;
            };
            zone.fire_level = item.fire_level.unwrap_or(0.0);
            zone.smoke_level = item.smoke_level.unwrap_or(0.0);
            zone.knife = item.knife.unwrap_or(false);
            zone.people_cnt = item.people_cnt.unwrap_or(0);
            updated += 1;
        }
        updated
    }
}

/// Queries the oracle, turning an overrun of `timeout` into [`OracleError::Timeout`].
pub async fn query_with_timeout(
    oracle: &dyn HazardOracle,
    zone: &str,
    timeout: Duration,
) -> Result<OracleResponse, OracleError> {
    match tokio::time::timeout(timeout, oracle.query(zone)).await {
        Ok(result) => result,
        Err(_) => Err(OracleError::Timeout(timeout)),
    }
}
