//! Zone risk and congestion derivation.
//!
//! Everything here is a pure function of a [`Zone`] and its owning object's size.
//! Nothing is cached: display state is recomputed on every read so it can never
//! go stale when hazard fields change independently of geometry.

use serde::Serialize;

use crate::geometry::Vector3D;
use crate::model::Zone;

/// Reference classroom floor area (m²) occupancy is normalized against.
pub const REFERENCE_AREA: f32 = 4.0;

/// Fire/smoke level above which a zone is too hot to fight with an extinguisher.
pub const EXTINGUISHABLE_LEVEL: f32 = 0.3;

/// Hazard classification of a zone, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardLevel {
    /// A violent incident is in progress; overrides any fire reading.
    ViolentIncident,
    VeryDangerous,
    Dangerous,
    Caution,
    Normal,
}

impl HazardLevel {
    pub fn color(self) -> &'static str {
        match self {
            HazardLevel::ViolentIncident => "#4a1a4a",
            HazardLevel::VeryDangerous => "#ff0000",
            HazardLevel::Dangerous => "#ff6600",
            HazardLevel::Caution => "#ffff00",
            HazardLevel::Normal => "#00ff00",
        }
    }

    pub fn opacity(self) -> f32 {
        match self {
            HazardLevel::Normal => 0.3,
            _ => 0.8,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HazardLevel::ViolentIncident => "violent incident",
            HazardLevel::VeryDangerous => "very dangerous",
            HazardLevel::Dangerous => "dangerous",
            HazardLevel::Caution => "caution",
            HazardLevel::Normal => "normal",
        }
    }
}

/// Occupancy density bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionLevel {
    VeryCrowded,
    Crowded,
    Moderate,
    Spacious,
}

impl CongestionLevel {
    pub fn color(self) -> &'static str {
        match self {
            CongestionLevel::VeryCrowded => "#ff0000",
            CongestionLevel::Crowded => "#ff8800",
            CongestionLevel::Moderate => "#ffdd00",
            CongestionLevel::Spacious => "#00ff00",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CongestionLevel::VeryCrowded => "very crowded",
            CongestionLevel::Crowded => "crowded",
            CongestionLevel::Moderate => "moderate",
            CongestionLevel::Spacious => "spacious",
        }
    }
}

/// Coarse status shown in the zone details popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneStatus {
    ViolentIncident,
    FireOrSmoke,
    Normal,
}

/// Everything the presentation layer needs to paint one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneAppearance {
    pub hazard: HazardLevel,
    pub color: &'static str,
    pub opacity: f32,
    pub congestion: CongestionLevel,
    pub congestion_color: &'static str,
    pub congestion_label: &'static str,
    pub normalized_occupancy: f32,
}

pub fn fire_score(zone: &Zone) -> f32 {
    zone.fire_level.max(zone.smoke_level)
}

pub fn hazard_level(zone: &Zone) -> HazardLevel {
    if zone.knife {
        return HazardLevel::ViolentIncident;
    }

    let score = fire_score(zone);
    if score >= 0.7 {
        HazardLevel::VeryDangerous
    } else if score >= 0.4 {
        HazardLevel::Dangerous
    } else if score > 0.0 {
        HazardLevel::Caution
    } else {
        HazardLevel::Normal
    }
}

/// Head count scaled to one reference classroom: `people / (width * depth) * 4`.
///
/// A zero-area zone yields `0`.
pub fn normalized_occupancy(people_cnt: u32, size: &Vector3D) -> f32 {
    let area = size.x() * size.z();
    if area == 0.0 {
        return 0.0;
    }
    people_cnt as f32 / area * REFERENCE_AREA
}

pub fn congestion_level(normalized: f32) -> CongestionLevel {
    if normalized >= 40.0 {
        CongestionLevel::VeryCrowded
    } else if normalized >= 30.0 {
        CongestionLevel::Crowded
    } else if normalized >= 20.0 {
        CongestionLevel::Moderate
    } else {
        CongestionLevel::Spacious
    }
}

pub fn appearance(zone: &Zone, size: &Vector3D) -> ZoneAppearance {
    let hazard = hazard_level(zone);
    let normalized = normalized_occupancy(zone.people_cnt, size);
    let congestion = congestion_level(normalized);

    ZoneAppearance {
        hazard,
        color: hazard.color(),
        opacity: hazard.opacity(),
        congestion,
        congestion_color: congestion.color(),
        congestion_label: congestion.label(),
        normalized_occupancy: normalized,
    }
}

pub fn zone_status(zone: &Zone) -> ZoneStatus {
    if zone.knife {
        ZoneStatus::ViolentIncident
    } else if zone.fire_level > 0.0 || zone.smoke_level > 0.0 {
        ZoneStatus::FireOrSmoke
    } else {
        ZoneStatus::Normal
    }
}

/// Whether a fire in `zone` is small enough to fight locally: both readings at or
/// below [`EXTINGUISHABLE_LEVEL`] and an extinguisher in one of the `nearby` zones.
pub fn can_extinguish<'a>(zone: &Zone, nearby: impl IntoIterator<Item = &'a Zone>) -> bool {
    if zone.fire_level > EXTINGUISHABLE_LEVEL || zone.smoke_level > EXTINGUISHABLE_LEVEL {
        return false;
    }
    nearby.into_iter().any(|z| z.extinguisher)
}
