//! Display-name to world-position lookup used to turn a route of zone names into
//! drawable points.

use std::collections::HashMap;

use tracing::debug;

use crate::geometry::Vector3D;
use crate::model::{ObjectBody, SpatialObject};

/// Well-known stair landmarks, named as the routing service reports them.
pub const STAIR_LANDMARKS: [(&str, [f32; 3]); 4] = [
    ("계단4", [-0.4, 0.35, -4.25]),
    ("계단3", [-1.75, 0.35, -2.9]),
    ("계단2", [-3.3, 0.35, -5.0]),
    ("계단1", [-3.3, 0.35, 7.0]),
];

/// Name -> position map. The first source to claim a name keeps it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionIndex {
    positions: HashMap<String, Vector3D>,
}

impl PositionIndex {
    /// Builds the index from, in order: zone names, stairs labels (falling back
    /// to the object id), then the built-in stair landmarks.
    pub fn build(objects: &[SpatialObject]) -> Self {
        let mut index = Self::default();

        for object in objects {
            if let ObjectBody::Zone { name, .. } = &object.body {
                index.claim(name, object.position);
            }
        }

        for object in objects {
            if let ObjectBody::Stairs { name } = &object.body {
                let label = name.as_deref().unwrap_or(object.id.as_str());
                index.claim(label, object.position);
            }
        }

        for (name, position) in STAIR_LANDMARKS {
            index.claim(name, Vector3D::from(position));
        }

        debug!(names = index.positions.len(), "position index rebuilt");
        index
    }

    fn claim(&mut self, name: &str, position: Vector3D) {
        self.positions.entry(name.to_string()).or_insert(position);
    }

    pub fn get(&self, name: &str) -> Option<Vector3D> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Resolves every name, keeping the order of those found and returning the
    /// names that had no position.
    pub fn resolve_route<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> (Vec<Vector3D>, Vec<&'a str>) {
        let mut points = Vec::new();
        let mut missing = Vec::new();
        for name in names {
            match self.get(name) {
                Some(position) => points.push(position),
                None => missing.push(name),
            }
        }
        (points, missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::model::{ObjectKind, ObjectModel, ObjectPatch};

    fn named(model: &mut ObjectModel, kind: ObjectKind, name: Option<&str>, at: Vector3D) {
        let id = model.add(kind).id.clone();
        model.patch(
            &id,
            ObjectPatch {
                position: Some(at),
                name: name.map(str::to_string),
                ..ObjectPatch::default()
            },
        );
    }

    #[test]
    fn zones_win_over_stairs_and_landmarks() {
        let mut model = ObjectModel::new(BuildConfig::default());
        named(&mut model, ObjectKind::Stairs, Some("201"), Vector3D::new(9.0, 0.0, 9.0));
        named(&mut model, ObjectKind::Zone, Some("201"), Vector3D::new(-1.0, 0.35, -1.25));
        named(&mut model, ObjectKind::Zone, Some("계단1"), Vector3D::new(5.0, 0.35, 5.0));

        let index = PositionIndex::build(model.list());
        assert_eq!(index.get("201"), Some(Vector3D::new(-1.0, 0.35, -1.25)));
        assert_eq!(index.get("계단1"), Some(Vector3D::new(5.0, 0.35, 5.0)));
    }

    #[test]
    fn first_zone_with_a_name_keeps_it() {
        let mut model = ObjectModel::new(BuildConfig::default());
        named(&mut model, ObjectKind::Zone, Some("hall"), Vector3D::new(1.0, 0.0, 0.0));
        named(&mut model, ObjectKind::Zone, Some("hall"), Vector3D::new(2.0, 0.0, 0.0));

        let index = PositionIndex::build(model.list());
        assert_eq!(index.get("hall"), Some(Vector3D::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn unnamed_stairs_are_keyed_by_id() {
        let mut model = ObjectModel::new(BuildConfig::default());
        named(&mut model, ObjectKind::Stairs, None, Vector3D::new(3.0, 0.0, 1.0));
        let id = model.list()[0].id.clone();

        let index = PositionIndex::build(model.list());
        assert_eq!(index.get(id.as_str()), Some(Vector3D::new(3.0, 0.0, 1.0)));
    }

    #[test]
    fn landmarks_fill_unclaimed_names() {
        let index = PositionIndex::build(&[]);
        assert_eq!(index.len(), STAIR_LANDMARKS.len());
        assert_eq!(index.get("계단2"), Some(Vector3D::new(-3.3, 0.35, -5.0)));
    }

    #[test]
    fn route_resolution_skips_unknown_names() {
        let mut model = ObjectModel::new(BuildConfig::default());
        named(&mut model, ObjectKind::Zone, Some("201"), Vector3D::new(-1.0, 0.35, -1.25));

        let index = PositionIndex::build(model.list());
        let (points, missing) = index.resolve_route(["201", "roof", "계단4"]);

        assert_eq!(
            points,
            vec![Vector3D::new(-1.0, 0.35, -1.25), Vector3D::new(-0.4, 0.35, -4.25)]
        );
        assert_eq!(missing, vec!["roof"]);
    }
}
