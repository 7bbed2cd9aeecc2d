//! Built-in second-floor layout shown when no floor-plan has been loaded.

use crate::config::BuildConfig;
use crate::geometry::Vector3D;
use crate::model::{ObjectBody, ObjectId, ObjectModel, SpatialObject, Zone};

/// Initial readings of a sample zone: `(fire, smoke, knife, extinguisher, people)`.
type Readings = (f32, f32, bool, bool, u32);

fn zone(
    id: &str,
    name: &str,
    position: Vector3D,
    size: Vector3D,
    (fire_level, smoke_level, knife, extinguisher, people_cnt): Readings,
) -> SpatialObject {
    SpatialObject {
        id: ObjectId::new(id),
        position,
        size,
        rotation: Vector3D::zero(),
        body: ObjectBody::Zone {
            zone: Zone {
                zone_id: id.to_string(),
                fire_level,
                smoke_level,
                knife,
                extinguisher,
                stair: false,
                people_cnt,
            },
            name: name.to_string(),
        },
    }
}

/// Seventeen zones: classrooms 201호 to 211호 and corridors 복도1 to 복도6.
///
/// Room extents are measured wall-centre to wall-centre, so one wall
/// thickness is taken off the sides that meet a wall.
pub fn second_floor(build: &BuildConfig) -> ObjectModel {
    let h = build.wall_height;
    let t = build.wall_thickness;
    let at = |x: f32, z: f32| Vector3D::new(x, h / 2.0, z);
    let extent = |w: f32, d: f32| Vector3D::new(w, h, d);

    let objects = vec![
        // Classrooms along the corridor.
        zone(
            "zone-201",
            "201호",
            at(-1.0, -1.25),
            extent(2.0 - t, 2.5 - t),
            (0.0, 0.0, false, true, 15),
        ),
        zone(
            "zone-202",
            "202호",
            at(-1.0, 1.875),
            extent(2.0 - t, 3.75 - t),
            (0.2, 0.1, false, false, 25),
        ),
        zone(
            "zone-203",
            "203호",
            at(-1.0, 5.625),
            extent(2.0 - t, 3.75 - t),
            (0.0, 0.0, false, true, 10),
        ),
        zone(
            "zone-204",
            "204호",
            at(-4.0, 4.25),
            extent(2.0 - t, 2.5 - t),
            (0.0, 0.0, false, false, 8),
        ),
        zone(
            "zone-205",
            "205호",
            at(-4.0, 1.5),
            extent(2.0 - t, 3.0 - t),
            (0.5, 0.3, false, true, 30),
        ),
        zone(
            "zone-206",
            "206호",
            at(-4.0, -1.5),
            extent(2.0 - t, 3.0 - t),
            (0.0, 0.0, true, false, 5),
        ),
        // Classrooms across the wing.
        zone(
            "zone-211",
            "211호",
            at(1.25, -3.5),
            extent(2.5 - t, 2.0 - t),
            (0.0, 0.0, false, true, 12),
        ),
        zone(
            "zone-208",
            "208호",
            at(1.25, -6.5),
            extent(2.5 - t, 2.0 - t),
            (0.0, 0.0, false, false, 18),
        ),
        zone(
            "zone-209",
            "209호",
            at(3.75, -6.5),
            extent(2.5 - t, 2.0 - t),
            (0.1, 0.05, false, true, 22),
        ),
        zone(
            "zone-210",
            "210호",
            at(3.75, -3.5),
            extent(2.5 - t, 2.0 - t),
            (0.0, 0.0, false, true, 6),
        ),
        zone(
            "zone-207",
            "207호",
            at(-1.0, -6.5),
            extent(2.0 - t, 2.0 - t),
            (0.0, 0.0, false, false, 3),
        ),
        // Main corridor.
        zone(
            "zone-hallway-1",
            "복도1",
            at(-2.5, 5.625 - t / 2.0),
            extent(1.0 - t, 3.75),
            (0.0, 0.0, false, false, 5),
        ),
        zone(
            "zone-hallway-2",
            "복도2",
            at(-2.5, 1.875 - t / 2.0),
            extent(1.0 - t, 3.75),
            (1.0, 0.0, false, false, 8),
        ),
        zone(
            "zone-hallway-3",
            "복도3",
            at(-2.5, -1.875 - t / 2.0),
            extent(1.0 - t, 3.75),
            (0.0, 0.0, false, false, 12),
        ),
        zone(
            "zone-hallway-4",
            "복도4",
            at(-2.5, -5.625),
            extent(1.0 - t, 3.75 - t),
            (0.0, 0.0, false, false, 15),
        ),
        // Wing corridor.
        zone(
            "zone-hallway-5",
            "복도5",
            at(-0.25, -5.0),
            extent(3.7 - t, 1.0 - t),
            (0.0, 0.0, false, false, 10),
        ),
        zone(
            "zone-hallway-6",
            "복도6",
            at(3.25, -5.0),
            extent(3.5 - t, 1.0 - t),
            (0.0, 0.0, false, false, 7),
        ),
    ];

    ObjectModel::from_objects(*build, objects)
}
