//! World-space geometry primitives shared by the object model, the editor and
//! the route overlay.

use std::f32::consts::{PI, TAU};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// A 3D world coordinate (or extent, or Euler rotation) wrapper.
///
/// Internally uses [`nalgebra::Vector3<f32>`] for downstream math convenience and
/// serializes as a plain `[x, y, z]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3D(pub Vector3<f32>);

impl Vector3D {
    /// Convenience constructor.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vector3::new(x, y, z))
    }

    pub fn zero() -> Self {
        Self(Vector3::zeros())
    }

    pub fn x(&self) -> f32 {
        self.0.x
    }

    pub fn y(&self) -> f32 {
        self.0.y
    }

    pub fn z(&self) -> f32 {
        self.0.z
    }

    pub fn get(&self, axis: Axis) -> f32 {
        self.0[axis.index()]
    }

    /// Returns a copy with one component overwritten.
    pub fn with(mut self, axis: Axis, value: f32) -> Self {
        self.0[axis.index()] = value;
        self
    }

    /// Returns a copy with `delta` added to one component.
    pub fn nudged(mut self, axis: Axis, delta: f32) -> Self {
        self.0[axis.index()] += delta;
        self
    }

    pub fn approx_eq(&self, other: &Vector3D, epsilon: f32) -> bool {
        (self.0 - other.0).amax() <= epsilon
    }
}

impl Default for Vector3D {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<[f32; 3]> for Vector3D {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

/// One of the three world axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees * PI / 180.0
}

pub fn radians_to_degrees(radians: f32) -> f32 {
    radians * 180.0 / PI
}

/// Wraps an angle into `[0, 2π)`.
pub fn wrap_radians(radians: f32) -> f32 {
    let wrapped = radians.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}
