#[macro_use] pub mod macros; // must stay at the top
pub mod arena;
pub mod config;
pub mod geometry;
pub mod id_arena;
pub mod integrator;
pub mod light;
pub mod material;
pub mod random;
pub mod reflection;
pub mod renderer;
pub mod sampling;
pub mod spectrum;

pub use geometry::*;

use cgmath::{InnerSpace, Point2, Point3, Vector3};

pub type Float = f32;

pub type Point2f = Point2<Float>;
pub type Point3f = Point3<Float>;
pub type Vec3f = Vector3<Float>;

pub mod consts {
    pub use std::f32::consts::*;

    pub const INV_PI: super::Float = FRAC_1_PI;
    pub const INV_2_PI: super::Float = 0.5 * FRAC_1_PI;
    pub const INV_4_PI: super::Float = 0.25 * FRAC_1_PI;
}

pub fn abs_dot(v1: Vec3f, v2: Vec3f) -> Float {
    v1.dot(v2).abs()
}

pub fn lerp(t: Float, v1: Float, v2: Float) -> Float {
    (1.0 - t) * v1 + t * v2
}
