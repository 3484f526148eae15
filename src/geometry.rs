use crate::{Float, Point3f, Vec3f};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Point3f,
    pub dir: Vec3f,
}

impl Ray {
    pub fn new(origin: Point3f, dir: Vec3f) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: Float) -> Point3f {
        self.origin + (self.dir * t)
    }
}

/// Offset rays for the neighbouring pixels in x and y, used for texture filtering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Differential {
    pub rx_origin: Point3f,
    pub rx_dir: Vec3f,
    pub ry_origin: Point3f,
    pub ry_dir: Vec3f,
}

/// Direction-only differentials, as produced by a specular lobe for its outgoing direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionDifferentials {
    pub dx: Vec3f,
    pub dy: Vec3f,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayDifferential {
    pub ray: Ray,
    pub diff: Option<Differential>,
}

impl RayDifferential {
    pub fn new(ray: Ray) -> Self {
        Self { ray, diff: None }
    }

    /// Builds the ray leaving `origin` along `dir`. Differential origins collapse onto the new
    /// origin; their directions come from `dirs` when the scattering event transported them.
    pub fn spawn(origin: Point3f, dir: Vec3f, dirs: Option<DirectionDifferentials>) -> Self {
        let diff = dirs.map(|d| Differential {
            rx_origin: origin,
            rx_dir: d.dx,
            ry_origin: origin,
            ry_dir: d.dy,
        });
        Self { ray: Ray::new(origin, dir), diff }
    }
}

/// Builds two vectors that together with the unit vector `v` form an orthonormal basis.
pub fn coordinate_system(v: Vec3f) -> (Vec3f, Vec3f) {
    let sign = Float::copysign(1.0, v.z);
    let a = -1.0 / (sign + v.z);
    let b = v.x * v.y * a;
    let v2 = Vec3f::new(1.0 + sign * v.x * v.x * a, sign * b, -sign * v.x);
    let v3 = Vec3f::new(b, sign + v.y * v.y * a, -v.y);
    (v2, v3)
}

pub fn spherical_direction(sin_theta: Float, cos_theta: Float, phi: Float) -> Vec3f {
    Vec3f::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cgmath::InnerSpace;

    #[test]
    fn test_coordinate_system_is_orthonormal() {
        for v in &[
            Vec3f::new(0.0, 0.0, 1.0),
            Vec3f::new(0.0, 0.0, -1.0),
            Vec3f::new(1.0, 2.0, -3.0).normalize(),
            Vec3f::new(-0.3, 0.9, 0.1).normalize(),
        ] {
            let (s, t) = coordinate_system(*v);
            assert_abs_diff_eq!(s.magnitude(), 1.0, epsilon = 1e-5);
            assert_abs_diff_eq!(t.magnitude(), 1.0, epsilon = 1e-5);
            assert_abs_diff_eq!(s.dot(t), 0.0, epsilon = 1e-5);
            assert_abs_diff_eq!(s.dot(*v), 0.0, epsilon = 1e-5);
            assert_abs_diff_eq!(t.dot(*v), 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_spawn_collapses_differential_origins() {
        let origin = Point3f::new(1.0, 2.0, 0.0);
        let dirs = DirectionDifferentials { dx: Vec3f::new(0.1, 0.0, 1.0), dy: Vec3f::new(0.0, 0.1, 1.0) };
        let ray = RayDifferential::spawn(origin, Vec3f::new(0.0, 0.0, 1.0), Some(dirs));
        let diff = ray.diff.unwrap();
        assert_eq!(diff.rx_origin, origin);
        assert_eq!(diff.ry_origin, origin);
        assert_eq!(diff.rx_dir, dirs.dx);
        assert_eq!(diff.ry_dir, dirs.dy);

        assert!(RayDifferential::spawn(origin, Vec3f::new(0.0, 0.0, 1.0), None).diff.is_none());
    }
}
