// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::vec3::Vec3;
use crate::util::EPSILON_ZERO;

/// A plane defined by a point on it and its unit normal.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Plane {
    pub point: Vec3,
    pub normal: Vec3,
}

impl Plane {
    /// Constructs the plane containing the three points `a`, `b`, `c`.
    #[must_use]
    pub fn from_points(a: &Vec3, b: &Vec3, c: &Vec3) -> Self {
        let leg1 = *b - *a;
        let leg2 = *c - *a;
        let normal = leg1.cross_product(&leg2).normalized();
        Self { point: *a, normal }
    }
}

/// Intersects the line through `ray_origin` with direction `ray_direction`
/// against the plane.
///
/// Returns `None` when the ray is parallel to the plane.
#[must_use]
pub fn line_plane_intersection(
    ray_origin: &Vec3,
    ray_direction: &Vec3,
    plane: &Plane,
) -> Option<Vec3> {
    let direction = ray_direction.normalized();
    let normal = plane.normal.normalized();
    let diff = plane.point - *ray_origin;
    let d = normal.dot_product(&diff);
    let e = normal.dot_product(&direction);
    if e.abs() > EPSILON_ZERO {
        return Some(*ray_origin + (direction * (d / e)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_aligned_intersection() {
        // The z = 2 plane.
        let plane = Plane::from_points(
            &Vec3::from(0.0, 0.0, 2.0),
            &Vec3::from(1.0, 0.0, 2.0),
            &Vec3::from(0.0, 1.0, 2.0),
        );
        let hit = line_plane_intersection(
            &Vec3::from(5.0, 5.0, 0.0),
            &Vec3::from(0.0, 0.0, 1.0),
            &plane,
        )
        .unwrap();
        assert!(hit.nearly_equal(&Vec3::from(5.0, 5.0, 2.0)));
    }

    #[test]
    fn test_parallel_ray() {
        let plane = Plane::from_points(
            &Vec3::from(0.0, 0.0, 2.0),
            &Vec3::from(1.0, 0.0, 2.0),
            &Vec3::from(0.0, 1.0, 2.0),
        );
        let hit = line_plane_intersection(
            &Vec3::from(0.0, 0.0, 0.0),
            &Vec3::from(1.0, 1.0, 0.0),
            &plane,
        );
        assert!(hit.is_none());
    }
}
