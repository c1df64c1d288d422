// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! View frustum extraction and intersection tests.

use super::bounds::{Aabb, BoundingSphere, BoundingVolume};
use glam::{Mat4, Vec3, Vec4};

/// A plane in the form `dot(normal, p) + distance = 0`, normal pointing inward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal of the plane.
    pub normal: Vec3,
    /// Signed distance term.
    pub distance: f32,
}

impl Plane {
    fn from_vec4(v: Vec4) -> Self {
        let normal = v.truncate();
        let length = normal.length();
        if length <= f32::EPSILON {
            return Self {
                normal: Vec3::ZERO,
                distance: v.w,
            };
        }
        Self {
            normal: normal / length,
            distance: v.w / length,
        }
    }

    /// Signed distance from the plane to `point`; positive means inside.
    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// The six planes of a camera frustum.
///
/// Built for a `[0, 1]` clip-space depth range, which is what wgpu and the
/// `glam` `*_rh` projection helpers produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near and far planes, in that order.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the frustum planes from a combined view-projection matrix.
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let r0 = view_projection.row(0);
        let r1 = view_projection.row(1);
        let r2 = view_projection.row(2);
        let r3 = view_projection.row(3);
        Self {
            planes: [
                Plane::from_vec4(r3 + r0),
                Plane::from_vec4(r3 - r0),
                Plane::from_vec4(r3 + r1),
                Plane::from_vec4(r3 - r1),
                Plane::from_vec4(r2),
                Plane::from_vec4(r3 - r2),
            ],
        }
    }

    /// Returns `true` if the point lies inside or on the frustum.
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(point) >= 0.0)
    }

    /// Returns `true` if the sphere touches the frustum.
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(sphere.center) >= -sphere.radius)
    }

    /// Returns `true` if the box touches the frustum (positive-vertex test).
    ///
    /// The test is conservative: boxes near a frustum corner may be reported
    /// as visible while lying just outside.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let positive = Vec3::select(plane.normal.cmpge(Vec3::ZERO), aabb.max, aabb.min);
            plane.signed_distance(positive) >= 0.0
        })
    }

    /// Dispatches to the test matching the volume kind.
    pub fn intersects(&self, volume: &BoundingVolume) -> bool {
        match volume {
            BoundingVolume::Box(aabb) => self.intersects_aabb(aabb),
            BoundingVolume::Sphere(sphere) => self.intersects_sphere(sphere),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
        Frustum::from_view_projection(&(projection * view))
    }

    #[test]
    fn origin_is_visible_from_looking_camera() {
        let frustum = camera_frustum();
        assert!(frustum.contains_point(Vec3::ZERO));
        assert!(frustum.intersects_aabb(&Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE)));
    }

    #[test]
    fn box_behind_camera_is_rejected() {
        let frustum = camera_frustum();
        let behind = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, 20.0), Vec3::ONE);
        assert!(!frustum.intersects_aabb(&behind), "box behind the eye must be culled");
    }

    #[test]
    fn box_beyond_far_plane_is_rejected() {
        let frustum = camera_frustum();
        let far = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, -500.0), Vec3::ONE);
        assert!(!frustum.intersects(&BoundingVolume::Box(far)));
    }

    #[test]
    fn sphere_straddling_a_plane_is_kept() {
        let frustum = camera_frustum();
        // Just outside the right plane at z = 0, but the radius reaches back in.
        let sphere = BoundingSphere::new(Vec3::new(6.0, 0.0, 0.0), 2.0);
        assert!(frustum.intersects_sphere(&sphere));
        let far_right = BoundingSphere::new(Vec3::new(60.0, 0.0, 0.0), 2.0);
        assert!(!frustum.intersects_sphere(&far_right));
    }
}
