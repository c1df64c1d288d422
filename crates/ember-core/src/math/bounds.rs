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

//! Bounding volumes attached to renderable instances.

use glam::{Mat4, Vec3};

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// The corner with the smallest coordinates.
    pub min: Vec3,
    /// The corner with the largest coordinates.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from two corners, reordering components if needed.
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates a box from its center and half extents.
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let half_extents = half_extents.abs();
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Returns the center point of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns half the size of the box along each axis.
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Returns the eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Transforms the box by `matrix` and returns the box enclosing the result.
    ///
    /// Uses the absolute-value matrix trick, so the cost does not depend on the
    /// number of corners.
    pub fn transform(&self, matrix: &Mat4) -> Self {
        let center = matrix.transform_point3(self.center());
        let half = self.half_extents();
        let x = matrix.x_axis.truncate().abs() * half.x;
        let y = matrix.y_axis.truncate().abs() * half.y;
        let z = matrix.z_axis.truncate().abs() * half.z;
        Self::from_center_half_extents(center, x + y + z)
    }

    /// Returns the smallest sphere enclosing this box.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere {
            center: self.center(),
            radius: self.half_extents().length(),
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

/// A bounding sphere.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere {
    /// Sphere center.
    pub center: Vec3,
    /// Sphere radius, never negative.
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a sphere; a negative radius is clamped to zero.
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
        }
    }

    /// Returns the axis-aligned box enclosing the sphere.
    pub fn to_aabb(&self) -> Aabb {
        Aabb::from_center_half_extents(self.center, Vec3::splat(self.radius))
    }
}

/// The bounding volume stored with an instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundingVolume {
    /// An axis-aligned box.
    Box(Aabb),
    /// A sphere.
    Sphere(BoundingSphere),
}

impl BoundingVolume {
    /// Returns the enclosing axis-aligned box.
    pub fn aabb(&self) -> Aabb {
        match self {
            BoundingVolume::Box(aabb) => *aabb,
            BoundingVolume::Sphere(sphere) => sphere.to_aabb(),
        }
    }

    /// Returns the enclosing sphere.
    pub fn sphere(&self) -> BoundingSphere {
        match self {
            BoundingVolume::Box(aabb) => aabb.bounding_sphere(),
            BoundingVolume::Sphere(sphere) => *sphere,
        }
    }

    /// The volume after applying `matrix`. Spheres grow by the largest axis
    /// scale so the result stays conservative.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        match self {
            BoundingVolume::Box(aabb) => BoundingVolume::Box(aabb.transform(matrix)),
            BoundingVolume::Sphere(sphere) => {
                let scale = matrix
                    .x_axis
                    .truncate()
                    .length()
                    .max(matrix.y_axis.truncate().length())
                    .max(matrix.z_axis.truncate().length());
                BoundingVolume::Sphere(BoundingSphere::new(
                    matrix.transform_point3(sphere.center),
                    sphere.radius * scale,
                ))
            }
        }
    }
}

impl From<Aabb> for BoundingVolume {
    fn from(value: Aabb) -> Self {
        BoundingVolume::Box(value)
    }
}

impl From<BoundingSphere> for BoundingVolume {
    fn from(value: BoundingSphere) -> Self {
        BoundingVolume::Sphere(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn from_min_max_reorders_components() {
        let aabb = Aabb::from_min_max(Vec3::new(1.0, -1.0, 4.0), Vec3::new(-1.0, 1.0, 2.0));
        assert_eq!(aabb.min, Vec3::new(-1.0, -1.0, 2.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 1.0, 4.0));
    }

    #[test]
    fn translated_box_moves_with_matrix() {
        let aabb = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE);
        let moved = aabb.transform(&Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        assert_relative_eq!(moved.center().x, 5.0);
        assert_relative_eq!(moved.half_extents().x, 1.0);
    }

    #[test]
    fn rotated_box_grows_to_enclose() {
        let aabb = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0));
        let rotated = aabb.transform(&Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4));
        assert_relative_eq!(rotated.half_extents().x, std::f32::consts::SQRT_2, epsilon = 1e-5);
        assert_relative_eq!(rotated.half_extents().y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn sphere_and_box_round_out() {
        let sphere = BoundingSphere::new(Vec3::new(0.0, 2.0, 0.0), 3.0);
        let volume = BoundingVolume::from(sphere);
        assert_eq!(volume.aabb().max, Vec3::new(3.0, 5.0, 3.0));
        assert_eq!(BoundingSphere::new(Vec3::ZERO, -2.0).radius, 0.0);
    }

    #[test]
    fn scaled_sphere_stays_conservative() {
        let volume = BoundingVolume::from(BoundingSphere::new(Vec3::ZERO, 1.0));
        let matrix = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 4.0, 2.0),
            glam::Quat::IDENTITY,
            Vec3::new(0.0, 0.0, -3.0),
        );
        let BoundingVolume::Sphere(moved) = volume.transformed(&matrix) else {
            panic!("a sphere stays a sphere");
        };
        assert_relative_eq!(moved.radius, 4.0);
        assert_relative_eq!(moved.center.z, -3.0);
    }
}
