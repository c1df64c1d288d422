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

use ember_core::math::{Mat4, Vec3};
use ember_lanes::graph_lane::ViewData;

/// A perspective camera looking from `position` at `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Eye position in world space.
    pub position: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
    /// Up direction.
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 60f32.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// A default camera at `position` looking at `target`.
    pub fn look_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            ..Self::default()
        }
    }

    /// World to view.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// View to clip for a target of the given aspect ratio.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(f32::EPSILON), self.near, self.far)
    }

    /// The view the passes render from, for a target of `size` pixels.
    pub fn view_data(&self, size: (u32, u32)) -> ViewData {
        let aspect = size.0.max(1) as f32 / size.1.max(1) as f32;
        ViewData::new(
            self.view_matrix(),
            self.projection_matrix(aspect),
            self.near,
            self.far,
            size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_view_data_matches_the_camera() {
        let camera = Camera::look_at(Vec3::new(0.0, 2.0, 8.0), Vec3::ZERO);
        let view = camera.view_data((800, 400));

        assert_relative_eq!(view.position.y, 2.0, epsilon = 1e-4);
        assert_relative_eq!(view.position.z, 8.0, epsilon = 1e-4);
        assert_eq!(view.size, (800, 400));
        assert!(view.frustum.contains_point(Vec3::ZERO));
        assert!(!view.frustum.contains_point(Vec3::new(0.0, 0.0, 20.0)));
    }

    #[test]
    fn test_degenerate_size_keeps_a_valid_projection() {
        let view = Camera::default().view_data((0, 0));
        assert_eq!(view.size, (1, 1));
        assert!(view.projection.is_finite());
    }
}
