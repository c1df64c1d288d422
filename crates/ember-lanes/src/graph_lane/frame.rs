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

//! Per-frame inputs shared by every pass.

use ember_core::math::{Frustum, Mat4, Vec3};
use ember_core::renderer::api::{BindGroupId, CameraConstants, Color, OcclusionParams, Viewport};
use ember_core::renderer::{Light, ViewportShading, WeatherConstants};

use crate::batch_lane::BatchRenderer;
use crate::culling_lane::{CullingContext, CullingFlags, CullingManager};

/// The camera a frame is rendered from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewData {
    /// World to view.
    pub view: Mat4,
    /// View to clip.
    pub projection: Mat4,
    /// World to clip.
    pub view_projection: Mat4,
    /// Camera position in world space.
    pub position: Vec3,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
    /// Render target size in pixels.
    pub size: (u32, u32),
    /// World-space frustum.
    pub frustum: Frustum,
}

impl ViewData {
    /// Derives the combined matrices and the frustum.
    pub fn new(view: Mat4, projection: Mat4, near: f32, far: f32, size: (u32, u32)) -> Self {
        let view_projection = projection * view;
        Self {
            view,
            projection,
            view_projection,
            position: view.inverse().w_axis.truncate(),
            near,
            far,
            size: (size.0.max(1), size.1.max(1)),
            frustum: Frustum::from_view_projection(&view_projection),
        }
    }

    /// The viewport covering the whole target.
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.size.0, self.size.1)
    }

    /// The `CBCamera` contents.
    pub fn to_constants(&self) -> CameraConstants {
        CameraConstants {
            view: self.view.to_cols_array_2d(),
            projection: self.projection.to_cols_array_2d(),
            view_projection: self.view_projection.to_cols_array_2d(),
            inverse_view_projection: self.view_projection.inverse().to_cols_array_2d(),
            position: self.position.extend(1.0).to_array(),
            near: self.near,
            far: self.far,
            viewport_size: [self.size.0 as f32, self.size.1 as f32],
        }
    }

    /// Parameters of the cull kernel for this view.
    pub fn occlusion_params(
        &self,
        flags: CullingFlags,
        instance_count: u32,
        type_count: u32,
        depth_chain_mips: u32,
    ) -> OcclusionParams {
        OcclusionParams {
            activate_culling: flags.contains(CullingFlags::OCCLUSION) as u32,
            instance_count,
            type_count,
            max_mip_level: depth_chain_mips.saturating_sub(1),
            rt_size: [self.size.0 as f32, self.size.1 as f32],
            p00: self.projection.x_axis.x,
            p11: self.projection.y_axis.y,
            frustum_culling: flags.contains(CullingFlags::FRUSTUM) as u32,
            ..OcclusionParams::default()
        }
    }
}

/// Everything the passes read for one frame.
#[derive(Debug)]
pub struct FrameData<'a> {
    /// Monotonic frame counter.
    pub frame_index: u64,
    /// The camera.
    pub view: ViewData,
    /// Clear colour of the output.
    pub clear_color: Color,
    /// Editor shading mode.
    pub shading: ViewportShading,
    /// Visibility tests for the cull pass.
    pub culling_flags: CullingFlags,
    /// Group 0 of geometry pipelines, over `CBCamera`.
    pub camera_bind_group: BindGroupId,
    /// Batches, committed for this frame.
    pub batches: &'a BatchRenderer,
    /// The staged instance set.
    pub culling: &'a CullingContext,
    /// GPU buffers of the staged instance set.
    pub culling_manager: &'a CullingManager,
    /// Scene lights.
    pub lights: &'a [Light],
    /// Sun and fog, already uploaded to `CBWeather`.
    pub weather: WeatherConstants,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_view_data_recovers_camera_position() {
        let eye = Vec3::new(1.0, 2.0, 3.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 100.0);
        let data = ViewData::new(view, projection, 0.1, 100.0, (1280, 720));

        assert_relative_eq!(data.position.x, eye.x, epsilon = 1e-4);
        assert_relative_eq!(data.position.y, eye.y, epsilon = 1e-4);
        assert_relative_eq!(data.position.z, eye.z, epsilon = 1e-4);
        assert!(data.frustum.contains_point(Vec3::ZERO));
        assert_eq!(data.to_constants().viewport_size, [1280.0, 720.0]);
    }

    #[test]
    fn test_occlusion_params_follow_flags() {
        let data = ViewData::new(
            Mat4::IDENTITY,
            Mat4::perspective_rh(1.0, 1.0, 0.1, 10.0),
            0.1,
            10.0,
            (64, 32),
        );
        let params = data.occlusion_params(CullingFlags::FRUSTUM, 5, 2, 7);
        assert_eq!(params.activate_culling, 0);
        assert_eq!(params.frustum_culling, 1);
        assert_eq!(params.max_mip_level, 6);
        assert_eq!(params.rt_size, [64.0, 32.0]);
        assert_relative_eq!(params.p11, data.projection.y_axis.y);
    }
}
