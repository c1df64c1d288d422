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

//! Partitioning of the shadow atlas between shadow-casting lights.
//!
//! The atlas is a square grid of equally sized tiles. Directional lights take
//! one tile per cascade, spot lights one tile and point lights six, in light
//! order. A light that no longer fits loses its shadows entirely.

use bytemuck::{Pod, Zeroable};
use ember_core::math::{Mat4, Vec3, Vec4};
use ember_core::renderer::api::Viewport;
use ember_core::renderer::{GpuLight, Light, ShadowKind};

use crate::graph_lane::ViewData;

/// Tiles along each edge of the atlas.
pub const ATLAS_TILES_PER_ROW: u32 = 4;
/// Tiles available per frame.
pub const MAX_SHADOW_TILES: u32 = ATLAS_TILES_PER_ROW * ATLAS_TILES_PER_ROW;

const SHADOW_NEAR: f32 = 0.05;
const CASCADE_SPLIT_LAMBDA: f32 = 0.5;
/// Extra depth behind each cascade so casters outside the view still shadow it.
const CASCADE_CASTER_MARGIN: f32 = 50.0;

/// A shadow tile as laid out in the `ShadowTiles` storage buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadowTileData {
    /// World to tile clip space.
    pub view_projection: [[f32; 4]; 4],
    /// Atlas UV offset in `xy`, scale in `zw`.
    pub rect: [f32; 4],
}

/// One allocated atlas tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowTile {
    /// Index of the light in the frame's light list.
    pub light: usize,
    /// Technique of the light.
    pub kind: ShadowKind,
    /// Position in the atlas grid.
    pub index: u32,
    /// World to tile clip space.
    pub view_projection: Mat4,
}

impl ShadowTile {
    fn grid_position(&self) -> (u32, u32) {
        (self.index % ATLAS_TILES_PER_ROW, self.index / ATLAS_TILES_PER_ROW)
    }

    /// Pixel rectangle of the tile in an atlas of `atlas_size` pixels.
    pub fn viewport(&self, atlas_size: u32) -> Viewport {
        let tile = (atlas_size / ATLAS_TILES_PER_ROW) as f32;
        let (column, row) = self.grid_position();
        Viewport {
            x: column as f32 * tile,
            y: row as f32 * tile,
            width: tile,
            height: tile,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// GPU record of the tile.
    pub fn to_gpu(&self) -> ShadowTileData {
        let scale = 1.0 / ATLAS_TILES_PER_ROW as f32;
        let (column, row) = self.grid_position();
        ShadowTileData {
            view_projection: self.view_projection.to_cols_array_2d(),
            rect: [column as f32 * scale, row as f32 * scale, scale, scale],
        }
    }
}

/// The tiles allocated for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowAtlasLayout {
    tiles: Vec<ShadowTile>,
    first_tile: Vec<i32>,
    dropped_lights: u32,
}

impl ShadowAtlasLayout {
    /// Allocates tiles for `lights` as seen from `view`. Deterministic, so
    /// every pass computing it for the same frame agrees.
    pub fn allocate(lights: &[Light], view: &ViewData) -> Self {
        let mut layout = Self {
            tiles: Vec::new(),
            first_tile: Vec::with_capacity(lights.len()),
            dropped_lights: 0,
        };
        for (index, light) in lights.iter().enumerate() {
            let count = light.shadow_tile_count();
            let Some(kind) = light.shadow_kind().filter(|_| count > 0) else {
                layout.first_tile.push(-1);
                continue;
            };
            if layout.tiles.len() as u32 + count > MAX_SHADOW_TILES {
                layout.dropped_lights += 1;
                layout.first_tile.push(-1);
                continue;
            }
            layout.first_tile.push(layout.tiles.len() as i32);
            for view_projection in light_matrices(light, count, view) {
                let tile_index = layout.tiles.len() as u32;
                layout.tiles.push(ShadowTile {
                    light: index,
                    kind,
                    index: tile_index,
                    view_projection,
                });
            }
        }
        layout
    }

    /// Allocated tiles, grouped by light.
    pub fn tiles(&self) -> &[ShadowTile] {
        &self.tiles
    }

    /// First tile of a light, `-1` when it has no shadows this frame.
    pub fn shadow_index(&self, light: usize) -> i32 {
        self.first_tile.get(light).copied().unwrap_or(-1)
    }

    /// Shadow-casting lights that did not fit.
    pub fn dropped_lights(&self) -> u32 {
        self.dropped_lights
    }

    /// GPU records of every tile.
    pub fn gpu_tiles(&self) -> Vec<ShadowTileData> {
        self.tiles.iter().map(ShadowTile::to_gpu).collect()
    }

    /// Packs `lights` with their shadow indices.
    pub fn gpu_lights(&self, lights: &[Light]) -> Vec<GpuLight> {
        lights
            .iter()
            .enumerate()
            .map(|(index, light)| light.to_gpu(self.shadow_index(index)))
            .collect()
    }
}

fn up_for(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

fn light_matrices(light: &Light, count: u32, view: &ViewData) -> Vec<Mat4> {
    match light {
        Light::Directional(l) => cascade_matrices(l.direction, count, view),
        Light::Spot(l) => {
            let direction = l.direction.normalize_or_zero();
            let light_view =
                Mat4::look_at_rh(l.position, l.position + direction, up_for(direction));
            let fov = (l.outer_angle * 2.0).clamp(0.01, std::f32::consts::PI - 0.01);
            let projection =
                Mat4::perspective_rh(fov, 1.0, SHADOW_NEAR, l.range.max(SHADOW_NEAR + 0.01));
            vec![projection * light_view]
        }
        Light::Point(l) => {
            let projection = Mat4::perspective_rh(
                std::f32::consts::FRAC_PI_2,
                1.0,
                SHADOW_NEAR,
                l.range.max(SHADOW_NEAR + 0.01),
            );
            // Face order +X, -X, +Y, -Y, +Z, -Z, matched by the lighting shader.
            [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z]
                .into_iter()
                .map(|face| projection * Mat4::look_at_rh(l.position, l.position + face, up_for(face)))
                .collect()
        }
    }
}

/// Distances of the cascade boundaries, blending uniform and logarithmic splits.
pub fn cascade_splits(near: f32, far: f32, count: u32) -> Vec<f32> {
    let near = near.max(1e-3);
    let far = far.max(near + 1e-3);
    (0..=count)
        .map(|i| {
            let t = i as f32 / count.max(1) as f32;
            let uniform = near + (far - near) * t;
            let logarithmic = near * (far / near).powf(t);
            CASCADE_SPLIT_LAMBDA * logarithmic + (1.0 - CASCADE_SPLIT_LAMBDA) * uniform
        })
        .collect()
}

fn cascade_matrices(direction: Vec3, count: u32, view: &ViewData) -> Vec<Mat4> {
    let direction = direction.normalize_or_zero();
    let inverse = view.view_projection.inverse();
    let mut near_corners = [Vec3::ZERO; 4];
    let mut far_corners = [Vec3::ZERO; 4];
    for (i, (x, y)) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)]
        .into_iter()
        .enumerate()
    {
        let n = inverse * Vec4::new(x, y, 0.0, 1.0);
        let f = inverse * Vec4::new(x, y, 1.0, 1.0);
        near_corners[i] = n.truncate() / n.w;
        far_corners[i] = f.truncate() / f.w;
    }

    // Points on a frustum edge are linear in view depth.
    let depth_range = (view.far - view.near).max(1e-3);
    let splits = cascade_splits(view.near, view.far, count);
    splits
        .windows(2)
        .map(|bounds| {
            let t0 = (bounds[0] - view.near) / depth_range;
            let t1 = (bounds[1] - view.near) / depth_range;
            let corners: Vec<Vec3> = (0..4)
                .flat_map(|i| {
                    let edge = far_corners[i] - near_corners[i];
                    [near_corners[i] + edge * t0, near_corners[i] + edge * t1]
                })
                .collect();
            let center = corners.iter().copied().sum::<Vec3>() / corners.len() as f32;
            let radius = corners
                .iter()
                .map(|c| c.distance(center))
                .fold(0.0_f32, f32::max)
                .max(1e-3);
            let eye = center - direction * (radius + CASCADE_CASTER_MARGIN);
            let light_view = Mat4::look_at_rh(eye, center, up_for(direction));
            let projection = Mat4::orthographic_rh(
                -radius,
                radius,
                -radius,
                radius,
                0.0,
                2.0 * radius + CASCADE_CASTER_MARGIN,
            );
            projection * light_view
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::renderer::{DirectionalLight, PointLight, SpotLight};

    fn view() -> ViewData {
        ViewData::new(
            Mat4::look_at_rh(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO, Vec3::Y),
            Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 100.0),
            0.1,
            100.0,
            (1280, 720),
        )
    }

    fn point(casts_shadows: bool) -> Light {
        Light::Point(PointLight {
            position: Vec3::new(0.0, 3.0, 0.0),
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            casts_shadows,
        })
    }

    fn spot() -> Light {
        Light::Spot(SpotLight {
            position: Vec3::new(0.0, 5.0, 0.0),
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            intensity: 1.0,
            range: 20.0,
            inner_angle: 0.3,
            outer_angle: 0.5,
            casts_shadows: true,
        })
    }

    #[test]
    fn test_tiles_follow_light_kinds() {
        let lights = [
            Light::Directional(DirectionalLight {
                cascade_count: 3,
                ..Default::default()
            }),
            spot(),
            point(true),
            point(false),
        ];
        let layout = ShadowAtlasLayout::allocate(&lights, &view());

        assert_eq!(layout.tiles().len(), 3 + 1 + 6);
        assert_eq!(layout.shadow_index(0), 0);
        assert_eq!(layout.shadow_index(1), 3);
        assert_eq!(layout.shadow_index(2), 4);
        assert_eq!(layout.shadow_index(3), -1, "Non-casting lights get no tile");
        assert_eq!(layout.tiles()[4].kind, ShadowKind::Omnidirectional);
        assert_eq!(layout.dropped_lights(), 0);
    }

    #[test]
    fn test_lights_beyond_capacity_are_dropped() {
        let lights = [point(true), point(true), point(true)];
        let layout = ShadowAtlasLayout::allocate(&lights, &view());

        assert_eq!(layout.tiles().len(), 12);
        assert_eq!(layout.shadow_index(2), -1);
        assert_eq!(layout.dropped_lights(), 1);
        assert_eq!(layout.gpu_lights(&lights)[2].shadow_index, -1);
    }

    #[test]
    fn test_tile_rects_do_not_overlap() {
        let lights = [point(true), point(true)];
        let layout = ShadowAtlasLayout::allocate(&lights, &view());
        let rects: Vec<_> = layout.tiles().iter().map(|t| t.viewport(4096)).collect();
        for (i, a) in rects.iter().enumerate() {
            assert_eq!(a.width, 1024.0);
            for b in &rects[i + 1..] {
                let disjoint = a.x + a.width <= b.x
                    || b.x + b.width <= a.x
                    || a.y + a.height <= b.y
                    || b.y + b.height <= a.y;
                assert!(disjoint, "Tiles {a:?} and {b:?} overlap");
            }
        }
    }

    #[test]
    fn test_spot_tile_sees_points_in_its_cone() {
        let layout = ShadowAtlasLayout::allocate(&[spot()], &view());
        let clip = layout.tiles()[0].view_projection * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-3 && ndc.y.abs() < 1e-3, "Cone axis maps to the centre");
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn test_cascade_splits_cover_the_view_range() {
        let splits = cascade_splits(0.1, 100.0, 4);
        assert_eq!(splits.len(), 5);
        assert!((splits[0] - 0.1).abs() < 1e-4);
        assert!((splits[4] - 100.0).abs() < 1e-3);
        assert!(splits.windows(2).all(|w| w[0] < w[1]));
    }
}
