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

//! Tiled light culling: which lights touch which screen tile.

use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};
use ember_core::math::{Vec2, Vec3, Vec4};
use ember_core::renderer::api::*;
use ember_core::renderer::{DeviceFeature, GpuLight, GraphicsDevice, LightGridConfig, ResourceError};

use super::common::{storage_entry, texture_entry, uniform_entry, CachedBindGroup, UNFILTERED};
use super::names;
use super::shadow_atlas::ShadowAtlasLayout;
use crate::graph_lane::{PassBuilder, PassContext, PassInitContext, RenderGraphPass, ViewData};
use crate::resource_lane::{BufferRef, BufferSize, ResourceCreationFlags, TextureRef};

/// Lights uploaded per frame; the rest are ignored.
pub const MAX_LIGHTS: u32 = 1024;
/// Tiles handled by one workgroup along each axis.
pub const LIGHT_CULL_WORKGROUP_SIZE: u32 = 8;

/// The `LightTiles` uniform.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct LightTileParams {
    /// Tile columns.
    pub tiles_x: u32,
    /// Tile rows.
    pub tiles_y: u32,
    /// Tile edge in pixels.
    pub tile_size: u32,
    /// Capacity of each tile's index list.
    pub max_lights_per_tile: u32,
    /// Lights in `Lights`.
    pub light_count: u32,
    /// Mip of the depth chain whose texels are about one tile wide.
    pub depth_mip: u32,
    /// Padding.
    pub _pad: [u32; 2],
}

impl LightTileParams {
    /// Parameters for `config` over a `size` viewport.
    pub fn new(config: &LightGridConfig, size: (u32, u32), light_count: u32, depth_mips: u32) -> Self {
        let (tiles_x, tiles_y) = config.tile_dimensions(size.0.max(1), size.1.max(1));
        let tile_size = config.tile_size.pixels();
        Self {
            tiles_x,
            tiles_y,
            tile_size,
            max_lights_per_tile: config.max_lights_per_tile,
            light_count,
            depth_mip: tile_size.ilog2().min(depth_mips.saturating_sub(1)),
            _pad: [0; 2],
        }
    }
}

/// A light grid computed on the CPU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LightGrid {
    /// `(first index, count)` per tile, row-major.
    pub cells: Vec<[u32; 2]>,
    /// Light indices; tile `t` owns `max_lights_per_tile` slots from
    /// `t * max_lights_per_tile`.
    pub indices: Vec<u32>,
}

enum ScreenFootprint {
    Everywhere,
    Nowhere,
    Circle { center: Vec2, radius: f32 },
}

fn footprint(light: &GpuLight, view: &ViewData) -> ScreenFootprint {
    if light.kind == GpuLight::KIND_DIRECTIONAL {
        return ScreenFootprint::Everywhere;
    }
    let view_pos = view.view * Vec3::from_array(light.position).extend(1.0);
    let depth = -view_pos.z;
    if depth - light.range > view.far || depth + light.range < view.near {
        return ScreenFootprint::Nowhere;
    }
    if depth <= light.range {
        return ScreenFootprint::Everywhere;
    }
    let size = Vec2::new(view.size.0 as f32, view.size.1 as f32);
    let clip = view.projection * Vec4::new(view_pos.x, view_pos.y, view_pos.z, 1.0);
    let ndc = Vec2::new(clip.x, clip.y) / clip.w;
    let center = Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5) * size;
    let radius = light.range * view.projection.y_axis.y / depth * 0.5 * size.y;
    ScreenFootprint::Circle { center, radius }
}

/// Bins `lights` into screen tiles without depth information, so tiles keep
/// every light whose screen-space sphere bounds overlap them.
pub fn build_light_grid(lights: &[GpuLight], view: &ViewData, config: &LightGridConfig) -> LightGrid {
    let (tiles_x, tiles_y) = config.tile_dimensions(view.size.0, view.size.1);
    let tile = config.tile_size.pixels() as f32;
    let capacity = config.max_lights_per_tile;
    let footprints: Vec<_> = lights.iter().map(|light| footprint(light, view)).collect();

    let tile_count = (tiles_x * tiles_y) as usize;
    let mut grid = LightGrid {
        cells: Vec::with_capacity(tile_count),
        indices: vec![0; tile_count * capacity as usize],
    };
    for y in 0..tiles_y {
        for x in 0..tiles_x {
            let first = (y * tiles_x + x) * capacity;
            let min = Vec2::new(x as f32, y as f32) * tile;
            let max = min + Vec2::splat(tile);
            let mut count = 0;
            for (index, footprint) in footprints.iter().enumerate() {
                if count == capacity {
                    break;
                }
                let touches = match footprint {
                    ScreenFootprint::Everywhere => true,
                    ScreenFootprint::Nowhere => false,
                    ScreenFootprint::Circle { center, radius } => {
                        center.clamp(min, max).distance(*center) <= *radius
                    }
                };
                if touches {
                    grid.indices[(first + count) as usize] = index as u32;
                    count += 1;
                }
            }
            grid.cells.push([first, count]);
        }
    }
    grid
}

/// Uploads `Lights` and fills `LightGridBuffer` and `LightIndexList`.
///
/// With compute support the grid is built by the `light_cull` shader, which
/// also rejects lights behind each tile's Hi-Z depth. Without it the grid is
/// built on the CPU from screen-space bounds alone.
#[derive(Debug, Default)]
pub struct LightCullPass {
    camera: Option<BufferRef>,
    depth_chain: Option<TextureRef>,
    lights: Option<BufferRef>,
    tiles: Option<BufferRef>,
    grid: Option<BufferRef>,
    indices: Option<BufferRef>,
    config: LightGridConfig,
    layout: Option<BindGroupLayoutId>,
    pipeline: Option<ComputePipelineId>,
    bind_group: CachedBindGroup<u64>,
    truncated_warned: bool,
}

impl LightCullPass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }

    fn create_pipeline(&mut self, device: &dyn GraphicsDevice, module: ShaderModuleId) -> Result<(), ResourceError> {
        let compute = ShaderStageFlags::COMPUTE;
        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("LightCullLayout"),
            entries: &[
                uniform_entry::<LightTileParams>(0, compute),
                uniform_entry::<CameraConstants>(1, compute),
                storage_entry(2, compute, true),
                texture_entry(3, compute, UNFILTERED),
                storage_entry(4, compute, false),
                storage_entry(5, compute, false),
            ],
        })?;
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("LightCull"),
            bind_group_layouts: &[layout],
        })?;
        self.pipeline = Some(device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some(Cow::Borrowed("LightCull")),
            layout: pipeline_layout,
            stage: ShaderStage {
                module,
                entry_point: "cs_main",
            },
        })?);
        self.layout = Some(layout);
        Ok(())
    }
}

fn required<T: Clone>(value: &Option<T>) -> Result<T, ResourceError> {
    value.clone().ok_or(ResourceError::NotFound)
}

impl RenderGraphPass for LightCullPass {
    fn name(&self) -> &'static str {
        "LightCullPass"
    }

    fn build(&self, builder: &mut PassBuilder) {
        builder
            .read(names::DEPTH_CHAIN)
            .read(names::CAMERA)
            .write(names::LIGHT_GRID)
            .write(names::LIGHT_INDEX_LIST);
    }

    fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
        self.config = ctx.settings.tiles;
        let tile_size = self.config.tile_size;
        let resources = &mut *ctx.resources;
        self.camera = Some(resources.get_buffer(names::CAMERA)?);
        self.depth_chain = Some(resources.get_texture(names::DEPTH_CHAIN)?);
        self.lights = Some(resources.create_structured_buffer(
            names::LIGHTS,
            BufferSize::Fixed(MAX_LIGHTS as u64 * std::mem::size_of::<GpuLight>() as u64),
            BufferUsage::COPY_DST,
            ResourceCreationFlags::empty(),
        )?);
        self.tiles = Some(resources.create_constant_buffer::<LightTileParams>(
            names::LIGHT_TILES,
            true,
            ResourceCreationFlags::empty(),
        )?);
        self.grid = Some(resources.create_structured_buffer(
            names::LIGHT_GRID,
            BufferSize::PerTile {
                tile_size,
                bytes_per_tile: 2 * std::mem::size_of::<u32>() as u64,
            },
            BufferUsage::COPY_DST,
            ResourceCreationFlags::empty(),
        )?);
        self.indices = Some(resources.create_structured_buffer(
            names::LIGHT_INDEX_LIST,
            BufferSize::PerTile {
                tile_size,
                bytes_per_tile: self.config.max_lights_per_tile as u64 * std::mem::size_of::<u32>() as u64,
            },
            BufferUsage::COPY_DST,
            ResourceCreationFlags::empty(),
        )?);

        if ctx.device.supports_feature(DeviceFeature::ComputeShaders) {
            self.create_pipeline(ctx.device, ctx.shaders.get("light_cull")?)?;
        } else {
            log::info!("LightCullPass: compute shaders unavailable, binning lights on the CPU");
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
        let frame = ctx.frame;
        let resources = ctx.resources;
        let device = ctx.device;

        let mut lights = ShadowAtlasLayout::allocate(frame.lights, &frame.view).gpu_lights(frame.lights);
        if lights.len() > MAX_LIGHTS as usize {
            if !self.truncated_warned {
                log::warn!(
                    "LightCullPass: {} lights in the scene, only the first {MAX_LIGHTS} are shaded",
                    lights.len()
                );
                self.truncated_warned = true;
            }
            lights.truncate(MAX_LIGHTS as usize);
        }
        let lights_buffer = resources.buffer(&required(&self.lights)?)?.buffer;
        if !lights.is_empty() {
            device.write_buffer(lights_buffer, 0, bytemuck::cast_slice(&lights))?;
        }

        let depth_chain = resources.texture(&required(&self.depth_chain)?)?;
        let params = LightTileParams::new(
            &self.config,
            frame.view.size,
            lights.len() as u32,
            depth_chain.mip_views.len() as u32,
        );
        let tiles_buffer = resources.buffer(&required(&self.tiles)?)?.buffer;
        device.write_buffer(tiles_buffer, 0, bytemuck::bytes_of(&params))?;

        let grid = *resources.buffer(&required(&self.grid)?)?;
        let indices = *resources.buffer(&required(&self.indices)?)?;

        let (Some(layout), Some(pipeline)) = (self.layout, self.pipeline) else {
            let built = build_light_grid(&lights, &frame.view, &self.config);
            let cells: &[u8] = bytemuck::cast_slice(&built.cells);
            let list: &[u8] = bytemuck::cast_slice(&built.indices);
            device.write_buffer(grid.buffer, 0, &cells[..cells.len().min(grid.size as usize)])?;
            device.write_buffer(indices.buffer, 0, &list[..list.len().min(indices.size as usize)])?;
            return Ok(());
        };

        let camera = resources.buffer(&required(&self.camera)?)?.buffer;
        let depth_view = depth_chain.view;
        let bind_group = self.bind_group.get_or_create(device, resources.generation(), || {
            device.create_bind_group(&BindGroupDescriptor {
                label: Some("LightCull"),
                layout,
                entries: &[
                    BindGroupEntry::new(0, BindingResource::whole(tiles_buffer)),
                    BindGroupEntry::new(1, BindingResource::whole(camera)),
                    BindGroupEntry::new(2, BindingResource::whole(lights_buffer)),
                    BindGroupEntry::new(3, BindingResource::TextureView(depth_view)),
                    BindGroupEntry::new(4, BindingResource::whole(grid.buffer)),
                    BindGroupEntry::new(5, BindingResource::whole(indices.buffer)),
                ],
            })
        })?;

        let mut pass = ctx.encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some("LightCull"),
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(
            params.tiles_x.div_ceil(LIGHT_CULL_WORKGROUP_SIZE),
            params.tiles_y.div_ceil(LIGHT_CULL_WORKGROUP_SIZE),
            1,
        );
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        self.bind_group.release(device);
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(err) = device.destroy_compute_pipeline(pipeline) {
                log::warn!("LightCullPass: failed to destroy pipeline: {err}");
            }
        }
        self.layout = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::math::Mat4;
    use ember_core::renderer::{DirectionalLight, Light, PointLight, TileSize};

    fn view() -> ViewData {
        ViewData::new(
            Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y),
            Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0),
            0.1,
            100.0,
            (128, 128),
        )
    }

    fn config() -> LightGridConfig {
        LightGridConfig {
            tile_size: TileSize::X32,
            max_lights_per_tile: 4,
        }
    }

    fn point(position: Vec3, range: f32) -> GpuLight {
        Light::Point(PointLight {
            position,
            color: Vec3::ONE,
            intensity: 1.0,
            range,
            casts_shadows: false,
        })
        .to_gpu(-1)
    }

    #[test]
    fn test_directional_lights_touch_every_tile() {
        let lights = [Light::Directional(DirectionalLight::default()).to_gpu(-1)];
        let grid = build_light_grid(&lights, &view(), &config());

        assert_eq!(grid.cells.len(), 16);
        assert!(grid.cells.iter().all(|cell| cell[1] == 1));
        assert_eq!(grid.indices.len(), 16 * 4);
    }

    #[test]
    fn test_small_light_stays_near_its_projection() {
        let lights = [point(Vec3::ZERO, 0.5)];
        let grid = build_light_grid(&lights, &view(), &config());

        let lit: Vec<usize> = (0..grid.cells.len()).filter(|&t| grid.cells[t][1] > 0).collect();
        assert!(!lit.is_empty(), "The light projects onto the screen centre");
        assert!(lit.iter().all(|&t| [5, 6, 9, 10].contains(&t)), "Lit tiles: {lit:?}");
    }

    #[test]
    fn test_lights_behind_the_camera_are_skipped() {
        let lights = [point(Vec3::new(0.0, 0.0, 20.0), 1.0)];
        let grid = build_light_grid(&lights, &view(), &config());
        assert!(grid.cells.iter().all(|cell| cell[1] == 0));
    }

    #[test]
    fn test_tile_capacity_is_respected() {
        let lights: Vec<_> = (0..6).map(|_| point(Vec3::ZERO, 50.0)).collect();
        let grid = build_light_grid(&lights, &view(), &config());
        assert!(grid.cells.iter().all(|cell| cell[1] == 4));
        assert_eq!(grid.cells[3][0], 12, "Tile 3 owns slots 12..16");
    }

    #[test]
    fn test_tile_params_pick_a_tile_sized_mip() {
        let params = LightTileParams::new(&config(), (1920, 1080), 3, 11);
        assert_eq!((params.tiles_x, params.tiles_y), (60, 34));
        assert_eq!(params.depth_mip, 5);
        assert_eq!(LightTileParams::new(&config(), (8, 8), 0, 4).depth_mip, 3);
        assert_eq!(std::mem::size_of::<LightTileParams>(), 32);
    }
}
