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

use std::borrow::Cow;

use anyhow::{ensure, Context};
use ember_core::renderer::api::{
    BufferDescriptor, BufferId, BufferUsage, Extent3D, TextureDescriptor, TextureFormat, TextureId,
    TextureUsage, TextureViewDescriptor, TextureViewId,
};

use ember_lanes::render_lane::names;
use ember_lanes::resource_lane::TextureResource;

use super::camera::Camera;
use super::scene::Scene;
use super::scene_renderer::{RenderTarget, SceneRenderer};

/// Row pitch granularity of texture-to-buffer copies.
const COPY_ROW_ALIGNMENT: u32 = 256;

/// Pixels captured from an offscreen render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Texel format of `pixels`.
    pub format: TextureFormat,
    /// Tightly packed rows, top to bottom.
    pub pixels: Vec<u8>,
}

impl Screenshot {
    /// The bytes of one texel, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let texel = self.format.bytes_per_pixel() as usize;
        let start = (y as usize * self.width as usize + x as usize) * texel;
        self.pixels.get(start..start + texel)
    }
}

struct Capture {
    texture: TextureId,
    view: Option<TextureViewId>,
    readback: Option<BufferId>,
}

impl SceneRenderer {
    /// Renders one frame into a temporary texture at the output size and
    /// reads it back.
    ///
    /// The temporary texture and readback buffer are destroyed whether or
    /// not the capture succeeds.
    pub async fn take_screenshot(
        &mut self,
        scene: &mut dyn Scene,
        camera: &Camera,
    ) -> anyhow::Result<Screenshot> {
        let (width, height) = self.output_size();
        let format = TextureFormat::Rgba8Unorm;
        let texture = self
            .device
            .create_texture(&TextureDescriptor::d2(
                "Screenshot",
                width,
                height,
                format,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
            ))
            .context("failed to create the screenshot texture")?;
        let mut capture = Capture {
            texture,
            view: None,
            readback: None,
        };

        let previous = self
            .resources
            .get_texture(names::OUTPUT)
            .and_then(|output| self.resources.texture(&output).cloned())
            .ok();

        let result = self
            .capture(&mut capture, scene, camera, (width, height), format)
            .await;
        self.dispose(capture);
        self.restore_output(previous);
        if let Err(err) = &result {
            log::error!("SceneRenderer: screenshot failed: {err:#}");
        }
        result
    }

    async fn capture(
        &mut self,
        capture: &mut Capture,
        scene: &mut dyn Scene,
        camera: &Camera,
        (width, height): (u32, u32),
        format: TextureFormat,
    ) -> anyhow::Result<Screenshot> {
        let view = self
            .device
            .create_texture_view(capture.texture, &TextureViewDescriptor::default())
            .context("failed to create the screenshot view")?;
        capture.view = Some(view);

        let target = RenderTarget {
            texture: Some(capture.texture),
            view,
            width,
            height,
            format,
        };
        self.render_to(&target, scene, camera)
            .context("failed to render the screenshot frame")?;

        let row_bytes = width * format.bytes_per_pixel();
        let padded_row = row_bytes.div_ceil(COPY_ROW_ALIGNMENT) * COPY_ROW_ALIGNMENT;
        let size = padded_row as u64 * height as u64;
        let readback = self
            .device
            .create_buffer(&BufferDescriptor {
                label: Some(Cow::Borrowed("ScreenshotReadback")),
                size,
                usage: BufferUsage::MAP_READ | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            })
            .context("failed to create the readback buffer")?;
        capture.readback = Some(readback);

        let mut encoder = self.device.create_command_encoder(Some("Screenshot"));
        encoder.copy_texture_to_buffer(
            &capture.texture,
            &readback,
            padded_row,
            Extent3D::d2(width, height),
        );
        self.device.submit_command_buffer(encoder.finish());

        let padded = self
            .device
            .read_buffer(readback, 0, size)
            .await
            .context("failed to read back the screenshot")?;
        ensure!(
            padded.len() as u64 == size,
            "readback returned {} bytes, expected {size}",
            padded.len()
        );

        let pixels = padded
            .chunks_exact(padded_row as usize)
            .flat_map(|row| &row[..row_bytes as usize])
            .copied()
            .collect();
        log::info!("SceneRenderer: captured a {width}x{height} screenshot");
        Ok(Screenshot {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Points `Output` back at the target bound before the capture, or
    /// leaves it empty so nothing resolves to the destroyed screenshot view.
    fn restore_output(&mut self, previous: Option<TextureResource>) {
        let result = match previous {
            Some(target) => self
                .resources
                .import_texture(
                    names::OUTPUT,
                    target.texture,
                    target.view,
                    (target.width, target.height),
                    target.format,
                )
                .map(|_| ()),
            None => self.resources.clear_import(names::OUTPUT),
        };
        if let Err(err) = result {
            log::warn!("SceneRenderer: failed to restore the output target: {err}");
        }
        self.publish();
    }

    fn dispose(&self, capture: Capture) {
        let device = self.device.as_ref();
        let mut results = vec![];
        if let Some(view) = capture.view {
            results.push(device.destroy_texture_view(view));
        }
        results.push(device.destroy_texture(capture.texture));
        if let Some(buffer) = capture.readback {
            results.push(device.destroy_buffer(buffer));
        }
        for err in results.into_iter().filter_map(Result::err) {
            log::warn!("SceneRenderer: failed to release a screenshot resource: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_indexes_packed_rows() {
        let shot = Screenshot {
            width: 2,
            height: 2,
            format: TextureFormat::Rgba8Unorm,
            pixels: (0..16).collect(),
        };
        assert_eq!(shot.pixel(1, 0), Some(&[4, 5, 6, 7][..]));
        assert_eq!(shot.pixel(0, 1), Some(&[8, 9, 10, 11][..]));
        assert_eq!(shot.pixel(2, 0), None, "x is out of range");
    }
}
