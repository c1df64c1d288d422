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

//! Screen-space tiling used by light culling.

/// Edge length of a light-culling tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum TileSize {
    /// 16x16 pixels.
    #[default]
    X16,
    /// 32x32 pixels.
    X32,
}

impl TileSize {
    /// Edge length in pixels.
    #[inline]
    pub const fn pixels(&self) -> u32 {
        match self {
            TileSize::X16 => 16,
            TileSize::X32 => 32,
        }
    }

    /// Tiles needed to cover `screen_size` pixels.
    #[inline]
    pub const fn tile_count(&self, screen_size: u32) -> u32 {
        screen_size.div_ceil(self.pixels())
    }
}

/// Configuration of the light grid built by the light culling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LightGridConfig {
    /// Tile edge.
    pub tile_size: TileSize,
    /// Capacity of each tile's slice of the index list.
    pub max_lights_per_tile: u32,
}

impl Default for LightGridConfig {
    fn default() -> Self {
        Self {
            tile_size: TileSize::X16,
            max_lights_per_tile: 128,
        }
    }
}

impl LightGridConfig {
    /// Tile columns and rows for a screen.
    #[inline]
    pub const fn tile_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        (
            self.tile_size.tile_count(width),
            self.tile_size.tile_count(height),
        )
    }

    /// Total tile count for a screen.
    #[inline]
    pub fn total_tiles(&self, width: u32, height: u32) -> u32 {
        let (x, y) = self.tile_dimensions(width, height);
        x * y
    }

    /// Byte size of `LightIndexList`.
    pub fn light_index_list_size(&self, width: u32, height: u32) -> u64 {
        self.total_tiles(width, height) as u64
            * self.max_lights_per_tile as u64
            * std::mem::size_of::<u32>() as u64
    }

    /// Byte size of `LightGridBuffer`: an `(offset, count)` pair per tile.
    pub fn light_grid_size(&self, width: u32, height: u32) -> u64 {
        self.total_tiles(width, height) as u64 * 2 * std::mem::size_of::<u32>() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_dimensions_round_up() {
        let config = LightGridConfig::default();
        assert_eq!(config.tile_dimensions(1920, 1080), (120, 68));
        assert_eq!(config.total_tiles(1920, 1080), 8160);
        assert_eq!(config.light_grid_size(1920, 1080), 8160 * 8);
    }

    #[test]
    fn test_large_tiles() {
        let config = LightGridConfig {
            tile_size: TileSize::X32,
            max_lights_per_tile: 64,
        };
        assert_eq!(config.tile_dimensions(100, 33), (4, 2));
        assert_eq!(config.light_index_list_size(100, 33), 8 * 64 * 4);
    }
}
