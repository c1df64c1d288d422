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

//! Name-keyed registry of compiled shader modules.

use std::borrow::Cow;

use ahash::AHashMap;
use ember_core::renderer::api::{ShaderModuleDescriptor, ShaderModuleId, ShaderSource};
use ember_core::renderer::{GraphicsDevice, ResourceError, ShaderError};

use crate::render_lane::shaders;

/// Compiled shader modules, looked up by name when passes build pipelines.
///
/// The library does not own the modules it was handed with [`register`];
/// it owns, and [`release`] destroys, the ones it compiled itself.
///
/// [`register`]: ShaderLibrary::register
/// [`release`]: ShaderLibrary::release
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    modules: AHashMap<String, (ShaderModuleId, bool)>,
}

impl ShaderLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles every shader the built-in passes need.
    pub fn with_builtin_shaders(device: &dyn GraphicsDevice) -> Result<Self, ResourceError> {
        let mut library = Self::new();
        for (name, source) in shaders::BUILTIN {
            library.load_wgsl(device, name, source)?;
        }
        log::info!("ShaderLibrary: compiled {} built-in shaders", library.len());
        Ok(library)
    }

    /// Registers a module compiled elsewhere. Replaces any previous entry.
    pub fn register(&mut self, name: &str, module: ShaderModuleId) {
        self.modules.insert(name.to_string(), (module, false));
    }

    /// Compiles WGSL source and registers it under `name`.
    pub fn load_wgsl(
        &mut self,
        device: &dyn GraphicsDevice,
        name: &str,
        source: &str,
    ) -> Result<ShaderModuleId, ResourceError> {
        let module = device.create_shader_module(&ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(Cow::Owned(source.to_string())),
        })?;
        log::debug!("ShaderLibrary: compiled '{name}' as {module:?}");
        if let Some((old, true)) = self.modules.insert(name.to_string(), (module, true)) {
            let _ = device.destroy_shader_module(old);
        }
        Ok(module)
    }

    /// Looks up a module.
    ///
    /// ## Errors
    /// * `ShaderError::NotFound` - Nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<ShaderModuleId, ResourceError> {
        self.modules
            .get(name)
            .map(|(module, _)| *module)
            .ok_or_else(|| {
                ShaderError::NotFound {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Destroys the modules compiled by this library and forgets every entry.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        for (name, (module, owned)) in self.modules.drain() {
            if owned {
                if let Err(err) = device.destroy_shader_module(module) {
                    log::warn!("ShaderLibrary: failed to destroy '{name}': {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::HeadlessDevice;

    #[test]
    fn test_builtin_shaders_are_all_registered() {
        let device = HeadlessDevice::new();
        let library = ShaderLibrary::with_builtin_shaders(&device).unwrap();
        for (name, _) in shaders::BUILTIN {
            assert!(library.contains(name), "missing built-in shader '{name}'");
        }
    }

    #[test]
    fn test_missing_shader_is_a_shader_error() {
        let library = ShaderLibrary::new();
        assert!(matches!(
            library.get("cull"),
            Err(ResourceError::Shader(ShaderError::NotFound { name })) if name == "cull"
        ));
    }

    #[test]
    fn test_compile_failure_propagates() {
        let device = HeadlessDevice::new();
        device.fail_shader("gbuffer");
        let result = ShaderLibrary::with_builtin_shaders(&device);
        assert!(matches!(
            result,
            Err(ResourceError::Shader(ShaderError::CompilationError { .. }))
        ));
    }

    #[test]
    fn test_registered_modules_are_not_destroyed() {
        let device = HeadlessDevice::new();
        let external = device
            .create_shader_module(&ShaderModuleDescriptor {
                label: Some("external"),
                source: ShaderSource::Wgsl(Cow::Borrowed("")),
            })
            .unwrap();
        let mut library = ShaderLibrary::new();
        library.register("forward", external);
        library.load_wgsl(&device, "cull", "").unwrap();
        library.release(&device);

        assert!(library.is_empty());
        assert!(device.destroy_shader_module(external).is_ok());
    }
}
