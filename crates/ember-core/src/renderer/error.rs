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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::renderer::api::pipeline::ShaderModuleId;
use std::fmt;

/// An error related to the creation or lookup of a shader module.
#[derive(Debug)]
pub enum ShaderError {
    /// The shader source failed to compile into a backend-specific module.
    CompilationError {
        /// A descriptive label for the shader, if available.
        label: String,
        /// Detailed error messages from the shader compiler.
        details: String,
    },
    /// No shader is registered under the requested name.
    NotFound {
        /// The name that was looked up.
        name: String,
    },
    /// The requested shader module id is unknown to the device.
    InvalidModule {
        /// The unknown id.
        id: ShaderModuleId,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::NotFound { name } => {
                write!(f, "No shader registered under '{name}'")
            }
            ShaderError::InvalidModule { id } => {
                write!(f, "Shader module not found for ID: {id:?}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation of a pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// Failed to create a pipeline or bind group layout.
    LayoutCreationFailed(String),
    /// The graphics backend failed to compile the pipeline state object.
    CompilationFailed {
        /// A descriptive label for the pipeline, if available.
        label: Option<String>,
        /// Detailed error messages from the backend.
        details: String,
    },
    /// A required graphics feature is not supported by the device.
    FeatureNotSupported(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::LayoutCreationFailed(msg) => {
                write!(f, "Pipeline layout creation failed: {msg}")
            }
            PipelineError::CompilationFailed { label, details } => {
                write!(
                    f,
                    "Pipeline compilation failed for '{}': {}",
                    label.as_deref().unwrap_or("Unknown"),
                    details
                )
            }
            PipelineError::FeatureNotSupported(msg) => {
                write!(f, "Feature not supported: {msg}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// No resource has been registered under the name yet.
    UnknownName {
        /// The name that was looked up.
        name: String,
    },
    /// The resource exists but has a different kind than requested.
    KindMismatch {
        /// The name that was looked up.
        name: String,
        /// The kind the caller asked for.
        expected: &'static str,
        /// The kind actually registered.
        found: &'static str,
    },
    /// The resource was released by `resize_begin` and not yet recreated.
    ResizeInProgress {
        /// The resource that was accessed.
        name: String,
    },
    /// A name sharing its slot with other names was re-created with a
    /// different descriptor.
    AliasedReplacement {
        /// The name being replaced.
        name: String,
        /// The other names bound to the same slot.
        aliases: Vec<String>,
    },
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
    /// An attempt was made to access a resource out of its bounds.
    OutOfBounds,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::UnknownName { name } => {
                write!(f, "No resource named '{name}' has been created")
            }
            ResourceError::KindMismatch {
                name,
                expected,
                found,
            } => {
                write!(f, "Resource '{name}' is a {found}, not a {expected}")
            }
            ResourceError::ResizeInProgress { name } => {
                write!(f, "Resource '{name}' was accessed during a resize")
            }
            ResourceError::AliasedReplacement { name, aliases } => write!(
                f,
                "Resource '{name}' shares its slot with {} and cannot change descriptor",
                aliases.join(", ")
            ),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A wiring fault in the render graph. These are detected when the graph is
/// built and keep it from ever executing.
#[derive(Debug)]
pub enum GraphError {
    /// Two passes share a name.
    DuplicatePass {
        /// The repeated name.
        name: String,
    },
    /// A pass reads a resource nothing writes or imports.
    MissingDependency {
        /// The reading pass.
        pass: String,
        /// The unresolved resource.
        resource: String,
    },
    /// A pass reads a resource that is only written by a pass registered after it.
    WrittenDownstream {
        /// The reading pass.
        pass: String,
        /// The resource.
        resource: String,
        /// The later pass writing it.
        writer: String,
    },
    /// The dependency edges form a cycle.
    Cycle {
        /// Passes left unresolved by the sort.
        passes: Vec<String>,
    },
    /// `execute` was called on a graph whose passes were never built.
    NotBuilt,
    /// `execute` was called before `init`.
    NotInitialized {
        /// The first pass that was not initialized.
        pass: String,
    },
    /// A pass failed while initializing or executing.
    PassFailed {
        /// The failing pass.
        pass: String,
        /// The underlying failure.
        source: ResourceError,
    },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::DuplicatePass { name } => {
                write!(f, "A pass named '{name}' is already registered")
            }
            GraphError::MissingDependency { pass, resource } => {
                write!(
                    f,
                    "Pass '{pass}' reads '{resource}', which no pass writes and nothing imports"
                )
            }
            GraphError::WrittenDownstream {
                pass,
                resource,
                writer,
            } => {
                write!(
                    f,
                    "Pass '{pass}' reads '{resource}', which is only written later by '{writer}'"
                )
            }
            GraphError::Cycle { passes } => {
                write!(f, "Render graph contains a cycle through {passes:?}")
            }
            GraphError::NotBuilt => write!(f, "The render graph has not been built."),
            GraphError::NotInitialized { pass } => {
                write!(f, "Pass '{pass}' was executed before initialization")
            }
            GraphError::PassFailed { pass, source } => {
                write!(f, "Pass '{pass}' failed: {source}")
            }
        }
    }
}

impl std::error::Error for GraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GraphError::PassFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A high-level error that can occur while rendering a frame.
#[derive(Debug)]
pub enum RenderError {
    /// An operation was attempted before the renderer was initialized.
    NotInitialized,
    /// A frame was requested between `resize_begin` and `resize_end`.
    ResizeInProgress,
    /// Failed to acquire the next frame from the swap chain.
    SurfaceAcquisitionFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// The render graph is misconfigured or a pass failed.
    Graph(GraphError),
    /// The graphics device was lost. This is fatal for the renderer.
    DeviceLost,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => write!(f, "The renderer is not initialized."),
            RenderError::ResizeInProgress => {
                write!(f, "A frame was requested while a resize was in progress.")
            }
            RenderError::SurfaceAcquisitionFailed(msg) => {
                write!(f, "Failed to acquire surface for rendering: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::Graph(err) => write!(f, "Render graph error: {err}"),
            RenderError::DeviceLost => write!(
                f,
                "The graphics device was lost and needs to be reinitialized."
            ),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            RenderError::Graph(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<GraphError> for RenderError {
    fn from(err: GraphError) -> Self {
        RenderError::Graph(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::NotFound {
            name: "cull".to_string(),
        };
        assert_eq!(format!("{err}"), "No shader registered under 'cull'");

        let err_comp = ShaderError::CompilationError {
            label: "GBuffer".to_string(),
            details: "Syntax error at line 5".to_string(),
        };
        assert_eq!(
            format!("{err_comp}"),
            "Shader compilation failed for 'GBuffer': Syntax error at line 5"
        );
    }

    #[test]
    fn resource_error_display_wrapping_shader_error() {
        let res_err: ResourceError = ShaderError::InvalidModule {
            id: ShaderModuleId(42),
        }
        .into();
        assert_eq!(
            format!("{res_err}"),
            "Shader resource error: Shader module not found for ID: ShaderModuleId(42)"
        );
        assert!(res_err.source().is_some());
    }

    #[test]
    fn kind_mismatch_names_both_kinds() {
        let err = ResourceError::KindMismatch {
            name: "CBCamera".to_string(),
            expected: "Texture2D",
            found: "ConstantBuffer",
        };
        assert_eq!(
            format!("{err}"),
            "Resource 'CBCamera' is a ConstantBuffer, not a Texture2D"
        );
    }

    #[test]
    fn graph_error_keeps_pass_failure_chain() {
        let graph_err = GraphError::PassFailed {
            pass: "GBufferPass".to_string(),
            source: ResourceError::UnknownName {
                name: "GBuffer".to_string(),
            },
        };
        let render_err: RenderError = graph_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Render graph error: Pass 'GBufferPass' failed: No resource named 'GBuffer' has been created"
        );
        let source = render_err.source().expect("graph error is the source");
        assert!(source.source().is_some(), "resource error is the root cause");
    }
}
