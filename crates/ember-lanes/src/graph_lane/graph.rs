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

//! The built graph and its executer.

use ember_core::renderer::{FrameProfiler, GraphError, GraphicsDevice};

use super::{FrameData, PassContext, PassInitContext, RenderGraphPass};
use crate::resource_lane::ResourceBuilder;

/// One pass as seen by editor tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// The pass name.
    pub name: &'static str,
    /// Declared reads.
    pub reads: Vec<String>,
    /// Declared writes.
    pub writes: Vec<String>,
    /// Passes that must run first.
    pub dependencies: Vec<&'static str>,
}

#[derive(Debug)]
struct PassSlot {
    pass: Box<dyn RenderGraphPass>,
    initialized: bool,
}

/// An ordered, validated set of passes.
///
/// Obtained from [`RenderGraphBuilder::build`](super::RenderGraphBuilder::build).
/// The default value is an empty, unbuilt graph that refuses to execute.
#[derive(Debug, Default)]
pub struct RenderGraph {
    nodes: Vec<GraphNode>,
    passes: Vec<PassSlot>,
    imports: Vec<String>,
    built: bool,
}

impl RenderGraph {
    pub(crate) fn from_parts(
        nodes: Vec<GraphNode>,
        passes: Vec<Box<dyn RenderGraphPass>>,
        imports: Vec<String>,
    ) -> Self {
        Self {
            nodes,
            passes: passes
                .into_iter()
                .map(|pass| PassSlot {
                    pass,
                    initialized: false,
                })
                .collect(),
            imports,
            built: true,
        }
    }

    /// Returns `true` once the graph came out of a successful build.
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Nodes in execution order.
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Pass names in execution order.
    pub fn passes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.nodes.iter().map(|node| node.name)
    }

    /// The node of a pass.
    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Resources supplied from outside the graph.
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Initializes every pass not yet initialized, in execution order.
    pub fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), GraphError> {
        if !self.built {
            return Err(GraphError::NotBuilt);
        }
        for slot in self.passes.iter_mut().filter(|slot| !slot.initialized) {
            log::debug!("RenderGraph: initializing '{}'", slot.pass.name());
            slot.pass.init(ctx).map_err(|source| {
                let err = GraphError::PassFailed {
                    pass: slot.pass.name().to_string(),
                    source,
                };
                log::error!("RenderGraph: {err}");
                err
            })?;
            slot.initialized = true;
        }
        Ok(())
    }

    /// Records every pass into one encoder and submits it once.
    ///
    /// Nothing is submitted when a pass fails.
    pub fn execute(
        &mut self,
        device: &dyn GraphicsDevice,
        resources: &ResourceBuilder,
        frame: &FrameData<'_>,
        profiler: &dyn FrameProfiler,
    ) -> Result<(), GraphError> {
        if !self.built {
            return Err(GraphError::NotBuilt);
        }
        if let Some(slot) = self.passes.iter().find(|slot| !slot.initialized) {
            return Err(GraphError::NotInitialized {
                pass: slot.pass.name().to_string(),
            });
        }

        let mut encoder = device.create_command_encoder(Some("RenderGraph"));
        profiler.begin_frame();
        for slot in &mut self.passes {
            let name = slot.pass.name();
            profiler.begin(name);
            let result = slot.pass.execute(&mut PassContext {
                device,
                resources,
                encoder: encoder.as_mut(),
                frame,
            });
            profiler.end(name);
            if let Err(source) = result {
                profiler.end_frame();
                let err = GraphError::PassFailed {
                    pass: name.to_string(),
                    source,
                };
                log::error!("RenderGraph: frame {} aborted: {err}", frame.frame_index);
                return Err(err);
            }
        }
        device.submit_command_buffer(encoder.finish());
        profiler.end_frame();
        Ok(())
    }

    /// Releases every pass's device objects. `init` brings them back.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        for slot in &mut self.passes {
            if slot.initialized {
                slot.pass.release(device);
                slot.initialized = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch_lane::BatchRenderer;
    use crate::culling_lane::{CullingContext, CullingFlags, CullingManager};
    use crate::graph_lane::{
        PassBuilder, RenderGraphBuilder, ShaderLibrary, SharedLayouts, ViewData,
    };
    use ember_core::math::Mat4;
    use ember_core::renderer::api::Color;
    use ember_core::renderer::{
        RendererSettings, ResourceError, ViewportShading, WeatherConstants,
    };
    use ember_infra::HeadlessDevice;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RenderGraphPass for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn build(&self, builder: &mut PassBuilder) {
            builder.write(self.name);
        }

        fn init(&mut self, _ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
            self.log.lock().unwrap().push(format!("init {}", self.name));
            Ok(())
        }

        fn execute(&mut self, _ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
            self.log.lock().unwrap().push(format!("run {}", self.name));
            if self.fail {
                Err(ResourceError::NotFound)
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct BlockProfiler(Mutex<Vec<String>>);

    impl FrameProfiler for BlockProfiler {
        fn begin(&self, block: &str) {
            self.0.lock().unwrap().push(format!("+{block}"));
        }

        fn end(&self, block: &str) {
            self.0.lock().unwrap().push(format!("-{block}"));
        }
    }

    fn graph(log: &Arc<Mutex<Vec<String>>>, failing: Option<&str>) -> RenderGraph {
        let mut builder = RenderGraphBuilder::new();
        for name in ["First", "Second"] {
            builder
                .add_pass(Box::new(Recording {
                    name,
                    log: log.clone(),
                    fail: failing == Some(name),
                }))
                .unwrap();
        }
        builder.build().unwrap()
    }

    fn run(
        graph: &mut RenderGraph,
        device: &HeadlessDevice,
        profiler: &dyn FrameProfiler,
    ) -> Result<(), GraphError> {
        let resources = ResourceBuilder::new(Arc::new(device.clone()), 8, 8);
        let batches = BatchRenderer::new();
        let culling = CullingContext::new();
        let manager = CullingManager::new();
        let frame = FrameData {
            frame_index: 0,
            view: ViewData::new(Mat4::IDENTITY, Mat4::IDENTITY, 0.1, 10.0, (8, 8)),
            clear_color: Color::BLACK,
            shading: ViewportShading::Rendered,
            culling_flags: CullingFlags::empty(),
            camera_bind_group: ember_core::renderer::api::BindGroupId(0),
            batches: &batches,
            culling: &culling,
            culling_manager: &manager,
            lights: &[],
            weather: WeatherConstants::default(),
        };
        graph.execute(device, &resources, &frame, profiler)
    }

    fn init(graph: &mut RenderGraph, device: &HeadlessDevice) {
        let mut resources = ResourceBuilder::new(Arc::new(device.clone()), 8, 8);
        let layouts = SharedLayouts::new(device).unwrap();
        graph
            .init(&mut PassInitContext {
                device,
                resources: &mut resources,
                shaders: &ShaderLibrary::new(),
                layouts: &layouts,
                settings: &RendererSettings::default(),
            })
            .unwrap();
    }

    #[test]
    fn test_unbuilt_graph_refuses_to_run() {
        let device = HeadlessDevice::new();
        let mut graph = RenderGraph::default();
        assert!(matches!(
            run(&mut graph, &device, &ember_core::renderer::NullProfiler),
            Err(GraphError::NotBuilt)
        ));
    }

    #[test]
    fn test_uninitialized_pass_refuses_to_run() {
        let device = HeadlessDevice::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = graph(&log, None);
        assert!(matches!(
            run(&mut graph, &device, &ember_core::renderer::NullProfiler),
            Err(GraphError::NotInitialized { pass }) if pass == "First"
        ));
    }

    #[test]
    fn test_passes_run_in_order_inside_profiler_blocks() {
        let device = HeadlessDevice::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = graph(&log, None);
        init(&mut graph, &device);
        let profiler = BlockProfiler::default();
        run(&mut graph, &device, &profiler).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            ["init First", "init Second", "run First", "run Second"]
        );
        assert_eq!(
            *profiler.0.lock().unwrap(),
            ["+First", "-First", "+Second", "-Second"]
        );
        assert_eq!(device.submission_count(), 1, "one submission per frame");
    }

    #[test]
    fn test_failing_pass_aborts_without_submitting() {
        let device = HeadlessDevice::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = graph(&log, Some("First"));
        init(&mut graph, &device);

        let result = run(&mut graph, &device, &ember_core::renderer::NullProfiler);
        assert!(matches!(result, Err(GraphError::PassFailed { pass, .. }) if pass == "First"));
        assert!(!log.lock().unwrap().contains(&"run Second".to_string()));
        assert_eq!(device.submission_count(), 0);
    }
}
