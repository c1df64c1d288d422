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

//! Assembles passes into a validated, ordered graph.

use ahash::AHashSet;
use ember_core::graph::topological_sort;
use ember_core::renderer::GraphError;

use super::{GraphNode, PassBuilder, RenderGraph, RenderGraphPass};

/// Collects passes and imported resources, then validates and orders them.
///
/// Passes are expected in execution order: a pass may only read what an
/// earlier pass wrote or what was imported. Anything else is a wiring fault
/// reported by [`build`](Self::build), never a per-frame failure.
#[derive(Debug, Default)]
pub struct RenderGraphBuilder {
    imports: Vec<String>,
    passes: Vec<Box<dyn RenderGraphPass>>,
}

impl RenderGraphBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `resource` as supplied from outside the graph.
    pub fn import(&mut self, resource: &str) -> &mut Self {
        if !self.imports.iter().any(|i| i == resource) {
            self.imports.push(resource.to_string());
        }
        self
    }

    /// Appends a pass.
    ///
    /// ## Errors
    /// * `GraphError::DuplicatePass` - A pass with the same name was added before.
    pub fn add_pass(&mut self, pass: Box<dyn RenderGraphPass>) -> Result<&mut Self, GraphError> {
        if self.passes.iter().any(|p| p.name() == pass.name()) {
            return Err(GraphError::DuplicatePass {
                name: pass.name().to_string(),
            });
        }
        self.passes.push(pass);
        Ok(self)
    }

    /// Names of the passes added so far.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Collects every pass's dependencies, validates them and sorts the
    /// passes.
    ///
    /// Edges are read-after-write, write-after-write and write-after-read, so
    /// a resource's producers, consumers and overwriters keep their
    /// registration order.
    pub fn build(self) -> Result<RenderGraph, GraphError> {
        let result = self.build_inner();
        if let Err(err) = &result {
            log::error!("RenderGraph: build failed: {err}");
        }
        result
    }

    fn build_inner(self) -> Result<RenderGraph, GraphError> {
        let imports: AHashSet<&str> = self.imports.iter().map(String::as_str).collect();
        let mut nodes: Vec<GraphNode> = self
            .passes
            .iter()
            .map(|pass| {
                let mut builder = PassBuilder::default();
                pass.build(&mut builder);
                let (reads, writes) = builder.into_parts();
                GraphNode {
                    name: pass.name(),
                    reads,
                    writes,
                    dependencies: Vec::new(),
                }
            })
            .collect();

        let mut edges: Vec<(usize, usize)> = Vec::new();
        for i in 0..nodes.len() {
            for resource in &nodes[i].reads {
                let writer = (0..i).rev().find(|&j| nodes[j].writes.contains(resource));
                match writer {
                    Some(j) => edges.push((j, i)),
                    None if imports.contains(resource.as_str()) => {}
                    None => {
                        let later = (i + 1..nodes.len()).find(|&k| nodes[k].writes.contains(resource));
                        return Err(match later {
                            Some(k) => GraphError::WrittenDownstream {
                                pass: nodes[i].name.to_string(),
                                resource: resource.clone(),
                                writer: nodes[k].name.to_string(),
                            },
                            None => GraphError::MissingDependency {
                                pass: nodes[i].name.to_string(),
                                resource: resource.clone(),
                            },
                        });
                    }
                }
            }
            for resource in &nodes[i].writes {
                for j in 0..i {
                    let earlier = &nodes[j];
                    if earlier.writes.contains(resource) || earlier.reads.contains(resource) {
                        edges.push((j, i));
                    }
                }
            }
        }
        edges.sort_unstable();
        edges.dedup();

        let order = topological_sort(0..nodes.len(), edges.iter().copied()).map_err(|cycle| {
            GraphError::Cycle {
                passes: cycle
                    .unresolved
                    .iter()
                    .map(|&i| nodes[i].name.to_string())
                    .collect(),
            }
        })?;

        for &(from, to) in &edges {
            let name = nodes[from].name;
            nodes[to].dependencies.push(name);
        }

        let mut slots: Vec<Option<Box<dyn RenderGraphPass>>> =
            self.passes.into_iter().map(Some).collect();
        let mut node_slots: Vec<Option<GraphNode>> = nodes.into_iter().map(Some).collect();
        let mut passes = Vec::with_capacity(order.len());
        let mut sorted_nodes = Vec::with_capacity(order.len());
        for index in order {
            if let (Some(pass), Some(node)) = (slots[index].take(), node_slots[index].take()) {
                passes.push(pass);
                sorted_nodes.push(node);
            }
        }

        log::info!(
            "RenderGraph: built {} passes: {}",
            sorted_nodes.len(),
            sorted_nodes
                .iter()
                .map(|n| n.name)
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        Ok(RenderGraph::from_parts(sorted_nodes, passes, self.imports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_lane::{PassContext, PassInitContext};
    use ember_core::renderer::ResourceError;

    #[derive(Debug)]
    struct Declared {
        name: &'static str,
        reads: &'static [&'static str],
        writes: &'static [&'static str],
    }

    impl RenderGraphPass for Declared {
        fn name(&self) -> &'static str {
            self.name
        }

        fn build(&self, builder: &mut PassBuilder) {
            for r in self.reads {
                builder.read(r);
            }
            for w in self.writes {
                builder.write(w);
            }
        }

        fn init(&mut self, _ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
            Ok(())
        }

        fn execute(&mut self, _ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
            Ok(())
        }
    }

    fn pass(
        name: &'static str,
        reads: &'static [&'static str],
        writes: &'static [&'static str],
    ) -> Box<dyn RenderGraphPass> {
        Box::new(Declared {
            name,
            reads,
            writes,
        })
    }

    #[test]
    fn test_forward_wiring_keeps_registration_order() {
        let mut builder = RenderGraphBuilder::new();
        builder.import("CBCamera");
        builder.add_pass(pass("Depth", &["CBCamera"], &["Depth"])).unwrap();
        builder.add_pass(pass("Shadow", &[], &["Atlas"])).unwrap();
        builder.add_pass(pass("Light", &["Depth", "Atlas"], &["Color"])).unwrap();
        let graph = builder.build().unwrap();

        let names: Vec<_> = graph.nodes().iter().map(|n| n.name).collect();
        assert_eq!(names, ["Depth", "Shadow", "Light"]);
        assert_eq!(graph.nodes()[2].dependencies, ["Depth", "Shadow"]);
        assert!(graph.nodes()[0].dependencies.is_empty(), "imports add no edge");
    }

    #[test]
    fn test_duplicate_pass_is_rejected() {
        let mut builder = RenderGraphBuilder::new();
        builder.add_pass(pass("A", &[], &["X"])).unwrap();
        assert!(matches!(
            builder.add_pass(pass("A", &[], &["Y"])),
            Err(GraphError::DuplicatePass { name }) if name == "A"
        ));
    }

    #[test]
    fn test_unwritten_read_fails_the_build() {
        let mut builder = RenderGraphBuilder::new();
        builder.add_pass(pass("Light", &["GBuffer"], &["Color"])).unwrap();
        assert!(matches!(
            builder.build(),
            Err(GraphError::MissingDependency { pass, resource })
                if pass == "Light" && resource == "GBuffer"
        ));
    }

    #[test]
    fn test_read_before_write_fails_the_build() {
        let mut builder = RenderGraphBuilder::new();
        builder.add_pass(pass("Light", &["GBuffer"], &["Color"])).unwrap();
        builder.add_pass(pass("Geometry", &[], &["GBuffer"])).unwrap();
        assert!(matches!(
            builder.build(),
            Err(GraphError::WrittenDownstream { writer, .. }) if writer == "Geometry"
        ));
    }

    #[test]
    fn test_read_write_chains_on_the_previous_writer() {
        let mut builder = RenderGraphBuilder::new();
        builder.add_pass(pass("Deferred", &[], &["Light"])).unwrap();
        builder.add_pass(pass("Forward", &["Light"], &["Light"])).unwrap();
        builder.add_pass(pass("Post", &["Light"], &["Output"])).unwrap();
        let graph = builder.build().unwrap();

        assert_eq!(graph.nodes()[1].dependencies, ["Deferred"]);
        assert_eq!(graph.nodes()[2].dependencies, ["Forward"]);
    }
}
