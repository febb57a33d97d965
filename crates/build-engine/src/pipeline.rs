//! Build Pipeline Graph
//!
//! The fixed step topology of an APK build:
//!
//! ```text
//! compile-entry-point -> dex-convert --\
//! compile-resources -------------------+-> package-artifact -> sign-artifact -> verify-artifact
//! install-native-library --------------/                                    \-> deploy-artifact
//! ```
//!
//! A graph can only be built from an error-free resolution, so a pipeline is
//! either complete or does not exist.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use petgraph::Direction;
use tracing::{debug, info};

use apkforge_android_toolchain::{ResolvedConfiguration, ValidConfiguration};
use apkforge_core::{AppLayout, DeployConfig, ForgeConfig, SigningConfig};

use crate::{BuildError, BuildPaths};

/// One step of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepId {
    CompileEntryPoint,
    DexConvert,
    CompileResources,
    InstallNativeLibrary,
    PackageArtifact,
    SignArtifact,
    VerifyArtifact,
    DeployArtifact,
}

impl StepId {
    /// Declaration order, which is also the tie-break order for execution
    pub const ALL: [StepId; 8] = [
        StepId::CompileEntryPoint,
        StepId::DexConvert,
        StepId::CompileResources,
        StepId::InstallNativeLibrary,
        StepId::PackageArtifact,
        StepId::SignArtifact,
        StepId::VerifyArtifact,
        StepId::DeployArtifact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::CompileEntryPoint => "compile-entry-point",
            StepId::DexConvert => "dex-convert",
            StepId::CompileResources => "compile-resources",
            StepId::InstallNativeLibrary => "install-native-library",
            StepId::PackageArtifact => "package-artifact",
            StepId::SignArtifact => "sign-artifact",
            StepId::VerifyArtifact => "verify-artifact",
            StepId::DeployArtifact => "deploy-artifact",
        }
    }

    /// Steps that must succeed before this one may run
    pub fn depends_on(&self) -> &'static [StepId] {
        match self {
            StepId::CompileEntryPoint
            | StepId::CompileResources
            | StepId::InstallNativeLibrary => &[],
            StepId::DexConvert => &[StepId::CompileEntryPoint],
            StepId::PackageArtifact => &[
                StepId::InstallNativeLibrary,
                StepId::CompileResources,
                StepId::DexConvert,
            ],
            StepId::SignArtifact => &[StepId::PackageArtifact],
            StepId::VerifyArtifact | StepId::DeployArtifact => &[StepId::SignArtifact],
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepId {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| BuildError::UnknownStep(s.to_string()))
    }
}

/// Execution state of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Everything a step needs, resolved once when the graph is built
#[derive(Debug, Clone)]
pub struct StepContext {
    pub toolchain: ValidConfiguration,
    pub app: AppLayout,
    pub paths: BuildPaths,
    pub signing: SigningConfig,
    pub deploy: DeployConfig,
}

impl StepContext {
    pub fn new(toolchain: ValidConfiguration, config: &ForgeConfig) -> Self {
        Self {
            toolchain,
            app: config.app.clone(),
            paths: BuildPaths::new(config.build.output_dir.clone(), config.app.name.clone()),
            signing: config.signing.clone(),
            deploy: config.deploy.clone(),
        }
    }
}

/// A node of the pipeline graph
#[derive(Debug, Clone)]
pub struct PipelineStep {
    pub id: StepId,
    pub depends_on: Vec<StepId>,
    pub status: StepStatus,
    pub context: Arc<StepContext>,
}

/// The build DAG
pub struct PipelineGraph {
    graph: DiGraph<PipelineStep, ()>,
    nodes: HashMap<StepId, NodeIndex>,
    context: Arc<StepContext>,
}

impl PipelineGraph {
    /// Build the pipeline from a resolution, refusing any resolution with errors
    pub fn build(
        resolved: ResolvedConfiguration,
        config: &ForgeConfig,
    ) -> Result<Self, BuildError> {
        let toolchain = resolved.into_valid().map_err(BuildError::Unresolved)?;
        Ok(Self::new(StepContext::new(toolchain, config)))
    }

    /// Build the pipeline for an already validated configuration
    pub(crate) fn new(context: StepContext) -> Self {
        let context = Arc::new(context);
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for id in StepId::ALL {
            let idx = graph.add_node(PipelineStep {
                id,
                depends_on: id.depends_on().to_vec(),
                status: StepStatus::Pending,
                context: Arc::clone(&context),
            });
            nodes.insert(id, idx);
        }

        // Edge from dependency to dependent
        for id in StepId::ALL {
            for dep in id.depends_on() {
                graph.add_edge(nodes[dep], nodes[&id], ());
            }
        }

        info!(
            "Pipeline ready: build-tools {}, API level {}",
            context.toolchain.build_tools(),
            context.toolchain.api_level()
        );
        Self { graph, nodes, context }
    }

    pub fn contains(&self, id: StepId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn step(&self, id: StepId) -> Option<&PipelineStep> {
        self.nodes.get(&id).map(|idx| &self.graph[*idx])
    }

    pub fn status(&self, id: StepId) -> Option<StepStatus> {
        self.step(id).map(|s| s.status)
    }

    pub(crate) fn set_status(&mut self, id: StepId, status: StepStatus) {
        if let Some(idx) = self.nodes.get(&id) {
            debug!("{} -> {:?}", id, status);
            self.graph[*idx].status = status;
        }
    }

    /// Direct predecessors of a step
    pub fn predecessors(&self, id: StepId) -> Vec<StepId> {
        match self.nodes.get(&id) {
            Some(idx) => self
                .graph
                .neighbors_directed(*idx, Direction::Incoming)
                .map(|n| self.graph[n].id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// A pending step whose predecessors have all succeeded
    pub fn is_eligible(&self, id: StepId) -> bool {
        self.status(id) == Some(StepStatus::Pending)
            && self
                .predecessors(id)
                .into_iter()
                .all(|p| self.status(p) == Some(StepStatus::Succeeded))
    }

    /// Deterministic topological order: repeatedly take the first step, in
    /// declaration order, whose predecessors have all been emitted
    pub fn execution_order(&self) -> Vec<StepId> {
        let mut order: Vec<StepId> = Vec::with_capacity(self.nodes.len());
        while order.len() < self.nodes.len() {
            let next = StepId::ALL.iter().copied().find(|id| {
                self.contains(*id)
                    && !order.contains(id)
                    && self.predecessors(*id).iter().all(|p| order.contains(p))
            });
            match next {
                Some(id) => order.push(id),
                None => break,
            }
        }
        order
    }

    /// `target` and every step it transitively depends on, in execution order
    pub fn plan_until(&self, target: StepId) -> Vec<StepId> {
        let Some(&start) = self.nodes.get(&target) else {
            return Vec::new();
        };

        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, start);
        let mut needed = HashSet::new();
        while let Some(idx) = dfs.next(reversed) {
            needed.insert(self.graph[idx].id);
        }

        self.execution_order()
            .into_iter()
            .filter(|id| needed.contains(id))
            .collect()
    }

    /// Steps in execution order
    pub fn steps(&self) -> impl Iterator<Item = &PipelineStep> {
        self.execution_order()
            .into_iter()
            .filter_map(move |id| self.step(id))
    }

    /// The shared step context
    pub fn context(&self) -> Arc<StepContext> {
        Arc::clone(&self.context)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use apkforge_android_toolchain::{Component, ValidationError};
    use std::path::PathBuf;

    fn resolved(errors: Vec<ValidationError>) -> ResolvedConfiguration {
        ResolvedConfiguration {
            sdk_root: PathBuf::from("/sdk"),
            ndk_root: PathBuf::from("/sdk/ndk/27.0.12077973"),
            build_tools: Some("35.0.0".to_string()),
            api_level: Some(34),
            min_api: 26,
            errors,
        }
    }

    pub(crate) fn valid_toolchain() -> ValidConfiguration {
        resolved(Vec::new()).into_valid().unwrap()
    }

    pub(crate) fn graph() -> PipelineGraph {
        PipelineGraph::new(StepContext::new(valid_toolchain(), &ForgeConfig::default()))
    }

    #[test]
    fn test_execution_order() {
        let order = graph().execution_order();
        assert_eq!(order, StepId::ALL.to_vec());
    }

    #[test]
    fn test_order_respects_dependencies() {
        let order = graph().execution_order();
        let pos = |id: StepId| order.iter().position(|s| *s == id).unwrap();
        for id in StepId::ALL {
            for dep in id.depends_on() {
                assert!(pos(*dep) < pos(id), "{} must run before {}", dep, id);
            }
        }
    }

    #[test]
    fn test_graph_is_acyclic() {
        let g = graph();
        assert!(!petgraph::algo::is_cyclic_directed(&g.graph));
        assert_eq!(g.graph.node_count(), 8);
        assert_eq!(g.graph.edge_count(), 7);
    }

    #[test]
    fn test_predecessors() {
        let g = graph();
        let mut preds = g.predecessors(StepId::PackageArtifact);
        preds.sort();
        assert_eq!(
            preds,
            vec![StepId::DexConvert, StepId::CompileResources, StepId::InstallNativeLibrary]
        );
        assert!(g.predecessors(StepId::CompileResources).is_empty());
    }

    #[test]
    fn test_eligibility() {
        let mut g = graph();
        assert!(g.is_eligible(StepId::CompileEntryPoint));
        assert!(g.is_eligible(StepId::CompileResources));
        assert!(!g.is_eligible(StepId::DexConvert));

        g.set_status(StepId::CompileEntryPoint, StepStatus::Succeeded);
        assert!(g.is_eligible(StepId::DexConvert));

        g.set_status(StepId::DexConvert, StepStatus::Failed);
        g.set_status(StepId::CompileResources, StepStatus::Succeeded);
        g.set_status(StepId::InstallNativeLibrary, StepStatus::Succeeded);
        assert!(!g.is_eligible(StepId::PackageArtifact));
    }

    #[test]
    fn test_plan_until() {
        let g = graph();
        assert_eq!(
            g.plan_until(StepId::DexConvert),
            vec![StepId::CompileEntryPoint, StepId::DexConvert]
        );

        let plan = g.plan_until(StepId::VerifyArtifact);
        assert_eq!(plan.len(), 7);
        assert!(!plan.contains(&StepId::DeployArtifact));
        assert_eq!(plan.last(), Some(&StepId::VerifyArtifact));
    }

    #[test]
    fn test_no_graph_with_errors() {
        let errors = vec![ValidationError::new(Component::Ndk, "NDK too old", "upgrade")];
        let result = PipelineGraph::build(resolved(errors), &ForgeConfig::default());
        match result {
            Err(BuildError::Unresolved(errors)) => assert_eq!(errors.len(), 1),
            _ => panic!("a graph must not be built from a failed resolution"),
        }
    }

    #[test]
    fn test_graph_from_valid_resolution() {
        let g = PipelineGraph::build(resolved(Vec::new()), &ForgeConfig::default()).unwrap();
        assert!(g.contains(StepId::PackageArtifact));
        assert!(g.steps().all(|s| s.status == StepStatus::Pending));
        assert_eq!(g.context().toolchain.api_level(), 34);
    }

    #[test]
    fn test_step_names_round_trip() {
        for id in StepId::ALL {
            assert_eq!(id.as_str().parse::<StepId>().unwrap(), id);
        }
        assert!("link-everything".parse::<StepId>().is_err());
    }
}
