//! Build Runner
//!
//! Walks the pipeline graph one step at a time. The first failing step stops
//! the run and every step after it stays pending.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::pipeline::{PipelineGraph, StepId, StepStatus};
use crate::{BuildError, ToolInvoker};

/// Build output
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Steps that ran and succeeded, in order
    pub steps_run: Vec<StepId>,
    /// Signed APK, when the run got that far
    pub artifact: Option<PathBuf>,
    /// Build duration in seconds
    pub duration_secs: f64,
}

/// Build progress
#[derive(Debug, Clone)]
pub enum BuildProgress {
    Started { total: usize },
    StepStarted { step: StepId, index: usize, total: usize },
    StepFinished { step: StepId },
    Completed { output: BuildOutput },
    Failed { step: StepId, error: String },
}

/// Runs pipeline steps through a [`ToolInvoker`]
pub struct BuildRunner<I> {
    invoker: I,
    step_timeout: Duration,
    progress: Option<mpsc::Sender<BuildProgress>>,
}

impl<I: ToolInvoker> BuildRunner<I> {
    /// Create a new build runner
    pub fn new(invoker: I, step_timeout: Duration) -> Self {
        Self {
            invoker,
            step_timeout,
            progress: None,
        }
    }

    /// Report progress on a channel
    pub fn with_progress(mut self, tx: mpsc::Sender<BuildProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Run every step of the pipeline
    pub async fn run(&self, graph: &mut PipelineGraph) -> Result<BuildOutput, BuildError> {
        let plan = graph.execution_order();
        self.run_steps(graph, plan).await
    }

    /// Run `target` and the steps it depends on
    pub async fn run_until(
        &self,
        graph: &mut PipelineGraph,
        target: StepId,
    ) -> Result<BuildOutput, BuildError> {
        let plan = graph.plan_until(target);
        if plan.is_empty() {
            return Err(BuildError::UnknownStep(target.to_string()));
        }
        self.run_steps(graph, plan).await
    }

    async fn run_steps(
        &self,
        graph: &mut PipelineGraph,
        plan: Vec<StepId>,
    ) -> Result<BuildOutput, BuildError> {
        let start = Instant::now();
        let context = graph.context();
        let total = plan.len();
        let mut steps_run = Vec::with_capacity(total);

        // A new run retries what failed last time
        for step in &plan {
            if graph.status(*step) == Some(StepStatus::Failed) {
                graph.set_status(*step, StepStatus::Pending);
            }
        }

        info!("Running {} step(s)", total);
        self.report(BuildProgress::Started { total }).await;

        for (index, step) in plan.into_iter().enumerate() {
            // Steps completed by an earlier run on the same graph are kept
            if graph.status(step) == Some(StepStatus::Succeeded) {
                debug!("Skipping {}: already succeeded", step);
                continue;
            }
            if !graph.is_eligible(step) {
                let err = BuildError::StepFailed {
                    step,
                    diagnostics: "a prerequisite step has not succeeded".to_string(),
                };
                return Err(self.fail(graph, step, err).await);
            }

            info!("[{}/{}] {}", index + 1, total, step);
            self.report(BuildProgress::StepStarted { step, index, total }).await;
            graph.set_status(step, StepStatus::Running);

            let invocation = self.invoker.invoke(step, &context);
            let result = tokio::time::timeout(self.step_timeout, invocation).await;
            let output = match result {
                Err(_) => {
                    let err = BuildError::Timeout { step, secs: self.step_timeout.as_secs() };
                    return Err(self.fail(graph, step, err).await);
                }
                Ok(Err(err)) => return Err(self.fail(graph, step, err).await),
                Ok(Ok(output)) => output,
            };

            if !output.success {
                let err = BuildError::StepFailed { step, diagnostics: output.diagnostics };
                return Err(self.fail(graph, step, err).await);
            }

            if !output.diagnostics.trim().is_empty() {
                debug!("{} output:\n{}", step, output.diagnostics.trim_end());
            }
            graph.set_status(step, StepStatus::Succeeded);
            self.report(BuildProgress::StepFinished { step }).await;
            steps_run.push(step);
        }

        let artifact = (graph.status(StepId::SignArtifact) == Some(StepStatus::Succeeded))
            .then(|| context.paths.signed_apk());
        let duration = start.elapsed().as_secs_f64();

        let output = BuildOutput {
            steps_run,
            artifact,
            duration_secs: duration,
        };

        info!("Build completed in {:.2}s", duration);
        self.report(BuildProgress::Completed { output: output.clone() }).await;
        Ok(output)
    }

    async fn fail(&self, graph: &mut PipelineGraph, step: StepId, err: BuildError) -> BuildError {
        error!("{}", err);
        graph.set_status(step, StepStatus::Failed);
        self.report(BuildProgress::Failed { step, error: err.to_string() }).await;
        err
    }

    async fn report(&self, progress: BuildProgress) {
        if let Some(ref tx) = self.progress {
            let _ = tx.send(progress).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::graph;
    use crate::{StepContext, ToolOutput};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingInvoker {
        calls: Arc<Mutex<Vec<StepId>>>,
        fail_on: Option<StepId>,
        hang_on: Option<StepId>,
    }

    impl RecordingInvoker {
        fn calls(&self) -> Vec<StepId> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolInvoker for RecordingInvoker {
        async fn invoke(
            &self,
            step: StepId,
            _context: &StepContext,
        ) -> Result<ToolOutput, BuildError> {
            self.calls.lock().unwrap().push(step);
            if self.hang_on == Some(step) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.fail_on == Some(step) {
                return Ok(ToolOutput::failed("error: boom"));
            }
            Ok(ToolOutput::ok(""))
        }
    }

    fn runner(invoker: RecordingInvoker) -> BuildRunner<RecordingInvoker> {
        BuildRunner::new(invoker, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_full_run_in_order() {
        let invoker = RecordingInvoker::default();
        let mut g = graph();

        let output = runner(invoker.clone()).run(&mut g).await.unwrap();

        assert_eq!(invoker.calls(), StepId::ALL.to_vec());
        assert_eq!(output.steps_run, StepId::ALL.to_vec());
        assert!(output.artifact.is_some());
        assert!(g.steps().all(|s| s.status == StepStatus::Succeeded));
    }

    #[tokio::test]
    async fn test_failure_abandons_remaining_steps() {
        let invoker = RecordingInvoker {
            fail_on: Some(StepId::CompileResources),
            ..Default::default()
        };
        let mut g = graph();

        let result = runner(invoker.clone()).run(&mut g).await;
        match result {
            Err(BuildError::StepFailed { step, diagnostics }) => {
                assert_eq!(step, StepId::CompileResources);
                assert!(diagnostics.contains("boom"));
            }
            other => panic!("expected step failure, got {:?}", other.map(|o| o.steps_run)),
        }

        assert_eq!(
            invoker.calls(),
            vec![StepId::CompileEntryPoint, StepId::DexConvert, StepId::CompileResources]
        );
        assert_eq!(g.status(StepId::CompileResources), Some(StepStatus::Failed));
        assert_eq!(g.status(StepId::InstallNativeLibrary), Some(StepStatus::Pending));
        assert_eq!(g.status(StepId::PackageArtifact), Some(StepStatus::Pending));
        assert_eq!(g.status(StepId::DeployArtifact), Some(StepStatus::Pending));
    }

    #[tokio::test]
    async fn test_failed_step_retried_on_next_run() {
        let mut g = graph();
        let failing = RecordingInvoker {
            fail_on: Some(StepId::DexConvert),
            ..Default::default()
        };
        assert!(runner(failing).run(&mut g).await.is_err());
        assert_eq!(g.status(StepId::DexConvert), Some(StepStatus::Failed));

        let invoker = RecordingInvoker::default();
        let output = runner(invoker.clone()).run(&mut g).await.unwrap();

        assert_eq!(invoker.calls()[0], StepId::DexConvert);
        assert_eq!(output.steps_run.len(), 7);
        assert!(g.steps().all(|s| s.status == StepStatus::Succeeded));
    }

    #[tokio::test]
    async fn test_run_until() {
        let invoker = RecordingInvoker::default();
        let mut g = graph();
        let runner = runner(invoker.clone());

        let output = runner.run_until(&mut g, StepId::VerifyArtifact).await.unwrap();
        assert_eq!(output.steps_run.len(), 7);
        assert!(!invoker.calls().contains(&StepId::DeployArtifact));
        assert_eq!(g.status(StepId::DeployArtifact), Some(StepStatus::Pending));

        // A later run on the same graph only does what is left
        let output = runner.run(&mut g).await.unwrap();
        assert_eq!(output.steps_run, vec![StepId::DeployArtifact]);
        assert_eq!(invoker.calls().len(), 8);
    }

    #[tokio::test]
    async fn test_step_timeout() {
        let invoker = RecordingInvoker {
            hang_on: Some(StepId::DexConvert),
            ..Default::default()
        };
        let mut g = graph();
        let runner = BuildRunner::new(invoker.clone(), Duration::from_millis(50));

        let result = runner.run(&mut g).await;
        assert!(matches!(result, Err(BuildError::Timeout { step: StepId::DexConvert, .. })));
        assert_eq!(g.status(StepId::DexConvert), Some(StepStatus::Failed));
        assert_eq!(invoker.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let (tx, mut rx) = mpsc::channel(32);
        let mut g = graph();
        let runner = runner(RecordingInvoker::default()).with_progress(tx);

        runner.run_until(&mut g, StepId::DexConvert).await.unwrap();
        drop(runner);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(BuildProgress::Started { total: 2 })));
        assert!(matches!(events.last(), Some(BuildProgress::Completed { .. })));
        assert_eq!(events.len(), 6);
    }
}
