//! Main orchestrator - runs a pipeline stage by stage

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::activity::ActivityList;
use crate::agent::AgentRegistry;
use crate::context::PipelineContext;
use crate::error::{BroodError, Result};
use crate::executor::{StageExecutor, StageInvocation, StageOutput};
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::run::{CancelToken, RunEvent, RunId, RunState, RunTracker};

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub activities: ActivityList,
    /// Raw output of every stage, in pipeline order
    pub transcript: Vec<StageOutput>,
    /// Path the activity list was written to, if the final stage names one
    pub artifact: Option<PathBuf>,
}

/// Executes pipelines through an external stage executor
///
/// Holds no per-run state, so one orchestrator can drive any number of
/// concurrent runs.
pub struct Orchestrator {
    executor: Arc<dyn StageExecutor>,
    event_tx: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl Orchestrator {
    pub fn new(executor: Arc<dyn StageExecutor>) -> Self {
        Self {
            executor,
            event_tx: None,
        }
    }

    /// Report run progress on the given channel
    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Build the standard family activity pipeline for a request and run it
    pub async fn plan(
        &self,
        ctx: &PipelineContext,
        options: &PipelineOptions,
    ) -> Result<ActivityList> {
        let pipeline = Pipeline::family_activities(&AgentRegistry::standard(), ctx, options)?;
        self.run(&pipeline).await
    }

    /// Run the pipeline and return the validated activity list
    pub async fn run(&self, pipeline: &Pipeline) -> Result<ActivityList> {
        self.run_with_cancel(pipeline, &CancelToken::new())
            .await
            .map(|report| report.activities)
    }

    /// Run the pipeline, checking `cancel` before every stage
    #[instrument(skip_all, fields(stages = pipeline.len()))]
    pub async fn run_with_cancel(
        &self,
        pipeline: &Pipeline,
        cancel: &CancelToken,
    ) -> Result<RunReport> {
        let mut tracker = RunTracker::new(self.event_tx.clone());
        let run_id = tracker.id;

        info!(run_id = %run_id, "Starting pipeline run");
        tracker.emit(RunEvent::RunStarted {
            run_id,
            stages: pipeline.len(),
        });

        match self.execute(pipeline, cancel, &mut tracker).await {
            Ok(report) => {
                tracker.transition(RunState::Completed);
                tracker.emit(RunEvent::RunCompleted {
                    run_id,
                    activities: report.activities.len(),
                });
                info!(run_id = %run_id, activities = report.activities.len(), "Pipeline run completed");
                Ok(report)
            }
            Err(e) => {
                error!(run_id = %run_id, state = ?tracker.state(), error = %e, "Pipeline run failed");
                tracker.transition(RunState::Failed);
                tracker.emit(RunEvent::RunFailed {
                    run_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        pipeline: &Pipeline,
        cancel: &CancelToken,
        tracker: &mut RunTracker,
    ) -> Result<RunReport> {
        let run_id = tracker.id;
        let mut transcript: Vec<StageOutput> = Vec::with_capacity(pipeline.len());

        for (index, stage) in pipeline.stages().iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(BroodError::Cancelled {
                    before_stage: stage.name.clone(),
                });
            }

            tracker.transition(RunState::StageRunning { index });
            tracker.emit(RunEvent::StageStarted {
                run_id,
                stage: stage.name.clone(),
                role: stage.agent.role_name.clone(),
            });
            debug!(run_id = %run_id, stage = %stage.name, "Invoking stage");

            let invocation = StageInvocation::new(stage, &transcript, pipeline.verbose());
            let raw = match self.executor.run_stage(invocation).await {
                Ok(raw) => raw,
                Err(source) => {
                    tracker.emit(RunEvent::StageFailed {
                        run_id,
                        stage: stage.name.clone(),
                        error: format!("{source:#}"),
                    });
                    return Err(BroodError::StageExecution {
                        stage: stage.name.clone(),
                        source,
                    });
                }
            };

            tracker.emit(RunEvent::StageCompleted {
                run_id,
                stage: stage.name.clone(),
                output_len: raw.len(),
            });
            info!(run_id = %run_id, stage = %stage.name, "Stage completed");

            transcript.push(StageOutput {
                stage: stage.name.clone(),
                role_name: stage.agent.role_name.clone(),
                raw,
            });
        }

        tracker.transition(RunState::Validating);

        let final_output = transcript.last().map(|o| o.raw.as_str()).unwrap_or_default();
        let activities = ActivityList::validate(final_output, pipeline.bounds())?;

        let artifact = match &pipeline.final_stage().output_artifact {
            Some(path) => {
                write_artifact(path, &activities, run_id).await?;
                info!(run_id = %run_id, path = %path.display(), "Wrote activity artifact");
                Some(path.clone())
            }
            None => None,
        };

        Ok(RunReport {
            run_id,
            activities,
            transcript,
            artifact,
        })
    }
}

/// Write the list next to its destination, then rename into place
async fn write_artifact(path: &Path, activities: &ActivityList, run_id: RunId) -> Result<()> {
    let artifact_err = |source| BroodError::Artifact {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(activities)
        .map_err(|e| artifact_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        tokio::fs::create_dir_all(dir).await.map_err(artifact_err)?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| {
            artifact_err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "artifact path has no file name",
            ))
        })?
        .to_string_lossy();
    let tmp_name = format!(".{file_name}.{run_id}.tmp");
    let tmp = match dir {
        Some(dir) => dir.join(tmp_name),
        None => PathBuf::from(tmp_name),
    };

    if let Err(e) = tokio::fs::write(&tmp, &json).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(artifact_err(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(artifact_err(e));
    }
    Ok(())
}
