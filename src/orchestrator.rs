//! Orchestrator - runs the four stages as separate processes
//!
//! ```text
//! load_data ──> preprocess ──> train ──> evaluate
//!     │             │            │          │
//!     └─ exit != 0 ─┴── abort ───┴──────────┘
//! ```
//!
//! Each stage is invoked through a [`StageRunner`], which reports the
//! outcome instead of raising. [`Pipeline::run`] then decides whether to
//! continue; the policy is abort-on-first-failure, with no retry.

use crate::config::{PipelineConfig, PipelineLayout};
use crate::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// One pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Resolve and extract the raw dataset
    LoadData,
    /// Split into train and test subsets
    Preprocess,
    /// Fit and save the model
    Train,
    /// Score the model on the test subset
    Evaluate,
}

impl Stage {
    /// Stages in execution order.
    pub const ALL: [Self; 4] = [Self::LoadData, Self::Preprocess, Self::Train, Self::Evaluate];

    /// Binary implementing the stage.
    #[must_use]
    pub const fn binary(self) -> &'static str {
        match self {
            Self::LoadData => "load_data",
            Self::Preprocess => "preprocess",
            Self::Train => "train",
            Self::Evaluate => "evaluate",
        }
    }

    /// Positional arguments for the stage, taken from `layout`.
    #[must_use]
    pub fn args(self, layout: &PipelineLayout) -> Vec<OsString> {
        match self {
            Self::LoadData => vec![
                OsString::from(&layout.raw_data),
                layout.extracted.clone().into_os_string(),
            ],
            Self::Preprocess => vec![
                layout.extracted.clone().into_os_string(),
                layout.train.clone().into_os_string(),
                layout.test.clone().into_os_string(),
            ],
            Self::Train => vec![
                layout.train.clone().into_os_string(),
                layout.model.clone().into_os_string(),
            ],
            Self::Evaluate => vec![
                layout.model.clone().into_os_string(),
                layout.test.clone().into_os_string(),
            ],
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary())
    }
}

/// Result of running one stage, whether it succeeded or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    /// Stage that ran
    pub stage: Stage,
    /// Exit code, `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Wall-clock time
    pub duration: Duration,
}

impl StageOutcome {
    /// Whether the stage exited zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Progress notification from [`Pipeline::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent<'a> {
    /// The stage is about to be started
    Starting(Stage),
    /// The stage ran; emitted for failures too
    Finished(&'a StageOutcome),
}

/// Executes a single stage.
pub trait StageRunner {
    /// Run `stage` with `args` under `config`.
    ///
    /// # Errors
    ///
    /// Returns error only if the stage could not be started; a stage that
    /// starts and fails is reported through [`StageOutcome`].
    fn run_stage(
        &mut self,
        stage: Stage,
        args: &[OsString],
        config: &PipelineConfig,
    ) -> Result<StageOutcome>;
}

/// Runs stage binaries as child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    bin_dir: PathBuf,
    working_dir: PathBuf,
}

impl ProcessRunner {
    /// Runner taking binaries from `bin_dir`, executing in `working_dir`.
    #[must_use]
    pub fn new(bin_dir: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Runner taking binaries from the directory of the running executable.
    ///
    /// # Errors
    ///
    /// Returns error if the current executable cannot be located
    pub fn beside_current_exe(working_dir: impl Into<PathBuf>) -> Result<Self> {
        let exe = std::env::current_exe()?;
        let bin_dir = exe
            .parent()
            .ok_or_else(|| Error::Other(format!("{} has no parent directory", exe.display())))?;
        Ok(Self::new(bin_dir, working_dir))
    }

    /// Path of a stage's binary.
    #[must_use]
    pub fn program(&self, stage: Stage) -> PathBuf {
        self.bin_dir
            .join(format!("{}{}", stage.binary(), std::env::consts::EXE_SUFFIX))
    }

    /// Working directory of the children.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

impl StageRunner for ProcessRunner {
    fn run_stage(
        &mut self,
        stage: Stage,
        args: &[OsString],
        config: &PipelineConfig,
    ) -> Result<StageOutcome> {
        let program = self.program(stage);
        tracing::info!(%stage, program = %program.display(), ?args, "starting stage");

        let started = Instant::now();
        let output = Command::new(&program)
            .args(args)
            .envs(config.env_pairs())
            .current_dir(&self.working_dir)
            .output()
            .map_err(|e| Error::Other(format!("cannot start {}: {e}", program.display())))?;

        let outcome = StageOutcome {
            stage,
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        };
        tracing::info!(
            %stage,
            code = ?outcome.exit_code,
            elapsed_ms = outcome.duration.as_millis(),
            "stage finished"
        );
        Ok(outcome)
    }
}

/// Outcomes of the stages that ran, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    outcomes: Vec<StageOutcome>,
}

impl PipelineReport {
    /// Outcomes in execution order.
    #[must_use]
    pub fn outcomes(&self) -> &[StageOutcome] {
        &self.outcomes
    }

    /// The stage that stopped the pipeline, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|outcome| !outcome.success())
    }

    /// Whether all four stages ran and succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcomes.len() == Stage::ALL.len() && self.failure().is_none()
    }

    /// Convert to an error naming the failed stage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StageFailed`] if any stage failed
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failure().map(|outcome| Error::StageFailed {
            stage: outcome.stage.binary().to_string(),
            code: outcome.exit_code,
        });
        failed.map_or(Ok(self), Err)
    }
}

/// The four-stage pipeline with a fixed layout and configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    layout: PipelineLayout,
    config: PipelineConfig,
}

impl Pipeline {
    /// Pipeline over `layout`, forwarding `config` to every stage.
    #[must_use]
    pub const fn new(layout: PipelineLayout, config: PipelineConfig) -> Self {
        Self { layout, config }
    }

    /// File layout.
    #[must_use]
    pub const fn layout(&self) -> &PipelineLayout {
        &self.layout
    }

    /// Configuration forwarded to the stages.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the stages in order, stopping after the first that fails.
    /// `observe` is told before each stage starts and sees its outcome as
    /// soon as it finishes.
    ///
    /// # Errors
    ///
    /// Returns error if a stage could not be started. A stage that ran
    /// and failed is reported in the returned [`PipelineReport`].
    pub fn run<R, F>(&self, runner: &mut R, mut observe: F) -> Result<PipelineReport>
    where
        R: StageRunner,
        F: FnMut(StageEvent<'_>),
    {
        let mut report = PipelineReport::default();
        for stage in Stage::ALL {
            observe(StageEvent::Starting(stage));
            let outcome = runner.run_stage(stage, &stage.args(&self.layout), &self.config)?;
            observe(StageEvent::Finished(&outcome));
            let failed = !outcome.success();
            report.outcomes.push(outcome);
            if failed {
                tracing::warn!(%stage, "stage failed, aborting pipeline");
                break;
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedRunner {
        fail_at: Option<Stage>,
        calls: Vec<(Stage, Vec<OsString>, PipelineConfig)>,
    }

    impl ScriptedRunner {
        fn new(fail_at: Option<Stage>) -> Self {
            Self {
                fail_at,
                calls: Vec::new(),
            }
        }
    }

    impl StageRunner for ScriptedRunner {
        fn run_stage(
            &mut self,
            stage: Stage,
            args: &[OsString],
            config: &PipelineConfig,
        ) -> Result<StageOutcome> {
            self.calls.push((stage, args.to_vec(), config.clone()));
            let failed = self.fail_at == Some(stage);
            Ok(StageOutcome {
                stage,
                exit_code: Some(i32::from(failed)),
                stdout: format!("{stage} ran\n"),
                stderr: if failed { "boom\n".to_string() } else { String::new() },
                duration: Duration::ZERO,
            })
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            PipelineLayout::under(Path::new("")),
            PipelineConfig::new("file:mlruns", "exp"),
        )
    }

    #[test]
    fn test_all_stages_run_in_order() {
        let mut runner = ScriptedRunner::new(None);
        let mut seen = Vec::new();
        let report = pipeline()
            .run(&mut runner, |event| {
                if let StageEvent::Finished(outcome) = event {
                    seen.push(outcome.stage);
                }
            })
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(seen, Stage::ALL);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_abort_after_each_failing_stage() {
        for (position, failing) in Stage::ALL.into_iter().enumerate() {
            let mut runner = ScriptedRunner::new(Some(failing));
            let report = pipeline().run(&mut runner, |_| {}).unwrap();

            assert_eq!(runner.calls.len(), position + 1);
            assert_eq!(report.failure().map(|o| o.stage), Some(failing));
            assert!(!report.succeeded());
            match report.into_result() {
                Err(Error::StageFailed { stage, code }) => {
                    assert_eq!(stage, failing.binary());
                    assert_eq!(code, Some(1));
                }
                other => panic!("expected StageFailed, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_starting_announced_before_each_stage_runs() {
        let mut runner = ScriptedRunner::new(Some(Stage::Train));
        let mut events = Vec::new();
        pipeline()
            .run(&mut runner, |event| {
                events.push(match event {
                    StageEvent::Starting(stage) => format!("start {stage}"),
                    StageEvent::Finished(outcome) => {
                        format!("end {} {}", outcome.stage, outcome.success())
                    }
                });
            })
            .unwrap();

        assert_eq!(
            events,
            [
                "start load_data",
                "end load_data true",
                "start preprocess",
                "end preprocess true",
                "start train",
                "end train false",
            ]
        );
    }

    #[test]
    fn test_starting_precedes_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ProcessRunner::new(dir.path(), dir.path());
        let mut started = Vec::new();
        let result = pipeline().run(&mut runner, |event| {
            if let StageEvent::Starting(stage) = event {
                started.push(stage);
            }
        });
        assert!(result.is_err());
        assert_eq!(started, [Stage::LoadData]);
    }

    #[test]
    fn test_stage_arguments_follow_layout() {
        let mut runner = ScriptedRunner::new(None);
        pipeline().run(&mut runner, |_| {}).unwrap();

        let args: Vec<Vec<String>> = runner
            .calls
            .iter()
            .map(|(_, args, _)| args.iter().map(|a| a.to_string_lossy().into_owned()).collect())
            .collect();
        assert_eq!(args[0], ["data/raw_data.csv", "data/extracted.csv"]);
        assert_eq!(args[1], ["data/extracted.csv", "data/train.csv", "data/test.csv"]);
        assert_eq!(args[2], ["data/train.csv", "data/model.bin"]);
        assert_eq!(args[3], ["data/model.bin", "data/test.csv"]);
    }

    #[test]
    fn test_config_forwarded_to_every_stage() {
        let mut runner = ScriptedRunner::new(None);
        pipeline().run(&mut runner, |_| {}).unwrap();
        assert!(runner
            .calls
            .iter()
            .all(|(_, _, config)| config.tracking_uri == "file:mlruns"));
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ProcessRunner::new(dir.path(), dir.path());
        let err = pipeline().run(&mut runner, |_| {}).unwrap_err();
        assert!(err.to_string().contains("load_data"));
    }
}
