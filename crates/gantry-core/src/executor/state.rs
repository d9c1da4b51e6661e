use gantry_model::{BuildStage, ExecutorStage};
use tracing::trace;

use crate::{ExecutorError, ExecutorResult};

/// Lifecycle bookkeeping shared by executor implementations.
#[derive(Debug, Default)]
pub struct ExecutorState {
    stage: ExecutorStage,
}

impl ExecutorState {
    pub fn stage(&self) -> ExecutorStage {
        self.stage
    }

    pub fn set(&mut self, stage: ExecutorStage) {
        trace!(from = %self.stage, to = %stage, "executor stage");
        self.stage = stage;
    }

    pub fn begin_prepare(&mut self) -> ExecutorResult<()> {
        self.require("prepare", |s| s == ExecutorStage::Created)?;
        self.set(ExecutorStage::Preparing);
        Ok(())
    }

    pub fn prepared(&mut self) {
        self.set(ExecutorStage::Prepared);
    }

    /// Enter `stage`; only valid once prepared.
    pub fn begin_run(&mut self, stage: BuildStage) -> ExecutorResult<()> {
        self.require("run", |s| {
            matches!(s, ExecutorStage::Prepared | ExecutorStage::Running(_))
        })?;
        self.set(ExecutorStage::Running(stage));
        Ok(())
    }

    /// Returns `false` when the job was already finished.
    pub fn begin_finish(&mut self) -> bool {
        if matches!(
            self.stage,
            ExecutorStage::Finishing
                | ExecutorStage::Finished
                | ExecutorStage::CleaningUp
                | ExecutorStage::CleanedUp
        ) {
            return false;
        }
        self.set(ExecutorStage::Finishing);
        true
    }

    pub fn finished(&mut self) {
        self.set(ExecutorStage::Finished);
    }

    /// Returns `false` when cleanup already ran.
    pub fn begin_cleanup(&mut self) -> bool {
        if matches!(self.stage, ExecutorStage::CleaningUp | ExecutorStage::CleanedUp) {
            return false;
        }
        self.set(ExecutorStage::CleaningUp);
        true
    }

    pub fn cleaned_up(&mut self) {
        self.set(ExecutorStage::CleanedUp);
    }

    fn require(
        &self,
        op: &'static str,
        allowed: impl Fn(ExecutorStage) -> bool,
    ) -> ExecutorResult<()> {
        if allowed(self.stage) {
            Ok(())
        } else {
            Err(ExecutorError::InvalidState {
                op,
                stage: self.stage,
            })
        }
    }
}
