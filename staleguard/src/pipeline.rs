use tracing::{debug, error, instrument};

use crate::context::RunContext;
use crate::error::Result;
use crate::stages::Stage;

/// Ordered stages applied to one run. The first failing stage aborts the run;
/// later stages never see a half-updated context.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    #[instrument(skip(self, ctx), fields(policy = %ctx.policy.id, stage_count = self.stages.len()))]
    pub async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        for stage in &self.stages {
            if let Err(e) = stage.run(ctx).await {
                error!(stage = stage.name(), error = %e, "stage failed");
                return Err(e);
            }
            debug!(stage = stage.name(), "stage complete");
        }
        Ok(())
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self { stages: vec![] }
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
