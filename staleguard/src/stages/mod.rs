pub mod advisory;
pub mod update;

use async_trait::async_trait;

use crate::context::RunContext;
use crate::error::Result;

#[async_trait]
pub trait Stage: Send + Sync {
    async fn run(&self, ctx: &mut RunContext) -> Result<()>;
    fn name(&self) -> &'static str;
}

pub use advisory::AdvisoryStage;
pub use update::CacheUpdateStage;
