//! Builds `state::CoreServices` once at boot and starts the cluster-job
//! scheduler poller, mirroring the teacher's `PhotosProcessorInitializer`
//! (`initializers/photos_processor.rs`): an `Initializer::before_run` that
//! kicks off the process's background work rather than leaving it to the
//! first inbound request.

use std::sync::Arc;
use std::time::Duration;

use loco_rs::prelude::*;
use tracing::info;

use crate::common::settings::Settings;
use crate::debounce::scheduler::ClusterJobDispatch;
use crate::state;
use crate::workers::cluster_group::ClusterDispatch;

const SCHEDULER_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct CoreServicesInitializer;

#[async_trait]
impl Initializer for CoreServicesInitializer {
    fn name(&self) -> String {
        "core-services".to_string()
    }

    async fn before_run(&self, ctx: &AppContext) -> Result<()> {
        let settings = Settings::from_context(ctx);
        let services = state::init(settings).await?;

        let dispatch: Arc<dyn ClusterJobDispatch> = Arc::new(ClusterDispatch { ctx: ctx.clone() });
        let scheduler = services.scheduler.clone();
        tokio::spawn(async move {
            info!("cluster job scheduler poller starting");
            scheduler.run_forever(dispatch, SCHEDULER_POLL_INTERVAL).await;
        });

        Ok(())
    }
}
