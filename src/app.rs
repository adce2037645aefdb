//! `loco_rs::app::Hooks` wiring for this binary. No literal counterpart
//! ships in the teacher pack (it has no `src/app.rs`/`src/lib.rs`), so this
//! follows the standard `loco-rs new` application shape: boot via
//! `create_app`, register routes/initializers/workers here.

use async_trait::async_trait;
use loco_rs::app::{AppContext, Hooks, Initializer};
use loco_rs::boot::{create_app, BootResult, StartMode};
use loco_rs::controller::AppRoutes;
use loco_rs::db::truncate_table;
use loco_rs::environment::Environment;
use loco_rs::task::Tasks;
use loco_rs::worker::AppWorker;
use loco_rs::{config::Config, Result};
use migration::Migrator;

use crate::controllers;
use crate::initializers::core_services::CoreServicesInitializer;
use crate::models::{meetings, photos};
use crate::workers::cluster_group::ClusterGroupWorker;
use crate::workers::process_photo::ProcessPhotoWorker;

pub struct App;

#[async_trait]
impl Hooks for App {
    fn app_name() -> &'static str {
        env!("CARGO_CRATE_NAME")
    }

    fn app_version() -> String {
        format!(
            "{}-{}",
            env!("CARGO_PKG_VERSION"),
            option_env!("BUILD_SHA").or(option_env!("GIT_SHA")).unwrap_or("dev")
        )
    }

    async fn boot(mode: StartMode, environment: &Environment, config: Config) -> Result<BootResult> {
        create_app::<Self, Migrator>(mode, environment, config).await
    }

    fn routes(_ctx: &AppContext) -> AppRoutes {
        AppRoutes::with_default_routes()
            .add_route(controllers::photos::routes())
            .add_route(controllers::download::routes())
    }

    async fn initializers(_ctx: &AppContext) -> Result<Vec<Box<dyn Initializer>>> {
        Ok(vec![Box::new(CoreServicesInitializer)])
    }

    async fn connect_workers(ctx: &AppContext, queue: &loco_rs::bgworker::Queue) -> Result<()> {
        queue.register(ProcessPhotoWorker::build(ctx)).await?;
        queue.register(ClusterGroupWorker::build(ctx)).await?;
        Ok(())
    }

    fn register_tasks(_tasks: &mut Tasks) {}

    async fn truncate(ctx: &AppContext) -> Result<()> {
        truncate_table(&ctx.db, photos::Entity).await?;
        truncate_table(&ctx.db, meetings::Entity).await?;
        Ok(())
    }

    async fn seed(_ctx: &AppContext, _base: &std::path::Path) -> Result<()> {
        Ok(())
    }
}
