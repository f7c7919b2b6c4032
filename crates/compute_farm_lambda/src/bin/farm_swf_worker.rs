use std::error::Error;
use std::time::Duration;

use compute_farm_lambda::adapters::activity_service::SwfActivityService;
use compute_farm_lambda::config::{AwsClients, FarmConfig, FarmSettings};
use compute_farm_lambda::worker::{run_once, WorkerOutcome};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let settings = FarmSettings::from_env()?;
    let domain = settings.require_swf_domain()?.to_string();
    let task_list = settings.swf_task_list.clone();

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let clients = AwsClients::from_sdk_config(&aws_config);
    let runtime = tokio::runtime::Handle::current();
    let service = SwfActivityService::new(
        clients.swf.clone(),
        domain.as_str(),
        task_list.as_str(),
        format!("farm-worker-{}", std::process::id()),
        runtime.clone(),
    );
    let farm = FarmConfig::from_aws(settings, clients, runtime)?;
    info!(
        component = "farm_swf_worker",
        domain = %domain,
        task_list = %task_list,
        bucket = %farm.store.bucket(),
        prefix = %farm.settings.prefix,
        "worker_started"
    );

    tokio::task::spawn_blocking(move || loop {
        match run_once(&service, &farm) {
            Ok(WorkerOutcome::Idle) => debug!(component = "farm_swf_worker", "poll_empty"),
            Ok(_) => {}
            Err(failure) => {
                error!(
                    component = "farm_swf_worker",
                    error = %failure,
                    "poll_failed"
                );
                std::thread::sleep(POLL_ERROR_BACKOFF);
            }
        }
    })
    .await?;

    Ok(())
}
