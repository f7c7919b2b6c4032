use compute_farm_lambda::adapters::s3_store::S3ShardStore;
use compute_farm_lambda::config::{AwsClients, FarmConfig, FarmSettings};
use compute_farm_lambda::runtime::handle_event;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn handle_request(
    event: LambdaEvent<Value>,
    farm: &FarmConfig<S3ShardStore>,
) -> Result<Value, Error> {
    let request_id = event.context.request_id.clone();
    handle_event(event.payload, farm).map_err(|failure| {
        error!(
            component = "farm_runtime",
            request_id = %request_id,
            error = %failure,
            "activity_failed"
        );
        Error::from(failure.to_string())
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    let settings = FarmSettings::from_env().map_err(|error| Error::from(error.to_string()))?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let farm = FarmConfig::from_aws(
        settings,
        AwsClients::from_sdk_config(&aws_config),
        tokio::runtime::Handle::current(),
    )
    .map_err(|error| Error::from(error.to_string()))?;
    info!(
        component = "farm_runtime",
        bucket = %farm.store.bucket(),
        prefix = %farm.settings.prefix,
        max_level = farm.settings.max_level,
        task_version = %farm.settings.task_version,
        "runtime_configured"
    );

    let farm = &farm;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(event, farm)
    }))
    .await
}
