use compute_farm_core::contract::{TaskRegistry, DEFAULT_TASK_VERSION};
use compute_farm_core::paths::MAX_SPLIT_DEPTH;

use crate::adapters::s3_store::S3ShardStore;
use crate::handlers::HandlerConfig;

pub const BUCKET_ENV: &str = "COMPUTE_FARM_BUCKET";
pub const PREFIX_ENV: &str = "COMPUTE_FARM_PREFIX";
pub const MAX_LEVEL_ENV: &str = "COMPUTE_FARM_MAX_LEVEL";
pub const TRANSFER_WORKERS_ENV: &str = "COMPUTE_FARM_TRANSFER_WORKERS";
pub const TASK_VERSION_ENV: &str = "COMPUTE_FARM_TASK_VERSION";
pub const SWF_DOMAIN_ENV: &str = "COMPUTE_FARM_SWF_DOMAIN";
pub const SWF_TASK_LIST_ENV: &str = "COMPUTE_FARM_SWF_TASK_LIST";

pub const DEFAULT_PREFIX: &str = "compute-farm/shards";
pub const DEFAULT_MAX_LEVEL: usize = 3;
pub const DEFAULT_TRANSFER_WORKERS: usize = 8;
pub const DEFAULT_SWF_TASK_LIST: &str = "compute-farm";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),
    #[error("{key}='{value}' is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Deployment settings read once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmSettings {
    pub bucket: Option<String>,
    pub prefix: String,
    pub max_level: usize,
    pub transfer_workers: usize,
    pub task_version: String,
    pub swf_domain: Option<String>,
    pub swf_task_list: String,
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: DEFAULT_PREFIX.to_string(),
            max_level: DEFAULT_MAX_LEVEL,
            transfer_workers: DEFAULT_TRANSFER_WORKERS,
            task_version: DEFAULT_TASK_VERSION.to_string(),
            swf_domain: None,
            swf_task_list: DEFAULT_SWF_TASK_LIST.to_string(),
        }
    }
}

impl FarmSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let max_level = match read(MAX_LEVEL_ENV) {
            Some(raw) => parse_count(MAX_LEVEL_ENV, &raw)?,
            None => defaults.max_level,
        };
        if max_level > MAX_SPLIT_DEPTH {
            return Err(ConfigError::Invalid {
                key: MAX_LEVEL_ENV,
                value: max_level.to_string(),
                reason: format!("must be at most {MAX_SPLIT_DEPTH}"),
            });
        }

        let transfer_workers = match read(TRANSFER_WORKERS_ENV) {
            Some(raw) => parse_count(TRANSFER_WORKERS_ENV, &raw)?,
            None => defaults.transfer_workers,
        };
        if transfer_workers == 0 {
            return Err(ConfigError::Invalid {
                key: TRANSFER_WORKERS_ENV,
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            bucket: read(BUCKET_ENV),
            prefix: read(PREFIX_ENV).unwrap_or(defaults.prefix),
            max_level,
            transfer_workers,
            task_version: read(TASK_VERSION_ENV).unwrap_or(defaults.task_version),
            swf_domain: read(SWF_DOMAIN_ENV),
            swf_task_list: read(SWF_TASK_LIST_ENV).unwrap_or(defaults.swf_task_list),
        })
    }

    pub fn require_bucket(&self) -> Result<&str, ConfigError> {
        self.bucket.as_deref().ok_or(ConfigError::Missing(BUCKET_ENV))
    }

    pub fn require_swf_domain(&self) -> Result<&str, ConfigError> {
        self.swf_domain
            .as_deref()
            .ok_or(ConfigError::Missing(SWF_DOMAIN_ENV))
    }

    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            prefix: self.prefix.clone(),
            max_level: self.max_level,
        }
    }

    pub fn task_registry(&self) -> TaskRegistry {
        TaskRegistry::with_version(&self.task_version)
    }
}

fn parse_count(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: error.to_string(),
    })
}

/// Service clients shared by every activity: workflow (SWF), object storage
/// (S3), DynamoDB and CloudWatch Logs.
#[derive(Debug, Clone)]
pub struct AwsClients {
    pub swf: aws_sdk_swf::Client,
    pub s3: aws_sdk_s3::Client,
    pub dynamodb: aws_sdk_dynamodb::Client,
    pub logs: aws_sdk_cloudwatchlogs::Client,
}

impl AwsClients {
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            swf: aws_sdk_swf::Client::new(sdk_config),
            s3: aws_sdk_s3::Client::new(sdk_config),
            dynamodb: aws_sdk_dynamodb::Client::new(sdk_config),
            logs: aws_sdk_cloudwatchlogs::Client::new(sdk_config),
        }
    }
}

/// Process-wide harness configuration: settings, the three registered task
/// types, the shard store and, when running against AWS, the service clients.
/// Built once at start-up and read-only afterwards.
#[derive(Debug, Clone)]
pub struct FarmConfig<S> {
    pub settings: FarmSettings,
    pub tasks: TaskRegistry,
    pub store: S,
    aws: Option<AwsClients>,
}

impl<S> FarmConfig<S> {
    pub fn new(settings: FarmSettings, store: S) -> Self {
        Self {
            tasks: settings.task_registry(),
            settings,
            store,
            aws: None,
        }
    }

    pub fn aws(&self) -> Option<&AwsClients> {
        self.aws.as_ref()
    }

    pub fn handler_config(&self) -> HandlerConfig {
        self.settings.handler_config()
    }
}

impl FarmConfig<S3ShardStore> {
    /// Wires the S3 shard store to the shared S3 client.
    pub fn from_aws(
        settings: FarmSettings,
        clients: AwsClients,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self, ConfigError> {
        let store = S3ShardStore::new(settings.require_bucket()?, clients.s3.clone(), runtime);
        let mut config = Self::new(settings, store);
        config.aws = Some(clients);
        Ok(config)
    }
}
