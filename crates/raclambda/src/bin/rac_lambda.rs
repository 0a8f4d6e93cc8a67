use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use raclambda::adapters::conversion::RacBinary;
use raclambda::adapters::object_store::ObjectFetcher;
use raclambda::adapters::parameter_store::ParameterStore;
use raclambda::adapters::sync::RcloneSync;
use raclambda::handlers::cycle::CycleDependencies;
use raclambda::handlers::event::handle_event;
use raclambda::runtime::config::HandlerConfig;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

struct S3ObjectFetcher {
    s3_client: aws_sdk_s3::Client,
}

impl ObjectFetcher for S3ObjectFetcher {
    fn fetch_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String> {
        let bucket = bucket.to_string();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_object()
                    .bucket(bucket)
                    .key(object_key)
                    .send()
                    .await
                    .map_err(|error| format!("failed to read object from s3: {error}"))?;
                let body = output
                    .body
                    .collect()
                    .await
                    .map_err(|error| format!("failed to stream object body: {error}"))?;
                Ok::<_, String>(body.into_bytes().to_vec())
            })
        })
    }
}

struct SsmParameterStore {
    ssm_client: aws_sdk_ssm::Client,
}

impl ParameterStore for SsmParameterStore {
    fn get_secure_parameter(&self, name: &str) -> Result<String, String> {
        let parameter_name = name.to_string();
        let client = self.ssm_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_parameter()
                    .name(parameter_name.clone())
                    .with_decryption(true)
                    .send()
                    .await
                    .map_err(|error| format!("failed to read ssm parameter: {error}"))?;
                output
                    .parameter()
                    .and_then(|parameter| parameter.value())
                    .map(str::to_string)
                    .ok_or_else(|| format!("ssm parameter '{parameter_name}' has no value"))
            })
        })
    }
}

struct RuntimeDependencies {
    s3_client: aws_sdk_s3::Client,
    ssm_client: aws_sdk_ssm::Client,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    runtime: &RuntimeDependencies,
) -> Result<Value, Error> {
    let config = HandlerConfig::from_env().map_err(|error| {
        tracing::error!(
            component = "rac_lambda",
            event = "configuration_rejected",
            kind = error.kind(),
            error = %error
        );
        Error::from(error.to_string())
    })?;

    let fetcher = S3ObjectFetcher {
        s3_client: runtime.s3_client.clone(),
    };
    let parameters = SsmParameterStore {
        ssm_client: runtime.ssm_client.clone(),
    };
    let sync = RcloneSync::new(config.sync_binary.clone());
    let tool = RacBinary::new(config.conversion_binary.clone());

    let event_time = Utc::now().to_rfc3339();
    // The cycle spawns subprocesses and blocks on S3/SSM calls.
    let response = tokio::task::block_in_place(|| {
        handle_event(
            &event.payload,
            &config,
            CycleDependencies {
                fetcher: &fetcher,
                parameters: &parameters,
                sync: &sync,
                tool: &tool,
            },
            &event_time,
        )
    })
    .map_err(|error| Error::from(error.to_string()))?;

    serde_json::to_value(response)
        .map_err(|error| Error::from(format!("failed to serialize cycle response: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_current_span(false)
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let runtime = RuntimeDependencies {
        s3_client: aws_sdk_s3::Client::new(&aws_config),
        ssm_client: aws_sdk_ssm::Client::new(&aws_config),
    };

    lambda_runtime::run(service_fn(|event| handle_request(event, &runtime))).await
}
