use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client as S3Client;
use edge_resizer_shared::{config::ResizerConfig, heic, types::CloudFrontEvent, AppState};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    // Initialize clients once at startup
    let config = ResizerConfig::from_env();
    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .load()
        .await;

    tracing::info!("Serving originals from bucket {} ({})", config.bucket, config.region);

    let state = AppState::new(S3Client::new(&aws_config), heic::default_converter(), config);

    run(service_fn(move |event: LambdaEvent<CloudFrontEvent>| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
