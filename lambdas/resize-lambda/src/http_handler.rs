use edge_resizer_shared::types::{CloudFrontEvent, CloudFrontResponse};
use edge_resizer_shared::AppState;
use lambda_runtime::{Error, LambdaEvent};
use std::sync::Arc;

/// Lambda@Edge origin-response handler
pub(crate) async fn function_handler(
    event: LambdaEvent<CloudFrontEvent>,
    state: Arc<AppState>,
) -> Result<CloudFrontResponse, Error> {
    let cf = event
        .payload
        .records
        .into_iter()
        .next()
        .ok_or("CloudFront event has no records")?
        .cf;

    tracing::info!(
        "Image request - Uri: {} Query: {}",
        cf.request.uri,
        cf.request.querystring
    );

    let response = state.responder.handle(&cf.request, cf.response).await;

    tracing::info!("Responding {} for {}", response.status, cf.request.uri);

    Ok(response)
}
