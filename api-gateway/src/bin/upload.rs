//! Upload Lambda - Handles /api/upload endpoint.
//!
//! Issues short-lived signed parameters so the browser can upload images
//! straight to ImageKit. No authentication is required.

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::http::{error_response, failure_response, json_response, route_path, Cors};
use shared::{Config, ImageKitSigner, UploadSigner};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across requests.
struct AppState {
    signer: Box<dyn UploadSigner>,
    cors: Cors,
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let path = route_path(event.uri().path());

    let response = match (event.method().as_str(), path.trim_end_matches('/')) {
        ("OPTIONS", _) => return state.cors.preflight(),
        ("GET", "/upload") => match state.signer.issue() {
            Ok(params) => {
                info!(expire = params.expire, "issued upload parameters");
                json_response(200, &params)?
            }
            Err(e) => failure_response(&e, "An error occurred while signing the upload.")?,
        },
        (_, "/upload") => error_response(405, "Method not allowed")?,
        _ => error_response(404, "Not found")?,
    };

    Ok(state.cors.apply(response))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::from_env();
    let state = Arc::new(AppState {
        signer: Box::new(ImageKitSigner::from_config(&config)?),
        cors: Cors::new(config.client_url.as_deref()),
    });

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
