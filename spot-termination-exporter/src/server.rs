use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use failure::Error;
use log::{debug, error, info};
use prometheus::{Encoder, Registry, TextEncoder};
use warp::http::header::{HeaderValue, CONTENT_TYPE};
use warp::http::{Response, StatusCode};
use warp::hyper::Body;
use warp::path::FullPath;
use warp::{Filter, Reply};

use crate::error::ExporterError;

#[derive(Debug, PartialEq)]
pub enum Route {
    Metrics,
    Landing,
    NotFound,
}

pub fn route(path: &str, metrics_path: &str) -> Route {
    if path == metrics_path {
        Route::Metrics
    } else if path == "/" {
        Route::Landing
    } else {
        Route::NotFound
    }
}

/// Gathers all registered collectors and encodes them in the Prometheus text format.
///
/// Collecting blocks on requests to the metadata service.
pub fn render_metrics(registry: &Registry) -> Result<Vec<u8>, ExporterError> {
    let families = registry.gather();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buffer)
        .map_err(|e| ExporterError::FailedEncoding(e.to_string()))?;

    Ok(buffer)
}

pub fn landing_page(metrics_path: &str) -> String {
    format!(
        r#"<html>
<head><title>Spot Termination Exporter</title></head>
<body>
<h1>Spot Termination Exporter</h1>
<p><a href="{}">Metrics</a></p>
</body>
</html>
"#,
        metrics_path
    )
}

/// Binds the scrape endpoint and returns the actually bound address together with the server
/// future. Must be called within a tokio runtime.
pub fn bind(
    bind_address: SocketAddr,
    metrics_path: &str,
    registry: Registry,
) -> Result<(SocketAddr, impl Future<Output = ()> + Send + 'static), Error> {
    let metrics_path = Arc::new(metrics_path.to_string());
    let routes = warp::get()
        .and(warp::path::full())
        .and_then(move |path: FullPath| handle(path, metrics_path.clone(), registry.clone()));

    let (address, server) = warp::serve(routes)
        .try_bind_ephemeral(bind_address)
        .map_err(|e| failure::err_msg(format!("failed to bind to {} because {}", bind_address, e)))?;
    info!("Listening on {}.", address);

    Ok((address, server))
}

async fn handle(path: FullPath, metrics_path: Arc<String>, registry: Registry) -> Result<Response<Body>, Infallible> {
    debug!("Received request for '{}'.", path.as_str());

    let response = match route(path.as_str(), &metrics_path) {
        Route::Metrics => metrics_response(registry).await,
        Route::Landing => warp::reply::html(landing_page(&metrics_path)).into_response(),
        Route::NotFound => warp::reply::with_status("Not Found", StatusCode::NOT_FOUND).into_response(),
    };

    Ok(response)
}

async fn metrics_response(registry: Registry) -> Response<Body> {
    let rendered = tokio::task::spawn_blocking(move || render_metrics(&registry)).await;

    match rendered {
        Ok(Ok(buffer)) => {
            let mut response = Response::new(Body::from(buffer));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(prometheus::TEXT_FORMAT));
            response
        }
        Ok(Err(err)) => {
            error!("Failed to render metrics: {}", err);
            internal_error()
        }
        Err(err) => {
            error!("Metrics collection did not finish: {}", err);
            internal_error()
        }
    }
}

fn internal_error() -> Response<Body> {
    warp::reply::with_status("Internal Server Error", StatusCode::INTERNAL_SERVER_ERROR).into_response()
}
