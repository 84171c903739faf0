//! S.A.R.A. HTTP API
//!
//! JSON over HTTP on top of [`sara_core::Sara`]. Authenticated routes take
//! an `Authorization: Bearer <token>` header issued by `POST /api/auth/login`.
//! Failures use a single envelope, see [`error`].

#![warn(unreachable_pub)]

pub mod error;
mod filters;
mod handlers;

use handlers::Limits;
use sara_core::Sara;
use std::convert::Infallible;
use warp::{Filter, Reply};

/// Complete API with error recovery and request logging
pub fn routes(sara: &Sara) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let limits = Limits::of(sara);
    handlers::accounts::routes(sara, limits)
        .or(handlers::properties::routes(sara, limits))
        .unify()
        .or(handlers::contracts::routes(sara, limits))
        .unify()
        .or(handlers::payments::routes(sara, limits))
        .unify()
        .or(handlers::incidents::routes(sara, limits))
        .unify()
        .or(handlers::evaluations::routes(sara, limits))
        .unify()
        .or(handlers::reports::routes(sara))
        .unify()
        .or(handlers::inbox::routes(sara, limits))
        .unify()
        .or(handlers::admin::routes(sara, limits))
        .unify()
        .recover(error::recover)
        .with(warp::log::custom(log_request))
}

fn log_request(info: warp::log::Info<'_>) {
    let status = info.status().as_u16();
    let elapsed_ms = u64::try_from(info.elapsed().as_millis()).unwrap_or(u64::MAX);
    if status >= 500 {
        tracing::error!(method = %info.method(), path = info.path(), status, elapsed_ms, "Request");
    } else {
        tracing::info!(method = %info.method(), path = info.path(), status, elapsed_ms, "Request");
    }
}

/// Serve until `shutdown` resolves
///
/// # Errors
/// When the address cannot be bound
pub async fn serve(
    sara: &Sara,
    addr: std::net::SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), warp::Error> {
    let (bound, server) = warp::serve(routes(sara)).try_bind_with_graceful_shutdown(addr, shutdown)?;
    tracing::info!(addr = %bound, version = sara_core::VERSION, "Listening");
    server.await;
    tracing::info!("Server stopped");
    Ok(())
}
