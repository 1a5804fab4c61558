//! EAM Server - HTTP/JSON surface for artifact version control
//!
//! Exposes the [`VersionControl`] service over axum. Service calls are
//! synchronous (SQLite transactions) and run on the blocking pool.
//!
//! # Core Concepts
//!
//! - [`router`]: All routes, generic over the store backend
//! - [`spawn_reaper`]: Optional background purge of expired and orphaned locks
//! - [`ServerConfig`]: TOML configuration with CLI overrides applied in `main`
//! - [`ApiError`]: Maps service errors to status codes and a JSON body
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use eam_core::prelude::*;
//!
//! let vc = Arc::new(VersionControl::new(MemoryStore::new(), Arc::new(directory)));
//! let app = eam_server::router(vc);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod auth;
pub mod config;
mod error;
mod extract;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use eam_core::{Store, VcError, VersionControl};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

pub use auth::{Caller, USER_HEADER};
pub use config::ServerConfig;
pub use error::ApiError;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the application router
pub fn router<S: Store + 'static>(vc: Arc<VersionControl<S>>) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/version-control/checkout", post(routes::locks::checkout::<S>))
        .route("/version-control/checkin", post(routes::locks::checkin::<S>))
        .route(
            "/version-control/cancel-checkout",
            post(routes::locks::cancel_checkout::<S>),
        )
        .route("/version-control/locks", get(routes::locks::query_locks::<S>))
        .route(
            "/version-control/locks/:artifact_type/:artifact_id",
            delete(routes::locks::release_lock::<S>),
        )
        .route(
            "/initiatives",
            get(routes::initiatives::list::<S>).post(routes::initiatives::create::<S>),
        )
        .route("/initiatives/:id", get(routes::initiatives::get_one::<S>))
        .route(
            "/initiatives/:id/status",
            post(routes::initiatives::set_status::<S>),
        )
        .route(
            "/initiatives/:id/participants",
            post(routes::initiatives::add_participant::<S>),
        )
        .route(
            "/initiatives/:id/changes",
            get(routes::initiatives::changes::<S>),
        )
        .route(
            "/initiatives/:id/conflicts",
            get(routes::conflicts::list::<S>),
        )
        .route(
            "/initiatives/:id/detect-conflicts",
            post(routes::conflicts::detect::<S>),
        )
        .route(
            "/initiatives/:id/dependencies/:artifact_type/:artifact_id",
            get(routes::initiatives::dependencies::<S>),
        )
        .route(
            "/initiatives/:id/impact-report",
            get(routes::initiatives::impact_report::<S>),
        )
        .route(
            "/initiatives/:id/complete",
            post(routes::initiatives::complete::<S>),
        )
        .route(
            "/initiatives/:id/abandon",
            post(routes::initiatives::abandon::<S>),
        )
        .route(
            "/initiatives/:id/conflicts/:conflict_id/auto-resolve",
            post(routes::conflicts::auto_resolve::<S>),
        )
        .route(
            "/conflicts/:id/resolve",
            post(routes::conflicts::resolve::<S>),
        )
        .route(
            "/artifacts/:artifact_type",
            get(routes::artifacts::list::<S>).post(routes::artifacts::create::<S>),
        )
        .route(
            "/artifacts/:artifact_type/propose",
            post(routes::artifacts::propose::<S>),
        )
        .route(
            "/artifacts/:artifact_type/:artifact_id",
            get(routes::artifacts::read::<S>).patch(routes::artifacts::update::<S>),
        )
        .route(
            "/artifacts/:artifact_type/:artifact_id/versions",
            get(routes::artifacts::versions::<S>),
        )
        .route("/audit", get(routes::audit::trail::<S>))
        .route(
            "/audit/compare-versions",
            get(routes::audit::compare_versions::<S>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(vc)
}

/// Periodically purge expired locks and locks of closed initiatives
///
/// Reads already ignore expired locks; this only keeps the table small.
pub fn spawn_reaper<S: Store + 'static>(
    vc: Arc<VersionControl<S>>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let vc = Arc::clone(&vc);
            match tokio::task::spawn_blocking(move || vc.purge_expired_locks()).await {
                Ok(Ok(0)) => tracing::debug!("Lock reaper pass: nothing to purge"),
                Ok(Ok(purged)) => tracing::info!("Lock reaper purged {} lock(s)", purged),
                Ok(Err(err)) => tracing::warn!("Lock reaper pass failed: {}", err),
                Err(err) => tracing::error!("Lock reaper task panicked: {}", err),
            }
        }
    })
}

/// Run a service call on the blocking pool
pub(crate) async fn blocking<S, R, F>(vc: &Arc<VersionControl<S>>, f: F) -> Result<R, ApiError>
where
    S: Store + 'static,
    R: Send + 'static,
    F: FnOnce(&VersionControl<S>) -> Result<R, VcError> + Send + 'static,
{
    let vc = Arc::clone(vc);
    tokio::task::spawn_blocking(move || f(&vc))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}
