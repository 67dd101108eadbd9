// ---------------------------------------------------------------------------
// Route registration
// ---------------------------------------------------------------------------

mod devices;
mod discovery;
mod profiles;
mod system;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/api/discovery/start", post(discovery::start_discovery))
        .route(
            "/api/discovery/status/{job_id}",
            get(discovery::discovery_status),
        )
        .route(
            "/api/discovery/results/{job_id}",
            get(discovery::discovery_results),
        )
        .route(
            "/api/discovery/job/{job_id}",
            delete(discovery::cancel_discovery),
        )
        .route(
            "/api/devices",
            get(devices::list_devices).post(devices::create_device),
        )
        .route("/api/devices/search", get(devices::search_devices))
        .route(
            "/api/devices/status/{status}",
            get(devices::devices_by_status),
        )
        .route(
            "/api/devices/{id}",
            get(devices::get_device)
                .put(devices::update_device)
                .delete(devices::delete_device),
        )
        .route("/api/devices/{id}/status", put(devices::set_device_status))
        .route(
            "/api/credentials",
            get(profiles::list_profiles).post(profiles::create_profile),
        )
        .route(
            "/api/credentials/{id}",
            get(profiles::get_profile)
                .put(profiles::update_profile)
                .delete(profiles::delete_profile),
        );

    Router::new()
        .route("/api/system/health", get(system::health_check))
        .merge(api_routes)
        // CORS policy proper lives in the gateway in front of us; this
        // permissive layer only keeps direct browser access workable.
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1 MB: request bodies here are small
        .with_state(state)
}
