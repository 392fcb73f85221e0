pub mod error;
pub mod scripts;
pub mod state;

pub use error::ApiError;
pub use state::{AppState, Gateway};

use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::middleware::auth_middleware;
use scripts::{list_commands, missing_script_name, run_script};

async fn status() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// `/status` is public; every other route sits behind the auth gate.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", get(list_commands).post(missing_script_name))
        .route("/{script_name}", post(run_script))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/status", get(status))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
