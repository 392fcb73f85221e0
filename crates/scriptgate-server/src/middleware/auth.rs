use axum::{
    extract::{ConnectInfo, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use scriptgate_core::{AuthDecision, NotifyEvent, spawn_notification};
use std::net::SocketAddr;
use tracing::warn;

use crate::api::AppState;

/// Rejects requests whose `Authorization` header does not equal the shared
/// secret. The value is compared verbatim; there is no bearer scheme.
pub async fn auth_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| std::str::from_utf8(value.as_bytes()).ok());

    match state.auth.authenticate(provided) {
        AuthDecision::Open | AuthDecision::Granted => next.run(req).await,
        AuthDecision::Denied { attempts } => {
            let peer = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.to_string());
            warn!(
                attempts,
                peer = peer.as_deref().unwrap_or("unknown"),
                path = %req.uri().path(),
                "Unauthorized request"
            );
            spawn_notification(
                state.notifier.as_ref(),
                NotifyEvent::AuthFailure { attempts, peer },
            );
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}
