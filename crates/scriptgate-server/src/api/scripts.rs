use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use scriptgate_core::{ExecutionOutcome, NotifyEvent, list_scripts, spawn_notification};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::api::{ApiError, state::AppState};

/// Chunks buffered between the script and the socket.
const SINK_CAPACITY: usize = 16;

#[derive(Debug, Serialize)]
pub struct CommandList {
    pub commands: Vec<String>,
}

// GET /
pub async fn list_commands(State(state): State<AppState>) -> Result<Json<CommandList>, ApiError> {
    let scripts_dir = state.resolver.scripts_dir();
    let commands = list_scripts(scripts_dir).await.map_err(|err| {
        error!(
            scripts_dir = %scripts_dir.display(),
            error = %err,
            "Failed to list scripts"
        );
        ApiError::Internal(format!("Failed to list scripts: {}", err))
    })?;
    debug!(count = commands.len(), "Listed commands");
    Ok(Json(CommandList { commands }))
}

// POST /
pub async fn missing_script_name() -> ApiError {
    ApiError::MissingScriptName
}

// POST /{script_name}
pub async fn run_script(
    State(state): State<AppState>,
    Path(script_name): Path<String>,
) -> Result<Response, ApiError> {
    let script = state.resolver.resolve(&script_name).await?;
    let permit = state.limiter.try_acquire()?;
    let session = state.streamer.spawn(&script)?;

    let (sink, output) = mpsc::channel(SINK_CAPACITY);
    let notifier = state.notifier.clone();
    tokio::spawn(async move {
        let _permit = permit;
        let script = session.script().to_string();
        let outcome = session.stream_into(sink).await;
        let exit_code = match outcome {
            ExecutionOutcome::Exited(0) | ExecutionOutcome::Cancelled => return,
            ExecutionOutcome::Exited(code) => Some(code),
            ExecutionOutcome::Signaled(_) | ExecutionOutcome::Faulted(_) => None,
        };
        spawn_notification(
            notifier.as_ref(),
            NotifyEvent::ScriptFailed { script, exit_code },
        );
    });

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(ReceiverStream::new(output)),
    )
        .into_response())
}
