use alive_core::AliveError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::routes::HealthState;

pub const ALIVE_BODY: &str = "Alive!";
pub const NOT_ALIVE_BODY: &str = "Can't find the alive key";
pub const NOT_FOUND_BODY: &str = "Not found";

pub async fn liveness_probe(State(state): State<HealthState>) -> Response {
    if let Some(probe) = &state.custom_probe {
        if !probe() {
            error!("Custom liveness probe failed for {}", state.hostname);
            return (StatusCode::NOT_FOUND, NOT_ALIVE_BODY).into_response();
        }
    }

    match state.processes.processes_for_host(&state.hostname).await {
        Ok(processes) if !processes.is_empty() => {
            debug!("{} active process(es) on {}", processes.len(), state.hostname);
            (StatusCode::OK, ALIVE_BODY).into_response()
        }
        Ok(_) => {
            error!("No active worker process found for {}", state.hostname);
            (StatusCode::NOT_FOUND, NOT_ALIVE_BODY).into_response()
        }
        // the liveness contract is binary: anything but alive is a 404
        Err(e) => {
            error!("Failed to read worker processes for {}: {}", state.hostname, e);
            (StatusCode::NOT_FOUND, format!("{NOT_ALIVE_BODY}: {e}")).into_response()
        }
    }
}

pub async fn busy_count(State(state): State<HealthState>) -> Response {
    match state.processes.processes_for_host(&state.hostname).await {
        Ok(processes) => {
            let busy: u64 = processes.iter().map(|process| process.busy).sum();
            (StatusCode::OK, busy.to_string()).into_response()
        }
        Err(e) => unavailable(&state.hostname, e),
    }
}

pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
}

fn unavailable(hostname: &str, e: AliveError) -> Response {
    error!("Failed to read worker processes for {}: {}", hostname, e);
    (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
}
