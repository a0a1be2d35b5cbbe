use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_str, reply};
use crate::ipc::router::open_workspace;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn health(state: &AppState) -> serde_json::Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

/// A failed open leaves the previous workspace selected.
fn workspace_select(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let path = get_optional_str(params, "path")?
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| HandlerErr::bad_params("missing params.path"))?;
    open_workspace(state, &path)
        .map_err(|e| HandlerErr::new("db_open_failed", format!("{e:#}")))?;
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(reply(req, Ok(health(state)))),
        "workspace.select" => Some(reply(req, workspace_select(state, &req.params))),
        _ => None,
    }
}
