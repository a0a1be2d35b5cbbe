use crate::cache::{CacheStore, ClientCache};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, get_typed, parse_status, reply};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use tracing::debug;

fn io_failed(e: crate::cache::CacheError) -> HandlerErr {
    HandlerErr::new("io_failed", e.to_string())
}

fn cache_put(store: &CacheStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let cache: ClientCache =
        get_typed(params, "cache")?.ok_or_else(|| HandlerErr::bad_params("missing cache"))?;
    store.save(&cache).map_err(io_failed)?;
    Ok(json!({ "cache": cache }))
}

fn cache_record_class(
    store: &CacheStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    let status = parse_status(&get_required_str(params, "status")?)?;

    let mut cache = store.load();
    if !cache.record_class(&subject_id, status.is_attended()) {
        return Err(HandlerErr::not_found("cached subject"));
    }
    store.save(&cache).map_err(io_failed)?;
    debug!(subject_id = %subject_id, status = %status, "cached class recorded");
    Ok(json!({ "cache": cache }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    if !req.method.starts_with("cache.") {
        return None;
    }
    let Some(store) = state.cache.as_ref() else {
        return Some(HandlerErr::new("no_workspace", "select a workspace first").response(&req.id));
    };
    let outcome = match req.method.as_str() {
        "cache.get" => Ok(json!({ "cache": store.load() })),
        "cache.put" => cache_put(store, &req.params),
        "cache.recordClass" => cache_record_class(store, &req.params),
        "cache.reset" => store
            .reset()
            .map(|_| json!({ "cache": ClientCache::default() }))
            .map_err(io_failed),
        _ => return None,
    };
    Some(reply(req, outcome))
}
