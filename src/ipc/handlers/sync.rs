use crate::ipc::helpers::{get_required_str, table_details, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::sync;
use rusqlite::Connection;
use serde_json::json;

fn sync_enqueue(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let operation = get_required_str(params, "operation")?;
    let payload = match params.get("data") {
        Some(v) if !v.is_null() => v,
        _ => return Err(HandlerErr::new("bad_params", "missing data")),
    };

    match sync::enqueue(conn, &operation, payload) {
        Ok(entry_id) => Ok(json!({
            "entryId": entry_id,
            "message": "added to sync queue"
        })),
        Err(sync::EnqueueError::Unsupported) => Err(HandlerErr::new(
            "unsupported_operation",
            format!("unsupported operation: {}", operation),
        )),
        Err(sync::EnqueueError::Db(e)) => Err(HandlerErr {
            code: "db_insert_failed",
            message: e.to_string(),
            details: table_details("sync_queue"),
        }),
    }
}

fn sync_process(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let outcomes = sync::process(conn).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: table_details("sync_queue"),
    })?;

    // The wire surface reports entries removed, not records upserted.
    let processed = outcomes.len();
    Ok(json!({
        "message": format!("processed {} items from sync queue", processed),
        "processed": processed
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.enqueue" => Some(with_conn(state, req, sync_enqueue)),
        "sync.process" => Some(with_conn(state, req, sync_process)),
        _ => None,
    }
}
