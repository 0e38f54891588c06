use crate::ipc::helpers::{get_required_str, table_details, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, ApplyError, SubmitBatch};
use rusqlite::Connection;
use serde_json::json;

fn attendance_get(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let date = get_required_str(params, "date")?;

    if !ledger::class_exists(conn, &class_id).map_err(HandlerErr::db)? {
        return Err(HandlerErr::new("not_found", "class not found"));
    }

    let day = ledger::query_day(conn, &class_id, &date).map_err(HandlerErr::db)?;
    let rows: Vec<serde_json::Value> = day
        .iter()
        .map(|d| {
            json!({
                "studentId": d.student_id,
                "rollNo": d.roll_no,
                "name": d.name,
                "status": d.status,
                "timestamp": d.timestamp
            })
        })
        .collect();

    Ok(json!({ "attendance": rows }))
}

fn attendance_submit(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let batch: SubmitBatch = serde_json::from_value(params.clone()).map_err(|e| {
        HandlerErr::new("bad_params", format!("missing or invalid fields: {}", e))
    })?;

    // One transaction per submission keeps the lookup-then-write upsert
    // atomic with respect to other requests.
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let summary = match ledger::apply_batch(&tx, &batch) {
        Ok(s) => s,
        Err(ApplyError::UnknownClass) => {
            return Err(HandlerErr::new("invalid_reference", "invalid class id"));
        }
        Err(ApplyError::Db(e)) => {
            return Err(HandlerErr {
                code: "db_update_failed",
                message: e.to_string(),
                details: table_details("attendance"),
            });
        }
    };
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({
        "message": "attendance saved",
        "applied": summary.applied,
        "skipped": summary.skipped
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.get" => Some(with_conn(state, req, attendance_get)),
        "attendance.submit" => Some(with_conn(state, req, attendance_submit)),
        _ => None,
    }
}
