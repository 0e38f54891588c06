use crate::ipc::helpers::{get_required_str, table_details, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn students_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;

    let mut stmt = conn
        .prepare(
            "SELECT id, roll_no, name
             FROM students
             WHERE class_id = ?
             ORDER BY roll_no",
        )
        .map_err(HandlerErr::db)?;
    let students: Vec<serde_json::Value> = stmt
        .query_map([&class_id], |r| {
            let id: String = r.get(0)?;
            let roll_no: String = r.get(1)?;
            let name: String = r.get(2)?;
            Ok(json!({ "id": id, "rollNo": roll_no, "name": name }))
        })
        .and_then(|it| it.collect())
        .map_err(HandlerErr::db)?;

    if students.is_empty() {
        return Err(HandlerErr::new(
            "not_found",
            "no students found for this class",
        ));
    }
    Ok(json!({ "students": students }))
}

fn students_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let roll_no = get_required_str(params, "rollNo")?;
    let name = get_required_str(params, "name")?;
    let class_id = get_required_str(params, "classId")?;
    let qr_code = get_required_str(params, "qrCode")?;

    if !ledger::class_exists(conn, &class_id).map_err(HandlerErr::db)? {
        return Err(HandlerErr::new("invalid_reference", "class not found"));
    }

    let student_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, roll_no, name, class_id, qr_code)
         VALUES(?, ?, ?, ?, ?)",
        (&student_id, &roll_no, &name, &class_id, &qr_code),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: table_details("students"),
    })?;

    Ok(json!({ "studentId": student_id, "message": "student added" }))
}

fn students_lookup_by_qr(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let qr_code = get_required_str(params, "qrCode")?;

    let student = conn
        .query_row(
            "SELECT id, roll_no, name, class_id FROM students WHERE qr_code = ?",
            [&qr_code],
            |r| {
                let id: String = r.get(0)?;
                let roll_no: String = r.get(1)?;
                let name: String = r.get(2)?;
                let class_id: String = r.get(3)?;
                Ok(json!({
                    "id": id,
                    "rollNo": roll_no,
                    "name": name,
                    "classId": class_id
                }))
            },
        )
        .optional()
        .map_err(HandlerErr::db)?;

    student.ok_or_else(|| HandlerErr::new("not_found", "student not found"))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_conn(state, req, students_list)),
        "students.create" => Some(with_conn(state, req, students_create)),
        "students.lookupByQr" => Some(with_conn(state, req, students_lookup_by_qr)),
        _ => None,
    }
}
