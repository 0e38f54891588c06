//! Attendance ledger: one status row per (student, date), mutated only
//! through the upsert rule shared by direct submission and sync replay.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use uuid::Uuid;

pub const STATUS_PRESENT: &str = "Present";
pub const STATUS_ABSENT: &str = "Absent";

/// Sentinel for "no event recorded", distinct from any real timestamp.
pub const NO_TIMESTAMP: &str = "N/A";

/// Direct-submission request shape; sync-queue payloads reuse it verbatim.
#[derive(Debug, Deserialize)]
pub struct SubmitBatch {
    #[serde(rename = "classId")]
    pub class_id: String,
    pub date: String,
    #[serde(default)]
    pub attendance: Vec<BatchRecord>,
}

/// Individual records stay loosely typed: a malformed record is skipped,
/// never allowed to fail the whole batch.
#[derive(Debug, Default, Deserialize)]
pub struct BatchRecord {
    #[serde(rename = "studentId", default)]
    pub student_id: serde_json::Value,
    #[serde(default)]
    pub status: serde_json::Value,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub applied: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub enum ApplyError {
    /// The batch references a class that does not exist.
    UnknownClass,
    Db(rusqlite::Error),
}

impl From<rusqlite::Error> for ApplyError {
    fn from(e: rusqlite::Error) -> Self {
        ApplyError::Db(e)
    }
}

pub fn class_exists(conn: &Connection, class_id: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
}

fn student_in_class(conn: &Connection, student_id: &str, class_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM students WHERE id = ? AND class_id = ?",
        (student_id, class_id),
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
}

fn valid_status(status: &serde_json::Value) -> Option<&str> {
    match status.as_str() {
        Some(s) if s == STATUS_PRESENT || s == STATUS_ABSENT => Some(s),
        _ => None,
    }
}

/// Applies a submission batch under the upsert rule.
///
/// Each record is handled independently: records with an unrecognized status,
/// a missing student id, or a student outside the batch's class are skipped
/// without aborting the batch. Valid records update the existing
/// (student, date) row in place (status + fresh timestamp, no history) or
/// insert a new one. Replaying the identical batch is a no-op state-wise.
///
/// The caller owns the transaction boundary.
pub fn apply_batch(conn: &Connection, batch: &SubmitBatch) -> Result<BatchSummary, ApplyError> {
    if !class_exists(conn, &batch.class_id)? {
        return Err(ApplyError::UnknownClass);
    }

    let mut summary = BatchSummary::default();
    for record in &batch.attendance {
        let Some(status) = valid_status(&record.status) else {
            summary.skipped += 1;
            continue;
        };
        let student_id = match record.student_id.as_str() {
            Some(s) if !s.is_empty() => s,
            _ => {
                summary.skipped += 1;
                continue;
            }
        };
        if !student_in_class(conn, student_id, &batch.class_id)? {
            summary.skipped += 1;
            continue;
        }

        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM attendance WHERE student_id = ? AND date = ?",
                (student_id, &batch.date),
                |r| r.get(0),
            )
            .optional()?;

        let now = Utc::now().to_rfc3339();
        match existing {
            Some(row_id) => {
                conn.execute(
                    "UPDATE attendance SET status = ?, timestamp = ? WHERE id = ?",
                    (status, &now, &row_id),
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO attendance(id, student_id, class_id, date, timestamp, status)
                     VALUES(?, ?, ?, ?, ?, ?)",
                    (
                        Uuid::new_v4().to_string(),
                        student_id,
                        &batch.class_id,
                        &batch.date,
                        &now,
                        status,
                    ),
                )?;
            }
        }
        summary.applied += 1;
    }

    Ok(summary)
}

#[derive(Debug)]
pub struct StudentDay {
    pub student_id: String,
    pub roll_no: String,
    pub name: String,
    pub status: String,
    pub timestamp: String,
}

/// Every student of the class exactly once, left-joined against the given
/// date. Students with no row for that date read as Absent / "N/A".
pub fn query_day(
    conn: &Connection,
    class_id: &str,
    date: &str,
) -> rusqlite::Result<Vec<StudentDay>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.roll_no, s.name, a.status, a.timestamp
         FROM students s
         LEFT JOIN attendance a ON a.student_id = s.id AND a.date = ?
         WHERE s.class_id = ?
         ORDER BY s.roll_no",
    )?;
    stmt.query_map((date, class_id), |r| {
        Ok(StudentDay {
            student_id: r.get(0)?,
            roll_no: r.get(1)?,
            name: r.get(2)?,
            status: r
                .get::<_, Option<String>>(3)?
                .unwrap_or_else(|| STATUS_ABSENT.to_string()),
            timestamp: r
                .get::<_, Option<String>>(4)?
                .unwrap_or_else(|| NO_TIMESTAMP.to_string()),
        })
    })
    .and_then(|it| it.collect())
}
