//! Durable sync queue: buffers attendance submissions made offline and
//! replays them through the same upsert rule as direct submission.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::ledger::{self, ApplyError, SubmitBatch};

pub const OP_SUBMIT_ATTENDANCE: &str = "submit_attendance";

pub fn is_supported(operation: &str) -> bool {
    operation == OP_SUBMIT_ATTENDANCE
}

#[derive(Debug)]
pub enum EnqueueError {
    Unsupported,
    Db(rusqlite::Error),
}

impl From<rusqlite::Error> for EnqueueError {
    fn from(e: rusqlite::Error) -> Self {
        EnqueueError::Db(e)
    }
}

/// Appends an operation to the queue. Only the operation tag is validated
/// here; payload shape problems surface at processing time, not enqueue time.
pub fn enqueue(
    conn: &Connection,
    operation: &str,
    payload: &serde_json::Value,
) -> Result<String, EnqueueError> {
    if !is_supported(operation) {
        return Err(EnqueueError::Unsupported);
    }
    let entry_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO sync_queue(id, operation, payload, enqueued_at)
         VALUES(?, ?, ?, ?)",
        (
            &entry_id,
            operation,
            payload.to_string(),
            Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(entry_id)
}

/// What became of a single queue entry during a processing pass. The IPC
/// surface only reports a count, but tests and logs get the full story.
#[derive(Debug)]
pub enum EntryOutcome {
    /// The batch ran; per-record skips are carried through from the ledger.
    Applied { applied: usize, skipped: usize },
    /// Recognized entry that could not be applied (e.g. unknown class).
    Skipped(&'static str),
    /// Payload failed to parse; the parse error is kept for the log.
    Discarded(String),
}

/// Drains every entry present at the start of the pass, oldest first, in one
/// transaction. Entries are removed unconditionally after one attempt; there
/// is no retry path and no dead-letter retention. A pass over an empty queue
/// returns an empty list. Only storage errors abort (and roll back) the pass.
pub fn process(conn: &Connection) -> rusqlite::Result<Vec<EntryOutcome>> {
    let tx = conn.unchecked_transaction()?;

    // The queue is append-only between drains, so rowid order is enqueue order.
    let entries: Vec<(String, String, String)> = {
        let mut stmt =
            tx.prepare("SELECT id, operation, payload FROM sync_queue ORDER BY rowid")?;
        stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .and_then(|it| it.collect())?
    };

    let mut outcomes = Vec::with_capacity(entries.len());
    for (entry_id, operation, payload) in entries {
        let outcome = replay_entry(&tx, &operation, &payload)?;
        tx.execute("DELETE FROM sync_queue WHERE id = ?", [&entry_id])?;
        match &outcome {
            EntryOutcome::Applied { applied, skipped } => {
                tracing::debug!(entry = %entry_id, applied, skipped, "sync entry applied");
            }
            EntryOutcome::Skipped(reason) => {
                tracing::info!(entry = %entry_id, reason, "sync entry skipped");
            }
            EntryOutcome::Discarded(err) => {
                tracing::info!(entry = %entry_id, error = %err, "sync entry discarded");
            }
        }
        outcomes.push(outcome);
    }

    tx.commit()?;
    Ok(outcomes)
}

fn replay_entry(
    conn: &Connection,
    operation: &str,
    payload: &str,
) -> rusqlite::Result<EntryOutcome> {
    if !is_supported(operation) {
        return Ok(EntryOutcome::Skipped("unsupported operation"));
    }
    let batch: SubmitBatch = match serde_json::from_str(payload) {
        Ok(b) => b,
        Err(e) => return Ok(EntryOutcome::Discarded(e.to_string())),
    };
    match ledger::apply_batch(conn, &batch) {
        Ok(summary) => Ok(EntryOutcome::Applied {
            applied: summary.applied,
            skipped: summary.skipped,
        }),
        Err(ApplyError::UnknownClass) => Ok(EntryOutcome::Skipped("unknown class")),
        Err(ApplyError::Db(e)) => Err(e),
    }
}
