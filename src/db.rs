use rusqlite::Connection;
use std::path::Path;
use uuid::Uuid;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("attendance.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    init_schema(&conn)?;
    seed_demo_data(&conn)?;

    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            roll_no TEXT NOT NULL,
            name TEXT NOT NULL,
            class_id TEXT NOT NULL,
            qr_code TEXT NOT NULL UNIQUE,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_qr ON students(qr_code)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            date TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            status TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    // The upsert path is lookup-then-write; the unique index is a backstop
    // that keeps the one-row-per-(student, date) invariant under races.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_attendance_student_date
         ON attendance(student_id, date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_class_date ON attendance(class_id, date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sync_queue(
            id TEXT PRIMARY KEY,
            operation TEXT NOT NULL,
            payload TEXT NOT NULL,
            enqueued_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// First-run convenience: five demo classes with five students each, so a
/// fresh workspace has something to scan against. No-op once any class exists.
fn seed_demo_data(conn: &Connection) -> anyhow::Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM classes", [], |r| r.get(0))?;
    if count > 0 {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    for c in 1..=5 {
        let class_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO classes(id, name) VALUES(?, ?)",
            (&class_id, format!("Class {}", c)),
        )?;
        for i in 1..=5 {
            tx.execute(
                "INSERT INTO students(id, roll_no, name, class_id, qr_code)
                 VALUES(?, ?, ?, ?, ?)",
                (
                    Uuid::new_v4().to_string(),
                    format!("{:03}{:03}", c, i),
                    format!("Student {} from Class {}", i, c),
                    &class_id,
                    format!("STUDENT_{}_{}", c, i),
                ),
            )?;
        }
    }
    tx.commit()?;
    tracing::info!("seeded demo classes into empty workspace");
    Ok(())
}
