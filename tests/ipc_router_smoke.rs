use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("attendanced-router-smoke");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));

    // Data methods refuse to run before a workspace is selected.
    let early = request(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.get",
        json!({ "classId": "x", "date": "2024-01-01" }),
    );
    assert_eq!(
        early
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("no_workspace")
    );
    let early_list = request(&mut stdin, &mut reader, "2b", "classes.list", json!({}));
    assert_eq!(
        early_list
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("no_workspace")
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request(
        &mut stdin,
        &mut reader,
        "4",
        "classes.create",
        json!({ "name": "Smoke Class" }),
    );
    let class_id = created
        .get("result")
        .and_then(|v| v.get("classId"))
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string();

    let _ = request(&mut stdin, &mut reader, "5", "classes.list", json!({}));

    let created_student = request(
        &mut stdin,
        &mut reader,
        "6",
        "students.create",
        json!({
            "rollNo": "900001",
            "name": "Smoke Student",
            "classId": class_id,
            "qrCode": "SMOKE_QR_1"
        }),
    );
    let student_id = created_student
        .get("result")
        .and_then(|v| v.get("studentId"))
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();

    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.list",
        json!({ "classId": class_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "students.lookupByQr",
        json!({ "qrCode": "SMOKE_QR_1" }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "attendance.submit",
        json!({
            "classId": class_id,
            "date": "2024-09-03",
            "attendance": [{ "studentId": student_id, "status": "Present" }]
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "attendance.get",
        json!({ "classId": class_id, "date": "2024-09-03" }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "sync.enqueue",
        json!({
            "operation": "submit_attendance",
            "data": {
                "classId": class_id,
                "date": "2024-09-04",
                "attendance": [{ "studentId": student_id, "status": "Absent" }]
            }
        }),
    );
    let _ = request(&mut stdin, &mut reader, "12", "sync.process", json!({}));

    // Unknown methods still fall through to not_implemented.
    writeln!(
        stdin,
        "{}",
        json!({ "id": "13", "method": "nonsense.method", "params": {} })
    )
    .expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let unknown: serde_json::Value =
        serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(unknown.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    drop(stdin);
    let _ = child.wait();
}
