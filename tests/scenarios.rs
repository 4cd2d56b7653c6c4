//! End-to-end scenarios from the testable-properties section: S1-S6 driven
//! directly against the document/queue/session types, no subprocesses.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::Mutex as AsyncMutex;

use parchment::broadcast::Frame;
use parchment::document::Document;
use parchment::roles::RoleTable;
use parchment::session::{handle_connection, SessionTable};
use parchment::status::EditStatus;

fn role_table(entries: &[(&str, &str)]) -> RoleTable {
    let dir = temp_dir::TempDir::new().unwrap();
    let path = dir.path().join("roles.txt");
    let body: String = entries
        .iter()
        .map(|(user, role)| format!("{user} {role}\n"))
        .collect();
    std::fs::write(&path, body).unwrap();
    RoleTable::load(&path).unwrap()
}

#[test]
fn s1_single_insert_commits_and_frames() {
    let mut doc = Document::new();
    let status = doc.apply("A", "INSERT 0 Hello", 0);
    assert_eq!(status, Some(EditStatus::Success));

    let version = doc.version();
    let records = doc.close_tick();
    assert_eq!(version, 0);
    assert_eq!(doc.version(), 1);
    assert_eq!(doc.text(), "Hello");

    let frame = Frame::new(version, records);
    assert_eq!(
        frame.to_lines(),
        vec![
            "VERSION 0".to_string(),
            "EDIT A INSERT 0 Hello SUCCESS".to_string(),
            "END".to_string(),
        ]
    );
}

#[test]
fn s2_two_writers_in_one_tick_apply_in_submission_order() {
    let mut doc = Document::from_text("Hello").unwrap();
    doc.close_tick(); // version 0 -> 1, no pending

    assert_eq!(doc.apply("A", "INSERT 5  world", 1), Some(EditStatus::Success));
    assert_eq!(doc.apply("B", "BOLD 0 5", 1), Some(EditStatus::Success));

    let version = doc.version();
    let records = doc.close_tick();
    assert_eq!(version, 1);
    assert_eq!(doc.version(), 2);
    assert_eq!(doc.text(), "**Hello** world");
    assert_eq!(records[0].username, "A");
    assert_eq!(records[1].username, "B");
    assert!(records.iter().all(|r| r.status == EditStatus::Success));
}

#[test]
fn s3_stale_version_is_rejected_but_version_still_advances() {
    let mut doc = Document::from_text("Hello").unwrap();
    doc.close_tick(); // version 0 -> 1

    let status = doc.apply("A", "INSERT 0 Hi ", 0);
    assert_eq!(status, Some(EditStatus::OutdatedVersion));
    assert_eq!(doc.text(), "Hello");

    doc.close_tick();
    assert_eq!(doc.version(), 2);
}

#[test]
fn unparsable_command_advances_no_version_and_leaves_no_record() {
    let mut doc = Document::new();
    assert_eq!(doc.apply("A", "FROBNICATE", 0), None);
    assert_eq!(doc.pending().len(), 0);
    assert_eq!(doc.version(), 0);
}

#[test]
fn s4_read_only_client_is_rejected_unauthorized() {
    let mut doc = Document::from_text("Hello").unwrap();
    doc.reject("R", "DEL 0 1", doc.version(), EditStatus::Unauthorized);
    assert_eq!(doc.text(), "Hello");
    assert_eq!(doc.pending()[0].status, EditStatus::Unauthorized);
}

#[test]
fn s5_second_writer_fails_after_first_shrinks_the_document() {
    let mut doc = Document::from_text("Hello").unwrap();
    doc.close_tick();
    let version = doc.version();

    assert_eq!(doc.apply("A", "DEL 0 5", version), Some(EditStatus::Success));
    assert_eq!(
        doc.apply("B", "BOLD 0 5", version),
        Some(EditStatus::InvalidPosition)
    );

    let records = doc.close_tick();
    assert_eq!(records[0].status, EditStatus::Success);
    assert_eq!(records[1].status, EditStatus::InvalidPosition);
}

#[tokio::test]
async fn s6_handshake_then_one_tick_produces_the_expected_frame() {
    let roles = Arc::new(role_table(&[("alice", "write")]));
    let sessions = Arc::new(StdMutex::new(SessionTable::new(4)));
    let queue = Arc::new(StdMutex::new(parchment::queue::Queue::new()));
    let document = Arc::new(AsyncMutex::new(Document::new()));

    let (client, server) = UnixStream::pair().unwrap();
    let driver = tokio::spawn(handle_connection(
        server,
        sessions.clone(),
        roles,
        queue.clone(),
        document.clone(),
    ));

    let (read_half, mut write_half) = client.into_split();
    let mut reader = BufReader::new(read_half);

    write_half.write_all(b"alice\n").await.unwrap();

    let mut role_line = String::new();
    reader.read_line(&mut role_line).await.unwrap();
    assert_eq!(role_line.trim(), "write");

    let mut version_line = String::new();
    reader.read_line(&mut version_line).await.unwrap();
    assert_eq!(version_line.trim(), "0");
    let mut length_line = String::new();
    reader.read_line(&mut length_line).await.unwrap();
    assert_eq!(length_line.trim(), "0");

    write_half.write_all(b"0 HEADING 1 0\n").await.unwrap();

    // Wait for the session reader to hand the command to the queue.
    let batch = loop {
        let batch = queue.lock().unwrap().drain_sorted();
        if !batch.is_empty() {
            break batch;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    };
    assert_eq!(batch.len(), 1);

    let (version, records) = {
        let mut doc = document.lock().await;
        for entry in &batch {
            doc.apply(&entry.username, &entry.raw_cmd, entry.submitted_version);
        }
        let version = doc.version();
        let records = doc.close_tick();
        (version, records)
    };
    assert_eq!(version, 0);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, EditStatus::Success);

    let frame = Frame::new(version, records);
    let handle = sessions.lock().unwrap().active_handles().into_iter().next().unwrap();
    handle.write_lines(&frame.to_lines()).await.unwrap();

    let mut frame_lines = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        let is_end = line == "END";
        frame_lines.push(line);
        if is_end {
            break;
        }
    }
    assert_eq!(
        frame_lines,
        vec![
            "VERSION 0".to_string(),
            "EDIT alice HEADING 1 0 SUCCESS".to_string(),
            "END".to_string(),
        ]
    );
    assert_eq!(document.lock().await.text(), "# ");

    write_half.write_all(b"DISCONNECT\n").await.unwrap();
    driver.await.unwrap();
}
