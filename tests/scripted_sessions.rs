//! End-to-end backup sessions against scripted in-memory devices.
//!
//! Each test spawns a task that plays the device side of the conversation
//! over a loopback transport, then drives a real [`NodeBackupHandler`]
//! against it and inspects the artifact it leaves behind.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinHandle;

use netbkp::backup::{CloseReason, NodeBackupHandler, SessionState, UNSUPPORTED_NOTE};
use netbkp::config::{NodeConfig, SessionTuning};
use netbkp::error::FailureKind;
use netbkp::transport::{LoopbackDevice, SessionHandle};

const SEPARATOR: &str =
    "-----------------------------------------------------------------------------------\n";

fn node(hostname: &str, node_type: &str, prompt: &str) -> NodeConfig {
    NodeConfig {
        hostname: hostname.to_string(),
        ip: "10.0.2.7".to_string(),
        node_type: node_type.to_string(),
        prompt: prompt.to_string(),
        username: "admin".to_string(),
        password: "secret".to_string(),
    }
}

fn fast_tuning() -> SessionTuning {
    SessionTuning {
        connect_timeout: Duration::from_secs(2),
        auth_timeout: Duration::from_secs(2),
        prompt_timeout: Duration::from_secs(2),
        settle_delay: Duration::from_millis(10),
        buffer_size: 1024 * 1024,
    }
}

fn artifact_name(hostname: &str) -> String {
    format!(
        "{}-backup-{}",
        hostname.to_lowercase(),
        Local::now().format("%Y%m%d")
    )
}

fn expected_header(node: &NodeConfig) -> String {
    format!(
        "{SEPARATOR}Equipment type: {} -> {} with IP: {}\n{SEPARATOR}",
        node.node_type, node.hostname, node.ip
    )
}

/// Plays a scripted device: alternately emits the given chunks and records
/// the lines the session sends, returning everything received once the
/// session side hangs up.
fn scripted_device(
    mut device: LoopbackDevice,
    script: Vec<(&'static str, bool)>,
) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut received = Vec::new();
        for (chunk, expect_reply) in script {
            if device.output.send(chunk.to_string()).await.is_err() {
                break;
            }
            if expect_reply {
                match device.input.recv().await {
                    Some(line) => received.push(line),
                    None => break,
                }
            }
        }
        while let Some(line) = device.input.recv().await {
            received.push(line);
        }
        received
    })
}

#[tokio::test]
async fn switch_session_captures_until_hash() {
    let run_dir = tempfile::tempdir().unwrap();
    let node = node("EXOS-VM", "connectivitySwitch", "EXOS-VM>");
    let tuning = fast_tuning();

    let (handle, device) = SessionHandle::in_memory();
    let device = scripted_device(
        device,
        vec![
            ("Password:", true),
            ("EXOS-VM>", true),
            ("#", true),
            ("abc#", false),
        ],
    );

    let mut handler = NodeBackupHandler::new(&node, &tuning);
    let outcome = handler
        .create_node_backup_with(handle, run_dir.path())
        .await;

    assert_eq!(outcome.state, SessionState::Closed(CloseReason::Success));
    assert!(outcome.error.is_none());

    let sent = device.await.unwrap();
    assert_eq!(
        sent,
        vec![
            "secret\n".to_string(),
            "disable clipaging\n".to_string(),
            "show configuration\n".to_string(),
            "exit\n".to_string(),
        ]
    );

    let body = fs::read_to_string(&outcome.artifact).unwrap();
    assert_eq!(body, format!("{}abc", expected_header(&node)));
}

#[tokio::test]
async fn srx_session_captures_until_set() {
    let run_dir = tempfile::tempdir().unwrap();
    let node = node("Edge_FW_01", "srx", "fw01>");
    let tuning = fast_tuning();

    let (handle, device) = SessionHandle::in_memory();
    let device = scripted_device(
        device,
        vec![
            ("Password:", true),
            ("fw01>", true),
            ("system host-name fw01;\nset", false),
        ],
    );

    let mut handler = NodeBackupHandler::new(&node, &tuning);
    let outcome = handler
        .create_node_backup_with(handle, run_dir.path())
        .await;

    assert_eq!(outcome.state, SessionState::Closed(CloseReason::Success));

    let sent = device.await.unwrap();
    assert_eq!(
        sent,
        vec![
            "secret\n".to_string(),
            "show config | display set | no-more\n".to_string(),
            "exit\n".to_string(),
        ]
    );

    let body = fs::read_to_string(&outcome.artifact).unwrap();
    assert_eq!(
        body,
        format!("{}system host-name fw01;\n", expected_header(&node))
    );
}

#[tokio::test]
async fn expect_timeout_writes_partial_output() {
    let run_dir = tempfile::tempdir().unwrap();
    let node = node("Edge_FW_01", "srx", "fw01>");
    let mut tuning = fast_tuning();
    tuning.prompt_timeout = Duration::from_millis(200);

    let (handle, device) = SessionHandle::in_memory();
    // The device sends a partial dump and never reaches the terminator.
    let device = scripted_device(
        device,
        vec![
            ("Password:", true),
            ("fw01>", true),
            ("partial dump without terminator", false),
        ],
    );

    let mut handler = NodeBackupHandler::new(&node, &tuning);
    let outcome = handler
        .create_node_backup_with(handle, run_dir.path())
        .await;

    assert_eq!(
        outcome.state,
        SessionState::Closed(CloseReason::Failed(FailureKind::ExpectTimeout))
    );
    assert!(outcome.error.is_some());

    let body = fs::read_to_string(&outcome.artifact).unwrap();
    assert_eq!(
        body,
        format!(
            "{}partial dump without terminator",
            expected_header(&node)
        )
    );

    // The session is logged out exactly once on the timeout path.
    let sent = device.await.unwrap();
    assert_eq!(
        sent.iter().filter(|line| line.as_str() == "exit\n").count(),
        1
    );
    assert_eq!(sent.last().map(String::as_str), Some("exit\n"));
}

#[tokio::test]
async fn unsupported_equipment_writes_fallback_note() {
    let run_dir = tempfile::tempdir().unwrap();
    let node = node("Rack_UPS_02", "ups", "ups>");
    let tuning = fast_tuning();

    let (handle, device) = SessionHandle::in_memory();
    let device = scripted_device(device, vec![("Password:", true)]);

    let mut handler = NodeBackupHandler::new(&node, &tuning);
    let outcome = handler
        .create_node_backup_with(handle, run_dir.path())
        .await;

    assert_eq!(
        outcome.state,
        SessionState::Closed(CloseReason::Failed(FailureKind::UnsupportedEquipment))
    );

    let body = fs::read_to_string(&outcome.artifact).unwrap();
    assert_eq!(body, format!("{}{}", expected_header(&node), UNSUPPORTED_NOTE));

    device.await.unwrap();
}

#[tokio::test]
async fn same_day_rerun_overwrites_the_same_artifact() {
    let run_dir = tempfile::tempdir().unwrap();
    let node = node("EXOS-VM", "connectivitySwitch", "EXOS-VM>");
    let tuning = fast_tuning();

    for dump in ["abc#", "abcdef#"] {
        let (handle, device) = SessionHandle::in_memory();
        let device = scripted_device(
            device,
            vec![
                ("Password:", true),
                ("EXOS-VM>", true),
                ("#", true),
                (dump, false),
            ],
        );

        let mut handler = NodeBackupHandler::new(&node, &tuning);
        let outcome = handler
            .create_node_backup_with(handle, run_dir.path())
            .await;
        assert!(outcome.succeeded());
        device.await.unwrap();
    }

    let entries: Vec<_> = fs::read_dir(run_dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);

    let path = run_dir.path().join(artifact_name("EXOS-VM"));
    let body = fs::read_to_string(path).unwrap();
    assert!(body.ends_with("abcdef"));
}

#[tokio::test]
async fn auth_timeout_when_no_password_prompt_appears() {
    let run_dir = tempfile::tempdir().unwrap();
    let node = node("Edge_FW_01", "srx", "fw01>");
    let mut tuning = fast_tuning();
    tuning.auth_timeout = Duration::from_millis(200);

    let (handle, device) = SessionHandle::in_memory();
    // A banner arrives but the password prompt never does.
    let device = scripted_device(device, vec![("Welcome to fw01\n", false)]);

    let mut handler = NodeBackupHandler::new(&node, &tuning);
    let outcome = handler
        .create_node_backup_with(handle, run_dir.path())
        .await;

    assert_eq!(
        outcome.state,
        SessionState::Closed(CloseReason::Failed(FailureKind::AuthTimeout))
    );

    assert!(Path::new(&outcome.artifact).exists());
    device.await.unwrap();
}
