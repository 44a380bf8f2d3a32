#![cfg(feature = "integration-test-api")]

mod support;

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

use serde_json::{Value, json};
use support::{IntegrationEnv, JPEG_MAGIC, VideoKind};

/// Sends each request as one line, closes stdin, and returns responses keyed by id.
/// Failures with id 0 are collected under key 0 in arrival order.
fn run_sidecar(env: &IntegrationEnv, requests: &[String]) -> (HashMap<u64, Value>, Vec<Value>) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_vidthumb-sidecar"))
        .env("VIDTHUMB_TEMP_DIR", env.artifact_dir())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn sidecar");

    {
        let mut stdin = child.stdin.take().expect("stdin");
        for line in requests {
            writeln!(stdin, "{}", line).expect("write request");
        }
    }

    let stdout = child.stdout.take().expect("stdout");
    let mut by_id = HashMap::new();
    let mut unidentified = Vec::new();
    for line in BufReader::new(stdout).lines() {
        let value: Value = serde_json::from_str(&line.expect("line")).expect("json response");
        match value["id"].as_u64() {
            Some(0) | None => unidentified.push(value),
            Some(id) => {
                by_id.insert(id, value);
            }
        }
    }
    assert!(child.wait().expect("wait").success());
    (by_id, unidentified)
}

#[test]
fn capabilities_malformed_lines_and_unknown_methods() {
    let env = IntegrationEnv::new();
    let (responses, unidentified) = run_sidecar(
        &env,
        &[
            json!({ "id": 1, "method": "app.capabilities" }).to_string(),
            "{ not json".to_string(),
            json!({ "id": 2, "method": "media.transcode", "params": {} }).to_string(),
            json!({ "id": 3, "method": "media.inspect", "params": { "extension": "mp4" } })
                .to_string(),
        ],
    );

    let caps = &responses[&1]["result"];
    assert_eq!(caps["protocolVersion"], 1);
    assert_eq!(caps["engine"], "ffmpeg-cli");

    assert_eq!(unidentified.len(), 1);
    assert_eq!(unidentified[0]["error"]["summary"], "Invalid request");

    assert_eq!(responses[&2]["error"]["code"], "InvalidArgument");
    assert_eq!(responses[&3]["error"]["code"], "InvalidArgument");
}

#[test]
fn concurrent_requests_are_answered_by_id() {
    let env = IntegrationEnv::new();
    let bytes = env.test_video_bytes(
        "input.mp4",
        3.0,
        VideoKind::Plain {
            width: 320,
            height: 240,
        },
    );

    let (responses, unidentified) = run_sidecar(
        &env,
        &[
            json!({
                "id": 10,
                "method": "media.thumbnails",
                "params": {
                    "videoBytes": bytes,
                    "extension": "mp4",
                    "timestampsMs": [0, 1000, 60000, 1.5],
                    "imageWidth": 80,
                    "thumbnailFormat": "jpg"
                }
            })
            .to_string(),
            json!({
                "id": 11,
                "method": "media.inspect",
                "params": { "videoBytes": bytes, "extension": "mp4" }
            })
            .to_string(),
            json!({
                "id": 12,
                "method": "media.inspect",
                "params": { "videoBytes": [1, 2, 3], "extension": "mp4" }
            })
            .to_string(),
        ],
    );
    assert!(unidentified.is_empty());

    let slots = responses[&10]["result"].as_array().expect("slot array");
    assert_eq!(slots.len(), 4);
    let first: Vec<u8> = serde_json::from_value(slots[0].clone()).expect("bytes");
    assert!(first.starts_with(JPEG_MAGIC));
    assert!(slots[1].is_array());
    assert!(slots[2].is_null());
    assert!(slots[3].is_null());

    let meta = &responses[&11]["result"];
    assert_eq!(meta["width"], 320);
    assert_eq!(meta["height"], 240);
    assert_eq!(meta["fileSizeBytes"], bytes.len());

    assert_eq!(responses[&12]["error"]["code"], "DecodeError");
    assert!(env.artifacts().is_empty());
}
