use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use castr_ogg::{OggWriter, PageFlags};

fn castr() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_castr"));
    command.arg("--log-level").arg("error");
    command
}

fn write_container(path: &Path, gap: bool) {
    let mut writer = OggWriter::new(Vec::new());
    let mut meta = 0;
    writer
        .write_packet(0, 0, &mut meta, b"ECMETA\0\0", PageFlags::BEGIN)
        .unwrap();
    let mut track = 0;
    writer
        .write_packet(0, 1, &mut track, b"OpusHead", PageFlags::BEGIN)
        .unwrap();
    writer
        .write_packet(0, 1, &mut track, b"OpusTags", PageFlags::NONE)
        .unwrap();
    if gap {
        track += 1;
    }
    writer
        .write_packet(960, 1, &mut track, &[0x55; 40], PageFlags::NONE)
        .unwrap();
    std::fs::write(path, writer.into_inner()).unwrap();
}

#[test]
fn version_prints_package_version() {
    let output = castr().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.trim(), format!("castr {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn extended_version_reports_session_defaults() {
    let output = castr()
        .args(["--format", "json", "version", "--extended"])
        .output()
        .expect("version should run");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["name"], "castr");
    assert_eq!(json["formats"], serde_json::json!(["opus", "flac"]));
    assert_eq!(json["port_range"], "36678..53062");
    assert_eq!(json["max_tracks"], 16);
}

#[test]
fn inspect_summarizes_streams_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("1.ogg.data");
    write_container(&path, false);

    let output = castr()
        .arg("--format")
        .arg("json")
        .arg("inspect")
        .arg(&path)
        .output()
        .expect("inspect should run");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["contiguous"], true);
    let streams = json["streams"].as_array().unwrap();
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0]["serial"], 0);
    assert_eq!(streams[1]["serial"], 1);
    assert_eq!(streams[1]["pages"], 3);
    assert_eq!(streams[1]["last_granule"], 960);
    assert_eq!(streams[1]["truncated"], false);
}

#[test]
fn inspect_reports_sequence_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gap.ogg");
    write_container(&path, true);

    let output = castr()
        .arg("--format")
        .arg("json")
        .arg("inspect")
        .arg(&path)
        .output()
        .expect("inspect should run");
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["contiguous"], false);
}

#[test]
fn inspect_rejects_corrupt_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.ogg");
    std::fs::write(&path, b"this is not a container at all, not even close").unwrap();

    let output = castr()
        .arg("inspect")
        .arg(&path)
        .output()
        .expect("inspect should run");
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn serve_rejects_bad_startup_message() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = castr()
        .arg("serve")
        .arg("--bind")
        .arg("127.0.0.1")
        .arg("--recording-dir")
        .arg(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"not json\n")
        .unwrap();
    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(60));
}

#[test]
fn serve_rejects_bad_flags() {
    let output = castr()
        .arg("serve")
        .arg("--port-len")
        .arg("0")
        .stdin(Stdio::null())
        .output()
        .expect("serve should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn serve_reports_readiness_and_creates_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = castr()
        .arg("serve")
        .arg("--bind")
        .arg("127.0.0.1")
        .arg("--recording-dir")
        .arg(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let mut stdin = child.stdin.take().unwrap();
    stdin
        .write_all(b"{\"c\":\"info\",\"r\":{\"name\":\"Smoke\",\"format\":\"opus\",\"uid\":5}}\n")
        .unwrap();
    stdin.flush().unwrap();

    let mut line = String::new();
    BufReader::new(child.stdout.take().unwrap())
        .read_line(&mut line)
        .unwrap();

    let ready: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    let rid = ready["r"]["rid"].as_u64().unwrap();
    let info_path = dir.path().join(format!("{rid}.ogg.info"));
    // Sinks write in the background; give the first line a moment to land.
    let mut info = String::new();
    for _ in 0..100 {
        info = std::fs::read_to_string(&info_path).unwrap_or_default();
        if info.ends_with('\n') {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    let _ = child.kill();
    let _ = child.wait();

    assert_eq!(ready["c"], "ready");
    assert_eq!(ready["r"]["name"], "Smoke");
    assert_eq!(ready["r"]["uid"], 5);
    assert!(rid > 0 && rid <= i32::MAX as u64);
    assert!(ready["r"]["port"].as_u64().unwrap() > 0);

    for suffix in ["header1", "header2", "data", "users", "info"] {
        assert!(dir.path().join(format!("{rid}.ogg.{suffix}")).exists());
    }
    assert!(info.contains("\"name\":\"Smoke\""));
}
