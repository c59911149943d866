//! End-to-end scenarios exercising the public API: tree construction,
//! serialized execution, progress aggregation, dispatch-queue interplay
//! and failure routing.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use frametask::{DispatchQueue, Task, TaskExecutor, TaskGroup, TaskTree};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Polls `condition` until it holds or a generous timeout expires.
fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Serves a single HTTP response with the given body, returning its URL.
fn serve_once(body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while !request.ends_with(b"\r\n\r\n") {
            if stream.read(&mut byte).unwrap() == 0 {
                break;
            }
            request.push(byte[0]);
        }
        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(header.as_bytes()).unwrap();
        stream.write_all(&body).unwrap();
    });

    format!("http://{}/tool.zip", addr)
}

/// Builds an in-memory stored zip from name/content pairs.
fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[test]
fn create_project_tree_runs_in_order_and_completes() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().to_path_buf();
    let log = Arc::new(Mutex::new(Vec::new()));

    let executor = TaskExecutor::new().unwrap();
    let tree = TaskTree::new(TaskGroup::ProjectManager, "Create project");

    let file_path = project.join("project.toml");
    let write_path = file_path.clone();
    let write_log = Arc::clone(&log);
    tree.add(Task::new("Writing project files...", move || {
        std::fs::write(&write_path, "name = \"demo\"\n")?;
        write_log.lock().push("write");
        Ok(())
    }))
    .unwrap();

    let dirs = Task::group("Creating directories...");
    for name in ["assets", "scenes"] {
        let target = project.join(name);
        let dir_log = Arc::clone(&log);
        dirs.add(Task::new(format!("Creating {name}/..."), move || {
            std::fs::create_dir_all(&target)?;
            dir_log.lock().push(name);
            Ok(())
        }))
        .unwrap();
    }
    tree.add(dirs).unwrap();

    let register_project = project.clone();
    let register_log = Arc::clone(&log);
    tree.add(Task::new("Registering project...", move || {
        // Earlier steps' side effects must be visible before this runs.
        assert!(register_project.join("project.toml").exists());
        assert!(register_project.join("assets").is_dir());
        assert!(register_project.join("scenes").is_dir());
        register_log.lock().push("register");
        Ok(())
    }))
    .unwrap();

    let handle = executor.submit(tree).unwrap();
    assert!(wait_until(|| !executor.is_running()));

    assert_eq!(*log.lock(), ["write", "assets", "scenes", "register"]);
    assert_eq!(handle.percentage(), 1.0);
    assert!(executor.error_sink().is_empty());
    assert_eq!(handle.group(), TaskGroup::ProjectManager);
}

#[test]
fn install_chain_downloads_extracts_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let binaries = dir.path().join("binaries");
    let archive = binaries.join("tool.zip");
    let body = zip_bytes(&[("tool/bin/run", b"#!/bin/sh\n"), ("tool/readme", b"hi")]);
    let url = serve_once(body);

    let executor = TaskExecutor::new().unwrap();
    let tree = TaskTree::new(TaskGroup::Editor, "Installing tool...");
    {
        let binaries = binaries.clone();
        tree.add(Task::new("Creating directory...", move || {
            std::fs::create_dir_all(&binaries)?;
            Ok(())
        }))
        .unwrap();
    }
    tree.add(Task::download_to_file(&url, &archive).unwrap())
        .unwrap();
    tree.add(Task::extract_zip("Unpacking the zip...", &archive, &binaries))
        .unwrap();
    {
        let archive = archive.clone();
        tree.add(Task::new("Cleaning up...", move || {
            std::fs::remove_file(&archive)?;
            Ok(())
        }))
        .unwrap();
    }

    let handle = executor.submit(tree).unwrap();
    assert!(wait_until(|| !executor.is_running()));

    assert!(executor.error_sink().is_empty(), "{:?}", executor.error_sink().messages());
    assert_eq!(
        std::fs::read(binaries.join("tool/bin/run")).unwrap(),
        b"#!/bin/sh\n"
    );
    assert!(!archive.exists(), "temp archive removed by cleanup step");
    assert_eq!(handle.percentage(), 1.0);
}

#[test]
fn failed_extraction_reports_once_with_partial_progress() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("a.zip");
    let dest = dir.path().join("out");
    std::fs::write(
        &archive,
        zip_bytes(&[
            ("e0.txt", b"0"),
            ("e1.txt", b"1"),
            ("e2.txt", b"2"),
            ("e3.txt", b"3"),
            ("e4.txt", b"4"),
        ]),
    )
    .unwrap();
    // Make the third entry unwritable.
    std::fs::create_dir_all(dest.join("e2.txt")).unwrap();

    let extract = Task::extract_zip("Unpacking...", &archive, &dest);
    let progress = Arc::clone(&extract);

    let executor = TaskExecutor::new().unwrap();
    let tree = TaskTree::new(TaskGroup::Editor, "Import");
    tree.add(extract).unwrap();
    executor.submit(tree).unwrap();
    assert!(wait_until(|| !executor.is_running()));

    assert_eq!(
        executor.error_sink().len(),
        1,
        "exactly one failure event for the aborted tree"
    );
    assert_eq!(progress.units_done(), 2.0, "entries 0 and 1 completed");
    assert_eq!(progress.units_total(), 5.0);
}

#[test]
fn worker_enqueues_ui_work_drained_by_the_frame_loop() {
    let executor = TaskExecutor::new().unwrap();
    let ui_queue = Arc::new(DispatchQueue::new());
    let ui_log = Arc::new(Mutex::new(Vec::new()));

    let tree = TaskTree::new(TaskGroup::Editor, "Background work");
    for step in ["open popup", "refresh list"] {
        let queue = Arc::clone(&ui_queue);
        let log = Arc::clone(&ui_log);
        tree.add(Task::new(step, move || {
            queue.enqueue(move || log.lock().push(step));
            Ok(())
        }))
        .unwrap();
    }

    executor.submit(tree).unwrap();
    assert!(wait_until(|| !executor.is_running()));

    assert!(ui_log.lock().is_empty(), "nothing runs before the UI drains");
    ui_queue.drain_and_run();
    assert_eq!(*ui_log.lock(), ["open popup", "refresh list"]);
}

#[test]
fn nested_chain_is_renderable_while_running() {
    let executor = TaskExecutor::new().unwrap();
    let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();

    let tree = TaskTree::new(TaskGroup::ProjectManager, "Create project");
    let group = Task::group("Copying files...");
    group.add(Task::group("first")).unwrap();
    group
        .add(Task::new("second", move || {
            gate_rx.recv().ok();
            Ok(())
        }))
        .unwrap();
    tree.add(group).unwrap();

    executor.submit(tree).unwrap();

    // Wait until the worker is inside the gated leaf, then poll the chain
    // the way a progress popup would.
    assert!(wait_until(|| {
        executor
            .current_tree()
            .map(|t| {
                t.active_chain()
                    .last()
                    .is_some_and(|step| step.description == "second")
            })
            .unwrap_or(false)
    }));

    let current = executor.current_tree().unwrap();
    let chain = current.active_chain();
    assert_eq!(chain[0].description, "Create project");
    assert_eq!(chain[1].description, "Copying files...");
    assert_eq!(chain[2].description, "second");
    assert_eq!(chain[1].to_string(), "[1/2] Copying files...");

    gate_tx.send(()).unwrap();
    assert!(wait_until(|| !executor.is_running()));
}
