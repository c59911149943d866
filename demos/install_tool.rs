//! Download-and-unpack install chain: create a directory, download a zip
//! with byte-level progress, extract it with per-entry progress, then
//! clean up the temporary archive.
//!
//! Run with: `cargo run --example install_tool -- <url-of-zip>`

use frametask::{Task, TaskExecutor, TaskGroup, TaskTree};
use std::time::Duration;

fn main() -> Result<(), frametask::Error> {
    tracing_subscriber::fmt().init();

    let Some(url) = std::env::args().nth(1) else {
        eprintln!("usage: install_tool <url-of-zip>");
        return Ok(());
    };

    let install_dir = std::env::temp_dir().join("frametask-demo-install");
    let archive = install_dir.join("download.zip");

    let executor = TaskExecutor::new()?;
    let tree = TaskTree::new(TaskGroup::Editor, "Installing tool...");
    {
        let install_dir = install_dir.clone();
        tree.add(Task::new("Creating directory...", move || {
            std::fs::create_dir_all(&install_dir)?;
            Ok(())
        }))?;
    }
    tree.add(Task::download_to_file(&url, &archive)?)?;
    tree.add(Task::extract_zip(
        "Unpacking the zip...",
        &archive,
        &install_dir,
    ))?;
    {
        let archive = archive.clone();
        tree.add(Task::new("Cleaning up...", move || {
            std::fs::remove_file(&archive)?;
            Ok(())
        }))?;
    }

    executor.submit(tree)?;

    while executor.is_running() {
        if let Some(tree) = executor.current_tree() {
            let chain = tree.active_chain();
            if let Some(step) = chain.last() {
                let overall = tree.percentage();
                if overall.is_nan() {
                    println!("{step} (size unknown)");
                } else {
                    println!("{step} ({:.0}% overall)", overall * 100.0);
                }
            }
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    for message in executor.error_sink().messages() {
        eprintln!("failed: {message}");
    }
    if executor.error_sink().is_empty() {
        println!("installed into {}", install_dir.display());
    }
    Ok(())
}
