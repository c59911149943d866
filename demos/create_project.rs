//! Builds and runs a "Create project" task tree, polling it the way a
//! render loop would: once per frame, print the active chain and drain
//! the UI dispatch queue.
//!
//! Run with: `cargo run --example create_project`

use frametask::{DispatchQueue, Task, TaskExecutor, TaskGroup, TaskTree};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), frametask::Error> {
    tracing_subscriber::fmt().init();

    let executor = TaskExecutor::new()?;
    let ui_queue = Arc::new(DispatchQueue::new());

    let project = std::env::temp_dir().join("frametask-demo-project");
    let tree = TaskTree::new(TaskGroup::ProjectManager, "Create project");

    {
        let file = project.join("project.toml");
        tree.add(Task::new("Writing project files...", move || {
            std::fs::create_dir_all(file.parent().unwrap_or(&file))?;
            std::fs::write(&file, "name = \"demo\"\n")?;
            std::thread::sleep(Duration::from_millis(400));
            Ok(())
        }))?;
    }

    let dirs = Task::group("Creating directories...");
    for name in ["assets", "scenes", "src"] {
        let target = project.join(name);
        dirs.add(Task::new(format!("Creating {name}/..."), move || {
            std::fs::create_dir_all(&target)?;
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }))?;
    }
    tree.add(dirs)?;

    {
        let queue = Arc::clone(&ui_queue);
        tree.add(Task::watched("Registering project...", move |watcher| {
            watcher.set_total(5);
            for done in 1..=5 {
                std::thread::sleep(Duration::from_millis(150));
                watcher.set_done(done);
            }
            queue.enqueue(|| println!("(ui) project registered, refreshing list"));
            Ok(())
        }))?;
    }

    executor.submit(tree)?;

    // The "render loop": one iteration per frame.
    while executor.is_running() || !ui_queue.is_empty() {
        if let Some(tree) = executor.current_tree() {
            let chain = tree.active_chain();
            let nested: Vec<String> = chain.iter().skip(1).map(ToString::to_string).collect();
            println!(
                "{} ({:.0}%, busy for {}s) {}",
                tree.group(),
                tree.percentage() * 100.0,
                tree.running_for().as_secs(),
                nested.join(" > ")
            );
        }
        ui_queue.drain_and_run();
        std::thread::sleep(Duration::from_millis(100));
    }

    println!("done, no failures: {}", executor.error_sink().is_empty());
    Ok(())
}
