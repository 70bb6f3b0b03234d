//! Guarded copy example demonstrating the decision engine.
//!
//! This example shows how to:
//! - Configure rules with `GateOptions::builder()`
//! - Authorize table-driven operations with `Gate::authorize_call()`
//! - Copy a file through guarded streams
//! - See a symlink into a denied directory get refused
//!
//! # Usage
//!
//! ```bash
//! cargo run --example guarded_copy --package fsgate
//! ```

use fsgate::prelude::*;
use fsgate::permissions::PermissionKind::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== fsgate Guarded Copy Example ===\n");

    // Scratch tree: inbox/ is readable, outbox/ is writable, vault/ is off limits
    let dir = tempfile::tempdir()?;
    let root = dir.path().canonicalize()?;
    for sub in ["inbox", "outbox", "vault"] {
        std::fs::create_dir(root.join(sub))?;
    }
    std::fs::write(root.join("inbox/report.csv"), "id,total\n1,42\n")?;
    std::fs::write(root.join("vault/token"), "do-not-read")?;

    let options = GateOptions::builder()
        .rule(format!("{}/inbox/**", root.display()), [Read, Stat])
        .rule(format!("{}/outbox/**", root.display()), [Write, Stat])
        .build();
    let gate = Gate::new(options)?;

    println!("Rules:");
    for rule in gate.rules().rules() {
        println!("  - {} => {}", rule.pattern(), rule.permissions());
    }
    println!();

    // Table-driven authorization
    let src = root.join("inbox/report.csv");
    let dst = root.join("outbox/report.csv");
    let verdict = gate
        .authorize_call("copy_file", &[src.clone().into(), dst.clone().into()])
        .await?;
    println!("copy_file inbox -> outbox: allowed = {}", verdict.is_allowed());

    // Stream copy
    let reader = gate.create_read_stream(&src).await?;
    let mut writer = gate.create_write_stream(&dst).await?;
    let copied = reader.pipe_to(&mut writer).await?;
    drop(writer);
    println!("Copied {copied} bytes through guarded streams");

    // A link into the vault is judged by where it points
    #[cfg(unix)]
    {
        let link = root.join("inbox/shortcut");
        std::os::unix::fs::symlink(root.join("vault/token"), &link)?;

        let op = Operation::new("read_file").require_path(&link, Read);
        match gate.check(&op).await {
            Ok(_) => println!("Unexpected: vault readable through link"),
            Err(e) => println!("Denied as expected: {e}"),
        }
    }

    println!("\nLive descriptors: {}", gate.tracker().len());
    Ok(())
}
