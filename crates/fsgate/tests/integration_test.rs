//! Integration tests for fsgate
//!
//! These tests run the gate against a real directory tree created under a
//! temporary directory, using the default file-system resolver.
//!
//! # Test Structure
//!
//! - **Rules on real paths**: precedence and default deny on disk
//! - **Canonicalization**: `..` components, symlinks, missing targets
//! - **Descriptors**: open, revoke, re-check
//! - **Streams**: guarded file copies
//! - **Configuration**: loading options from a file
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test integration
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use fsgate::prelude::*;
use fsgate::permissions::PermissionKind::*;

// ============================================================================
// Helper Functions
// ============================================================================

/// A temp tree with `public/`, `secret/` and a few files
struct Tree {
    _dir: TempDir,
    root: PathBuf,
}

impl Tree {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        // The temp dir itself may sit behind a symlink (e.g. /tmp on macOS)
        let root = dir.path().canonicalize().unwrap();

        std::fs::create_dir(root.join("public")).unwrap();
        std::fs::create_dir(root.join("secret")).unwrap();
        std::fs::write(root.join("public/readme.txt"), b"hello").unwrap();
        std::fs::write(root.join("secret/key.pem"), b"-----BEGIN-----").unwrap();

        Self { _dir: dir, root }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    fn pattern(&self, rel: &str) -> String {
        format!("{}/{}", self.root.display(), rel)
    }
}

fn gate_for(tree: &Tree, rules: &[(&str, PermissionSet)]) -> Gate {
    let mut builder = GateOptions::builder();
    for (rel, perms) in rules {
        builder = builder.rule(tree.pattern(rel), *perms);
    }
    Gate::new(builder.build()).unwrap()
}

fn read_op(path: &Path) -> Operation {
    Operation::new("read_file").require_path(path, Read)
}

// ============================================================================
// Rules on Real Paths
// ============================================================================

#[tokio::test]
async fn test_default_deny_on_disk() {
    let tree = Tree::new();
    let gate = gate_for(&tree, &[]);

    let verdict = gate.authorize(&read_op(&tree.path("public/readme.txt"))).await.unwrap();
    assert!(!verdict.is_allowed());
}

#[tokio::test]
async fn test_precedence_on_disk() {
    let tree = Tree::new();
    let gate = gate_for(
        &tree,
        &[
            ("**", PermissionSet::from([Read, Stat])),
            ("secret/**", PermissionSet::empty()),
        ],
    );

    assert!(gate.check(&read_op(&tree.path("public/readme.txt"))).await.is_ok());
    assert!(gate
        .check(&read_op(&tree.path("secret/key.pem")))
        .await
        .unwrap_err()
        .is_permission_denied());
}

#[tokio::test]
async fn test_table_operations_on_disk() {
    let tree = Tree::new();
    let gate = gate_for(
        &tree,
        &[
            ("public/*", PermissionSet::from([Read, Stat, Delete])),
            ("secret/*", PermissionSet::from(Stat)),
        ],
    );

    let src = tree.path("public/readme.txt");
    let dst = tree.path("secret/copied.txt");

    let stat = gate.authorize_call("stat", &[dst.parent().unwrap().join("key.pem").into()]).await;
    assert!(stat.unwrap().is_allowed());

    // Destination doesn't exist yet and lacks write
    let Verdict::Deny(denial) = gate
        .authorize_call("copy_file", &[src.clone().into(), dst.clone().into()])
        .await
        .unwrap()
    else {
        panic!("copy into secret/ must be denied");
    };
    assert_eq!(denial.permission, Write);
    assert_eq!(denial.target, dst.display().to_string());

    gate.grant(&tree.pattern("secret/*"), Write).unwrap();
    assert!(gate
        .authorize_call("copy_file", &[src.into(), dst.into()])
        .await
        .unwrap()
        .is_allowed());
}

// ============================================================================
// Canonicalization
// ============================================================================

#[tokio::test]
async fn test_dot_dot_cannot_escape() {
    let tree = Tree::new();
    let gate = gate_for(&tree, &[("public/**", PermissionSet::all())]);

    let sneaky = tree.path("public/../secret/key.pem");
    let err = gate.check(&read_op(&sneaky)).await.unwrap_err();

    assert!(err.is_permission_denied());
    assert!(err.to_string().contains("public/../secret/key.pem"));
}

#[tokio::test]
async fn test_missing_file_in_allowed_directory() {
    let tree = Tree::new();
    let gate = gate_for(&tree, &[("public/*", PermissionSet::from(Write))]);

    let new_file = tree.path("public/new.txt");
    let verdict = gate
        .authorize_call("write_file", &[new_file.clone().into()])
        .await
        .unwrap();
    assert!(verdict.is_allowed());

    // Reading requires the target to exist
    let err = gate.authorize(&read_op(&new_file)).await.unwrap_err();
    assert!(matches!(err, GateError::ResolutionError { .. }));
}

#[tokio::test]
async fn test_missing_parent_chain() {
    let tree = Tree::new();
    let gate = gate_for(&tree, &[("public/**", PermissionSet::from(Write))]);

    let deep = tree.path("public/a/b/c.txt");
    assert!(gate.authorize_call("mkdir", &[deep.into()]).await.unwrap().is_allowed());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_into_denied_directory() {
    let tree = Tree::new();
    let link = tree.path("public/key-link");
    std::os::unix::fs::symlink(tree.path("secret/key.pem"), &link).unwrap();

    let gate = gate_for(&tree, &[("public/**", PermissionSet::all())]);

    let err = gate.check(&read_op(&link)).await.unwrap_err();
    let message = err.to_string();
    assert!(err.is_permission_denied());
    assert!(message.contains("key-link"));
    assert!(!message.contains("secret"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_directory_for_new_file() {
    let tree = Tree::new();
    std::os::unix::fs::symlink(tree.path("secret"), tree.path("public/drop")).unwrap();

    let gate = gate_for(&tree, &[("public/**", PermissionSet::all())]);

    let verdict = gate
        .authorize_call("write_file", &[tree.path("public/drop/planted.txt").into()])
        .await
        .unwrap();
    assert!(!verdict.is_allowed());
}

#[cfg(unix)]
#[tokio::test]
async fn test_dot_dot_through_symlink_for_new_file() {
    let tree = Tree::new();
    std::fs::create_dir(tree.path("secret/deep")).unwrap();
    std::os::unix::fs::symlink(tree.path("secret/deep"), tree.path("public/link")).unwrap();

    let gate = gate_for(&tree, &[("public/**", PermissionSet::all())]);

    let requested = tree.path("public/link/../planted.txt");
    let verdict = gate
        .authorize_call("write_file", &[requested.clone().into()])
        .await
        .unwrap();
    assert!(!verdict.is_allowed());

    // The OS agrees on where the file would land
    std::fs::write(&requested, b"x").unwrap();
    assert!(tree.path("secret/planted.txt").exists());
    assert!(!tree.path("public/planted.txt").exists());

    gate.grant(&tree.pattern("secret/*"), Write).unwrap();
    std::fs::remove_file(tree.path("secret/planted.txt")).unwrap();
    let Verdict::Allow(authorization) = gate
        .authorize_call("write_file", &[requested.into()])
        .await
        .unwrap()
    else {
        panic!("write into secret/ should now be allowed");
    };
    assert_eq!(
        authorization.primary_path().unwrap().as_path(),
        tree.path("secret/planted.txt")
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_cached_resolution_survives_retarget() {
    let tree = Tree::new();
    let link = tree.path("public/current");
    std::os::unix::fs::symlink(tree.path("public/readme.txt"), &link).unwrap();

    let rules = [("public/*", PermissionSet::from(Read))];
    let cached = gate_for(&tree, &rules);
    let uncached = Gate::new(
        GateOptions::builder()
            .cache_capacity(0)
            .rule(tree.pattern("public/*"), Read)
            .build(),
    )
    .unwrap();

    assert!(cached.check(&read_op(&link)).await.is_ok());
    assert!(uncached.check(&read_op(&link)).await.is_ok());

    std::fs::remove_file(&link).unwrap();
    std::os::unix::fs::symlink(tree.path("secret/key.pem"), &link).unwrap();

    // Trusted until the TTL runs out
    assert!(cached.check(&read_op(&link)).await.is_ok());
    assert!(uncached.check(&read_op(&link)).await.is_err());

    cached.canonicalizer().invalidate(&link);
    assert!(cached.check(&read_op(&link)).await.is_err());
}

// ============================================================================
// Descriptors
// ============================================================================

#[tokio::test]
async fn test_revoke_applies_to_open_descriptor() {
    let tree = Tree::new();
    let gate = gate_for(&tree, &[("public/*", PermissionSet::from([Read, Write]))]);

    let path = tree.path("public/readme.txt");
    let open = gate
        .table()
        .build("open", &[path.into(), OpArg::Flags("r+".into())])
        .unwrap();
    let fd = DescriptorId::Fd(11);
    gate.open(&open, fd).await.unwrap();

    let write = gate.table().build("write", &[fd.into()]).unwrap();
    assert!(gate.authorize(&write).await.unwrap().is_allowed());

    gate.revoke(&tree.pattern("public/*"), Write);

    let Verdict::Deny(denial) = gate.authorize(&write).await.unwrap() else {
        panic!("write through a revoked descriptor must be denied");
    };
    assert_eq!(denial.target, "fd:11");

    assert!(gate.authorize_call("close", &[fd.into()]).await.unwrap().is_allowed());
    assert!(gate.track_close(fd));
    assert!(matches!(
        gate.authorize(&write).await,
        Err(GateError::UnknownDescriptor(_))
    ));
}

// ============================================================================
// Streams
// ============================================================================

#[tokio::test]
async fn test_guarded_file_copy() {
    let tree = Tree::new();
    let gate = gate_for(
        &tree,
        &[
            ("public/*", PermissionSet::from(Read)),
            ("secret/*", PermissionSet::from(Write)),
        ],
    );

    let reader = gate.create_read_stream(tree.path("public/readme.txt")).await.unwrap();
    let mut writer = gate.create_write_stream(tree.path("secret/out.txt")).await.unwrap();
    assert_eq!(gate.tracker().len(), 2);

    let copied = reader.pipe_to(&mut writer).await.unwrap();
    drop(writer);

    assert_eq!(copied, 5);
    assert_eq!(std::fs::read(tree.path("secret/out.txt")).unwrap(), b"hello");
    assert!(gate.tracker().is_empty());
}

#[tokio::test]
async fn test_denied_stream_creates_nothing() {
    let tree = Tree::new();
    let gate = gate_for(&tree, &[("public/*", PermissionSet::from(Read))]);

    let err = gate
        .create_write_stream(tree.path("secret/new.txt"))
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());
    assert!(!tree.path("secret/new.txt").exists());
    assert!(gate.tracker().is_empty());
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_options_from_file() {
    let tree = Tree::new();
    let config = tree.path("gate.json");
    let json = serde_json::json!({
        "max_descriptors": 4,
        "resolution_timeout_ms": 2000,
        "rules": [
            { "pattern": tree.pattern("public/**"), "permissions": ["read", "stat"] }
        ]
    });
    std::fs::write(&config, json.to_string()).unwrap();

    let gate = Gate::new(GateOptions::from_file(&config).unwrap()).unwrap();
    assert_eq!(gate.tracker().max_descriptors(), 4);
    assert!(gate.check(&read_op(&tree.path("public/readme.txt"))).await.is_ok());

    let granted = gate
        .effective_permissions_for(&tree.path("public/readme.txt"))
        .await
        .unwrap();
    assert_eq!(granted, PermissionSet::from([Read, Stat]));
}
