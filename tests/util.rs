//! Shared test utilities for integration tests
//!
//! Provides diff fixtures and a sandboxed command builder so the
//! binary never sees the caller's config files or CI variables.

#![allow(dead_code)]

use assert_cmd::Command;
use assert_fs::prelude::*;

/// One removed and one added marker in `src/app.rs`
pub const APP_DIFF: &str = "\
diff --git a/src/app.rs b/src/app.rs
index 1111111..2222222 100644
--- a/src/app.rs
+++ b/src/app.rs
@@ -1,4 +1,4 @@
 fn main() {
-    // TODO: remove me
+    // TODO: new thing
     run();
 }
";

/// Same change under `vendor/`, plus a marker in `src/`
pub const VENDOR_DIFF: &str = "\
diff --git a/vendor/lib.rs b/vendor/lib.rs
--- a/vendor/lib.rs
+++ b/vendor/lib.rs
@@ -1,1 +1,2 @@
 fn lib() {}
+// TODO: vendored work
diff --git a/src/main.rs b/src/main.rs
--- a/src/main.rs
+++ b/src/main.rs
@@ -10,1 +10,2 @@
 fn main() {}
+// TODO: our work
";

/// Temp project with `changes.patch` holding `diff`
pub fn project_with_diff(diff: &str) -> assert_fs::TempDir
{
    // Initialize the temporary project root
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("changes.patch")
        .write_str(diff)
        .expect("write diff");

    tmp
}

/// `todo2issue` running in `dir` with an empty environment
pub fn todo2issue(dir: &std::path::Path) -> Command
{
    let mut cmd = Command::cargo_bin("todo2issue").expect("binary");
    cmd.current_dir(dir)
        .env_clear();
    cmd
}
