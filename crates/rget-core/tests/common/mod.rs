#![allow(dead_code)]

pub mod http_server;

/// Scratch destination inside a fresh temp dir.
pub fn scratch(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}
