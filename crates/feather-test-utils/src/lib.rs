//! Shared test utilities for feather integration tests.
//!
//! Writes the files a job run touches: a fake worker executable, box
//! geometry in ASCII STL, and pick files. Everything here panics on
//! failure; it is only ever called from tests.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// A scratch handoff directory plus the paths tests usually need in it.
pub struct Scratch {
    pub dir: tempfile::TempDir,
}

impl Scratch {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside the scratch directory.
    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Names of every file currently in the directory, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .expect("failed to list scratch dir")
            .map(|entry| {
                entry
                    .expect("failed to read dir entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Self::new()
    }
}

/// Write an executable shell script standing in for the worker.
///
/// `body` runs under `/bin/sh` with the mode keyword in `$1` and the
/// descriptor path in `$2`. Use `exec` for long-running commands so a
/// SIGTERM reaches them directly.
pub fn write_fake_worker(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("failed to write fake worker");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to make fake worker executable");
    }

    path
}

/// Write an axis-aligned box from the origin to `size` as ASCII STL, with
/// outward-facing winding.
pub fn write_box_stl(path: &Path, size: [f64; 3]) {
    let [x, y, z] = size;
    let o = 0.0;
    #[rustfmt::skip]
    let faces: [([f64; 3], [[f64; 3]; 3]); 12] = [
        ([0.0, 0.0, -1.0], [[o, o, o], [o, y, o], [x, y, o]]),
        ([0.0, 0.0, -1.0], [[o, o, o], [x, y, o], [x, o, o]]),
        ([0.0, 0.0, 1.0],  [[o, o, z], [x, o, z], [x, y, z]]),
        ([0.0, 0.0, 1.0],  [[o, o, z], [x, y, z], [o, y, z]]),
        ([0.0, -1.0, 0.0], [[o, o, o], [x, o, o], [x, o, z]]),
        ([0.0, -1.0, 0.0], [[o, o, o], [x, o, z], [o, o, z]]),
        ([0.0, 1.0, 0.0],  [[o, y, o], [o, y, z], [x, y, z]]),
        ([0.0, 1.0, 0.0],  [[o, y, o], [x, y, z], [x, y, o]]),
        ([-1.0, 0.0, 0.0], [[o, o, o], [o, o, z], [o, y, z]]),
        ([-1.0, 0.0, 0.0], [[o, o, o], [o, y, z], [o, y, o]]),
        ([1.0, 0.0, 0.0],  [[x, o, o], [x, y, o], [x, y, z]]),
        ([1.0, 0.0, 0.0],  [[x, o, o], [x, y, z], [x, o, z]]),
    ];

    let mut out = String::from("solid box\n");
    for (n, corners) in faces {
        let _ = writeln!(out, "  facet normal {} {} {}", n[0], n[1], n[2]);
        out.push_str("    outer loop\n");
        for [vx, vy, vz] in corners {
            let _ = writeln!(out, "      vertex {vx} {vy} {vz}");
        }
        out.push_str("    endloop\n  endfacet\n");
    }
    out.push_str("endsolid box\n");

    std::fs::write(path, out).expect("failed to write STL");
}

/// Write picked points as a JSON array of `[x, y, z]` triples.
pub fn write_picks(path: &Path, points: &[[f64; 3]]) {
    let json = serde_json::to_string(points).expect("failed to encode picks");
    std::fs::write(path, json).expect("failed to write picks");
}
