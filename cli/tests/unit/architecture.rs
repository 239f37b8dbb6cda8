//! Structural tests for layer boundaries.
//!
//! The domain layer stays synchronous and I/O free, and the application
//! layer depends on ports only.

use std::path::{Path, PathBuf};

fn src(dir: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(dir)
}

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Non-comment lines outside `#[cfg(test)]` blocks.
fn production_lines(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut lines = Vec::new();
    let mut depth = 0i32;
    let mut test_block_depth: Option<i32> = None;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("#[cfg(test)]") && test_block_depth.is_none() {
            test_block_depth = Some(depth);
        }
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if test_block_depth.is_some_and(|start| depth <= start) {
                        test_block_depth = None;
                    }
                }
                _ => {}
            }
        }
        // A `#[cfg(test)] mod name;` declaration has no block to close.
        if test_block_depth == Some(depth) && trimmed.ends_with(';') {
            test_block_depth = None;
            continue;
        }
        if test_block_depth.is_some() || trimmed.starts_with("//") {
            continue;
        }
        lines.push(line.to_string());
    }
    lines
}

fn violations(dir: &str, forbidden: &[&str], skip_files: &[&str]) -> Vec<String> {
    let mut found = Vec::new();
    for file in collect_rs_files(&src(dir)) {
        let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if skip_files.contains(&name) {
            continue;
        }
        for line in production_lines(&file) {
            for pattern in forbidden {
                if line.contains(pattern) {
                    found.push(format!("{}: {}", file.display(), line.trim()));
                }
            }
        }
    }
    found
}

#[test]
fn domain_has_no_io_or_outer_layer_imports() {
    let found = violations(
        "domain",
        &[
            "crate::infra",
            "crate::application",
            "crate::commands",
            "tokio",
            "std::fs",
            "std::net",
            "reqwest",
        ],
        &[],
    );
    assert!(found.is_empty(), "domain boundary violations:\n{}", found.join("\n"));
}

#[test]
fn application_does_not_import_adapters() {
    let found = violations(
        "application",
        &["crate::infra", "crate::commands", "crate::app::", "reqwest", "std::fs"],
        &["test_support.rs"],
    );
    assert!(
        found.is_empty(),
        "application boundary violations:\n{}",
        found.join("\n")
    );
}

#[test]
fn source_tree_is_present() {
    assert!(!collect_rs_files(&src("domain")).is_empty());
    assert!(!collect_rs_files(&src("application")).is_empty());
}
