//! Embeds a human-readable version string as `BUILD_INFO_HUMAN`.
//!
//! The string is `<crate version> (<git version>) <rustc version>`, where the
//! git version is `git describe --tags --always --dirty` when a tag is
//! reachable, otherwise `v<crate version>-<timestamp>-<commit>[+dirty]`.
//! Clean trees use the commit timestamp, dirty trees the build time.

use std::process::Command;

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn main() {
    for path in ["src", "build.rs", "Cargo.toml", "Cargo.lock"] {
        println!("cargo:rerun-if-changed={path}");
    }

    let components: Vec<String> = [
        Some(env!("CARGO_PKG_VERSION").to_string()),
        git_version().map(|v| format!("({v})")),
        output_of("rustc", &["--version"]),
    ]
    .into_iter()
    .flatten()
    .collect();

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", components.join(" "));
}

fn output_of(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn git(args: &[&str]) -> Option<String> {
    output_of("git", args)
}

/// `None` outside a git checkout. `.cargo-ok`, written by `cargo install
/// --git`, does not count as a change.
fn is_dirty() -> Option<bool> {
    git(&["status", "--porcelain"])
        .map(|status| status.lines().any(|line| line.get(3..) != Some(".cargo-ok")))
        .or_else(|| git(&["rev-parse", "--git-dir"]).map(|_| false))
}

fn git_version() -> Option<String> {
    match git(&["describe", "--tags", "--always", "--dirty"]) {
        Some(described) if described.contains('v') || described.contains("-g") => Some(described),
        _ => Some(pseudo_version()),
    }
}

fn pseudo_version() -> String {
    let commit = git(&["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let dirty = is_dirty();

    let timestamp = match dirty {
        Some(false) => git(&["log", "-1", "--format=%ct"])
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
    .unwrap_or_else(Utc::now)
    .format(TIMESTAMP_FORMAT);

    let suffix = if dirty == Some(true) { "+dirty" } else { "" };
    format!("v{}-{timestamp}-{commit}{suffix}", env!("CARGO_PKG_VERSION"))
}
