//! Structural tests for layer boundaries.
//!
//! These scan the source tree so a stray import shows up as a test failure
//! rather than in review.

use std::path::{Path, PathBuf};

fn src(parts: &[&str]) -> PathBuf {
    let mut dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    for part in parts {
        dir = dir.join(part);
    }
    dir
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

fn relative(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
        .replace('\\', "/")
}

/// Track brace depth and report whether a line sits inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    fn process_line(&mut self, line: &str) -> bool {
        if line.trim().contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Production lines of a file: comments and `#[cfg(test)]` blocks removed,
/// with their 1-based line numbers.
fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut tracker = CfgTestTracker::new();
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            let comment = trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*');
            (!in_test && !comment).then(|| (i + 1, line.to_string()))
        })
        .collect()
}

/// Every production line under `dir` containing one of `needles`.
fn find(dir: &Path, needles: &[&str]) -> Vec<String> {
    let mut hits = Vec::new();
    for file in collect_rs_files(dir) {
        let rel = relative(&file);
        for (lineno, line) in production_lines(&file) {
            if let Some(needle) = needles.iter().find(|n| line.contains(**n)) {
                hits.push(format!("{rel}:{lineno}: `{needle}`: {}", line.trim()));
            }
        }
    }
    hits
}

#[test]
fn no_inline_json_branching_in_commands() {
    let mut violations = find(&src(&["commands"]), &["json: bool"]);
    for file in collect_rs_files(&src(&["commands"])) {
        for (lineno, line) in production_lines(&file) {
            let trimmed = line.trim();
            if trimmed.starts_with("if json") || trimmed.starts_with("if !json") {
                violations.push(format!("{}:{lineno}: {trimmed}", relative(&file)));
            }
        }
    }
    assert!(
        violations.is_empty(),
        "commands/ must go through app.renderer() or app.is_json():\n{}",
        violations.join("\n")
    );
}

#[test]
fn domain_has_no_io_or_outer_layer_imports() {
    let violations = find(
        &src(&["domain"]),
        &[
            "tokio::",
            "std::process",
            "reqwest",
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay pure:\n{}",
        violations.join("\n")
    );
}

#[test]
fn services_depend_only_on_ports_and_domain() {
    let violations = find(
        &src(&["application"]),
        &["crate::infra", "crate::commands", "crate::output", "reqwest::", "process::Command"],
    );
    assert!(
        violations.is_empty(),
        "application/ must reach the outside world through ports:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = find(&src(&["infra"]), &["crate::commands", "crate::output"]);
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let violations = find(&src(&["infra"]), &["println!", "eprintln!"]);
    assert!(
        violations.is_empty(),
        "infra/ logs through tracing, never println!/eprintln!:\n{}",
        violations.join("\n")
    );
}

#[test]
fn processes_are_spawned_only_by_infra() {
    let violations: Vec<String> = find(&src(&[]), &["process::Command"])
        .into_iter()
        .filter(|hit| !hit.starts_with("src/infra/"))
        .collect();
    assert!(
        violations.is_empty(),
        "only infra/command_runner.rs may spawn processes:\n{}",
        violations.join("\n")
    );
}

#[test]
fn command_handlers_take_app_context() {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src(&["commands"])) {
        for (lineno, line) in production_lines(&file) {
            let trimmed = line.trim();
            let is_handler = trimmed.starts_with("pub fn run(") || trimmed.starts_with("pub async fn run(");
            if is_handler && !trimmed.contains("app: &AppContext") {
                violations.push(format!("{}:{lineno}: {trimmed}", relative(&file)));
            }
        }
    }
    assert!(
        violations.is_empty(),
        "command handlers must receive &AppContext:\n{}",
        violations.join("\n")
    );
}
