// SPDX-License-Identifier: MIT

//! Failure summary extraction from gate output.

const FAILURE_MARKERS: [&str; 4] = ["error", "failed", "failure", "exception"];
const MAX_SUMMARY_LINES: usize = 5;

/// Pull a short failure summary out of combined gate output.
///
/// Scans stderr, then stdout, for lines containing a failure marker
/// (capped at five); falls back to the last five lines of combined
/// output when nothing matches.
pub fn extract_failure_summary(stdout: &str, stderr: &str) -> String {
    for stream in [stderr, stdout] {
        let lines: Vec<&str> = stream
            .lines()
            .map(str::trim)
            .filter(|line| {
                let lower = line.to_lowercase();
                FAILURE_MARKERS.iter().any(|marker| lower.contains(marker))
            })
            .take(MAX_SUMMARY_LINES)
            .collect();
        if !lines.is_empty() {
            return lines.join("\n");
        }
    }

    let combined = format!("{stdout}{stderr}");
    let lines: Vec<&str> = combined.trim().lines().collect();
    let start = lines.len().saturating_sub(MAX_SUMMARY_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
#[path = "summary_tests.rs"]
mod tests;
