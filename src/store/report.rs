use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::Path;

use crate::error::StoreError;
use crate::format_float;
use crate::synthesis::ScriptRecord;

const RULE: &str = "===============================================";
const THIN_RULE: &str = "-----------------------------------------------";

const PRODUCTION_NOTES: &[&str] = &[
    "Use background clips that match the emotional tone",
    "Keep subtitles locked to the narration",
    "Add a visual beat on the pattern interrupt",
    "Keep transitions minimal and let the story carry",
];

/// Plain-text export of scripts for whoever records them. Scripts appear in
/// the order given.
pub fn render_production_report(scripts: &[ScriptRecord], generated: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "PRODUCTION-READY SHORTS SCRIPTS");
    let _ = writeln!(out, "Generated: {}", generated.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(out, "{RULE}\n");

    for (idx, script) in scripts.iter().enumerate() {
        let _ = writeln!(
            out,
            "SCRIPT #{} - VIRALITY SCORE: {}/20",
            idx + 1,
            format_float(script.score, 1)
        );
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "SOURCE THREAD: {}", script.source_thread_id);
        let _ = writeln!(out, "TYPE: {}", script.narrative);
        let _ = writeln!(
            out,
            "ESTIMATED DURATION: {} seconds",
            script.estimated_duration_seconds.round() as u64
        );
        if script.low_confidence {
            let _ = writeln!(out, "NOTE: short source body, review before recording");
        }
        let _ = writeln!(out, "{THIN_RULE}\n");
        let _ = writeln!(out, "{}\n", script.full_text);
        let _ = writeln!(out, "{THIN_RULE}");
        let _ = writeln!(out, "PRODUCTION NOTES:");
        for note in PRODUCTION_NOTES {
            let _ = writeln!(out, "- {note}");
        }
        let _ = writeln!(out, "\n{RULE}\n");
    }
    out
}

pub async fn write_production_report(
    path: &Path,
    scripts: &[ScriptRecord],
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
        }
    }
    let report = render_production_report(scripts, Utc::now());
    tokio::fs::write(path, report)
        .await
        .map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })
}
