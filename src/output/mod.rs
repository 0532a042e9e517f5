use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::pipeline::JobResult;
use crate::store::JobRecord;

/// Human-readable rendering of a finished job
pub fn format_as_text(result: &JobResult) -> String {
    let mut out = String::new();

    out.push_str(&format!("# {}\n\n", result.title));
    out.push_str(&format!(
        "## Lyrics ({} → {})\n\n{}\n\n",
        result.detected_language, result.target_language, result.content
    ));

    if result.original_transcription != result.content {
        out.push_str(&format!("## Original\n\n{}\n\n", result.original_transcription));
    }

    out.push_str("## Files\n\n");
    out.push_str(&format!("video: {}\n", result.video_file.display()));
    out.push_str(&format!("audio: {}\n", result.audio_file.display()));
    out.push_str(&format!("transcript: {}\n", result.transcript_file.display()));

    out
}

pub fn format_as_json(result: &JobResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

fn render(result: &JobResult, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_as_text(result)),
        OutputFormat::Json => format_as_json(result),
    }
}

/// Save job result to file
pub async fn save_to_file(result: &JobResult, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(result, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print job result to console
pub fn print_to_console(result: &JobResult, format: &OutputFormat) -> Result<()> {
    println!("{}", render(result, format)?);
    Ok(())
}

/// One line per saved record, newest first
pub fn format_history(records: &[JobRecord]) -> String {
    records
        .iter()
        .map(|r| {
            format!(
                "#{:<4} {}  {}  ({})",
                r.id,
                r.created_at.format("%Y-%m-%d %H:%M"),
                r.title,
                r.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
