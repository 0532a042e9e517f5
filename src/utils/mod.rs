use std::path::{Path, PathBuf};

use url::Url;

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Derive the filesystem-safe base name used for every artifact of a video.
///
/// Keeps alphanumerics, spaces, underscores and hyphens; everything else is dropped
/// (not replaced), then trailing whitespace is stripped.
pub fn safe_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// `<media_root>/<safe_title>_video.mp4`
pub fn video_path(media_root: &Path, title: &str) -> PathBuf {
    media_root.join(format!("{}_video.mp4", safe_title(title)))
}

/// `<media_root>/<safe_title>_audio.mp3`
pub fn audio_path(media_root: &Path, title: &str) -> PathBuf {
    media_root.join(format!("{}_audio.mp3", safe_title(title)))
}

/// `<media_root>/<safe_title>.txt`
pub fn transcript_path(media_root: &Path, title: &str) -> PathBuf {
    media_root.join(format!("{}.txt", safe_title(title)))
}

/// Map the three-letter codes a model sometimes answers with to the two-letter codes we
/// accept as targets. Anything outside the table passes through unchanged.
pub fn normalize_language_code(code: &str) -> String {
    let normalized = match code {
        "spa" => "es",
        "eng" => "en",
        "fra" => "fr",
        "deu" => "de",
        "ita" => "it",
        "por" => "pt",
        "rus" => "ru",
        "jpn" => "ja",
        "kor" => "ko",
        "zho" => "zh",
        "ara" => "ar",
        _ => code,
    };

    normalized.to_string()
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Check if the current environment has required tools
pub async fn check_dependencies() -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available("yt-dlp").await {
        missing.push("yt-dlp - required for downloading videos".to_string());
    }

    // yt-dlp shells out to ffmpeg for the mp3 conversion
    if !check_command_available("ffmpeg").await {
        missing.push("ffmpeg - required for audio extraction".to_string());
    }

    missing
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_safe_title() {
        assert_eq!(safe_title("Song: Title? (Live)"), "Song Title Live");
        assert_eq!(safe_title("my_song - remix"), "my_song - remix");
        assert_eq!(safe_title("  spaced!  "), "  spaced");
        assert_eq!(safe_title("Canción ñandú"), "Canción ñandú");
        assert_eq!(safe_title("???"), "");
    }

    #[test]
    fn test_artifact_paths_share_safe_title() {
        let root = Path::new("/media");
        let title = "Song: Title? (Live)";

        assert_eq!(video_path(root, title), Path::new("/media/Song Title Live_video.mp4"));
        assert_eq!(audio_path(root, title), Path::new("/media/Song Title Live_audio.mp3"));
        assert_eq!(transcript_path(root, title), Path::new("/media/Song Title Live.txt"));
    }

    #[test]
    fn test_normalize_language_code() {
        assert_eq!(normalize_language_code("spa"), "es");
        assert_eq!(normalize_language_code("jpn"), "ja");
        assert_eq!(normalize_language_code("es"), "es");
        assert_eq!(normalize_language_code("nld"), "nld"); // Pass through
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://www.youtube.com/watch?v=123"), Some("youtube.com".to_string()));
        assert_eq!(extract_domain("https://youtu.be/123"), Some("youtu.be".to_string()));
        assert_eq!(extract_domain("invalid-url"), None);
    }
}
