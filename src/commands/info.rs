//! `vidfetch info`: analyze a URL and list its formats.

use anyhow::Result;
use tracing::info;
use vidfetch_core::{FormatDescriptor, FormatTab, VideoInfo, format_file_size};

use super::{build_orchestrator, user_facing};
use crate::config::Settings;

pub async fn run_info_command(settings: &Settings, url: &str) -> Result<()> {
    let orchestrator = build_orchestrator(settings)?;
    let video = orchestrator
        .analyze(url)
        .await
        .map_err(|error| user_facing(error, &orchestrator))?;

    info!(formats = video.formats.len(), "Video analyzed");
    print!("{}", render_info(&video));
    Ok(())
}

fn render_info(video: &VideoInfo) -> String {
    let mut out = String::new();
    out.push_str(&format!("Title:    {}\n", video.title));
    out.push_str(&format!("Duration: {}\n", video.duration_label()));
    if let Some(thumbnail) = &video.thumbnail {
        out.push_str(&format!("Thumb:    {thumbnail}\n"));
    }
    for (heading, tab) in [("Video", FormatTab::Video), ("Audio", FormatTab::Audio)] {
        out.push_str(&format!("\n{heading} formats:\n"));
        let formats = video.formats_for(tab);
        if formats.is_empty() {
            out.push_str("  (none)\n");
        }
        for format in formats {
            out.push_str(&render_format_row(format));
        }
    }
    out
}

fn render_format_row(format: &FormatDescriptor) -> String {
    let merge = if format.requires_merge { "  (merge)" } else { "" };
    format!(
        "  {:<10} {:<24} {:>10}{merge}\n",
        format.format_id,
        format.label(),
        format_file_size(format.size_mb)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render_info_lists_both_tabs() {
        let video: VideoInfo = serde_json::from_str(
            r#"{"title":"Song","duration":125,"formats":[
                {"format_id":"137","ext":"mp4","resolution":1080,"requires_merge":true,"filesize":2048.0},
                {"format_id":"22","ext":"mp4","resolution":720,"filesize":12.5},
                {"format_id":"a1","ext":"mp3","audio_only":true,"abr":128}
            ]}"#,
        )
        .unwrap();
        let rendered = render_info(&video);
        assert!(rendered.contains("Title:    Song"));
        assert!(rendered.contains("Duration: 2:05"));
        let pos_22 = rendered.find("MP4 - 720p Video").unwrap();
        let pos_137 = rendered.find("MP4 - 1080p Video").unwrap();
        assert!(pos_22 < pos_137, "non-merge formats come first");
        assert!(rendered.contains("2.00 GB"));
        assert!(rendered.contains("MP3 - 128 kbps Audio"));
    }

    #[test]
    fn test_render_info_empty_tabs() {
        let video: VideoInfo = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        let rendered = render_info(&video);
        assert!(rendered.contains("Duration: -"));
        assert_eq!(rendered.matches("(none)").count(), 2);
    }
}
