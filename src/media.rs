//! Video metadata and format descriptors returned by the backend info lookup.
//!
//! [`VideoInfo`] is immutable once fetched and is replaced wholesale on every
//! analysis. Formats are selected by value, never by list index, because the
//! display order changes with the active [`FormatTab`].

use serde::{Deserialize, Deserializer, Serialize};

/// Metadata for an analyzed video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Video title as reported by the source.
    #[serde(default, deserialize_with = "deserialize_title")]
    pub title: String,
    /// Thumbnail image URL.
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Duration in whole seconds.
    #[serde(default, deserialize_with = "deserialize_seconds")]
    pub duration: Option<u64>,
    /// Deliverable renditions, in backend order.
    #[serde(default)]
    pub formats: Vec<FormatDescriptor>,
}

impl VideoInfo {
    /// Looks up a format by its identifier.
    #[must_use]
    pub fn find_format(&self, format_id: &str) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|f| f.format_id == format_id)
    }

    /// Returns the formats shown under `tab`, in display order.
    #[must_use]
    pub fn formats_for(&self, tab: FormatTab) -> Vec<&FormatDescriptor> {
        tab.select(&self.formats)
    }

    /// Duration rendered as `m:ss`, or `-` when unknown.
    #[must_use]
    pub fn duration_label(&self) -> String {
        format_duration(self.duration)
    }
}

/// One deliverable rendition of a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Backend format identifier, unique within a [`VideoInfo`].
    pub format_id: String,
    /// Container extension (`mp4`, `mp3`, ...).
    #[serde(default)]
    pub ext: Option<String>,
    /// Whether the rendition carries audio only.
    #[serde(default)]
    pub audio_only: bool,
    /// Vertical resolution in pixels.
    #[serde(default)]
    pub resolution: Option<u32>,
    /// Audio bitrate in kbps.
    #[serde(default, rename = "abr")]
    pub bitrate: Option<f64>,
    /// Approximate size in megabytes.
    #[serde(default, rename = "filesize")]
    pub size_mb: Option<f64>,
    /// The backend must merge separate audio and video streams.
    #[serde(default)]
    pub requires_merge: bool,
    /// Video codec as reported by the backend, e.g. `avc1.64001F`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcodec: Option<String>,
    /// Audio codec as reported by the backend, e.g. `mp4a.40.2`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acodec: Option<String>,
}

impl FormatDescriptor {
    /// Short human label, e.g. `MP4 - 720p Video` or `MP3 - 128 kbps Audio`.
    #[must_use]
    pub fn label(&self) -> String {
        let ext = self.ext.as_deref().unwrap_or("?").to_uppercase();
        if self.audio_only {
            let bitrate = self
                .bitrate
                .map_or_else(|| "???".to_string(), |abr| format!("{abr:.0}"));
            format!("{ext} - {bitrate} kbps Audio")
        } else {
            let resolution = self
                .resolution
                .map_or_else(|| "?".to_string(), |r| r.to_string());
            format!("{ext} - {resolution}p Video")
        }
    }
}

/// Which group of formats the user is browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatTab {
    /// MP4 renditions with a video stream.
    #[default]
    Video,
    /// MP3 audio-only renditions.
    Audio,
}

impl FormatTab {
    /// Filters `formats` for this tab and sorts them for display.
    ///
    /// Formats that need no merge come first; within each group higher
    /// resolutions come first.
    #[must_use]
    pub fn select<'a>(&self, formats: &'a [FormatDescriptor]) -> Vec<&'a FormatDescriptor> {
        let mut selected: Vec<&FormatDescriptor> = formats
            .iter()
            .filter(|f| match self {
                Self::Video => !f.audio_only && f.ext.as_deref() == Some("mp4"),
                Self::Audio => f.audio_only && f.ext.as_deref() == Some("mp3"),
            })
            .collect();
        selected.sort_by(|a, b| {
            a.requires_merge
                .cmp(&b.requires_merge)
                .then_with(|| b.resolution.unwrap_or(0).cmp(&a.resolution.unwrap_or(0)))
        });
        selected
    }
}

/// Formats a duration in seconds as `m:ss`.
///
/// Unknown or zero durations render as `-`.
#[must_use]
pub fn format_duration(seconds: Option<u64>) -> String {
    match seconds {
        None | Some(0) => "-".to_string(),
        Some(total) => format!("{}:{:02}", total / 60, total % 60),
    }
}

/// Formats an approximate size in megabytes, switching to gigabytes above 1024 MB.
#[must_use]
pub fn format_file_size(size_mb: Option<f64>) -> String {
    match size_mb {
        Some(mb) if mb.is_finite() && mb > 0.0 => {
            if mb > 1024.0 {
                format!("{:.2} GB", mb / 1024.0)
            } else {
                format!("{mb:.2} MB")
            }
        }
        _ => "-".to_string(),
    }
}

fn deserialize_title<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// The backend passes through whatever the extractor reports, which may be a float.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| s.round() as u64))
}
