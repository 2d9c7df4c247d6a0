use crate::error::{Result, SlicerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use storage::Settings;

/// One discoverable video file from a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub name: String,
    /// `name + "_" + mtime_nanos`; cache key and content-endpoint key.
    #[serde(rename = "id")]
    pub identity: String,
    pub path: PathBuf,
}

pub fn identity_for(name: &str, mtime_nanos: u128) -> String {
    format!("{name}_{mtime_nanos}")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    start: f64,
    end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(SlicerError::invalid("time range must be finite"));
        }
        if start < 0.0 {
            return Err(SlicerError::invalid(format!("start {start} is negative")));
        }
        if end < start {
            return Err(SlicerError::invalid(format!(
                "end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    Source,
    P1080,
    P720,
    P480,
}

impl Resolution {
    /// Unknown tiers behave like `source`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "1080p" => Self::P1080,
            "720p" => Self::P720,
            "480p" => Self::P480,
            _ => Self::Source,
        }
    }

    pub fn scale_filter(&self) -> Option<&'static str> {
        match self {
            Self::Source => None,
            Self::P1080 => Some("scale=-1:1080"),
            Self::P720 => Some("scale=-1:720"),
            Self::P480 => Some("scale=-1:480"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoEncoder {
    H264Nvenc,
    HevcNvenc,
    #[default]
    Libx264,
    Libx265,
}

impl VideoEncoder {
    pub fn encoder(&self) -> &'static str {
        match self {
            Self::H264Nvenc => "h264_nvenc",
            Self::HevcNvenc => "hevc_nvenc",
            Self::Libx264 => "libx264",
            Self::Libx265 => "libx265",
        }
    }

    pub fn preset(&self) -> &'static str {
        match self {
            Self::H264Nvenc | Self::HevcNvenc => "p4",
            Self::Libx264 | Self::Libx265 => "medium",
        }
    }
}

const MUTED_SUFFIX: &str = ":muted";

/// Codec setting value, e.g. `hevc_nvenc` or `libx264:muted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecChoice {
    pub encoder: VideoEncoder,
    pub muted: bool,
}

impl CodecChoice {
    /// Unrecognised names, including `default`, select libx264.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        let (name, muted) = match s.strip_suffix(MUTED_SUFFIX) {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        let encoder = match name.to_ascii_lowercase().as_str() {
            "h264_nvenc" => VideoEncoder::H264Nvenc,
            "hevc_nvenc" => VideoEncoder::HevcNvenc,
            "libx265" => VideoEncoder::Libx265,
            _ => VideoEncoder::Libx264,
        };
        Self { encoder, muted }
    }
}

/// Target container, stored as a lower-case extension without the dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container(String);

impl Container {
    /// Empty means mp4. Anything but ASCII letters and digits is rejected so the
    /// extension cannot reach outside the save directory.
    pub fn new(ext: &str) -> Result<Self> {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        if ext.is_empty() {
            return Ok(Self::default());
        }
        if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SlicerError::invalid(format!(
                "container extension {ext:?} must be letters and digits only"
            )));
        }
        Ok(Self(ext))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_gif(&self) -> bool {
        self.0 == "gif"
    }
}

impl Default for Container {
    fn default() -> Self {
        Self(storage::settings::DEFAULT_EXTENSION.to_string())
    }
}

/// Accepts `""`, `"2500"` or `"2500k"`.
pub fn parse_bitrate(s: &str) -> Result<Option<u32>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let digits = s.strip_suffix(['k', 'K']).unwrap_or(s);
    digits
        .parse::<u32>()
        .map(Some)
        .map_err(|_| SlicerError::invalid(format!("bitrate {s:?} is not a number of kbit/s")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SlicerError::invalid("crop region must have a non-zero size"));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

/// Export preferences as the user typed them; parsed into an [`ExportRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportPreferences {
    pub extension: String,
    pub codec: String,
    pub resolution: String,
    pub bitrate: String,
}

impl From<&Settings> for ExportPreferences {
    fn from(s: &Settings) -> Self {
        Self {
            extension: s.file_extension.clone(),
            codec: s.codec.clone(),
            resolution: s.resolution.clone(),
            bitrate: s.bitrate.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub source: PathBuf,
    /// Empty means derive from the source name.
    pub title: String,
    pub range: TimeRange,
    pub container: Container,
    pub codec: CodecChoice,
    pub resolution: Resolution,
    pub bitrate_kbps: Option<u32>,
    pub crop: Option<CropRegion>,
}

impl ExportRequest {
    pub fn new(
        source: impl Into<PathBuf>,
        title: impl Into<String>,
        range: TimeRange,
        prefs: &ExportPreferences,
    ) -> Result<Self> {
        let source: PathBuf = source.into();
        if source.as_os_str().is_empty() {
            return Err(SlicerError::invalid("source path is empty"));
        }
        let title: String = title.into();
        let title = title.trim();
        if title.contains(['/', '\\']) || title == "." || title == ".." {
            return Err(SlicerError::invalid(format!(
                "title {title:?} must be a plain file name"
            )));
        }
        Ok(Self {
            source,
            title: title.to_string(),
            range,
            container: Container::new(&prefs.extension)?,
            codec: CodecChoice::parse(&prefs.codec),
            resolution: Resolution::parse(&prefs.resolution),
            bitrate_kbps: parse_bitrate(&prefs.bitrate)?,
            crop: None,
        })
    }

    pub fn with_crop(mut self, region: CropRegion) -> Self {
        self.crop = Some(region);
        self
    }

    pub fn muted(&self) -> bool {
        self.codec.muted
    }

    /// The title, or `<source stem>_clip` / `<source stem>_cropped` when empty.
    pub fn output_title(&self) -> String {
        if !self.title.is_empty() {
            return self.title.clone();
        }
        let suffix = if self.crop.is_some() { "_cropped" } else { "_clip" };
        derive_title(&self.source, suffix)
    }
}

pub fn derive_title(source: &Path, suffix: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "video".to_string());
    format!("{stem}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_parsing_strips_mute_suffix() {
        let c = CodecChoice::parse("hevc_nvenc:muted");
        assert_eq!(c.encoder, VideoEncoder::HevcNvenc);
        assert!(c.muted);
        let c = CodecChoice::parse("libx265");
        assert_eq!(c.encoder, VideoEncoder::Libx265);
        assert!(!c.muted);
    }

    #[test]
    fn unknown_and_default_codecs_fall_back_to_x264_medium() {
        for raw in ["default", "", "vp9", "default:muted"] {
            let c = CodecChoice::parse(raw);
            assert_eq!(c.encoder, VideoEncoder::Libx264, "{raw}");
            assert_eq!(c.encoder.preset(), "medium");
        }
        assert!(CodecChoice::parse("default:muted").muted);
    }

    #[test]
    fn resolution_tiers() {
        assert_eq!(Resolution::parse("720p").scale_filter(), Some("scale=-1:720"));
        assert_eq!(Resolution::parse("1080P").scale_filter(), Some("scale=-1:1080"));
        assert_eq!(Resolution::parse("480p").scale_filter(), Some("scale=-1:480"));
        assert_eq!(Resolution::parse("source").scale_filter(), None);
        assert_eq!(Resolution::parse("").scale_filter(), None);
        assert_eq!(Resolution::parse("4k").scale_filter(), None);
    }

    #[test]
    fn time_range_validation() {
        assert!(TimeRange::new(1.0, 3.0).is_ok());
        assert!(TimeRange::new(2.0, 2.0).is_ok());
        assert!(matches!(
            TimeRange::new(3.0, 1.0),
            Err(SlicerError::InvalidInput(_))
        ));
        assert!(TimeRange::new(-1.0, 1.0).is_err());
        assert!(TimeRange::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn container_normalisation() {
        assert_eq!(Container::new(".MOV").unwrap().as_str(), "mov");
        assert_eq!(Container::new("").unwrap().as_str(), "mp4");
        assert!(Container::new("GIF").unwrap().is_gif());
    }

    #[test]
    fn extension_with_path_parts_is_rejected() {
        for ext in ["mp4/../../../etc/x", "mp4\\..\\x", "tar.gz", "m p4"] {
            assert!(
                matches!(Container::new(ext), Err(SlicerError::InvalidInput(_))),
                "{ext}"
            );
        }
        let prefs = ExportPreferences {
            extension: "mp4/../../../etc/x".into(),
            ..ExportPreferences::default()
        };
        let err = ExportRequest::new(
            "/v/game.mp4",
            "t",
            TimeRange::new(0.0, 1.0).unwrap(),
            &prefs,
        )
        .unwrap_err();
        assert!(matches!(err, SlicerError::InvalidInput(_)));
    }

    #[test]
    fn bitrate_parsing() {
        assert_eq!(parse_bitrate("").unwrap(), None);
        assert_eq!(parse_bitrate("2500").unwrap(), Some(2500));
        assert_eq!(parse_bitrate("2500k").unwrap(), Some(2500));
        assert!(parse_bitrate("fast").is_err());
    }

    #[test]
    fn titles_are_derived_from_source_stem() {
        let prefs = ExportPreferences::default();
        let range = TimeRange::new(0.0, 1.0).unwrap();
        let req = ExportRequest::new("/videos/match.mkv", "", range, &prefs).unwrap();
        assert_eq!(req.output_title(), "match_clip");
        let cropped = req.with_crop(CropRegion::new(0, 0, 10, 10).unwrap());
        assert_eq!(cropped.output_title(), "match_cropped");
    }

    #[test]
    fn titles_with_separators_are_rejected() {
        let prefs = ExportPreferences::default();
        let range = TimeRange::new(0.0, 1.0).unwrap();
        assert!(ExportRequest::new("/v/a.mp4", "../escape", range, &prefs).is_err());
        assert!(ExportRequest::new("", "x", range, &prefs).is_err());
    }

    #[test]
    fn media_entry_serializes_identity_as_id() {
        let e = MediaEntry {
            name: "a.mp4".into(),
            identity: identity_for("a.mp4", 42),
            path: PathBuf::from("/v/a.mp4"),
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["id"], "a.mp4_42");
        assert_eq!(v["name"], "a.mp4");
    }
}
