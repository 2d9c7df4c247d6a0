//! Encoder argument construction.
//!
//! Everything here is pure: the same request always yields the same arguments.

use crate::models::ExportRequest;
use std::path::{Path, PathBuf};

pub const THUMBNAIL_FILE: &str = "thumbnail.jpg";
const THUMBNAIL_SEEK: &str = "00:00:01";
const THUMBNAIL_SCALE: &str = "scale=320:-1";
const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "128k";

/// Arguments for one encoder run plus the file it will produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInvocation {
    pub args: Vec<String>,
    pub output: PathBuf,
}

pub fn format_seconds(secs: f64) -> String {
    format!("{secs:.2}")
}

/// Output file for `request` inside `save_dir`.
pub fn output_path(request: &ExportRequest, save_dir: &Path) -> PathBuf {
    save_dir.join(format!(
        "{}.{}",
        request.output_title(),
        request.container.as_str()
    ))
}

pub fn export_invocation(request: &ExportRequest, save_dir: &Path) -> EncoderInvocation {
    let output = output_path(request, save_dir);
    let mut args: Vec<String> = vec![
        "-i".into(),
        request.source.to_string_lossy().into_owned(),
        "-ss".into(),
        format_seconds(request.range.start()),
        "-t".into(),
        format_seconds(request.range.duration()),
    ];

    let filters: Vec<String> = request
        .crop
        .iter()
        .map(|c| c.filter())
        .chain(request.resolution.scale_filter().map(str::to_string))
        .collect();
    if !filters.is_empty() {
        args.push("-vf".into());
        args.push(filters.join(","));
    }

    let gif = request.container.is_gif();
    if !gif {
        // The GIF muxer only takes its own palette encoder.
        args.push("-c:v".into());
        args.push(request.codec.encoder.encoder().into());
        args.push("-preset".into());
        args.push(request.codec.encoder.preset().into());
        if let Some(kbps) = request.bitrate_kbps {
            args.push("-b:v".into());
            args.push(format!("{kbps}k"));
        }
    }

    if gif {
        args.push("-an".into());
        args.push("-loop".into());
        args.push("0".into());
    } else if request.muted() {
        args.push("-an".into());
    } else {
        args.push("-c:a".into());
        args.push(AUDIO_CODEC.into());
        args.push("-b:a".into());
        args.push(AUDIO_BITRATE.into());
    }

    args.push("-y".into());
    args.push(output.to_string_lossy().into_owned());
    EncoderInvocation { args, output }
}

/// Single JPEG frame one second in, 320 px wide.
pub fn thumbnail_invocation(source: &Path, work_dir: &Path) -> EncoderInvocation {
    let output = work_dir.join(THUMBNAIL_FILE);
    let args = vec![
        "-i".into(),
        source.to_string_lossy().into_owned(),
        "-ss".into(),
        THUMBNAIL_SEEK.into(),
        "-vframes".into(),
        "1".into(),
        "-vf".into(),
        THUMBNAIL_SCALE.into(),
        "-q:v".into(),
        "2".into(),
        "-y".into(),
        output.to_string_lossy().into_owned(),
    ];
    EncoderInvocation { args, output }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CropRegion, ExportPreferences, TimeRange};

    fn request(start: f64, end: f64, ext: &str, codec: &str, res: &str, bitrate: &str) -> ExportRequest {
        let prefs = ExportPreferences {
            extension: ext.into(),
            codec: codec.into(),
            resolution: res.into(),
            bitrate: bitrate.into(),
        };
        ExportRequest::new(
            "/videos/game.mp4",
            "",
            TimeRange::new(start, end).unwrap(),
            &prefs,
        )
        .unwrap()
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn seek_duration_and_scale() {
        let req = request(1.0, 3.0, "mp4", "libx264", "720p", "");
        let inv = export_invocation(&req, Path::new("/out"));
        assert_eq!(value_after(&inv.args, "-ss"), Some("1.00"));
        assert_eq!(value_after(&inv.args, "-t"), Some("2.00"));
        assert_eq!(value_after(&inv.args, "-vf"), Some("scale=-1:720"));
        assert_eq!(value_after(&inv.args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&inv.args, "-preset"), Some("medium"));
        assert_eq!(inv.output, PathBuf::from("/out/game_clip.mp4"));
        assert_eq!(inv.args.last().unwrap(), "/out/game_clip.mp4");
        assert_eq!(inv.args[inv.args.len() - 2], "-y");
    }

    #[test]
    fn full_argument_list_for_plain_export() {
        let req = request(0.5, 10.25, "mov", "hevc_nvenc", "source", "4000");
        let inv = export_invocation(&req, Path::new("/out"));
        let expected: Vec<String> = [
            "-i", "/videos/game.mp4", "-ss", "0.50", "-t", "9.75", "-c:v", "hevc_nvenc",
            "-preset", "p4", "-b:v", "4000k", "-c:a", "aac", "-b:a", "128k", "-y",
            "/out/game_clip.mov",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(inv.args, expected);
    }

    #[test]
    fn builder_is_deterministic() {
        let a = request(2.0, 7.5, "webm", "libx265:muted", "480p", "900k");
        let b = a.clone();
        assert_eq!(
            export_invocation(&a, Path::new("/o")),
            export_invocation(&b, Path::new("/o"))
        );
    }

    #[test]
    fn gif_drops_audio_and_loops() {
        for codec in ["libx264", "libx264:muted", "h264_nvenc"] {
            let req = request(0.0, 2.0, "gif", codec, "480p", "800");
            let inv = export_invocation(&req, Path::new("/out"));
            assert!(inv.args.contains(&"-an".to_string()));
            assert_eq!(value_after(&inv.args, "-loop"), Some("0"));
            assert!(!inv.args.contains(&"-c:a".to_string()));
            assert!(!inv.args.contains(&"aac".to_string()));
            assert!(inv.output.to_string_lossy().ends_with(".gif"));
        }
    }

    #[test]
    fn muted_codec_drops_audio() {
        let req = request(0.0, 2.0, "mp4", "h264_nvenc:muted", "", "");
        let inv = export_invocation(&req, Path::new("/out"));
        assert!(inv.args.contains(&"-an".to_string()));
        assert!(!inv.args.contains(&"aac".to_string()));
        assert_eq!(value_after(&inv.args, "-c:v"), Some("h264_nvenc"));
        assert!(!inv.args.contains(&"-loop".to_string()));
    }

    #[test]
    fn source_resolution_has_no_filter() {
        let req = request(0.0, 1.0, "mp4", "default", "source", "");
        let inv = export_invocation(&req, Path::new("/out"));
        assert!(!inv.args.contains(&"-vf".to_string()));
        assert!(!inv.args.contains(&"-b:v".to_string()));
    }

    #[test]
    fn crop_precedes_scale_in_filter_chain() {
        let req = request(1.0, 2.0, "mp4", "default", "720p", "")
            .with_crop(CropRegion::new(10, 20, 640, 360).unwrap());
        let inv = export_invocation(&req, Path::new("/out"));
        assert_eq!(
            value_after(&inv.args, "-vf"),
            Some("crop=640:360:10:20,scale=-1:720")
        );
        assert_eq!(inv.output, PathBuf::from("/out/game_cropped.mp4"));
    }

    #[test]
    fn explicit_title_is_used() {
        let prefs = ExportPreferences::default();
        let req = ExportRequest::new(
            "/videos/game.mp4",
            "highlight",
            TimeRange::new(0.0, 1.0).unwrap(),
            &prefs,
        )
        .unwrap();
        let inv = export_invocation(&req, Path::new("/out"));
        assert_eq!(inv.output, PathBuf::from("/out/highlight.mp4"));
    }

    #[test]
    fn thumbnail_arguments() {
        let inv = thumbnail_invocation(Path::new("/v/a.mp4"), Path::new("/tmp/work"));
        assert_eq!(inv.output, PathBuf::from("/tmp/work/thumbnail.jpg"));
        assert_eq!(value_after(&inv.args, "-ss"), Some("00:00:01"));
        assert_eq!(value_after(&inv.args, "-vframes"), Some("1"));
        assert_eq!(value_after(&inv.args, "-vf"), Some("scale=320:-1"));
        assert_eq!(value_after(&inv.args, "-q:v"), Some("2"));
    }
}
