use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_EXTENSION: &str = "mp4";
pub const DEFAULT_RESOLUTION: &str = "source";
pub const DEFAULT_CODEC: &str = "default";

/// User preferences persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub watch_location: String,
    pub save_location: String,
    pub file_extension: String,
    pub resolution: String,
    pub codec: String,
    pub bitrate: String,
    pub copy_to_clipboard: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watch_location: String::new(),
            save_location: String::new(),
            file_extension: DEFAULT_EXTENSION.to_string(),
            resolution: DEFAULT_RESOLUTION.to_string(),
            codec: DEFAULT_CODEC.to_string(),
            bitrate: String::new(),
            copy_to_clipboard: false,
        }
    }
}

/// Outcome of [`Settings::merge`], keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub applied: Vec<String>,
    /// Known fields whose value had the wrong JSON type; prior value kept.
    pub rejected: Vec<String>,
    pub unknown: Vec<String>,
}

impl Settings {
    /// Apply a partial update. A missing or mistyped field keeps its prior value.
    pub fn merge(&mut self, patch: &Map<String, Value>) -> MergeReport {
        let mut report = MergeReport::default();
        for (key, value) in patch {
            let accepted = match key.as_str() {
                "watch_location" => assign_string(&mut self.watch_location, value),
                "save_location" => assign_string(&mut self.save_location, value),
                "file_extension" => assign_string(&mut self.file_extension, value),
                "resolution" => assign_string(&mut self.resolution, value),
                "codec" => assign_string(&mut self.codec, value),
                "bitrate" => assign_string(&mut self.bitrate, value),
                "copy_to_clipboard" => match value.as_bool() {
                    Some(b) => {
                        self.copy_to_clipboard = b;
                        true
                    }
                    None => false,
                },
                _ => {
                    report.unknown.push(key.clone());
                    continue;
                }
            };
            if accepted {
                report.applied.push(key.clone());
            } else {
                report.rejected.push(key.clone());
            }
        }
        report
    }
}

fn assign_string(slot: &mut String, value: &Value) -> bool {
    match value.as_str() {
        Some(s) => {
            *slot = s.to_string();
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_keeps_missing_and_mistyped_fields() {
        let mut s = Settings {
            codec: "libx264".into(),
            copy_to_clipboard: true,
            ..Settings::default()
        };
        let patch = json!({"codec": 7, "file_extension": "webm"});
        let report = s.merge(patch.as_object().unwrap());
        assert_eq!(s.codec, "libx264");
        assert_eq!(s.file_extension, "webm");
        assert!(s.copy_to_clipboard);
        assert_eq!(report.rejected, vec!["codec".to_string()]);
    }

    #[test]
    fn serialized_field_names_are_snake_case() {
        let v = serde_json::to_value(Settings::default()).unwrap();
        for key in [
            "watch_location",
            "save_location",
            "file_extension",
            "resolution",
            "codec",
            "bitrate",
            "copy_to_clipboard",
        ] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
    }
}
