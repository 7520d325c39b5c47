//! manifest.json parser

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::manifest::archive::AddonArchive;
use crate::manifest::traits::{ManifestError, ManifestParser};
use crate::manifest::types::{ManifestDetail, ManifestSource};

/// Parser for WebExtension-style `manifest.json` files
pub struct JsonManifestParser {
    placeholder_re: Regex,
}

impl JsonManifestParser {
    /// Top-level keys that may hold per-application settings, in probe order
    const LOCATION_KEYS: [&'static str; 2] = ["applications", "browser_specific_settings"];

    /// Application keys probed inside each location, in probe order
    const APPLICATION_KEYS: [&'static str; 2] = ["zotero", "gecko"];

    pub fn new() -> Self {
        Self {
            placeholder_re: Regex::new(r"__MSG_(.*?)__").unwrap(),
        }
    }

    /// Read and decode `manifest.json`
    ///
    /// Returns `Ok(None)` when the archive does not carry the file.
    pub fn read_manifest(&self, archive: &AddonArchive) -> Result<Option<Value>, ManifestError> {
        let Some(bytes) = archive.read_entry(ManifestSource::Json.file_name())? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Extract addon details from a decoded manifest
    pub fn extract_details(&self, archive: &AddonArchive, manifest: &Value) -> ManifestDetail {
        let mut detail = ManifestDetail {
            name: string_field(manifest, "name"),
            version: string_field(manifest, "version"),
            description: string_field(manifest, "description"),
            ..Default::default()
        };

        for location in Self::LOCATION_KEYS {
            if detail.id.as_deref().is_some_and(|id| !id.is_empty()) {
                break;
            }
            for app in Self::APPLICATION_KEYS {
                let Some(settings) = manifest
                    .get(location)
                    .and_then(|l| l.get(app))
                    .filter(|s| s.is_object())
                else {
                    continue;
                };
                detail.id = string_field(settings, "id");
                detail.min_version = string_field(settings, "strict_min_version");
                detail.max_version = string_field(settings, "strict_max_version");
                detail.update_url = string_field(settings, "update_url");
                break;
            }
        }

        self.resolve_placeholders(archive, manifest, &mut detail);
        detail
    }

    /// Replace `__MSG_<key>__` placeholders with messages from the default locale
    fn resolve_placeholders(
        &self,
        archive: &AddonArchive,
        manifest: &Value,
        detail: &mut ManifestDetail,
    ) {
        // Loaded on first placeholder; `Some(None)` records a failed load
        let mut messages: Option<Option<Value>> = None;

        for field in [
            &mut detail.name,
            &mut detail.version,
            &mut detail.description,
            &mut detail.id,
            &mut detail.min_version,
            &mut detail.max_version,
            &mut detail.update_url,
        ] {
            let Some(value) = field.as_deref() else {
                continue;
            };
            let Some(key) = self
                .placeholder_re
                .captures(value)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
            else {
                continue;
            };

            let loaded = messages.get_or_insert_with(|| load_locale(archive, manifest));
            let Some(locale) = loaded.as_ref() else {
                break;
            };

            if let Some(message) = locale
                .get(&key)
                .and_then(|entry| entry.get("message"))
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
            {
                *field = Some(message.to_string());
            } else {
                debug!("Locale message {} not found, keeping placeholder", key);
            }
        }
    }
}

impl Default for JsonManifestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestParser for JsonManifestParser {
    fn source(&self) -> ManifestSource {
        ManifestSource::Json
    }

    fn parse(&self, archive: &AddonArchive) -> Result<ManifestDetail, ManifestError> {
        let manifest = self
            .read_manifest(archive)?
            .ok_or(ManifestError::Missing(ManifestSource::Json.file_name()))?;
        Ok(self.extract_details(archive, &manifest))
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Load `_locales/<default_locale>/messages.json`
fn load_locale(archive: &AddonArchive, manifest: &Value) -> Option<Value> {
    let default_locale = manifest.get("default_locale").and_then(Value::as_str)?;
    let locale_file = format!("_locales/{}/messages.json", default_locale);

    match archive.read_entry(&locale_file) {
        Ok(Some(bytes)) => serde_json::from_slice(&bytes)
            .inspect_err(|e| warn!("Failed to parse locale file {}: {}", locale_file, e))
            .ok(),
        Ok(None) => {
            debug!("Locale file {} not found", locale_file);
            None
        }
        Err(e) => {
            warn!("Failed to load locale file {}: {}", locale_file, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_addon_dir(manifest: &Value, messages: Option<(&str, Value)>) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("manifest.json"),
            serde_json::to_vec(manifest).unwrap(),
        )
        .unwrap();
        if let Some((locale, messages)) = messages {
            let locale_dir = temp_dir.path().join("_locales").join(locale);
            std::fs::create_dir_all(&locale_dir).unwrap();
            std::fs::write(
                locale_dir.join("messages.json"),
                serde_json::to_vec(&messages).unwrap(),
            )
            .unwrap();
        }
        temp_dir
    }

    fn parse_dir(dir: &TempDir) -> Result<ManifestDetail, ManifestError> {
        let archive = AddonArchive::open(dir.path()).unwrap();
        JsonManifestParser::new().parse(&archive)
    }

    #[test]
    fn parse_extracts_zotero_application_settings() {
        let dir = write_addon_dir(
            &json!({
                "name": "Translate",
                "version": "2.0.1",
                "description": "Translate PDFs",
                "applications": {
                    "zotero": {
                        "id": "translate@example.com",
                        "update_url": "https://example.com/update.json",
                        "strict_min_version": "6.999",
                        "strict_max_version": "7.*"
                    }
                }
            }),
            None,
        );

        let detail = parse_dir(&dir).unwrap();

        assert_eq!(
            detail,
            ManifestDetail {
                id: Some("translate@example.com".to_string()),
                name: Some("Translate".to_string()),
                version: Some("2.0.1".to_string()),
                description: Some("Translate PDFs".to_string()),
                update_url: Some("https://example.com/update.json".to_string()),
                min_version: Some("6.999".to_string()),
                max_version: Some("7.*".to_string()),
            }
        );
    }

    #[test]
    fn parse_falls_back_to_browser_specific_settings_gecko() {
        let dir = write_addon_dir(
            &json!({
                "name": "Legacy",
                "browser_specific_settings": {
                    "gecko": {
                        "id": "legacy@example.com",
                        "strict_min_version": "60.0"
                    }
                }
            }),
            None,
        );

        let detail = parse_dir(&dir).unwrap();

        assert_eq!(detail.id.as_deref(), Some("legacy@example.com"));
        assert_eq!(detail.min_version.as_deref(), Some("60.0"));
        assert_eq!(detail.max_version, None);
    }

    #[test]
    fn parse_stops_probing_once_id_is_found() {
        let dir = write_addon_dir(
            &json!({
                "applications": {
                    "zotero": { "id": "first@example.com", "strict_min_version": "7.0" }
                },
                "browser_specific_settings": {
                    "zotero": { "id": "second@example.com", "strict_min_version": "6.0" }
                }
            }),
            None,
        );

        let detail = parse_dir(&dir).unwrap();

        assert_eq!(detail.id.as_deref(), Some("first@example.com"));
        assert_eq!(detail.min_version.as_deref(), Some("7.0"));
    }

    #[test]
    fn parse_resolves_message_placeholders_from_default_locale() {
        let dir = write_addon_dir(
            &json!({
                "name": "__MSG_extName__",
                "description": "__MSG_extDescription__",
                "default_locale": "en-US",
                "applications": { "zotero": { "id": "msg@example.com" } }
            }),
            Some((
                "en-US",
                json!({
                    "extName": { "message": "Localized Name" }
                }),
            )),
        );

        let detail = parse_dir(&dir).unwrap();

        assert_eq!(detail.name.as_deref(), Some("Localized Name"));
        // Missing message keeps the placeholder
        assert_eq!(detail.description.as_deref(), Some("__MSG_extDescription__"));
    }

    #[test]
    fn parse_keeps_placeholders_when_locale_file_is_missing() {
        let dir = write_addon_dir(
            &json!({
                "name": "__MSG_extName__",
                "default_locale": "fr"
            }),
            None,
        );

        let detail = parse_dir(&dir).unwrap();

        assert_eq!(detail.name.as_deref(), Some("__MSG_extName__"));
    }

    #[test]
    fn parse_returns_missing_when_manifest_absent() {
        let temp_dir = TempDir::new().unwrap();

        let result = parse_dir(&temp_dir);

        assert!(matches!(result, Err(ManifestError::Missing("manifest.json"))));
    }

    #[test]
    fn parse_returns_json_error_for_malformed_manifest() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("manifest.json"), "{ not json").unwrap();

        let result = parse_dir(&temp_dir);

        assert!(matches!(result, Err(ManifestError::Json(_))));
    }
}
