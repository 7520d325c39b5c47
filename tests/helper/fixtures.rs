//! Synthetic addon bundles and release listings

use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;

use addon_scraper::release::{ReleaseAsset, ReleaseInfo};

/// Write a zip archive containing `entries` as `(path, content)` pairs
pub fn write_xpi(dir: &Path, file_name: &str, entries: &[(&str, String)]) -> PathBuf {
    let path = dir.join(file_name);
    let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
    path
}

/// `manifest.json` declaring a platform range under `applications.zotero`
pub fn json_manifest(id: &str, version: &str, min: &str, max: &str) -> (&'static str, String) {
    let manifest = serde_json::json!({
        "manifest_version": 2,
        "name": "Sample Addon",
        "description": "Does sample things",
        "version": version,
        "applications": {
            "zotero": {
                "id": id,
                "strict_min_version": min,
                "strict_max_version": max
            }
        }
    });
    ("manifest.json", manifest.to_string())
}

/// `install.rdf` targeting the platform application id
pub fn rdf_manifest(id: &str, version: &str, min: &str, max: &str) -> (&'static str, String) {
    let manifest = format!(
        r#"<?xml version="1.0"?>
<RDF xmlns="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
     xmlns:em="http://www.mozilla.org/2004/em-rdf#">
  <Description about="urn:mozilla:install-manifest">
    <em:id>{id}</em:id>
    <em:name>Legacy Addon</em:name>
    <em:version>{version}</em:version>
    <em:type>2</em:type>
    <em:targetApplication>
      <Description>
        <em:id>zotero@chnm.gmu.edu</em:id>
        <em:minVersion>{min}</em:minVersion>
        <em:maxVersion>{max}</em:maxVersion>
      </Description>
    </em:targetApplication>
  </Description>
</RDF>
"#
    );
    ("install.rdf", manifest)
}

pub fn download_url(repo: &str, tag: &str) -> String {
    format!("https://github.com/{}/releases/download/{}/addon.xpi", repo, tag)
}

/// A release with a single XPI asset
pub fn release(repo: &str, tag: &str, published_at: &str, asset_id: u64) -> ReleaseInfo {
    ReleaseInfo {
        tag_name: tag.to_string(),
        prerelease: false,
        published_at: Some(published_at.to_string()),
        assets: vec![ReleaseAsset {
            id: asset_id,
            name: "addon.xpi".to_string(),
            download_url: download_url(repo, tag),
            content_type: "application/x-xpinstall".to_string(),
            updated_at: published_at.to_string(),
        }],
    }
}
