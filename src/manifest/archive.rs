//! Read access to an addon bundle, either a zip archive or an unpacked directory

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use zip::ZipArchive;
use zip::result::ZipError;

use crate::manifest::traits::ManifestError;

/// An addon bundle on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddonArchive {
    /// Packed `.xpi` (zip) file
    Zip(PathBuf),
    /// Unpacked addon directory
    Directory(PathBuf),
}

impl AddonArchive {
    /// Open an addon path, detecting whether it is a directory or a zip file
    pub fn open(path: &Path) -> Result<Self, ManifestError> {
        if path.is_dir() {
            return Ok(Self::Directory(path.to_path_buf()));
        }
        if !path.exists() {
            return Err(ManifestError::PathNotFound(path.display().to_string()));
        }

        // Validate the central directory up front so entry reads fail softly later
        ZipArchive::new(File::open(path)?)?;
        Ok(Self::Zip(path.to_path_buf()))
    }

    /// Path of the bundle on disk
    pub fn path(&self) -> &Path {
        match self {
            Self::Zip(path) | Self::Directory(path) => path,
        }
    }

    /// Read an entry by its archive-relative name (`/`-separated)
    ///
    /// Returns `Ok(None)` when the entry does not exist.
    pub fn read_entry(&self, name: &str) -> Result<Option<Vec<u8>>, ManifestError> {
        match self {
            Self::Zip(path) => {
                let mut archive = ZipArchive::new(File::open(path)?)?;
                let mut entry = match archive.by_name(name) {
                    Ok(entry) => entry,
                    Err(ZipError::FileNotFound) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                let mut buf = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut buf)?;
                Ok(Some(buf))
            }
            Self::Directory(dir) => {
                let entry_path = name
                    .split('/')
                    .fold(dir.clone(), |path, part| path.join(part));
                if !entry_path.is_file() {
                    return Ok(None);
                }
                Ok(Some(std::fs::read(entry_path)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("addon.xpi");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn read_entry_returns_zip_entry_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_zip(temp_dir.path(), &[("manifest.json", "{}")]);

        let archive = AddonArchive::open(&path).unwrap();

        assert_eq!(archive, AddonArchive::Zip(path));
        assert_eq!(
            archive.read_entry("manifest.json").unwrap(),
            Some(b"{}".to_vec())
        );
        assert_eq!(archive.read_entry("install.rdf").unwrap(), None);
    }

    #[test]
    fn read_entry_reads_nested_files_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        let locale_dir = temp_dir.path().join("_locales/en");
        std::fs::create_dir_all(&locale_dir).unwrap();
        std::fs::write(locale_dir.join("messages.json"), "{}").unwrap();

        let archive = AddonArchive::open(temp_dir.path()).unwrap();

        assert_eq!(
            archive.read_entry("_locales/en/messages.json").unwrap(),
            Some(b"{}".to_vec())
        );
        assert_eq!(archive.read_entry("manifest.json").unwrap(), None);
    }

    #[test]
    fn open_rejects_files_that_are_not_zip_archives() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.xpi");
        std::fs::write(&path, "not a zip").unwrap();

        assert!(matches!(
            AddonArchive::open(&path),
            Err(ManifestError::Archive(_))
        ));
    }

    #[test]
    fn open_reports_missing_path() {
        assert!(matches!(
            AddonArchive::open(Path::new("/nonexistent/addon.xpi")),
            Err(ManifestError::PathNotFound(_))
        ));
    }
}
