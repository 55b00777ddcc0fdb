use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use exif::{In, Reader, Tag, Value};
use tracing::debug;

use crate::error::MetadataError;

/// Tags of the primary image, keyed by tag identifier.
///
/// Lives only for the duration of one extraction; the decoders read from it
/// and it is dropped.
#[derive(Debug, Default, Clone)]
pub struct TagTable {
    tags: HashMap<Tag, Value>,
}

impl TagTable {
    pub fn from_exif(exif: &exif::Exif) -> Self {
        let tags = exif
            .fields()
            .filter(|f| f.ifd_num == In::PRIMARY)
            .map(|f| (f.tag, f.value.clone()))
            .collect();
        Self { tags }
    }

    pub fn insert(&mut self, tag: Tag, value: Value) {
        self.tags.insert(tag, value);
    }

    pub fn get(&self, tag: Tag) -> Option<&Value> {
        self.tags.get(&tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.tags.contains_key(&tag)
    }

    /// First ASCII component of a tag, with trailing NULs and spaces removed.
    pub fn ascii(&self, tag: Tag) -> Option<String> {
        match self.get(tag)? {
            Value::Ascii(parts) => {
                let first = parts.first()?;
                let text = String::from_utf8_lossy(first);
                Some(text.trim_end_matches(|c| c == '\0' || c == ' ').to_string())
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tag names, e.g. `GPSLatitude`, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = String> + '_ {
        self.tags.keys().map(|t| t.to_string())
    }
}

/// Open `path` and read its embedded tag table.
///
/// Only a failure to open the file is an error. A file without tags, or
/// with tag data the parser rejects, yields an empty table.
pub fn read_tags(path: &Path) -> Result<TagTable, MetadataError> {
    let file = File::open(path).map_err(|source| MetadataError::Unavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(TagTable::from_exif(&exif)),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no readable tag table");
            Ok(TagTable::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ascii, rational3, write_tiff};
    use tempfile::tempdir;

    #[test]
    fn test_read_tags_missing_file() {
        let err = read_tags(Path::new("/nonexistent/photo.jpg")).unwrap_err();
        assert!(matches!(err, MetadataError::Unavailable { .. }));
    }

    #[test]
    fn test_read_tags_untagged_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let table = read_tags(&path).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_read_tags_from_tiff() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tagged.tiff");
        write_tiff(
            &path,
            vec![
                ascii(Tag::DateTimeOriginal, "2023:06:15 14:30:00"),
                ascii(Tag::GPSLatitudeRef, "N"),
                rational3(Tag::GPSLatitude, [(10, 1), (30, 1), (0, 1)]),
            ],
        );

        let table = read_tags(&path).unwrap();
        assert_eq!(
            table.ascii(Tag::DateTimeOriginal).as_deref(),
            Some("2023:06:15 14:30:00")
        );
        assert_eq!(table.ascii(Tag::GPSLatitudeRef).as_deref(), Some("N"));
        assert!(table.contains(Tag::GPSLatitude));
        assert!(table.names().any(|n| n == "GPSLatitude"));
    }

    #[test]
    fn test_ascii_strips_nul_padding() {
        let mut table = TagTable::default();
        table.insert(Tag::GPSLongitudeRef, Value::Ascii(vec![b"W\0".to_vec()]));
        assert_eq!(table.ascii(Tag::GPSLongitudeRef).as_deref(), Some("W"));
        assert_eq!(table.ascii(Tag::GPSLatitudeRef), None);
    }
}
