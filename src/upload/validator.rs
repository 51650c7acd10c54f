//! Pre-flight checks for an uploaded item.

use crate::error::ValidationError;
use crate::io::is_png;
use crate::transform::Geometry;
use crate::upload::MapItem;
use std::collections::BTreeSet;
use std::path::Path;

/// Checks an item directory against the required capture set.
#[derive(Debug, Clone)]
pub struct ItemValidator {
    required: BTreeSet<String>,
}

impl ItemValidator {
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            required: geometry.required_names().map(str::to_string).collect(),
        }
    }

    /// Number of files an item must contain.
    pub fn expected_files(&self) -> usize {
        self.required.len()
    }

    /// Validate `item`, whose pyramid would be written to `destination`.
    ///
    /// Checks, first failure wins:
    /// 1. `destination` must not exist yet
    /// 2. exactly the expected number of regular files
    /// 3. entry names equal the required set
    /// 4. every file sniffs as PNG
    pub fn validate(&self, item: &MapItem, destination: &Path) -> Result<(), ValidationError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ValidationError::Io { path, source }
        };

        if destination.try_exists().map_err(io_err(destination))? {
            return Err(ValidationError::DestinationCollision(destination.to_path_buf()));
        }

        let mut names = BTreeSet::new();
        let mut file_count = 0;
        for entry in std::fs::read_dir(&item.path).map_err(io_err(&item.path))? {
            let entry = entry.map_err(io_err(&item.path))?;
            if entry.file_type().map_err(io_err(&entry.path()))?.is_file() {
                file_count += 1;
            }
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }

        if file_count != self.expected_files() {
            return Err(ValidationError::WrongFileCount {
                expected: self.expected_files(),
                found: file_count,
            });
        }

        if names != self.required {
            return Err(ValidationError::UnexpectedFilenames {
                missing: self.required.difference(&names).cloned().collect(),
                unexpected: names.difference(&self.required).cloned().collect(),
            });
        }

        for name in &names {
            let path = item.path.join(name);
            if !is_png(&path).map_err(io_err(&path))? {
                return Err(ValidationError::NotPng(path));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::path::PathBuf;

    struct Fixture {
        _root: tempfile::TempDir,
        item: MapItem,
        storage: PathBuf,
        geometry: Geometry,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let item_path = root.path().join("uploads").join("acme").join("MTI=");
        std::fs::create_dir_all(&item_path).unwrap();
        let geometry = Geometry::standard();
        for name in geometry.required_names() {
            RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]))
                .save_with_format(item_path.join(name), ImageFormat::Png)
                .unwrap();
        }
        let storage = root.path().join("storage");
        Fixture {
            item: MapItem {
                tenant: "acme".to_string(),
                name: "MTI=".to_string(),
                path: item_path,
            },
            storage,
            geometry,
            _root: root,
        }
    }

    fn validate(f: &Fixture) -> Result<(), ValidationError> {
        ItemValidator::new(&f.geometry).validate(&f.item, &f.item.destination(&f.storage))
    }

    #[test]
    fn test_valid_item() {
        let f = fixture();
        assert!(validate(&f).is_ok());
    }

    #[test]
    fn test_destination_collision_wins() {
        let f = fixture();
        std::fs::create_dir_all(f.item.destination(&f.storage)).unwrap();
        // Also break the file set; the collision is still what gets reported
        std::fs::remove_file(f.item.path.join(f.geometry.sources[0].name)).unwrap();
        assert!(matches!(validate(&f), Err(ValidationError::DestinationCollision(_))));
    }

    #[test]
    fn test_too_few_and_too_many_files() {
        let f = fixture();
        std::fs::remove_file(f.item.path.join(f.geometry.sources[5].name)).unwrap();
        assert!(matches!(
            validate(&f),
            Err(ValidationError::WrongFileCount { expected: 6, found: 5 })
        ));

        let f = fixture();
        std::fs::write(f.item.path.join("extra.png"), b"x").unwrap();
        assert!(matches!(
            validate(&f),
            Err(ValidationError::WrongFileCount { expected: 6, found: 7 })
        ));
    }

    #[test]
    fn test_wrong_names() {
        let f = fixture();
        let old = f.item.path.join(f.geometry.sources[2].name);
        std::fs::rename(&old, f.item.path.join("minimap_sea_1_0.png")).unwrap();

        match validate(&f) {
            Err(ValidationError::UnexpectedFilenames { missing, unexpected }) => {
                assert_eq!(missing, vec![f.geometry.sources[2].name.to_string()]);
                assert_eq!(unexpected, vec!["minimap_sea_1_0.png".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_subdirectory_counts_against_names_not_files() {
        let f = fixture();
        std::fs::create_dir(f.item.path.join("thumbs")).unwrap();
        assert!(matches!(validate(&f), Err(ValidationError::UnexpectedFilenames { .. })));
    }

    #[test]
    fn test_content_sniff_overrides_names() {
        let f = fixture();
        let path = f.item.path.join(f.geometry.sources[4].name);
        std::fs::write(&path, b"GIF89a not really a png").unwrap();
        match validate(&f) {
            Err(ValidationError::NotPng(p)) => assert_eq!(p, path),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
