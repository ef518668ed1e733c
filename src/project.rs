//! Laravel project root discovery.

use std::path::{Path, PathBuf};

use tracing::info;

/// Find the Laravel project root by walking up from a file path.
///
/// Looks for Laravel-specific markers:
/// - composer.json + artisan
/// - composer.json + app/ and resources/ directories together
///
/// Returns None if no Laravel project root is found.
pub fn find_project_root(file_path: &Path) -> Option<PathBuf> {
    let mut current = file_path;

    // If it's a file, start from its parent directory
    if current.is_file() {
        current = current.parent()?;
    }

    loop {
        let has_composer = current.join("composer.json").exists();
        let has_artisan = current.join("artisan").exists();
        let has_app = current.join("app").is_dir();
        let has_resources = current.join("resources").is_dir();

        if has_composer && has_artisan {
            info!(
                "Found Laravel project root at {:?} (composer.json + artisan)",
                current
            );
            return Some(current.to_path_buf());
        }

        if has_composer && has_app && has_resources {
            info!(
                "Found Laravel project root at {:?} (composer.json + app + resources)",
                current
            );
            return Some(current.to_path_buf());
        }

        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_root_with_composer_and_artisan() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("composer.json"), "{}").unwrap();
        fs::write(dir.path().join("artisan"), "").unwrap();
        let nested = dir.path().join("app/Http/Controllers");
        fs::create_dir_all(&nested).unwrap();

        let root = find_project_root(&nested).unwrap();
        assert_eq!(root, dir.path());
    }

    #[test]
    fn finds_root_with_app_and_resources() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("composer.json"), "{}").unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::create_dir_all(dir.path().join("resources/views")).unwrap();

        let root = find_project_root(&dir.path().join("resources/views")).unwrap();
        assert_eq!(root, dir.path());
    }

    #[test]
    fn no_markers_means_no_root() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("some/plain/dir");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested), None);
    }
}
