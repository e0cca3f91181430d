use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extensions recognized as comic pages. Matched case-insensitively since
/// source filesystems may yield mixed-case names.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Enumerate the pages of a folder: non-recursive, image files only,
/// sorted lexicographically by file name so page order matches the
/// release's numbering scheme.
pub fn scan_folder(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut pages: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();

    pages.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").expect("write fixture");
    }

    #[test]
    fn filters_to_recognized_extensions() {
        let dir = tempdir().expect("tempdir");
        touch(dir.path(), "001.png");
        touch(dir.path(), "002.jpg");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "cover.tiff");
        touch(dir.path(), "noext");

        let pages = scan_folder(dir.path()).expect("scan");
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["001.png", "002.jpg"]);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = tempdir().expect("tempdir");
        touch(dir.path(), "a.PNG");
        touch(dir.path(), "b.Jpeg");
        touch(dir.path(), "c.WEBP");
        touch(dir.path(), "d.bMp");

        let pages = scan_folder(dir.path()).expect("scan");
        assert_eq!(pages.len(), 4);
    }

    #[test]
    fn pages_are_sorted_by_file_name() {
        let dir = tempdir().expect("tempdir");
        touch(dir.path(), "b.png");
        touch(dir.path(), "a.png");
        touch(dir.path(), "c.jpg");

        let pages = scan_folder(dir.path()).expect("scan");
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.jpg"]);
    }

    #[test]
    fn empty_folder_yields_empty_list() {
        let dir = tempdir().expect("tempdir");
        let pages = scan_folder(dir.path()).expect("scan");
        assert!(pages.is_empty());
    }

    #[test]
    fn missing_folder_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("does-not-exist");
        assert!(scan_folder(&missing).is_err());
    }

    #[test]
    fn subdirectories_are_skipped() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("chapter2.png")).expect("mkdir");
        touch(dir.path(), "page.png");

        let pages = scan_folder(dir.path()).expect("scan");
        assert_eq!(pages.len(), 1);
    }
}
