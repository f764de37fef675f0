//! Save file, transcript and configuration file locations
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use regex::Regex;
use tempfile::NamedTempFile;

use crate::{
    error::{ErrorCode, RuntimeError},
    recoverable_error,
};

/// Derive a base name for save and transcript files from a story file path
///
/// # Arguments
/// * `path` - Story file path
///
/// # Returns
/// File name without directories and without a story file extension
pub fn story_name(path: &str) -> String {
    let file_name = Path::new(path)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(path);
    match Regex::new(r"(?i)\.(z[1-8]|dat|zblorb|zlb)$") {
        Ok(r) => r.replace(file_name, "").to_string(),
        Err(e) => {
            warn!(target: "app::trace", "Story name regex: {}", e);
            file_name.to_string()
        }
    }
}

/// Build the path of a data file for a story
///
/// # Arguments
/// * `directory` - [Option] with a directory, or [None] for the current directory
/// * `name` - Story name
/// * `suffix` - File extension
pub fn data_path(directory: Option<&str>, name: &str, suffix: &str) -> PathBuf {
    let file_name = format!("{}.{}", name, suffix);
    match directory {
        Some(d) => Path::new(d).join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Look for a configuration file in the current directory, then in `~/.zline/`
///
/// # Arguments
/// * `name` - File name
///
/// # Returns
/// [Option] with the path of the first existing file
pub fn config_file(name: &str) -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from(name)];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".zline").join(name));
    }

    candidates.into_iter().find(|p| match p.try_exists() {
        Ok(b) => b,
        Err(e) => {
            info!(target: "app::trace", "Error checking existence of {}: {}", p.display(), e);
            false
        }
    })
}

/// Write a file by way of a temporary file in the same directory, so a
/// failed write never leaves a truncated file behind
///
/// # Arguments
/// * `path` - Destination path
/// * `data` - File contents
/// * `code` - [ErrorCode] to report failures with
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn write_file(path: &Path, data: &[u8], code: ErrorCode) -> Result<(), RuntimeError> {
    let directory = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut file = match NamedTempFile::new_in(&directory) {
        Ok(f) => f,
        Err(e) => return recoverable_error!(code, "{}: {}", directory.display(), e),
    };
    if let Err(e) = file.write_all(data).and_then(|_| file.flush()) {
        return recoverable_error!(code, "{}: {}", path.display(), e);
    }
    match file.persist(path) {
        Ok(_) => {
            info!(target: "app::quetzal", "Wrote {} bytes to {}", data.len(), path.display());
            Ok(())
        }
        Err(e) => recoverable_error!(code, "{}: {}", path.display(), e),
    }
}

/// Read a whole file
///
/// # Arguments
/// * `path` - File path
/// * `code` - [ErrorCode] to report failures with
///
/// # Returns
/// [Result] with the file contents or a [RuntimeError]
pub fn read_file(path: &Path, code: ErrorCode) -> Result<Vec<u8>, RuntimeError> {
    match fs::read(path) {
        Ok(data) => Ok(data),
        Err(e) => recoverable_error!(code, "{}: {}", path.display(), e),
    }
}

/// Open a file for appending, creating it if needed
pub fn append_file(path: &Path) -> Result<File, RuntimeError> {
    match fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(f) => Ok(f),
        Err(e) => recoverable_error!(ErrorCode::Transcript, "{}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use crate::{assert_ok, assert_ok_eq};

    use super::*;

    #[test]
    fn test_story_name() {
        assert_eq!(story_name("zork1.z3"), "zork1");
        assert_eq!(story_name("/games/Curses.Z5"), "Curses");
        assert_eq!(story_name("stories/anchor.z8"), "anchor");
        assert_eq!(story_name("minizork.dat"), "minizork");
        assert_eq!(story_name("noext"), "noext");
        assert_eq!(story_name("odd.z9"), "odd.z9");
    }

    #[test]
    fn test_data_path() {
        assert_eq!(data_path(None, "zork1", "ifzs"), PathBuf::from("zork1.ifzs"));
        assert_eq!(
            data_path(Some("/tmp/saves"), "zork1", "transcript"),
            PathBuf::from("/tmp/saves/zork1.transcript")
        );
    }

    #[test]
    fn test_write_read() {
        let dir = assert_ok!(tempfile::tempdir().map_err(|e| e.to_string()));
        let path = dir.path().join("test.ifzs");
        assert_ok!(write_file(&path, &[1, 2, 3], ErrorCode::Save));
        assert_ok_eq!(read_file(&path, ErrorCode::Restore), vec![1, 2, 3]);
        // Overwrite
        assert_ok!(write_file(&path, &[4], ErrorCode::Save));
        assert_ok_eq!(read_file(&path, ErrorCode::Restore), vec![4]);

        let e = read_file(&dir.path().join("missing"), ErrorCode::Restore).unwrap_err();
        assert_eq!(e.code(), ErrorCode::Restore);
        assert!(e.is_recoverable());
    }

    #[test]
    fn test_append() {
        let dir = assert_ok!(tempfile::tempdir().map_err(|e| e.to_string()));
        let path = dir.path().join("t.transcript");
        {
            let mut f = assert_ok!(append_file(&path));
            assert!(f.write_all(b"one\n").is_ok());
        }
        {
            let mut f = assert_ok!(append_file(&path));
            assert!(f.write_all(b"two\n").is_ok());
        }
        assert_ok_eq!(read_file(&path, ErrorCode::Transcript), b"one\ntwo\n".to_vec());
    }
}
