//! Splitting absolute paths into parent directory and entry name.

use crate::error::{Error, Result};

/// Parent directory and final component of an absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathComponents {
    /// Parent directory, `/` for top-level entries.
    pub dir: String,
    /// Final path component.
    pub file: String,
}

/// Split `path` into its parent directory and final component.
///
/// The root path yields `/` for both parts. Paths must be absolute and at
/// most `max_len` bytes; a trailing `/` leaves an empty final component and
/// is rejected.
pub fn parse_path_components(path: &str, max_len: usize) -> Result<PathComponents> {
    if path.len() > max_len {
        return Err(Error::NameTooLong {
            len: path.len(),
            max: max_len,
        });
    }
    if !path.starts_with('/') {
        return Err(Error::InvalidPath(format!("not absolute: {:?}", path)));
    }
    if path == "/" {
        return Ok(PathComponents {
            dir: "/".to_string(),
            file: "/".to_string(),
        });
    }

    // Starts with '/', so a separator exists.
    let split = path.rfind('/').unwrap_or(0);
    let (dir, file) = (&path[..split], &path[split + 1..]);
    if file.is_empty() {
        return Err(Error::InvalidPath(format!("no final component: {:?}", path)));
    }

    Ok(PathComponents {
        dir: if dir.is_empty() { "/" } else { dir }.to_string(),
        file: file.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(path: &str) -> (String, String) {
        let c = parse_path_components(path, 512).unwrap();
        (c.dir, c.file)
    }

    #[test]
    fn test_root() {
        assert_eq!(parts("/"), ("/".into(), "/".into()));
    }

    #[test]
    fn test_nested_and_top_level() {
        assert_eq!(parts("/a/b/f.txt"), ("/a/b".into(), "f.txt".into()));
        assert_eq!(parts("/f"), ("/".into(), "f".into()));
        assert_eq!(parts("/dir/sub"), ("/dir".into(), "sub".into()));
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            parse_path_components("", 512),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            parse_path_components("a/b", 512),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            parse_path_components("/a/b/", 512),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_length_bound() {
        assert!(parse_path_components("/abcd", 5).is_ok());
        assert!(matches!(
            parse_path_components("/abcde", 5),
            Err(Error::NameTooLong { len: 6, max: 5 })
        ));
    }
}
