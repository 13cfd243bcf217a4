//! Filename derivation and destination path resolution.
//!
//! Filenames come from `Content-Disposition` when the server provides
//! one, falling back to the final segment of the URL path. The resolved
//! destination follows a fixed ladder: explicit file path, existing
//! directory, configured directory, then the working directory.

use std::path::{Path, PathBuf};

use url::Url;

use crate::constants::DEFAULT_FILE_NAME;

/// Parses a `Content-Disposition` header to extract the filename.
///
/// Handles:
/// - `attachment; filename="example.bin"`
/// - `attachment; filename=example.bin`
/// - `attachment; filename*=UTF-8''example.bin` (RFC 5987)
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    // Try filename*= first (RFC 5987 encoded)
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        // Format: charset'language'encoded_value
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim();
            if let Ok(decoded) = urlencoding::decode(encoded_name) {
                let name = sanitize_filename(&decoded);
                if !name.is_empty() {
                    return Some(name);
                }
            }
        }
    }

    // Try regular filename=
    if let Some(pos) = header.find("filename=") {
        let value = header[pos + 9..].trim();
        let value = value.split(';').next().unwrap_or(value).trim();
        let value = value.trim_matches('"');
        let name = sanitize_filename(value);
        if !name.is_empty() {
            return Some(name);
        }
    }

    None
}

/// Extracts a filename from the final URL path segment.
///
/// A path ending in `/` yields `None`; the caller falls back to the
/// fixed default name.
pub(crate) fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).unwrap_or_else(|_| last.into());
    let name = sanitize_filename(&decoded);
    (!name.is_empty()).then_some(name)
}

/// Strips path separators and control characters from a filename.
pub(crate) fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .trim_matches('.')
        .to_string()
}

/// Resolves the destination file path from the configured `dest`/`dir`
/// and the probed filename hint.
///
/// 1. `dest` refers to an existing directory: `dest/<name>`.
/// 2. `dest` is set: used verbatim.
/// 3. `dir` is set: `dir/<name>`.
/// 4. Otherwise `./<name>` in the working directory.
///
/// `<name>` is the suggested name when present, else [`DEFAULT_FILE_NAME`].
pub(crate) fn resolve_dest(
    dest: Option<&Path>,
    dir: Option<&Path>,
    suggested: Option<&str>,
) -> PathBuf {
    let name = suggested
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_FILE_NAME);

    if let Some(dest) = dest {
        if dest.is_dir() {
            return dest.join(name);
        }
        return dest.to_path_buf();
    }
    if let Some(dir) = dir {
        return dir.join(name);
    }
    PathBuf::from(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn test_parse_content_disposition_quoted() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="go.mod""#).as_deref(),
            Some("go.mod")
        );
    }

    #[test]
    fn test_parse_content_disposition_unquoted() {
        assert_eq!(
            parse_content_disposition("attachment; filename=data.tar.gz").as_deref(),
            Some("data.tar.gz")
        );
    }

    #[test]
    fn test_parse_content_disposition_rfc5987() {
        assert_eq!(
            parse_content_disposition("attachment; filename*=UTF-8''na%C3%AFve.bin").as_deref(),
            Some("naïve.bin")
        );
    }

    #[test]
    fn test_parse_content_disposition_missing_filename() {
        assert_eq!(parse_content_disposition("inline"), None);
    }

    #[test]
    fn test_parse_content_disposition_strips_trailing_parameters() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="a.bin"; size=42"#).as_deref(),
            Some("a.bin")
        );
    }

    #[test]
    fn test_filename_from_url_last_segment() {
        let url = Url::parse("https://example.com/files/archive.zip?v=1").unwrap();
        assert_eq!(filename_from_url(&url).as_deref(), Some("archive.zip"));
    }

    #[test]
    fn test_filename_from_url_percent_decoded() {
        let url = Url::parse("https://example.com/my%20file.bin").unwrap();
        assert_eq!(filename_from_url(&url).as_deref(), Some("my file.bin"));
    }

    #[test]
    fn test_filename_from_url_trailing_slash_yields_none() {
        let url = Url::parse("https://example.com/files/").unwrap();
        assert_eq!(filename_from_url(&url), None);
    }

    #[test]
    fn test_filename_from_url_root_path_yields_none() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(filename_from_url(&url), None);
    }

    #[test]
    fn test_sanitize_filename_replaces_separators() {
        assert_eq!(sanitize_filename("a/b\\c:d"), "a_b_c_d");
    }

    #[test]
    fn test_resolve_dest_existing_directory_joins_name() {
        let tmp = TempDir::new().unwrap();
        let resolved = resolve_dest(Some(tmp.path()), None, Some("file.bin"));
        assert_eq!(resolved, tmp.path().join("file.bin"));
    }

    #[test]
    fn test_resolve_dest_file_path_used_verbatim() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.bin");
        let resolved = resolve_dest(Some(&dest), None, Some("ignored.bin"));
        assert_eq!(resolved, dest);
    }

    #[test]
    fn test_resolve_dest_dir_joins_suggested_name() {
        let tmp = TempDir::new().unwrap();
        let resolved = resolve_dest(None, Some(tmp.path()), Some("go.mod"));
        assert_eq!(resolved, tmp.path().join("go.mod"));
    }

    #[test]
    fn test_resolve_dest_dir_without_name_uses_default() {
        let tmp = TempDir::new().unwrap();
        let resolved = resolve_dest(None, Some(tmp.path()), None);
        assert_eq!(resolved, tmp.path().join(DEFAULT_FILE_NAME));
    }

    #[test]
    fn test_resolve_dest_bare_defaults_to_working_directory() {
        assert_eq!(
            resolve_dest(None, None, None),
            PathBuf::from(DEFAULT_FILE_NAME)
        );
        assert_eq!(
            resolve_dest(None, None, Some("named.bin")),
            PathBuf::from("named.bin")
        );
    }
}
