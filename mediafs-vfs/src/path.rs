//! Mapping between caller-facing paths and object keys.
//!
//! Callers hand in paths in whatever shape they hold them: relative or
//! absolute, with `\` separators, prefixed with the public hostname, or as a
//! key that was already resolved. Every shape resolves to a key of the form
//! `{prefix}/{path}`; directory-shaped keys end with `/`, file-shaped keys
//! never do.

use mediafs_common::config::StorageConfig;

pub const DELIMITER: &str = "/";

#[derive(Debug, Clone)]
pub struct PathResolver {
    prefix: String,
    hostname: String,
}

/// Case-insensitive `strip_prefix`, folding with Unicode lowercase.
fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let n = prefix.chars().count();
    let split = match s.char_indices().nth(n) {
        Some((i, _)) => i,
        None if s.chars().count() == n => s.len(),
        None => return None,
    };
    let (head, rest) = s.split_at(split);
    if head == prefix || head.to_lowercase() == prefix.to_lowercase() {
        Some(rest)
    } else {
        None
    }
}

/// Whether any segment of `path` is `.` or `..`.
pub fn has_dot_segments(path: &str) -> bool {
    path.split(['/', '\\']).any(|seg| seg == "." || seg == "..")
}

impl PathResolver {
    pub fn new(prefix: &str, hostname: &str) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
            hostname: hostname.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.prefix, &config.hostname)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    fn root(&self, is_dir: bool) -> String {
        if is_dir {
            format!("{}{}", self.prefix, DELIMITER)
        } else {
            self.prefix.clone()
        }
    }

    /// The remainder after the key prefix when it is the leading path segment.
    fn after_key_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        match strip_prefix_ignore_case(path, &self.prefix)? {
            "" => Some(""),
            rest => rest.strip_prefix(DELIMITER),
        }
    }

    /// Remove the key prefix when it is the leading path segment.
    fn strip_key_prefix<'a>(&self, path: &'a str) -> &'a str {
        self.after_key_prefix(path).unwrap_or(path)
    }

    /// Resolve a caller path into the object key it addresses.
    pub fn resolve(&self, path: &str, is_dir: bool) -> String {
        if path.is_empty() {
            return self.root(is_dir);
        }

        let path = strip_prefix_ignore_case(path, &self.hostname).unwrap_or(path);
        let normalized = path.replace('\\', DELIMITER);
        if normalized == DELIMITER {
            return self.root(is_dir);
        }

        let rest = normalized.strip_prefix(DELIMITER).unwrap_or(&normalized);
        let rest = self.strip_key_prefix(rest);
        let rest = if is_dir { rest } else { rest.trim_end_matches(DELIMITER) };
        if rest.is_empty() || rest == DELIMITER {
            return self.root(is_dir);
        }

        if is_dir && !rest.ends_with(DELIMITER) {
            format!("{}{}{}{}", self.prefix, DELIMITER, rest, DELIMITER)
        } else {
            format!("{}{}{}", self.prefix, DELIMITER, rest)
        }
    }

    /// Turn a backend key back into a relative path: prefix removed, at most
    /// one trailing delimiter removed.
    ///
    /// A key whose first relative segment is itself the prefix
    /// (`media/media/x.png`) keeps its prefix, since resolution strips one
    /// leading prefix segment and would otherwise land on a different key.
    pub fn to_relative<'a>(&self, key: &'a str) -> &'a str {
        let rest = match self.after_key_prefix(key) {
            Some(rest) if self.after_key_prefix(rest).is_none() => rest,
            _ => key,
        };
        rest.strip_suffix(DELIMITER).unwrap_or(rest)
    }

    /// Name of `key` relative to the directory key it was listed under.
    pub fn child_name<'a>(&self, dir_key: &str, key: &'a str) -> &'a str {
        let rest = key.strip_prefix(dir_key).unwrap_or(key);
        rest.strip_suffix(DELIMITER).unwrap_or(rest)
    }

    /// Strip the hostname and key prefix from a URL or full path. Input that
    /// carries neither is returned as is.
    pub fn relative_path(&self, full_path_or_url: &str) -> String {
        if full_path_or_url.is_empty() {
            return String::new();
        }
        let s = full_path_or_url
            .strip_prefix(DELIMITER)
            .unwrap_or(full_path_or_url);
        let s = strip_prefix_ignore_case(s, &self.hostname).unwrap_or(s);
        let s = s.strip_prefix(DELIMITER).unwrap_or(s);
        self.strip_key_prefix(s).to_string()
    }

    /// Public URL of the object a path resolves to.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.hostname, DELIMITER, self.resolve(path, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PATHS: &[&str] = &[
        "",
        "/",
        "img.png",
        "/photos/img.png",
        "photos/2023/",
        "\\photos\\2023\\img.png",
        "https://cdn.example.com/media/photos/img.png",
        "HTTPS://CDN.EXAMPLE.COM/photos",
        "media",
        "/media/",
        "Media/docs/report.pdf",
        "mediakit/readme.txt",
        "docs/a b/c+d.txt",
        "/media/media/x.png",
        "media/MEDIA/",
    ];

    fn resolver() -> PathResolver {
        PathResolver::new("media", "https://cdn.example.com")
    }

    #[test]
    fn test_resolve_examples() {
        let r = resolver();
        assert_eq!(r.resolve("/photos/img.png", false), "media/photos/img.png");
        assert_eq!(r.resolve("photos/img.png", false), "media/photos/img.png");
        assert_eq!(r.resolve("/photos", true), "media/photos/");
        assert_eq!(r.resolve("/photos/", true), "media/photos/");
        assert_eq!(r.resolve("\\photos\\img.png", false), "media/photos/img.png");
        assert_eq!(
            r.resolve("https://cdn.example.com/media/photos/img.png", false),
            "media/photos/img.png"
        );
        assert_eq!(r.resolve("HTTPS://CDN.example.com/photos/img.png", false), "media/photos/img.png");
        assert_eq!(r.resolve("MEDIA/photos/img.png", false), "media/photos/img.png");
    }

    #[test]
    fn test_resolve_root() {
        let r = resolver();
        assert_eq!(r.resolve("", false), "media");
        assert_eq!(r.resolve("/", false), "media");
        assert_eq!(r.resolve("\\", false), "media");
        assert_eq!(r.resolve("", true), "media/");
        assert_eq!(r.resolve("/", true), "media/");
        assert_eq!(r.resolve("/media", true), "media/");
        assert_eq!(r.resolve("https://cdn.example.com", true), "media/");
    }

    #[test]
    fn test_prefix_only_stripped_as_whole_segment() {
        let r = resolver();
        assert_eq!(r.resolve("mediakit/readme.txt", false), "media/mediakit/readme.txt");
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let r = resolver();
        for path in SAMPLE_PATHS {
            for is_dir in [false, true] {
                let key = r.resolve(path, is_dir);
                assert_eq!(r.resolve(&key, is_dir), key, "path {:?}", path);
                assert_eq!(r.resolve(r.to_relative(&key), is_dir), key, "path {:?}", path);
            }
        }
    }

    #[test]
    fn test_prefix_containment_and_suffix_invariant() {
        let r = resolver();
        for path in SAMPLE_PATHS {
            let file_key = r.resolve(path, false);
            let dir_key = r.resolve(path, true);
            assert!(file_key.starts_with("media"), "{:?}", file_key);
            assert!(dir_key.starts_with("media/"), "{:?}", dir_key);
            assert!(dir_key.ends_with('/'), "{:?}", dir_key);
            assert!(!file_key.ends_with('/'), "{:?}", file_key);
            if file_key != "media" {
                assert!(file_key.starts_with("media/"), "{:?}", file_key);
            }
        }
    }

    #[test]
    fn test_to_relative() {
        let r = resolver();
        assert_eq!(r.to_relative("media/photos/img.png"), "photos/img.png");
        assert_eq!(r.to_relative("media/photos/"), "photos");
        assert_eq!(r.to_relative("media/"), "");
        assert_eq!(r.to_relative("other/x/"), "other/x");
        assert_eq!(r.to_relative("media/media/x.png"), "media/media/x.png");
        assert_eq!(r.to_relative("media/media/"), "media/media");
        assert_eq!(r.to_relative("media/mediakit/x.png"), "mediakit/x.png");
    }

    #[test]
    fn test_nested_prefix_segment_round_trips() {
        let r = resolver();
        let key = r.resolve("/media/media/x.png", false);
        assert_eq!(key, "media/media/x.png");
        assert_eq!(r.resolve(r.to_relative(&key), false), key);
    }

    #[test]
    fn test_prefix_match_folds_non_ascii_case() {
        let r = PathResolver::new("Médias", "https://Cdn.Exemple.fr");
        assert_eq!(r.resolve("MÉDIAS/x.png", false), "Médias/x.png");
        assert_eq!(r.resolve("médias", true), "Médias/");
        assert_eq!(r.resolve("https://cdn.exemple.fr/médias/x.png", false), "Médias/x.png");
        assert_eq!(r.resolve("Méd/x.png", false), "Médias/Méd/x.png");
        assert_eq!(r.resolve("MÉDIASKIT/x.png", false), "Médias/MÉDIASKIT/x.png");
    }

    #[test]
    fn test_has_dot_segments() {
        assert!(has_dot_segments("/a/../b.png"));
        assert!(has_dot_segments("./b.png"));
        assert!(has_dot_segments("a\\..\\b.png"));
        assert!(has_dot_segments(".."));
        assert!(!has_dot_segments("/a/.hidden/b..png"));
        assert!(!has_dot_segments(""));
    }

    #[test]
    fn test_child_name() {
        let r = resolver();
        assert_eq!(r.child_name("media/", "media/photos/"), "photos");
        assert_eq!(r.child_name("media/reports/", "media/reports/2023-q1.csv"), "2023-q1.csv");
        assert_eq!(r.child_name("media/reports/", "media/reports/"), "");
    }

    #[test]
    fn test_relative_path() {
        let r = resolver();
        assert_eq!(r.relative_path("https://cdn.example.com/media/photos/img.png"), "photos/img.png");
        assert_eq!(r.relative_path("/media/photos/img.png"), "photos/img.png");
        assert_eq!(r.relative_path("photos/img.png"), "photos/img.png");
        assert_eq!(r.relative_path("/photos/img.png"), "photos/img.png");
        assert_eq!(r.relative_path(""), "");
    }

    #[test]
    fn test_url() {
        let r = resolver();
        assert_eq!(r.url("/photos/img.png"), "https://cdn.example.com/media/photos/img.png");
        let trailing = PathResolver::new("/media/", "https://cdn.example.com/");
        assert_eq!(trailing.url("photos/img.png"), "https://cdn.example.com/media/photos/img.png");
    }
}
