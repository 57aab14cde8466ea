/// Filename filter of the form `name*.ext`.
///
/// Only a trailing `*` on the name part is understood, and it is pushed down
/// into the listing prefix. The extension is a plain suffix test; a `*`
/// anywhere in it matches every extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name_prefix: String,
    pub extension: String,
}

pub const MATCH_ALL: &str = "*.*";

impl FileFilter {
    pub fn parse(filter: &str) -> Self {
        let (stem, extension) = match filter.rfind('.') {
            Some(i) => (&filter[..i], &filter[i..]),
            None => (filter, ""),
        };
        let name_prefix = stem.strip_suffix('*').unwrap_or(stem);
        let extension = if extension.contains('*') { "" } else { extension };
        Self {
            name_prefix: name_prefix.to_string(),
            extension: extension.to_string(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        !name.is_empty() && name.ends_with(&self.extension)
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::parse(MATCH_ALL)
    }
}
