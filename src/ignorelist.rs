use failure::{Error, ResultExt};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// A set of repositories (by `path_with_namespace`) which shouldn't be
/// indexed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IgnoreList {
    paths: HashSet<String>,
}

impl IgnoreList {
    /// Read an ignore list from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<IgnoreList, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).with_context(|_| {
            format!("Unable to read the ignore list at {}", path.display())
        })?;

        let list = IgnoreList::parse(&contents);
        debug!("Loaded {} ignored repositories", list.len());
        Ok(list)
    }

    /// One entry per line. Lines are taken verbatim, so a blank line is just
    /// an empty entry that never matches anything.
    pub fn parse(contents: &str) -> IgnoreList {
        let paths = contents.split('\n').map(String::from).collect();
        IgnoreList { paths }
    }

    pub fn contains(&self, path_with_namespace: &str) -> bool {
        self.paths.contains(path_with_namespace)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
