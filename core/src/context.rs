//! Build-context archives.
//!
//! # Design
//! The context starts as every regular file under the directory, dotfiles
//! included. Each pattern in `.dockerignore` is then applied in file order
//! to the running set: a plain pattern removes what it matches, a `!`
//! pattern adds it back. Matches are computed against the directory on disk,
//! so a negation can restore files an earlier pattern removed. A matched
//! directory stands for every file beneath it. Only leaf files reach the
//! archive.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use globset::{GlobBuilder, GlobMatcher};
use tracing::debug;

use crate::error::{ApiError, Result};

pub const IGNORE_FILE: &str = ".dockerignore";

/// Every entry under the root, relative to it.
struct Tree {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl Tree {
    fn scan(root: &Path) -> Result<Self> {
        let mut tree = Tree {
            files: Vec::new(),
            dirs: Vec::new(),
        };
        tree.walk(root, Path::new(""))?;
        Ok(tree)
    }

    fn walk(&mut self, root: &Path, relative: &Path) -> Result<()> {
        for entry in fs::read_dir(root.join(relative))? {
            let entry = entry?;
            let path = relative.join(entry.file_name());
            if entry.file_type()?.is_dir() {
                self.dirs.push(path.clone());
                self.walk(root, &path)?;
            } else if root.join(&path).is_file() {
                self.files.push(path);
            }
        }
        Ok(())
    }

    /// Files matched by `pattern`, with matched directories expanded.
    fn matching(&self, pattern: &GlobMatcher) -> BTreeSet<PathBuf> {
        let mut matched: BTreeSet<PathBuf> = self
            .files
            .iter()
            .filter(|file| pattern.is_match(file))
            .cloned()
            .collect();
        for dir in self.dirs.iter().filter(|dir| pattern.is_match(dir)) {
            matched.extend(self.files.iter().filter(|file| file.starts_with(dir)).cloned());
        }
        matched
    }
}

fn compile(pattern: &str) -> Result<Option<GlobMatcher>> {
    let pattern = pattern.trim_start_matches("./").trim_start_matches('/').trim_end_matches('/');
    if pattern.is_empty() {
        return Ok(None);
    }
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| ApiError::Argument(format!("invalid ignore pattern '{pattern}': {e}")))?;
    Ok(Some(glob.compile_matcher()))
}

/// Absolute paths of the files that make up the build context of `dir`.
/// A relative `dir` is resolved against the working directory.
pub fn context_files(dir: &Path) -> Result<BTreeSet<PathBuf>> {
    let dir = fs::canonicalize(dir)?;
    let dir = dir.as_path();
    let tree = Tree::scan(dir)?;
    let mut included: BTreeSet<PathBuf> = tree.files.iter().cloned().collect();

    let ignore_file = dir.join(IGNORE_FILE);
    if ignore_file.is_file() {
        let contents = fs::read_to_string(&ignore_file)?;
        for line in contents.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (negated, pattern) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            let Some(matcher) = compile(pattern)? else {
                continue;
            };
            let matched = tree.matching(&matcher);
            debug!(pattern = line, matched = matched.len(), "applying ignore pattern");
            if negated {
                included.extend(matched);
            } else {
                included.retain(|file| !matched.contains(file));
            }
        }
    }

    Ok(included.into_iter().map(|file| dir.join(file)).collect())
}

/// Tar the build context of `dir`, names relative to `dir`, keeping each
/// file's mode and modification time.
pub fn create_dir_tar(dir: &Path) -> Result<Vec<u8>> {
    let dir = fs::canonicalize(dir)?;
    let mut builder = tar::Builder::new(Vec::new());
    for path in context_files(&dir)? {
        let name = path
            .strip_prefix(&dir)
            .map_err(|e| ApiError::Argument(format!("{} escapes the context: {e}", path.display())))?;
        builder.append_path_with_name(&path, name)?;
    }
    Ok(builder.into_inner()?)
}

/// Tar in-memory `(name, contents)` entries with mode 0640.
pub fn create_tar<'a, I>(entries: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    let mut builder = tar::Builder::new(Vec::new());
    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o640);
        header.set_mtime(mtime);
        header.set_cksum();
        builder.append_data(&mut header, name, contents)?;
    }
    Ok(builder.into_inner()?)
}
