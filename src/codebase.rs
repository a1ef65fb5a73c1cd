//! Source-file listing used as the input of codebase diagrams.
//!
//! Only paths are read, never file contents. The walk honors `.gitignore` and
//! `.ignore` files and skips hidden, VCS, build and vendor directories.

use anyhow::{anyhow, Result};
use ignore::WalkBuilder;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "kt", "c", "h", "cpp", "hpp", "cs",
    "rb", "php", "swift", "scala", "ex", "exs", "clj", "hs", "ml", "lua", "sh", "sql", "vue",
    "svelte", "dart", "zig",
];

const SKIPPED_DIRS: &[&str] = &[
    "target", "node_modules", "vendor", "dist", "build", "out", "__pycache__", "venv", ".venv",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodebaseListing {
    pub root: PathBuf,
    /// Relative paths, sorted.
    pub files: Vec<PathBuf>,
    pub truncated: bool,
}

impl CodebaseListing {
    /// Text handed to the model: files grouped under their directory.
    pub fn describe(&self) -> String {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string());

        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for file in &self.files {
            let dir = file
                .parent()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| ".".to_string());
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            groups.entry(dir).or_default().push(file_name);
        }

        let mut lines = vec![format!("Codebase: {} ({} source files)", name, self.files.len())];
        for (dir, files) in groups {
            lines.push(format!("{}/", dir));
            for file in files {
                lines.push(format!("  {}", file));
            }
        }
        if self.truncated {
            lines.push("(listing truncated)".to_string());
        }
        lines.join("\n")
    }
}

/// List up to `max_files` source files under `root`.
pub fn scan(root: &Path, max_files: usize) -> Result<CodebaseListing> {
    if !root.is_dir() {
        return Err(anyhow!("{} is not a directory", root.display()));
    }

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .sort_by_file_path(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            !(entry.file_type().is_some_and(|t| t.is_dir())
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
        })
        .build();

    let mut files = Vec::new();
    let mut truncated = false;
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) || !is_source_file(entry.path()) {
            continue;
        }
        if files.len() == max_files {
            truncated = true;
            break;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        files.push(relative);
    }

    files.sort();
    info!(
        "Found {} source files under {}{}",
        files.len(),
        root.display(),
        if truncated { " (truncated)" } else { "" }
    );
    Ok(CodebaseListing {
        root: root.to_path_buf(),
        files,
        truncated,
    })
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_lists_source_files_and_skips_build_dirs() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/main.rs");
        touch(dir.path(), "src/lib/util.py");
        touch(dir.path(), "README.md");
        touch(dir.path(), "target/debug/build.rs");
        touch(dir.path(), "node_modules/pkg/index.js");
        touch(dir.path(), ".hidden/secret.rs");

        let listing = scan(dir.path(), 50).unwrap();
        assert_eq!(
            listing.files,
            vec![PathBuf::from("src/lib/util.py"), PathBuf::from("src/main.rs")]
        );
        assert!(!listing.truncated);
    }

    #[test]
    fn test_respects_ignore_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "keep.rs");
        touch(dir.path(), "generated/skip.rs");
        fs::write(dir.path().join(".ignore"), "generated/\n").unwrap();

        let listing = scan(dir.path(), 50).unwrap();
        assert_eq!(listing.files, vec![PathBuf::from("keep.rs")]);
    }

    #[test]
    fn test_max_files_truncates() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            touch(dir.path(), &format!("m{}.go", i));
        }
        let listing = scan(dir.path(), 3).unwrap();
        assert_eq!(listing.files.len(), 3);
        assert!(listing.truncated);
        assert!(listing.describe().ends_with("(listing truncated)"));
    }

    #[test]
    fn test_describe_groups_by_directory() {
        let listing = CodebaseListing {
            root: PathBuf::from("/work/app"),
            files: vec![
                PathBuf::from("main.rs"),
                PathBuf::from("src/a.rs"),
                PathBuf::from("src/b.rs"),
            ],
            truncated: false,
        };
        assert_eq!(
            listing.describe(),
            "Codebase: app (3 source files)\n./\n  main.rs\nsrc/\n  a.rs\n  b.rs"
        );
    }

    #[test]
    fn test_missing_root_is_an_error() {
        assert!(scan(Path::new("/definitely/not/here"), 10).is_err());
    }
}
