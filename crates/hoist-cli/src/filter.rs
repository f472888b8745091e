use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

/// Which files inside a directory argument get uploaded. With no patterns
/// everything matches. Hidden entries are always skipped.
pub struct IncludeRules {
    globs: Option<GlobSet>,
}

impl IncludeRules {
    pub fn new(patterns: &[String]) -> anyhow::Result<Self> {
        if patterns.is_empty() {
            return Ok(Self { globs: None });
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            globs: Some(builder.build()?),
        })
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        match &self.globs {
            Some(globs) => globs.is_match(rel_path),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
}

/// Expand the command-line paths into files. Files named directly are always
/// taken; directories are walked and filtered through `rules`.
pub fn collect_files(paths: &[PathBuf], rules: &IncludeRules) -> anyhow::Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    for path in paths {
        let meta = std::fs::metadata(path)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        if meta.is_dir() {
            let mut found = Vec::new();
            walk(path, path, rules, &mut found)?;
            found.sort_by(|a, b| a.name.cmp(&b.name));
            files.extend(found);
        } else {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            files.push(SourceFile {
                path: path.clone(),
                name,
            });
        }
    }
    Ok(files)
}

fn walk(
    root: &Path,
    dir: &Path,
    rules: &IncludeRules,
    out: &mut Vec<SourceFile>,
) -> anyhow::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(root, &path, rules, out)?;
        } else if file_type.is_file() {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if rules.matches(&rel) {
                out.push(SourceFile { path, name: rel });
            }
        }
    }
    Ok(())
}
