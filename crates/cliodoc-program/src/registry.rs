//! Program repositories and the name-keyed registry.

use crate::error::{ProgramError, ProgramResult};
use crate::program::Program;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use walkdir::{DirEntry, WalkDir};

/// All programs known to a render session, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    programs: BTreeMap<String, Program>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a program, rejecting a name that is already taken.
    ///
    /// `origin` names the definition in the collision error.
    pub fn insert(&mut self, program: Program, origin: impl Into<PathBuf>) -> ProgramResult<()> {
        if self.programs.contains_key(&program.name) {
            return Err(ProgramError::DuplicateProgram {
                name: program.name,
                path: origin.into(),
            });
        }
        self.programs.insert(program.name.clone(), program);
        Ok(())
    }

    /// Look up a program by name.
    pub fn get(&self, name: &str) -> Option<&Program> {
        self.programs.get(name)
    }

    /// Whether a program with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    /// Program names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }

    /// Programs in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Program> {
        self.programs.values()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

fn is_definition(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Decode every definition file below `dir`, returning each program with the
/// file it came from. Hidden files and directories are skipped.
pub fn load_programs_from_dir(dir: impl AsRef<Path>) -> ProgramResult<Vec<(PathBuf, Program)>> {
    let dir = dir.as_ref();
    let mut programs = Vec::new();

    let walker = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            ProgramError::Repository {
                path,
                source: e.into(),
            }
        })?;

        if !entry.file_type().is_file() || !is_definition(entry.path()) {
            continue;
        }

        let path = entry.path();
        let file = File::open(path).map_err(|source| ProgramError::Repository {
            path: path.to_path_buf(),
            source,
        })?;
        let program = Program::from_reader(file, path)?;
        debug!(program = %program.name, path = %path.display(), "loaded program");
        programs.push((path.to_path_buf(), program));
    }

    Ok(programs)
}

/// Load every repository root into one registry.
///
/// Each root must exist. A program name defined twice, in the same root or
/// across roots, aborts the whole load.
#[instrument(skip_all, fields(roots = roots.len()))]
pub fn load_repositories<P: AsRef<Path>>(roots: &[P]) -> ProgramResult<Registry> {
    let mut registry = Registry::new();

    for root in roots {
        let root = root.as_ref();
        std::fs::metadata(root).map_err(|source| ProgramError::Repository {
            path: root.to_path_buf(),
            source,
        })?;

        for (path, program) in load_programs_from_dir(root)? {
            registry.insert(program, path)?;
        }
    }

    debug!(programs = registry.len(), "registry loaded");
    Ok(registry)
}
