//! Watch mode: re-render sources as they change.

use crate::engine::Renderer;
use crate::error::{RenderError, RenderResult};
use cliodoc_exec::CancellationWatcher;
use cliodoc_program::load_repositories;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

const EVENT_BUFFER: usize = 100;

/// Where a changed source is written: `output_dir` joined with the path
/// relative to the first root containing it.
///
/// A path that is itself a root, or lies under none, keeps only its file name.
pub fn output_path_for(roots: &[PathBuf], output_dir: &Path, path: &Path) -> PathBuf {
    let relative = roots
        .iter()
        .find_map(|root| path.strip_prefix(root).ok())
        .filter(|rel| !rel.as_os_str().is_empty());

    match relative {
        Some(rel) => output_dir.join(rel),
        None => output_dir.join(path.file_name().unwrap_or(path.as_os_str())),
    }
}

fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_str().map(|n| n.starts_with('.')).unwrap_or(false),
        _ => false,
    })
}

fn is_definition(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Whether `path`, found under `root`, lies in an output tree nested inside
/// that root. An output directory enclosing the whole root hides nothing.
fn is_output(path: &Path, root: &Path, output_dir: &Path) -> bool {
    path.starts_with(output_dir) && !root.starts_with(output_dir)
}

fn canonical(path: &Path) -> RenderResult<PathBuf> {
    path.canonicalize().map_err(|source| RenderError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// A change worth acting on.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
    Source { path: PathBuf, output: PathBuf },
    Repository(PathBuf),
}

/// Renders sources under a set of roots whenever they change.
#[derive(Debug)]
pub struct WatchCoordinator {
    renderer: Renderer,
    roots: Vec<PathBuf>,
    output_dir: PathBuf,
    repositories: Vec<PathBuf>,
}

impl WatchCoordinator {
    /// Watch `roots` (files or directories), writing into `output_dir`.
    pub fn new(renderer: Renderer, roots: Vec<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            roots,
            output_dir: output_dir.into(),
            repositories: Vec::new(),
        }
    }

    /// Also reload the registry from these repositories when their
    /// definitions change.
    pub fn repositories(mut self, repositories: Vec<PathBuf>) -> Self {
        self.repositories = repositories;
        self
    }

    fn classify(&self, event: &Event, output_dir: &Path) -> Vec<Change> {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return Vec::new();
        }

        let mut changes = Vec::new();
        for path in &event.paths {
            if is_definition(path) {
                if let Some(repo) = self.repositories.iter().find(|r| path.starts_with(r)) {
                    let relative = path.strip_prefix(repo).unwrap_or(path);
                    if !is_hidden(relative) && !is_output(path, repo, output_dir) {
                        changes.push(Change::Repository(path.clone()));
                        continue;
                    }
                }
            }

            let Some(root) = self.roots.iter().find(|r| path.starts_with(r)) else {
                continue;
            };
            if is_output(path, root, output_dir) {
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(path);
            let wanted = if relative.as_os_str().is_empty() {
                true
            } else {
                !is_hidden(relative) && self.renderer.options().matches(relative)
            };
            if wanted && path.is_file() {
                changes.push(Change::Source {
                    path: path.clone(),
                    output: output_path_for(&self.roots, output_dir, path),
                });
            }
        }
        changes
    }

    fn reload_registry(&mut self) {
        match load_repositories(&self.repositories) {
            Ok(registry) => {
                info!(programs = registry.len(), "reloaded program repositories");
                self.renderer.set_registry(registry);
            }
            Err(e) => error!(error = %e, "keeping previous programs, reload failed"),
        }
    }

    /// Watch until `cancellation` fires.
    ///
    /// Render failures are logged and watching continues. A failing
    /// subscription ends the watch with an error; cancellation ends it with
    /// `Ok(())`.
    #[instrument(skip_all, fields(roots = self.roots.len()))]
    pub async fn run(mut self, mut cancellation: CancellationWatcher) -> RenderResult<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| RenderError::Write {
                path: self.output_dir.clone(),
                source,
            })?;
        let output_dir = canonical(&self.output_dir)?;
        self.roots = self.roots.iter().map(|r| canonical(r)).collect::<RenderResult<_>>()?;
        self.repositories = self
            .repositories
            .iter()
            .map(|r| canonical(r))
            .collect::<RenderResult<_>>()?;

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        for root in self.roots.iter().chain(self.repositories.iter()) {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }
        info!(output = %output_dir.display(), "watching for changes");

        loop {
            let next = tokio::select! {
                _ = cancellation.cancelled() => {
                    info!("watch cancelled");
                    return Ok(());
                }
                next = rx.recv() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(RenderError::WatchClosed),
            };
            debug!(kind = ?event.kind, paths = ?event.paths, "file event");

            for change in self.classify(&event, &output_dir) {
                match change {
                    Change::Repository(path) => {
                        debug!(path = %path.display(), "program definition changed");
                        self.reload_registry();
                    }
                    Change::Source { path, output } => {
                        match self.renderer.render_file(&path, &output).await {
                            Ok(()) => {}
                            Err(e) if e.is_cancelled() => {
                                info!("watch cancelled during render");
                                return Ok(());
                            }
                            Err(e) => warn!(source = %path.display(), error = %e, "render failed"),
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RenderOptions;
    use cliodoc_exec::ExecutionContext;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn coordinator(roots: Vec<PathBuf>) -> WatchCoordinator {
        let renderer = Renderer::new(RenderOptions::new(), ExecutionContext::system());
        WatchCoordinator::new(renderer, roots, "/out")
    }

    #[test]
    fn test_output_path_strips_root() {
        let roots = vec![PathBuf::from("/src/docs")];
        assert_eq!(
            output_path_for(&roots, Path::new("/out"), Path::new("/src/docs/a/b.tmpl.md")),
            PathBuf::from("/out/a/b.tmpl.md")
        );
    }

    #[test]
    fn test_output_path_for_file_root() {
        let roots = vec![PathBuf::from("/src/readme.tmpl.md")];
        assert_eq!(
            output_path_for(&roots, Path::new("/out"), Path::new("/src/readme.tmpl.md")),
            PathBuf::from("/out/readme.tmpl.md")
        );
        assert_eq!(
            output_path_for(&roots, Path::new("/out"), Path::new("/elsewhere/x.md")),
            PathBuf::from("/out/x.md")
        );
    }

    #[test]
    fn test_output_path_first_root_wins() {
        let roots = vec![PathBuf::from("/src"), PathBuf::from("/src/docs")];
        assert_eq!(
            output_path_for(&roots, Path::new("/out"), Path::new("/src/docs/x.tmpl.md")),
            PathBuf::from("/out/docs/x.tmpl.md")
        );
    }

    #[test]
    fn test_classify_filters_events() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::write(root.join("doc.tmpl.md"), "x").unwrap();
        std::fs::write(root.join("notes.md"), "x").unwrap();
        let c = coordinator(vec![root.clone()]);
        let out = Path::new("/out");

        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(root.join("doc.tmpl.md"))
            .add_path(root.join("notes.md"));
        assert_eq!(
            c.classify(&created, out),
            vec![Change::Source {
                path: root.join("doc.tmpl.md"),
                output: PathBuf::from("/out/doc.tmpl.md"),
            }]
        );

        let removed =
            Event::new(EventKind::Remove(RemoveKind::File)).add_path(root.join("doc.tmpl.md"));
        assert!(c.classify(&removed, out).is_empty());

        let modified =
            Event::new(EventKind::Modify(ModifyKind::Any)).add_path(root.join("doc.tmpl.md"));
        assert_eq!(c.classify(&modified, out).len(), 1);
    }

    #[test]
    fn test_classify_skips_output_dir_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("out")).unwrap();
        std::fs::create_dir_all(root.join(".cache")).unwrap();
        std::fs::write(root.join("out/doc.tmpl.md"), "x").unwrap();
        std::fs::write(root.join(".cache/doc.tmpl.md"), "x").unwrap();
        let c = coordinator(vec![root.clone()]);

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(root.join("out/doc.tmpl.md"))
            .add_path(root.join(".cache/doc.tmpl.md"));
        assert!(c.classify(&event, &root.join("out")).is_empty());
    }

    #[test]
    fn test_classify_output_dir_enclosing_root() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().to_path_buf();
        let docs = work.join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("page.tmpl.md"), "x").unwrap();
        let c = coordinator(vec![docs.clone()]);

        let event =
            Event::new(EventKind::Create(CreateKind::File)).add_path(docs.join("page.tmpl.md"));
        assert_eq!(
            c.classify(&event, &work),
            vec![Change::Source {
                path: docs.join("page.tmpl.md"),
                output: work.join("page.tmpl.md"),
            }]
        );
    }

    #[test]
    fn test_classify_repository_change() {
        let src = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let c = coordinator(vec![src.path().to_path_buf()])
            .repositories(vec![repo.path().to_path_buf()]);

        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(repo.path().join("echo.yaml"));
        assert_eq!(
            c.classify(&event, Path::new("/out")),
            vec![Change::Repository(repo.path().join("echo.yaml"))]
        );
    }
}
