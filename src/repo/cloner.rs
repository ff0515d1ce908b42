//! Git repository cloning functionality.
//!
//! This module clones remote repositories into ephemeral, uniquely named
//! workspaces using the git2 library. A [`Workspace`] removes its directory
//! when closed or dropped, so every exit path (including cancellation of the
//! surrounding future) cleans up.

use crate::error::FetchError;
use crate::models::Credential;
use git2::{ErrorClass, ErrorCode, FetchOptions, Progress, RemoteCallbacks};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Prefix of every workspace directory.
const WORKSPACE_PREFIX: &str = "cloned_repo_";

/// What to clone.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    /// Branch to checkout (None for the remote default branch).
    pub branch: Option<String>,
    pub credential: Option<Credential>,
}

/// Options for cloning a repository.
#[derive(Debug, Clone)]
pub struct CloneOptions {
    /// Depth for shallow clone (None for full clone).
    pub depth: Option<i32>,
    /// Whether to show progress.
    pub show_progress: bool,
    /// Parent directory for workspaces (None for the system temp dir).
    pub workspace_root: Option<PathBuf>,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self {
            depth: Some(1), // Shallow clone by default for speed
            show_progress: false,
            workspace_root: None,
        }
    }
}

/// A cloned repository on disk, deleted on [`Workspace::close`] or drop.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Path to the repository root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the workspace now. Failures are logged, never returned.
    pub fn close(mut self) {
        self.cleanup();
    }

    /// Remove the workspace on the blocking pool.
    ///
    /// Once started, removal finishes even if the caller stops waiting.
    pub async fn release(self) {
        let path = self.path.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || self.close()).await {
            warn!("Cleanup task for {} failed: {}", path.display(), e);
        }
    }

    fn cleanup(&mut self) {
        if let Some(dir) = self.dir.take() {
            debug!("Cleaning up workspace: {}", self.path.display());
            if let Err(e) = dir.close() {
                warn!("Failed to remove workspace {}: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Clones repositories into ephemeral workspaces.
#[derive(Debug, Clone, Default)]
pub struct RepoFetcher {
    options: CloneOptions,
}

impl RepoFetcher {
    pub fn new(options: CloneOptions) -> Self {
        Self { options }
    }

    /// Clone on the blocking pool.
    ///
    /// The workspace is created and owned inside the blocking task, so if the
    /// caller stops waiting the finished clone is still dropped and removed.
    pub async fn fetch(&self, request: FetchRequest) -> Result<Workspace, FetchError> {
        let fetcher = self.clone();
        tokio::task::spawn_blocking(move || fetcher.fetch_blocking(&request))
            .await
            .map_err(|e| FetchError::Task(e.to_string()))?
    }

    /// Clone a repository from a URL into a fresh workspace.
    pub fn fetch_blocking(&self, request: &FetchRequest) -> Result<Workspace, FetchError> {
        validate_repo_url(&request.url)?;
        info!("Cloning repository: {}", request.url);

        let temp = self.create_workspace_dir()?;
        let path = temp.path().to_path_buf();
        debug!("Clone target: {}", path.display());

        match self.clone_into(request, &path) {
            Ok(()) => {
                info!("Successfully cloned repository to: {}", path.display());
                Ok(Workspace {
                    dir: Some(temp),
                    path,
                })
            }
            Err(e) => {
                if let Err(cleanup) = temp.close() {
                    warn!(
                        "Failed to remove partial clone {}: {}",
                        path.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    fn create_workspace_dir(&self) -> Result<TempDir, FetchError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);

        match self.options.workspace_root {
            Some(ref root) => {
                std::fs::create_dir_all(root).map_err(FetchError::Workspace)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(FetchError::Workspace)
    }

    fn clone_into(&self, request: &FetchRequest, path: &Path) -> Result<(), FetchError> {
        // Set up progress callback
        let progress_bar = if self.options.show_progress {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            Some(Arc::new(pb))
        } else {
            None
        };

        let pb_clone = progress_bar.clone();
        let mut callbacks = RemoteCallbacks::new();

        callbacks.transfer_progress(move |progress: Progress<'_>| {
            if let Some(ref pb) = pb_clone {
                pb.set_length(progress.total_objects() as u64);
                pb.set_position(progress.received_objects() as u64);
            }
            true
        });

        if let Some(ref credential) = request.credential {
            let token = credential.expose().to_string();
            let mut attempts = 0;
            // libgit2 re-invokes the callback after a rejection; offer the
            // token once so a bad credential fails instead of looping.
            callbacks.credentials(move |_url, username, _allowed| {
                attempts += 1;
                if attempts > 1 {
                    return Err(git2::Error::from_str("credential rejected by remote"));
                }
                git2::Cred::userpass_plaintext(username.unwrap_or("x-access-token"), &token)
            });
        }

        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(callbacks);

        if let Some(depth) = self.options.depth {
            fetch_opts.depth(depth);
        }

        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch_opts);

        if let Some(ref branch) = request.branch {
            builder.branch(branch);
        }

        let result = builder.clone(&request.url, path);

        if let Some(pb) = progress_bar {
            pb.finish_and_clear();
        }

        result.map(|_| ()).map_err(|source| {
            let rejected = source.code() == ErrorCode::Auth
                || (source.class() == ErrorClass::Http && source.message().contains("401"));
            if rejected {
                FetchError::Authentication {
                    url: request.url.clone(),
                    message: source.message().to_string(),
                }
            } else {
                FetchError::Clone {
                    url: request.url.clone(),
                    source,
                }
            }
        })
    }
}

/// Check that a string looks like a clonable remote repository locator.
pub fn validate_repo_url(url: &str) -> Result<(), FetchError> {
    let url = url.trim();
    let invalid = || FetchError::InvalidUrl(url.to_string());

    if url.is_empty() || url.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    for scheme in ["https://", "http://", "ssh://", "git://", "file://"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            let rest = rest.trim_start_matches('/');
            return if rest.is_empty() || (scheme != "file://" && !rest.contains('/')) {
                Err(invalid())
            } else {
                Ok(())
            };
        }
    }

    // scp-like syntax: git@github.com:owner/repo
    if let Some(rest) = url.strip_prefix("git@") {
        if let Some((host, repo)) = rest.split_once(':') {
            if !host.is_empty() && !repo.is_empty() {
                return Ok(());
            }
        }
    }

    Err(invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Repository, RepositoryInitOptions, Signature};
    use tempfile::TempDir;

    /// Create a local repository on branch `main` containing the given files.
    fn init_source_repo(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();

        let mut index = repo.index().unwrap();
        for (name, content) in files {
            let full = dir.path().join(name);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(&full, content).unwrap();
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("test", "test@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
        dir
    }

    fn local_fetcher(root: &Path) -> RepoFetcher {
        RepoFetcher::new(CloneOptions {
            depth: None,
            show_progress: false,
            workspace_root: Some(root.to_path_buf()),
        })
    }

    fn file_url(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    #[test]
    fn test_validate_repo_url() {
        assert!(validate_repo_url("https://github.com/rust-lang/rust").is_ok());
        assert!(validate_repo_url("https://github.com/rust-lang/rust.git").is_ok());
        assert!(validate_repo_url("git@github.com:rust-lang/rust").is_ok());
        assert!(validate_repo_url("ssh://git@host/org/repo").is_ok());
        assert!(validate_repo_url("file:///tmp/repo").is_ok());

        assert!(validate_repo_url("").is_err());
        assert!(validate_repo_url("not a url").is_err());
        assert!(validate_repo_url("https://").is_err());
        assert!(validate_repo_url("https://github.com").is_err());
        assert!(validate_repo_url("ftp://host/repo").is_err());
        assert!(validate_repo_url("git@github.com").is_err());
    }

    #[test]
    fn test_clone_options_default() {
        let opts = CloneOptions::default();
        assert_eq!(opts.depth, Some(1));
        assert!(!opts.show_progress);
        assert!(opts.workspace_root.is_none());
    }

    #[test]
    fn test_fetch_clones_branch_and_cleans_up_on_close() {
        let source = init_source_repo(&[("app/main.py", "print('hi')\n")]);
        let root = TempDir::new().unwrap();
        let fetcher = local_fetcher(root.path());

        let workspace = fetcher
            .fetch_blocking(&FetchRequest {
                url: file_url(source.path()),
                branch: Some("main".to_string()),
                credential: None,
            })
            .unwrap();

        let cloned = workspace.path().to_path_buf();
        assert!(cloned.join("app/main.py").is_file());
        assert!(cloned
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(WORKSPACE_PREFIX));

        workspace.close();
        assert!(!cloned.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let source = init_source_repo(&[("a.txt", "a")]);
        let root = TempDir::new().unwrap();
        let fetcher = local_fetcher(root.path());

        let path = {
            let workspace = fetcher
                .fetch_blocking(&FetchRequest {
                    url: file_url(source.path()),
                    branch: None,
                    credential: None,
                })
                .unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_release_removes_workspace() {
        let source = init_source_repo(&[("a.txt", "a")]);
        let root = TempDir::new().unwrap();
        let fetcher = local_fetcher(root.path());

        let workspace = fetcher
            .fetch(FetchRequest {
                url: file_url(source.path()),
                branch: None,
                credential: None,
            })
            .await
            .unwrap();
        let path = workspace.path().to_path_buf();
        assert!(path.join("a.txt").is_file());

        workspace.release().await;
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_url_leaves_no_directory() {
        let root = TempDir::new().unwrap();
        let fetcher = local_fetcher(root.path());

        let err = fetcher
            .fetch_blocking(&FetchRequest {
                url: "not a url".to_string(),
                branch: None,
                credential: None,
            })
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_clone_leaves_no_directory() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("does-not-exist");
        let fetcher = local_fetcher(&root.path().join("workspaces"));

        let err = fetcher
            .fetch_blocking(&FetchRequest {
                url: file_url(&missing),
                branch: None,
                credential: None,
            })
            .unwrap_err();
        assert!(matches!(err, FetchError::Clone { .. }));
        assert_eq!(
            std::fs::read_dir(root.path().join("workspaces"))
                .unwrap()
                .count(),
            0
        );
    }

    #[test]
    fn test_missing_branch_is_clone_error() {
        let source = init_source_repo(&[("a.txt", "a")]);
        let root = TempDir::new().unwrap();
        let fetcher = local_fetcher(root.path());

        let err = fetcher
            .fetch_blocking(&FetchRequest {
                url: file_url(source.path()),
                branch: Some("no-such-branch".to_string()),
                credential: None,
            })
            .unwrap_err();
        assert!(matches!(err, FetchError::Clone { .. }));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_async_fetch() {
        let source = init_source_repo(&[("schema.sql", "select 1;")]);
        let root = TempDir::new().unwrap();
        let fetcher = local_fetcher(root.path());

        let workspace = fetcher
            .fetch(FetchRequest {
                url: file_url(source.path()),
                branch: Some("main".to_string()),
                credential: None,
            })
            .await
            .unwrap();
        assert!(workspace.path().join("schema.sql").is_file());
    }
}
