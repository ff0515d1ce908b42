//! Repository fetching.

pub mod cloner;

pub use cloner::{validate_repo_url, CloneOptions, FetchRequest, RepoFetcher, Workspace};
