//! The local side of a change request.
//!
//! A [`Workspace`] is a throwaway clone of the target repository. The selector
//! decides which of its files the agent may touch, [`RemoteFileSet`] mirrors
//! those files to the provider, and the diff engine reports what the agent
//! changed relative to the baseline checkout.

mod diff;
mod repo;
mod selector;
mod upload;

pub use diff::unified_diff;
pub use repo::Workspace;
pub use selector::{select_files, SelectedFile, DEFAULT_SUPPORTED_TYPES};
pub use upload::RemoteFileSet;
