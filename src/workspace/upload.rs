//! Uploaded copies of the selected files, tracked until teardown.

use tracing::{debug, info, warn};

use super::SelectedFile;
use crate::api::{LlmProvider, RemoteFile};
use crate::error::{ChangeError, Result};

/// Files uploaded to the provider for one request.
///
/// Every handle that was successfully created is remembered, including those
/// created before a later upload failed, so [`RemoteFileSet::close`] can
/// delete them all.
pub struct RemoteFileSet<'a> {
    provider: &'a dyn LlmProvider,
    files: Vec<RemoteFile>,
}

impl<'a> RemoteFileSet<'a> {
    pub fn new(provider: &'a dyn LlmProvider) -> Self {
        Self {
            provider,
            files: Vec::new(),
        }
    }

    /// Upload each file under its relative path, in input order.
    ///
    /// Stops at the first failure with [`ChangeError::UploadFailed`].
    pub async fn upload(&mut self, selected: &[SelectedFile]) -> Result<&[RemoteFile]> {
        for file in selected {
            if file.content.is_empty() {
                debug!("Not uploading empty file {}", file.relative_path);
                continue;
            }

            let remote = self
                .provider
                .upload_file(&file.relative_path, file.content.clone())
                .await
                .map_err(|e| ChangeError::UploadFailed {
                    path: file.relative_path.clone(),
                    reason: format!("{:#}", e),
                })?;

            debug!("Uploaded {} as {}", file.relative_path, remote.id);
            self.files.push(RemoteFile {
                id: remote.id,
                name: file.relative_path.clone(),
            });
        }

        info!("Uploaded {} file(s)", self.files.len());
        Ok(&self.files)
    }

    pub fn files(&self) -> &[RemoteFile] {
        &self.files
    }

    /// Delete every uploaded file.
    ///
    /// Failures are logged and do not stop the remaining deletions. Each
    /// handle is forgotten once attempted, so a second call does nothing.
    pub async fn close(&mut self) {
        for file in self.files.drain(..) {
            match self.provider.delete_file(&file.id).await {
                Ok(()) => debug!("Deleted remote file {} ({})", file.id, file.name),
                Err(e) => {
                    let err = ChangeError::ResourceCleanupFailed {
                        resource: format!("file {} ({})", file.id, file.name),
                        reason: format!("{:#}", e),
                    };
                    warn!("{}", err);
                }
            }
        }
    }
}
