use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use super::client::OpenAiClient;
use super::http::{send_with_retry, RetryPolicy};
use super::types::{DeletionStatus, FileObject, RemoteFile, RemoteFileContent};

/// Purpose tag that makes an uploaded file readable by assistants
const ASSISTANTS_PURPOSE: &str = "assistants";

impl OpenAiClient {
    /// Upload `bytes` to the file store under `name`.
    pub async fn upload_file(&self, name: &str, bytes: Vec<u8>) -> Result<RemoteFile> {
        let url = self.url("files")?;
        let what = "POST files";

        let response = send_with_retry(RetryPolicy::NonIdempotent, || {
            let part = Part::bytes(bytes.clone()).file_name(name.to_string());
            let form = Form::new()
                .text("purpose", ASSISTANTS_PURPOSE)
                .part("file", part);
            self.authorize(self.client.post(url.clone()), false)
                .multipart(form)
        })
        .await
        .with_context(|| format!("Failed to upload {}", name))?;

        let response = Self::check_status(response, what).await?;
        let file: FileObject = Self::read_json(response, what).await?;
        debug!("Uploaded {} as {}", name, file.id);

        Ok(RemoteFile {
            id: file.id,
            name: name.to_string(),
        })
    }

    /// Delete an uploaded file.
    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        let status: DeletionStatus = self.delete(&format!("files/{}", file_id), false).await?;
        if !status.deleted {
            anyhow::bail!("Provider did not delete file {}", file_id);
        }
        Ok(())
    }

    /// Fetch a file's metadata and content.
    pub async fn retrieve_file(&self, file_id: &str) -> Result<RemoteFileContent> {
        let file: FileObject = self.get_json(&format!("files/{}", file_id), false).await?;
        let bytes = self.get_bytes(&format!("files/{}/content", file_id)).await?;
        Ok(RemoteFileContent {
            filename: file.filename,
            bytes,
        })
    }
}
