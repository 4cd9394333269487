//! Code assets: a local scoring-code directory uploaded to workspace storage.
//!
//! The version of an uploaded asset is a digest of the directory contents, so
//! unchanged code maps to the asset that already exists.

use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use tracing::{debug, info};

use super::client::{state_or_succeeded, Azure};
use super::models::{
    api_versions, CodeVersionProperties, CodeVersionResource, PendingUploadRequest,
    PendingUploadResponse,
};
use crate::providers::traits::ProvisionError;

/// Hex characters of the content digest used as the asset version.
const VERSION_LEN: usize = 16;

/// A file inside a code directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct CodeFile {
    /// Path segments relative to the directory root.
    pub relative: Vec<String>,
    /// File contents.
    pub contents: Vec<u8>,
}

fn io_error(path: &Path, source: std::io::Error) -> ProvisionError {
    ProvisionError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Read every file below `root`, ordered by relative path.
pub(super) fn collect_files(root: &Path) -> Result<Vec<CodeFile>, ProvisionError> {
    if !root.is_dir() {
        return Err(ProvisionError::Config(format!(
            "Code directory {} does not exist",
            root.display()
        )));
    }

    let mut files = Vec::new();
    let mut pending = vec![PathBuf::from(root)];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).map_err(|e| io_error(&dir, e))? {
            let entry = entry.map_err(|e| io_error(&dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| io_error(&path, e))?;

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let relative = path
                    .strip_prefix(root)
                    .map_err(|_| {
                        ProvisionError::Config(format!("{} is outside the code directory", path.display()))
                    })?
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                let contents = std::fs::read(&path).map_err(|e| io_error(&path, e))?;
                files.push(CodeFile { relative, contents });
            }
        }
    }

    if files.is_empty() {
        return Err(ProvisionError::Config(format!(
            "Code directory {} is empty",
            root.display()
        )));
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// Version derived from file paths and contents.
pub(super) fn content_version(files: &[CodeFile]) -> String {
    let mut hasher = Sha1::new();
    for file in files {
        hasher.update(file.relative.join("/").as_bytes());
        hasher.update([0]);
        hasher.update((file.contents.len() as u64).to_le_bytes());
        hasher.update(&file.contents);
    }

    let mut version = hex::encode(hasher.finalize());
    version.truncate(VERSION_LEN);
    version
}

impl Azure {
    fn code_version_path(&self, name: &str, version: &str) -> String {
        format!("{}/codes/{}/versions/{}", self.workspace_url(), name, version)
    }

    /// ARM ID of a workspace code asset version.
    fn code_asset_id(&self, name: &str, version: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}/codes/{}/versions/{}",
            self.workspace.subscription_id,
            self.workspace.resource_group,
            self.workspace.workspace_name,
            name,
            version
        )
    }

    /// Upload `local_path` as code asset `name` unless this exact content
    /// is already registered. Returns the asset ID.
    pub(super) async fn upload_code_dir(
        &self,
        name: &str,
        local_path: &Path,
    ) -> Result<String, ProvisionError> {
        let files = collect_files(local_path)?;
        let version = content_version(&files);
        let url = format!(
            "{}?api-version={}",
            self.code_version_path(name, &version),
            api_versions::MACHINE_LEARNING
        );

        match self.get::<CodeVersionResource>(&url).await {
            Ok(existing) => {
                info!(name = %name, version = %version, "Code asset already registered");
                return Ok(if existing.id.is_empty() {
                    self.code_asset_id(name, &version)
                } else {
                    existing.id
                });
            }
            Err(ProvisionError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let pending: PendingUploadResponse = self
            .post_json(
                &format!(
                    "{}/startPendingUpload?api-version={}",
                    self.code_version_path(name, &version),
                    api_versions::MACHINE_LEARNING
                ),
                &PendingUploadRequest {
                    pending_upload_type: "TemporaryBlobReference".to_string(),
                },
            )
            .await?;
        let blob = pending.blob_reference_for_consumption;
        let sas = url::Url::parse(&blob.credential.sas_uri)
            .map_err(|e| ProvisionError::Config(format!("Invalid upload URL: {e}")))?;

        let count = files.len();
        for file in files {
            let mut target = sas.clone();
            target
                .path_segments_mut()
                .map_err(|()| ProvisionError::Config("Upload URL has no path".to_string()))?
                .pop_if_empty()
                .extend(&file.relative);
            self.put_blob(target, file.contents).await?;
        }
        debug!(name = %name, version = %version, files = count, "Uploaded code files");

        let body = CodeVersionResource {
            id: String::new(),
            properties: CodeVersionProperties {
                code_uri: Some(blob.blob_uri),
                is_anonymous: false,
                provisioning_state: None,
            },
        };
        let created: CodeVersionResource = self
            .put_and_wait(&url, &body, &format!("{name}:{version}"), |c: &CodeVersionResource| {
                state_or_succeeded(c.properties.provisioning_state.as_deref())
            })
            .await?;

        info!(name = %name, version = %version, "Registered code asset");
        Ok(if created.id.is_empty() {
            self.code_asset_id(name, &version)
        } else {
            created.id
        })
    }
}
