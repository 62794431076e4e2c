//! Attachment staging and batch upload

use crate::client::{AttachmentTransport, ClientError};
use crate::models::Attachment;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// A file picked locally that has not been uploaded yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl StagedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Attachment record for this file before it has a storage id
    pub fn as_attachment(&self) -> Attachment {
        Attachment {
            id: None,
            name: self.name.clone(),
            complaint_id: None,
        }
    }
}

/// Result of one batch: the files that went out and what the backend stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedBatch {
    pub sent: Vec<StagedFile>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("An upload is already in progress")]
    Busy,

    #[error("Upload failed: {0}")]
    Failed(#[source] ClientError),
}

/// Clears a busy flag when dropped, whatever path the upload took
pub(crate) struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    /// Raise the flag, or return `None` when it is already raised
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlagGuard(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AttachmentUploader {
    transport: Arc<dyn AttachmentTransport>,
    pending: Mutex<Vec<StagedFile>>,
    busy: AtomicBool,
}

impl AttachmentUploader {
    pub fn new(transport: Arc<dyn AttachmentTransport>) -> Self {
        Self {
            transport,
            pending: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
        }
    }

    fn pending_lock(&self) -> MutexGuard<'_, Vec<StagedFile>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a file. Nothing is sent and nothing is filtered here.
    pub fn stage(&self, file: StagedFile) {
        tracing::debug!("Staged {} ({} bytes)", file.name, file.data.len());
        self.pending_lock().push(file);
    }

    /// Drop a queued file by position; out of range is a no-op
    pub fn unstage(&self, index: usize) -> Option<StagedFile> {
        let mut pending = self.pending_lock();
        (index < pending.len()).then(|| pending.remove(index))
    }

    pub fn pending(&self) -> Vec<StagedFile> {
        self.pending_lock().clone()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_lock().is_empty()
    }

    pub fn clear(&self) {
        self.pending_lock().clear();
    }

    /// Drop the files of a finished batch from the queue.
    ///
    /// Each sent file removes one matching entry; files staged after the
    /// batch started stay queued.
    pub fn discard_sent(&self, sent: &[StagedFile]) {
        let mut pending = self.pending_lock();
        for file in sent {
            if let Some(index) = pending.iter().position(|p| p == file) {
                pending.remove(index);
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Upload every pending file as one batch.
    ///
    /// The pending list is left as is; the caller decides when to drop the
    /// sent files with [`AttachmentUploader::discard_sent`].
    pub async fn upload_all(&self) -> Result<UploadedBatch, UploadError> {
        let files = self.pending();
        if files.is_empty() {
            return Ok(UploadedBatch::default());
        }

        let _busy = FlagGuard::acquire(&self.busy).ok_or(UploadError::Busy)?;
        tracing::info!("Uploading {} attachment(s)", files.len());

        let uploaded = self
            .transport
            .upload_batch(&files)
            .await
            .map_err(|e| {
                tracing::error!("Attachment upload failed: {}", e);
                UploadError::Failed(e)
            })?;

        if uploaded.len() != files.len() {
            let missing: Vec<&str> = files
                .iter()
                .filter(|f| !uploaded.iter().any(|a| a.name == f.name))
                .map(|f| f.name.as_str())
                .collect();
            tracing::warn!(
                "Sent {} file(s), backend stored {} (missing: {:?})",
                files.len(),
                uploaded.len(),
                missing
            );
        }

        Ok(UploadedBatch {
            sent: files,
            attachments: uploaded,
        })
    }
}
