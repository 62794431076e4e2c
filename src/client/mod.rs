//! Backend collaborators consumed by the form and the redirect policy
//!
//! Each concern is its own trait so a form can be composed from any mix of
//! real and fake backends. [`ApiClient`] implements all of them over HTTP.

mod http;

pub use http::ApiClient;

use crate::models::{Attachment, Complaint, Office, Role};
use crate::uploader::StagedFile;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Resource not found")]
    NotFound,

    /// Server-side validation refused the payload
    #[error("Request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected response ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    /// HTTP status carried by the error, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::NotFound => Some(404),
            ClientError::Rejected { status, .. } | ClientError::Status { status, .. } => {
                Some(*status)
            }
            ClientError::Transport(_) | ClientError::Decode(_) => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            ClientError::Rejected { body, .. } | ClientError::Status { body, .. }
                if !body.is_empty() =>
            {
                Some(body)
            }
            _ => None,
        }
    }
}

/// Filter and paging for list retrieval
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplaintQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

#[async_trait]
pub trait ComplaintStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Complaint, ClientError>;

    async fn retrieve_all(&self, query: &ComplaintQuery) -> Result<Vec<Complaint>, ClientError>;

    /// Persist a new complaint; the returned record carries the new id
    async fn create(&self, complaint: &Complaint) -> Result<Complaint, ClientError>;

    async fn update(&self, complaint: &Complaint) -> Result<Complaint, ClientError>;
}

#[async_trait]
pub trait AttachmentTransport: Send + Sync {
    /// Send every file in one request; returns the stored attachments
    async fn upload_batch(&self, files: &[StagedFile]) -> Result<Vec<Attachment>, ClientError>;
}

#[async_trait]
pub trait OfficeDirectory: Send + Sync {
    async fn retrieve_offices(&self) -> Result<Vec<Office>, ClientError>;
}

#[async_trait]
pub trait Session: Send + Sync {
    async fn current_user_role(&self) -> Result<Role, ClientError>;
}
