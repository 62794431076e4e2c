//! HTTP binding of the collaborator traits

use super::{
    AttachmentTransport, ClientError, ComplaintQuery, ComplaintStore, OfficeDirectory, Session,
};
use crate::config::Config;
use crate::models::{
    AccountDto, Attachment, AttachmentDto, Complaint, ComplaintDto, Office, Role,
};
use crate::uploader::StagedFile;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// REST client for the PQRS backend
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ClientError> {
        Self::build(base_url.into(), token, None)
    }

    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        Self::build(
            config.api_base_url.clone(),
            config.api_token.clone(),
            config.connect_timeout,
        )
    }

    fn build(
        base_url: String,
        token: Option<String>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let mut builder = Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!("Backend answered {}: {}", status, body);
    Err(classify_status(status, body))
}

/// Map a non-success status onto the client error taxonomy
fn classify_status(status: StatusCode, body: String) -> ClientError {
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
            ClientError::Rejected {
                status: status.as_u16(),
                body,
            }
        }
        _ => ClientError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

#[async_trait]
impl ComplaintStore for ApiClient {
    async fn find_by_id(&self, id: &str) -> Result<Complaint, ClientError> {
        let dto: ComplaintDto = self.send(self.http.get(self.url(&format!("pqrs/{}", id)))).await?;
        Complaint::try_from(dto)
    }

    async fn retrieve_all(&self, query: &ComplaintQuery) -> Result<Vec<Complaint>, ClientError> {
        let dtos: Vec<ComplaintDto> = self
            .send(self.http.get(self.url("pqrs")).query(query))
            .await?;
        dtos.into_iter().map(Complaint::try_from).collect()
    }

    async fn create(&self, complaint: &Complaint) -> Result<Complaint, ClientError> {
        let dto: ComplaintDto = self
            .send(self.http.post(self.url("pqrs")).json(&ComplaintDto::from(complaint)))
            .await?;
        Complaint::try_from(dto)
    }

    async fn update(&self, complaint: &Complaint) -> Result<Complaint, ClientError> {
        let id = complaint
            .id
            .as_deref()
            .ok_or_else(|| ClientError::Decode("update without id".to_string()))?;
        let dto: ComplaintDto = self
            .send(
                self.http
                    .put(self.url(&format!("pqrs/{}", id)))
                    .json(&ComplaintDto::from(complaint)),
            )
            .await?;
        Complaint::try_from(dto)
    }
}

#[async_trait]
impl AttachmentTransport for ApiClient {
    async fn upload_batch(&self, files: &[StagedFile]) -> Result<Vec<Attachment>, ClientError> {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.data.clone())
                .file_name(file.name.clone())
                .mime_str(&file.content_type)
                .map_err(|e| ClientError::Transport(e.to_string()))?;
            form = form.part("files", part);
        }

        let dtos: Vec<AttachmentDto> = self
            .send(self.http.post(self.url("archivo-adjuntos/upload")).multipart(form))
            .await?;
        Ok(dtos.into_iter().map(Attachment::from).collect())
    }
}

#[async_trait]
impl OfficeDirectory for ApiClient {
    async fn retrieve_offices(&self) -> Result<Vec<Office>, ClientError> {
        self.send(self.http.get(self.url("oficinas"))).await
    }
}

#[async_trait]
impl Session for ApiClient {
    async fn current_user_role(&self) -> Result<Role, ClientError> {
        let account: AccountDto = self.send(self.http.get(self.url("account"))).await?;
        tracing::debug!("Account {} holds {:?}", account.login, account.authorities);
        Ok(Role::from_authorities(account.authorities.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, String::new()),
            ClientError::NotFound
        );
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "titulo".to_string()),
            ClientError::Rejected { status: 400, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, String::new()),
            ClientError::Status { status: 500, .. }
        ));
    }

    #[test]
    fn test_url_strips_trailing_slash() {
        let client = ApiClient::new("http://localhost:8080/", None).unwrap();
        assert_eq!(client.url("pqrs/ABC"), "http://localhost:8080/api/pqrs/ABC");
    }

    #[test]
    fn test_error_detail_accessors() {
        let err = ClientError::Rejected {
            status: 400,
            body: "titulo".to_string(),
        };
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.body(), Some("titulo"));
        assert_eq!(ClientError::Transport("reset".to_string()).status(), None);
        assert_eq!(
            ClientError::Status {
                status: 502,
                body: String::new()
            }
            .body(),
            None
        );
    }
}
