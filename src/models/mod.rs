//! Data models for the complaint intake client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::ClientError;

// =============================================================================
// Enums
// =============================================================================

/// Resolution status of a complaint, as the backend spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplaintStatus {
    #[serde(rename = "Recibido")]
    Received,
    #[serde(rename = "En Proceso")]
    InProgress,
    #[serde(rename = "Respondido")]
    Responded,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 3] = [
        ComplaintStatus::Received,
        ComplaintStatus::InProgress,
        ComplaintStatus::Responded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComplaintStatus::Received => "Recibido",
            ComplaintStatus::InProgress => "En Proceso",
            ComplaintStatus::Responded => "Respondido",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// Role of the signed-in account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
    Other(String),
}

impl Role {
    pub fn from_authority(authority: &str) -> Self {
        match authority {
            "ROLE_USER" => Role::User,
            "ROLE_ADMIN" => Role::Admin,
            other => Role::Other(other.to_string()),
        }
    }

    /// Picks the effective role from a list of authorities.
    ///
    /// Administrators usually also hold `ROLE_USER`, so admin wins.
    pub fn from_authorities<S: AsRef<str>>(authorities: &[S]) -> Self {
        let roles: Vec<Role> = authorities
            .iter()
            .map(|a| Role::from_authority(a.as_ref()))
            .collect();

        if roles.contains(&Role::Admin) {
            Role::Admin
        } else if roles.contains(&Role::User) {
            Role::User
        } else {
            roles
                .into_iter()
                .next()
                .unwrap_or_else(|| Role::Other(String::new()))
        }
    }
}

// =============================================================================
// Office
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Office {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
}

// =============================================================================
// Attachment
// =============================================================================

/// A file attached to a complaint.
///
/// `id` is the storage identifier and stays `None` until the upload
/// completes. `complaint_id` points back at the owning complaint without
/// owning it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attachment {
    pub id: Option<String>,
    pub name: String,
    pub complaint_id: Option<String>,
}

impl Attachment {
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pqrs_id: Option<String>,
}

impl From<AttachmentDto> for Attachment {
    fn from(dto: AttachmentDto) -> Self {
        Self {
            id: dto.id,
            name: dto.nombre,
            complaint_id: dto.pqrs_id,
        }
    }
}

impl From<&Attachment> for AttachmentDto {
    fn from(attachment: &Attachment) -> Self {
        Self {
            id: attachment.id.clone(),
            nombre: attachment.name.clone(),
            pqrs_id: attachment.complaint_id.clone(),
        }
    }
}

// =============================================================================
// Complaint
// =============================================================================

/// A PQRS record as the form works with it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Complaint {
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
    pub response_deadline: Option<DateTime<Utc>>,
    pub status: Option<ComplaintStatus>,
    pub responding_office: Option<Office>,
    pub attachments: Vec<Attachment>,
    pub submitter_full_name: Option<String>,
    pub submitter_email: Option<String>,
    pub submitter_phone: Option<String>,
    pub is_anonymous: Option<bool>,
}

impl Complaint {
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Wire shape of a complaint. Timestamps travel as RFC 3339 strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub titulo: Option<String>,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub fecha_creacion: Option<String>,
    #[serde(default)]
    pub fecha_limite_respuesta: Option<String>,
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub oficina_responder: Option<Office>,
    #[serde(default, rename = "archivosAdjuntosDTO")]
    pub archivos_adjuntos: Option<Vec<AttachmentDto>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_anonymous: Option<bool>,
}

fn parse_timestamp(
    field: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, ClientError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| ClientError::Decode(format!("{}: '{}' ({})", field, raw, e))),
    }
}

impl TryFrom<ComplaintDto> for Complaint {
    type Error = ClientError;

    fn try_from(dto: ComplaintDto) -> Result<Self, Self::Error> {
        let status = match dto.estado.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(ComplaintStatus::parse(raw).ok_or_else(|| {
                ClientError::Decode(format!("estado: unknown value '{}'", raw))
            })?),
        };

        let complaint_id = dto.id.clone();
        let attachments = dto
            .archivos_adjuntos
            .unwrap_or_default()
            .into_iter()
            .map(|a| {
                let mut attachment = Attachment::from(a);
                if attachment.complaint_id.is_none() {
                    attachment.complaint_id = complaint_id.clone();
                }
                attachment
            })
            .collect();

        Ok(Self {
            id: dto.id,
            title: dto.titulo.unwrap_or_default(),
            description: dto.descripcion.unwrap_or_default(),
            created_at: parse_timestamp("fechaCreacion", dto.fecha_creacion)?,
            response_deadline: parse_timestamp("fechaLimiteRespuesta", dto.fecha_limite_respuesta)?,
            status,
            responding_office: dto.oficina_responder,
            attachments,
            submitter_full_name: dto.submitter_full_name,
            submitter_email: dto.submitter_email,
            submitter_phone: dto.submitter_phone_number,
            is_anonymous: dto.is_anonymous,
        })
    }
}

impl From<&Complaint> for ComplaintDto {
    fn from(c: &Complaint) -> Self {
        Self {
            id: c.id.clone(),
            titulo: Some(c.title.clone()),
            descripcion: Some(c.description.clone()),
            fecha_creacion: c.created_at.map(|d| d.to_rfc3339()),
            fecha_limite_respuesta: c.response_deadline.map(|d| d.to_rfc3339()),
            estado: c.status.map(|s| s.as_str().to_string()),
            oficina_responder: c.responding_office.clone(),
            archivos_adjuntos: Some(c.attachments.iter().map(AttachmentDto::from).collect()),
            submitter_full_name: c.submitter_full_name.clone(),
            submitter_email: c.submitter_email.clone(),
            submitter_phone_number: c.submitter_phone.clone(),
            is_anonymous: c.is_anonymous,
        }
    }
}

// =============================================================================
// Account
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AccountDto {
    pub login: String,
    #[serde(default)]
    pub authorities: Vec<String>,
}
