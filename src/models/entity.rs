use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Which actor an account belongs to. Each role lives in its own collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Ngo,
    Resort,
    Admin,
}

impl Role {
    pub fn collection(&self) -> &'static str {
        match self {
            Role::Ngo => "ngos",
            Role::Resort => "resorts",
            Role::Admin => "admins",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Ngo => "NGO",
            Role::Resort => "Resort",
            Role::Admin => "Admin",
        }
    }

    /// Key the profile is returned under in a login response.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Ngo => "ngo",
            Role::Resort => "resort",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub phone_no: String,
    pub location: String,
    pub address: String,
    #[serde(default)]
    pub is_certified: Option<bool>,
    pub approval_status: ApprovalStatus,
    // Only set once an approver has issued credentials.
    #[serde(default)]
    pub password_hash: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Entity {
    pub fn pending(role: Role, payload: &RegisterEntity) -> Self {
        let now = DateTime::now();
        Self {
            _id: None,
            role,
            name: payload.name.trim().to_string(),
            email: normalize_email(&payload.email),
            phone_no: payload.phone_no.trim().to_string(),
            location: payload.location.clone(),
            address: payload.address.clone().unwrap_or_default(),
            is_certified: match role {
                Role::Ngo => Some(payload.is_certified.unwrap_or(false)),
                _ => None,
            },
            approval_status: ApprovalStatus::Pending,
            password_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> crate::errors::Result<ObjectId> {
        self._id
            .ok_or_else(|| crate::errors::AppError::internal("entity without _id"))
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterEntity {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(default)]
    pub location: String,
    #[validate(length(min = 7, max = 16, message = "Invalid phone number"))]
    pub phone_no: String,
    #[serde(rename = "isCertified", default)]
    pub is_certified: Option<bool>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ApproveRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EntityQuery {
    pub status: Option<ApprovalStatus>,
}

#[derive(Debug, Serialize)]
pub struct EntityProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub location: String,
    pub phone_no: String,
    pub address: String,
    #[serde(rename = "isCertified", skip_serializing_if = "Option::is_none")]
    pub is_certified: Option<bool>,
    #[serde(rename = "adminApprovalStatus")]
    pub approval_status: ApprovalStatus,
}

impl From<Entity> for EntityProfile {
    fn from(entity: Entity) -> Self {
        EntityProfile {
            id: entity._id.map(|id| id.to_hex()).unwrap_or_default(),
            name: entity.name,
            email: entity.email,
            location: entity.location,
            phone_no: entity.phone_no,
            address: entity.address,
            is_certified: entity.is_certified,
            approval_status: entity.approval_status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    pub fn subject_id(&self) -> crate::errors::Result<ObjectId> {
        ObjectId::parse_str(&self.sub).map_err(|_| crate::errors::AppError::Unauthorized)
    }

    /// Caller must act as `role`; returns its id.
    pub fn require(&self, role: Role) -> crate::errors::Result<ObjectId> {
        if self.role != role {
            return Err(crate::errors::AppError::Forbidden);
        }
        self.subject_id()
    }
}
