//! User references carried on claims and the caller's session identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder display name used until a user has been resolved.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Validation errors raised by identifier constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdValidationError {
    /// The identifier was empty or contained only whitespace.
    Empty,
    /// The identifier carried leading or trailing whitespace.
    Untrimmed,
}

impl fmt::Display for IdValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "identifier must not be empty"),
            Self::Untrimmed => write!(f, "identifier must not carry surrounding whitespace"),
        }
    }
}

impl std::error::Error for IdValidationError {}

pub(crate) fn validate_id(raw: String) -> Result<String, IdValidationError> {
    if raw.trim().is_empty() {
        return Err(IdValidationError::Empty);
    }
    if raw.trim() != raw {
        return Err(IdValidationError::Untrimmed);
    }
    Ok(raw)
}

/// Stable upstream user identifier.
///
/// The upstream service issues opaque string ids, so the only invariant is
/// that the value is non-empty and trimmed.
///
/// # Examples
/// ```
/// use claims_client::domain::UserId;
///
/// let id = UserId::new("64f0c2").expect("valid id");
/// assert_eq!(id.as_ref(), "64f0c2");
/// assert!(UserId::new("  ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validate and construct a [`UserId`].
    pub fn new(id: impl Into<String>) -> Result<Self, IdValidationError> {
        validate_id(id.into()).map(Self)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl TryFrom<String> for UserId {
    type Error = IdValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// A user referenced from a claim.
///
/// ## Invariants
/// - `id` is always present; only `name` may lag behind as [`UNKNOWN_NAME`].
/// - `name` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    /// Upstream identifier.
    pub id: UserId,
    /// Display name, or [`UNKNOWN_NAME`] while unresolved.
    pub name: String,
    /// Contact address when the upstream exposed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserRef {
    /// Build a reference, substituting the sentinel for a blank name.
    pub fn new(id: UserId, name: impl Into<String>, email: Option<String>) -> Self {
        let name = name.into();
        let name = if name.trim().is_empty() {
            UNKNOWN_NAME.to_owned()
        } else {
            name
        };
        Self { id, name, email }
    }

    /// Build an unresolved reference carrying only an id.
    pub fn placeholder(id: UserId) -> Self {
        Self {
            id,
            name: UNKNOWN_NAME.to_owned(),
            email: None,
        }
    }

    /// Whether this reference carries a real display name.
    pub fn is_resolved(&self) -> bool {
        is_resolved_name(&self.name)
    }
}

/// Return true when `name` is a usable display name.
pub fn is_resolved_name(name: &str) -> bool {
    !name.trim().is_empty() && name != UNKNOWN_NAME
}

/// Caller role as reported by the authentication collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Submits own claims.
    Employee,
    /// Approves claims of direct reports.
    Manager,
    /// Reimburses approved claims across the organisation.
    Finance,
    /// Administers users and limits.
    Admin,
}

impl Role {
    /// Parse a role string, case-insensitively.
    ///
    /// Unrecognised roles map to [`Role::Employee`], the least privileged
    /// role, so an unexpected value never widens lookup permissions.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "manager" => Self::Manager,
            "finance" => Self::Finance,
            "admin" => Self::Admin,
            _ => Self::Employee,
        }
    }

    /// Elevated roles may look up any user directly.
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::Finance | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Employee => "employee",
            Self::Manager => "manager",
            Self::Finance => "finance",
            Self::Admin => "admin",
        })
    }
}

/// Identity of the signed-in caller, supplied by the session collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionIdentity {
    /// Caller's own user id.
    pub id: UserId,
    /// Caller's role.
    pub role: Role,
    /// Caller's display name, if known locally.
    pub name: Option<String>,
    /// Caller's email, if known locally.
    pub email: Option<String>,
    /// Id of the caller's direct manager, if any.
    pub manager_id: Option<UserId>,
}

impl SessionIdentity {
    /// Build an identity with no locally known profile details.
    pub fn new(id: UserId, role: Role) -> Self {
        Self {
            id,
            role,
            name: None,
            email: None,
            manager_id: None,
        }
    }

    /// Attach a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach an email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Attach the caller's manager id.
    #[must_use]
    pub fn with_manager(mut self, manager_id: UserId) -> Self {
        self.manager_id = Some(manager_id);
        self
    }

    /// The caller as a claim reference, using `name → email → "Unknown"`.
    pub fn as_user_ref(&self) -> UserRef {
        let name = self
            .name
            .as_deref()
            .filter(|name| is_resolved_name(name))
            .or_else(|| self.email.as_deref().filter(|email| is_resolved_name(email)))
            .unwrap_or(UNKNOWN_NAME);
        UserRef::new(self.id.clone(), name, self.email.clone())
    }
}

/// A user record fetched from the directory, after normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryUser {
    /// The user as a claim reference.
    pub user: UserRef,
    /// Role reported by the directory, when present.
    pub role: Option<Role>,
    /// The user's direct manager, when present.
    pub manager_id: Option<UserId>,
}
