//! Normalisation of raw claim and user records into canonical values.
//!
//! Every upstream record passes through here before entering the data
//! model. The functions are pure and never fail: malformed input degrades to
//! defaults (`0`, `"Unknown"`, `draft`).

use serde_json::{Map, Value};

use super::claim::{Claim, ClaimId, ClaimStatus};
use super::raw::{
    EntityShape, NumberShape, first, first_string, first_text, first_timestamp,
};
use super::user::{DirectoryUser, Role, UNKNOWN_NAME, UserId, UserRef, is_resolved_name};

/// Where a referenced entity may live on a raw claim.
struct EntityKeys {
    /// Embedded-object or bare-id aliases, first usable wins.
    embedded: &'static [&'static str],
    /// Denormalised sibling id field.
    sibling_id: &'static str,
    /// Denormalised sibling name field.
    sibling_name: &'static str,
    /// Denormalised sibling email field.
    sibling_email: &'static str,
}

const CREATOR_KEYS: EntityKeys = EntityKeys {
    embedded: &["createdBy", "user", "owner"],
    sibling_id: "createdById",
    sibling_name: "createdByName",
    sibling_email: "createdByEmail",
};

const MANAGER_KEYS: EntityKeys = EntityKeys {
    embedded: &["manager"],
    sibling_id: "managerId",
    sibling_name: "managerName",
    sibling_email: "managerEmail",
};

const ID_KEYS: &[&str] = &["_id", "id"];

/// Normalise one raw claim record.
///
/// Accepts bare-id, embedded-object and denormalised-sibling layouts for
/// the creator and manager references. Serialising the result and
/// normalising it again yields an equal claim.
///
/// # Examples
/// ```
/// use claims_client::domain::{ClaimStatus, normalize};
/// use serde_json::json;
///
/// let claim = normalize(&json!({
///     "_id": "c1",
///     "user": "u1",
///     "manager": { "_id": "m1", "name": "Alice" },
///     "amount": "42.5",
///     "status": "DRAFT"
/// }));
///
/// assert_eq!(claim.amount, 42.5);
/// assert_eq!(claim.status, ClaimStatus::Draft);
/// assert_eq!(claim.created_by.expect("creator").name, "Unknown");
/// assert_eq!(claim.manager.expect("manager").name, "Alice");
/// ```
pub fn normalize(raw: &Value) -> Claim {
    let empty = Map::new();
    let object = raw.as_object().unwrap_or(&empty);

    Claim {
        id: first_text(object, ID_KEYS).and_then(|id| ClaimId::new(id).ok()),
        title: first_string(object, &["title"]).unwrap_or_default(),
        description: first_string(object, &["description"]).unwrap_or_default(),
        amount: NumberShape::classify(object.get("amount"))
            .finite()
            .unwrap_or(0.0),
        status: first_text(object, &["status"])
            .and_then(|status| ClaimStatus::parse(&status))
            .unwrap_or_default(),
        receipt_url: first_text(object, &["receiptUrl", "receipt"]),
        created_by: entity(object, &CREATOR_KEYS),
        manager: entity(object, &MANAGER_KEYS),
        rejection_reason: first_string(object, &["rejectionReason", "reason"]).unwrap_or_default(),
        created_at: first_timestamp(object, &["createdAt"]),
        updated_at: first_timestamp(object, &["updatedAt"]),
        submitted_at: first_timestamp(object, &["submittedAt"]),
        approved_at: first_timestamp(object, &["approvedAt", "approvalDate", "approvedDate"]),
        reimbursed_at: first_timestamp(object, &["reimbursedAt"]),
    }
}

/// Normalise a raw user record returned by the directory.
///
/// Returns `None` when the record carries no usable id. The record may be
/// wrapped as `{ "user": { .. } }`.
pub fn normalize_user(raw: &Value) -> Option<DirectoryUser> {
    let object = match raw {
        Value::Object(map) => match map.get("user") {
            Some(Value::Object(inner)) => inner,
            _ => map,
        },
        _ => return None,
    };

    let partial = PartialUser::from_embedded(object);
    let user = partial.into_user_ref()?;
    let manager_id = match EntityShape::classify(object.get("manager")) {
        EntityShape::BareId(value) => super::raw::text(value),
        EntityShape::Embedded(manager) => first_text(manager, ID_KEYS),
        EntityShape::Absent | EntityShape::Unrecognised => None,
    }
    .or_else(|| first_text(object, &["managerId"]))
    .and_then(|id| UserId::new(id).ok());
    let role = first_text(object, &["role"]).map(|role| Role::parse_lenient(&role));

    Some(DirectoryUser {
        user,
        role,
        manager_id,
    })
}

fn entity(object: &Map<String, Value>, keys: &EntityKeys) -> Option<UserRef> {
    let siblings = PartialUser::from_siblings(object, keys);
    let shape = keys
        .embedded
        .iter()
        .map(|key| EntityShape::classify(object.get(*key)))
        .find(EntityShape::is_usable)
        .unwrap_or(EntityShape::Absent);

    let primary = match shape {
        EntityShape::BareId(value) => PartialUser {
            id: super::raw::text(value),
            ..PartialUser::default()
        },
        EntityShape::Embedded(map) => PartialUser::from_embedded(map),
        EntityShape::Absent | EntityShape::Unrecognised => return siblings.into_user_ref(),
    };

    primary.fill_gaps_from(siblings).into_user_ref()
}

/// A user reference assembled from whichever fields a payload provided.
#[derive(Debug, Default)]
struct PartialUser {
    id: Option<String>,
    name: Option<String>,
    full_name: Option<String>,
    email: Option<String>,
}

impl PartialUser {
    fn from_embedded(map: &Map<String, Value>) -> Self {
        Self {
            id: first_text(map, ID_KEYS),
            name: display_text(map, "name"),
            full_name: display_text(map, "fullName"),
            email: display_text(map, "email"),
        }
    }

    fn from_siblings(object: &Map<String, Value>, keys: &EntityKeys) -> Self {
        Self {
            id: first_text(object, &[keys.sibling_id]),
            name: display_text(object, keys.sibling_name),
            full_name: None,
            email: display_text(object, keys.sibling_email),
        }
    }

    /// Keep every field already present; take the rest from `other`.
    fn fill_gaps_from(self, other: Self) -> Self {
        let name = self.name.or(self.full_name).or(other.name);
        Self {
            id: self.id.or(other.id),
            name,
            full_name: None,
            email: self.email.or(other.email),
        }
    }

    fn into_user_ref(self) -> Option<UserRef> {
        let id = UserId::new(self.id?).ok()?;
        let name = self
            .name
            .or(self.full_name)
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| UNKNOWN_NAME.to_owned());
        Some(UserRef::new(id, name, self.email))
    }
}

/// A display string, treating blanks and the sentinel as missing.
fn display_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    first(object, &[key])
        .and_then(Value::as_str)
        .filter(|candidate| is_resolved_name(candidate))
        .map(str::to_owned)
}
