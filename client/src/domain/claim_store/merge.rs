//! Merge rules for writing resolved names and re-fetched records.
//!
//! Every function here is monotonic: a resolved name is never replaced by
//! the sentinel and a reference id is never replaced. Applying the same
//! resolutions in any order, any number of times, yields the same claims.

use crate::domain::claim::{Claim, ClaimField, ClaimId};
use crate::domain::user::UserRef;

const FIELDS: [ClaimField; 2] = [ClaimField::CreatedBy, ClaimField::Manager];

/// Write `resolved` into `slot` when the ids match and the name is real.
///
/// Returns whether the slot changed.
pub(crate) fn apply_resolution(slot: &mut Option<UserRef>, resolved: &UserRef) -> bool {
    let Some(current) = slot.as_mut() else {
        return false;
    };
    if current.id != resolved.id || !resolved.is_resolved() {
        return false;
    }

    let email = resolved.email.clone().or_else(|| current.email.clone());
    if current.name == resolved.name && current.email == email {
        return false;
    }
    current.name.clone_from(&resolved.name);
    current.email = email;
    true
}

/// Write `resolved` into every matching reference of `claim`.
pub(crate) fn apply_to_claim(claim: &mut Claim, resolved: &UserRef) -> bool {
    FIELDS
        .iter()
        .fold(false, |changed, field| {
            apply_resolution(claim.user_slot_mut(*field), resolved) || changed
        })
}

/// Keep what `previous` already knew about the same claim.
///
/// Resolved names for the same reference id carry over, and a reference the
/// incoming record omits is kept rather than erased.
pub(crate) fn carry_forward(previous: &Claim, mut incoming: Claim) -> Claim {
    for field in FIELDS {
        let Some(known) = previous.user(field) else {
            continue;
        };
        let slot = incoming.user_slot_mut(field);
        if slot.is_none() {
            *slot = Some(known.clone());
        } else {
            apply_resolution(slot, known);
        }
    }
    incoming
}

/// Replace the claim with the same id, or append it.
pub(crate) fn upsert(claims: &mut Vec<Claim>, incoming: Claim) -> Claim {
    match claims
        .iter_mut()
        .find(|existing| existing.id.is_some() && existing.id == incoming.id)
    {
        Some(existing) => {
            let merged = carry_forward(existing, incoming);
            *existing = merged.clone();
            merged
        }
        None => {
            claims.push(incoming.clone());
            incoming
        }
    }
}

/// Replace the whole collection with `incoming`, carrying forward names.
pub(crate) fn replace_all(claims: &mut Vec<Claim>, incoming: Vec<Claim>) {
    let merged = incoming
        .into_iter()
        .map(|claim| {
            match claims
                .iter()
                .find(|existing| existing.id.is_some() && existing.id == claim.id)
            {
                Some(existing) => carry_forward(existing, claim),
                None => claim,
            }
        })
        .collect();
    *claims = merged;
}

/// Remove the claim with `id`. Returns whether one was removed.
pub(crate) fn remove(claims: &mut Vec<Claim>, id: &ClaimId) -> bool {
    let before = claims.len();
    claims.retain(|claim| claim.id.as_ref() != Some(id));
    claims.len() != before
}
