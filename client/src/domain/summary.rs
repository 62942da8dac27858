//! Claim limit usage and its reconciliation from partial payloads.
//!
//! The upstream service reports limit usage under several layouts and name
//! families, often with only one or two of the three figures present. All
//! families are treated as equally valid; none is canonical.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::raw::first_number;

const WRAPPER_KEYS: &[&str] = &["limit", "claimLimit"];

const LIMIT_IN_WRAPPER: &[&str] = &["effectiveClaimLimit", "limit", "total", "amount", "max"];
const LIMIT_AT_ROOT: &[&str] = &["effectiveClaimLimit", "limit", "total"];
const USED_IN_WRAPPER: &[&str] = &["usedClaimAmount", "used", "usedAmount", "consumed"];
const USED_AT_ROOT: &[&str] = &["usedClaimAmount", "used", "usedAmount"];
const REMAINING_IN_WRAPPER: &[&str] = &["remainingClaimLimit", "remaining"];
const REMAINING_AT_ROOT: &[&str] = &["remainingClaimLimit", "remaining"];

/// Limit usage for the signed-in caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Effective claim limit.
    pub limit: f64,
    /// Amount already committed by submitted or approved claims.
    pub used: f64,
    /// Headroom left before the limit is reached.
    pub remaining: f64,
}

impl Summary {
    /// Build a summary from explicit figures.
    pub fn new(limit: f64, used: f64, remaining: f64) -> Self {
        Self {
            limit,
            used,
            remaining,
        }
    }
}

/// Figures a single payload actually carried.
#[derive(Debug, Default)]
struct Observed {
    limit: Option<f64>,
    used: Option<f64>,
    remaining: Option<f64>,
}

impl Observed {
    fn from_payload(payload: &Value) -> Self {
        let roots = roots(payload);
        let wrappers: Vec<&Map<String, Value>> = roots
            .iter()
            .flat_map(|root| WRAPPER_KEYS.iter().filter_map(|key| root.get(*key)))
            .filter_map(Value::as_object)
            .collect();

        let lookup = |in_wrapper: &[&str], at_root: &[&str]| {
            wrappers
                .iter()
                .find_map(|wrapper| first_number(wrapper, in_wrapper))
                .or_else(|| roots.iter().find_map(|root| first_number(root, at_root)))
        };

        Self {
            limit: lookup(LIMIT_IN_WRAPPER, LIMIT_AT_ROOT),
            used: lookup(USED_IN_WRAPPER, USED_AT_ROOT),
            remaining: lookup(REMAINING_IN_WRAPPER, REMAINING_AT_ROOT),
        }
    }

    fn is_empty(&self) -> bool {
        self.limit.is_none() && self.used.is_none() && self.remaining.is_none()
    }

    /// Fill the one missing figure when the other two are known.
    fn derive_missing(self) -> Self {
        match (self.limit, self.used, self.remaining) {
            (Some(limit), Some(used), None) => Self {
                remaining: Some(limit - used),
                ..self
            },
            (Some(limit), None, Some(remaining)) => Self {
                used: Some(limit - remaining),
                ..self
            },
            (None, Some(used), Some(remaining)) => Self {
                limit: Some(used + remaining),
                ..self
            },
            _ => self,
        }
    }
}

/// The payload itself, then its `data` envelope.
fn roots(payload: &Value) -> Vec<&Map<String, Value>> {
    let Some(root) = payload.as_object() else {
        return Vec::new();
    };
    let mut roots = vec![root];
    if let Some(Value::Object(data)) = root.get("data") {
        roots.push(data);
    }
    roots
}

/// Reconcile `current` with whatever figures `payload` carries.
///
/// Each figure is taken from a nested wrapper first, then the root, then
/// derived from the other two payload figures, and finally kept from
/// `current`. A payload with no recognised figure leaves `current` as-is.
///
/// # Examples
/// ```
/// use claims_client::domain::{Summary, reconcile};
/// use serde_json::json;
///
/// let next = reconcile(&Summary::default(), &json!({ "limit": { "total": 1000 }, "used": 400 }));
/// assert_eq!(next, Summary::new(1000.0, 400.0, 600.0));
/// ```
pub fn reconcile(current: &Summary, payload: &Value) -> Summary {
    let observed = Observed::from_payload(payload);
    if observed.is_empty() {
        return *current;
    }

    let observed = observed.derive_missing();
    Summary {
        limit: observed.limit.unwrap_or(current.limit),
        used: observed.used.unwrap_or(current.used),
        remaining: observed.remaining.unwrap_or(current.remaining),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case::wrapper_and_root(json!({ "limit": { "total": 1000 }, "used": 400 }), Summary::new(1000.0, 400.0, 600.0))]
    #[case::data_envelope(
        json!({ "data": { "effectiveClaimLimit": 500, "remainingClaimLimit": 120 } }),
        Summary::new(500.0, 380.0, 120.0)
    )]
    #[case::claim_limit_wrapper(
        json!({ "claimLimit": { "max": "800", "consumed": "300", "remaining": 500 } }),
        Summary::new(800.0, 300.0, 500.0)
    )]
    #[case::limit_from_used_and_remaining(
        json!({ "usedAmount": 250, "remaining": 750 }),
        Summary::new(1000.0, 250.0, 750.0)
    )]
    #[case::wrapper_under_data(
        json!({ "data": { "limit": { "amount": 900, "used": 100 } } }),
        Summary::new(900.0, 100.0, 800.0)
    )]
    fn reconciles_payload_layouts(#[case] payload: Value, #[case] expected: Summary) {
        assert_eq!(reconcile(&Summary::default(), &payload), expected);
    }

    #[test]
    fn missing_figures_keep_previous_values() {
        let current = Summary::new(1000.0, 400.0, 600.0);
        let next = reconcile(&current, &json!({ "usedClaimAmount": 450 }));
        assert_eq!(next, Summary::new(1000.0, 450.0, 600.0));
    }

    #[rstest]
    #[case::no_figures(json!({ "claims": [] }))]
    #[case::non_numeric(json!({ "limit": "lots", "used": null }))]
    #[case::not_an_object(json!([1, 2, 3]))]
    fn payloads_without_figures_change_nothing(#[case] payload: Value) {
        let current = Summary::new(1000.0, 400.0, 600.0);
        assert_eq!(reconcile(&current, &payload), current);
    }

    #[test]
    fn wrapper_figures_win_over_root_figures() {
        let payload = json!({ "limit": { "total": 2000 }, "total": 10, "used": 0 });
        assert_eq!(reconcile(&Summary::default(), &payload).limit, 2000.0);
    }

    #[test]
    fn a_bare_numeric_limit_counts_as_a_root_figure() {
        let payload = json!({ "limit": 1500, "used": 500 });
        assert_eq!(
            reconcile(&Summary::default(), &payload),
            Summary::new(1500.0, 500.0, 1000.0)
        );
    }
}
