//! Envelope handling for claims service responses.
//!
//! The service wraps records inconsistently (`{claim}`, `{data:{items}}`,
//! `{managers}`, bare arrays). These helpers peel the envelopes off and hand
//! the raw records to the domain untouched.

use serde_json::{Map, Value};

use crate::domain::ports::{RawClaimList, RawClaimRecord};

const LIST_KEYS: [&str; 3] = ["items", "claims", "data"];
const PAGE_COUNT_KEYS: [&str; 2] = ["totalPages", "pages"];
const PAGE_META_KEYS: [&str; 7] = [
    "page",
    "totalPages",
    "pages",
    "totalItems",
    "sortBy",
    "sortDir",
    "status",
];

/// Decode a claim listing.
///
/// Paging metadata is stripped from the summary fragment: a paged listing's
/// numeric `limit` is the page size, not the claim limit.
pub(super) fn claim_list(body: Value) -> Result<RawClaimList, String> {
    match body {
        Value::Array(claims) => Ok(RawClaimList {
            claims,
            summary_fragment: None,
            total_pages: None,
        }),
        Value::Object(mut root) => {
            let mut data = match root.remove("data") {
                Some(Value::Object(data)) => Some(data),
                Some(Value::Array(claims)) => {
                    let total_pages = page_count(&root);
                    strip_page_meta(&mut root);
                    return Ok(RawClaimList {
                        claims,
                        summary_fragment: fragment(root),
                        total_pages,
                    });
                }
                Some(other) => {
                    root.insert("data".to_owned(), other);
                    None
                }
                None => None,
            };

            let (claims, total_pages) = match data.as_mut().and_then(take_page) {
                Some(page) => page,
                None => take_page(&mut root).unwrap_or_default(),
            };
            let total_pages = total_pages.or_else(|| page_count(&root));
            if let Some(data) = data.filter(|data| !data.is_empty()) {
                root.insert("data".to_owned(), Value::Object(data));
            }
            Ok(RawClaimList {
                claims,
                summary_fragment: fragment(root),
                total_pages,
            })
        }
        Value::Null => Ok(RawClaimList::default()),
        other => Err(format!("expected a claim listing, got {}", kind_of(&other))),
    }
}

/// Decode a single-claim response, keeping sibling fields as a summary
/// fragment.
pub(super) fn claim_record(body: Value) -> Result<RawClaimRecord, String> {
    let Value::Object(mut root) = body else {
        return Err(format!("expected a claim object, got {}", kind_of(&body)));
    };

    if let Some(claim) = take_object(&mut root, "claim") {
        return Ok(RawClaimRecord {
            claim,
            summary_fragment: fragment(root),
        });
    }
    if let Some(Value::Object(data)) = root.get_mut("data")
        && let Some(claim) = take_object(data, "claim")
    {
        return Ok(RawClaimRecord {
            claim,
            summary_fragment: fragment(root),
        });
    }
    if let Some(data) = take_object(&mut root, "data") {
        return Ok(RawClaimRecord {
            claim: data,
            summary_fragment: fragment(root),
        });
    }
    Ok(RawClaimRecord {
        claim: Value::Object(root),
        summary_fragment: None,
    })
}

/// Unwrap `{claim}` or `{data}` around a claim detail.
pub(super) fn claim_detail(body: Value) -> Result<Value, String> {
    claim_record(body).map(|record| record.claim)
}

/// Unwrap a single user record under `key` (`user` or `manager`).
///
/// Returns `None` when the service answers with `null` or an empty object.
pub(super) fn user_record(body: Value, key: &str) -> Option<Value> {
    let Value::Object(mut root) = body else {
        return None;
    };
    if root.get(key).is_some_and(Value::is_null) {
        return None;
    }

    let nested = match root.get_mut("data") {
        Some(Value::Object(data)) => take_object(data, key),
        _ => None,
    };
    let record = match take_object(&mut root, key).or(nested) {
        Some(record) => record,
        None => take_object(&mut root, "data").unwrap_or(Value::Object(root)),
    };
    match &record {
        Value::Object(fields) if !fields.is_empty() => Some(record),
        _ => None,
    }
}

/// Unwrap a list of user or limit records.
pub(super) fn record_list(body: Value, keys: &[&str]) -> Result<Vec<Value>, String> {
    match body {
        Value::Array(records) => Ok(records),
        Value::Object(mut root) => {
            for key in keys.iter().copied().chain(LIST_KEYS) {
                match root.remove(key) {
                    Some(Value::Array(records)) => return Ok(records),
                    Some(Value::Object(mut nested)) => {
                        if let Some(records) = keys
                            .iter()
                            .copied()
                            .chain(LIST_KEYS)
                            .find_map(|inner| take_array(&mut nested, inner))
                        {
                            return Ok(records);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Vec::new())
        }
        Value::Null => Ok(Vec::new()),
        other => Err(format!("expected a record list, got {}", kind_of(&other))),
    }
}

/// Take the records and page count out of `fields`.
fn take_page(fields: &mut Map<String, Value>) -> Option<(Vec<Value>, Option<u32>)> {
    let (key, claims) = LIST_KEYS
        .iter()
        .find_map(|key| take_array(fields, key).map(|claims| (*key, claims)))?;
    let total_pages = page_count(fields);
    if key != "claims" {
        strip_page_meta(fields);
    }
    Some((claims, total_pages))
}

fn strip_page_meta(fields: &mut Map<String, Value>) {
    for key in PAGE_META_KEYS {
        fields.remove(key);
    }
    if fields.get("limit").is_some_and(|limit| !limit.is_object()) {
        fields.remove("limit");
    }
}

fn take_array(fields: &mut Map<String, Value>, key: &str) -> Option<Vec<Value>> {
    match fields.remove(key) {
        Some(Value::Array(records)) => Some(records),
        Some(other) => {
            fields.insert(key.to_owned(), other);
            None
        }
        None => None,
    }
}

fn take_object(fields: &mut Map<String, Value>, key: &str) -> Option<Value> {
    match fields.remove(key) {
        Some(Value::Object(record)) => Some(Value::Object(record)),
        Some(other) => {
            fields.insert(key.to_owned(), other);
            None
        }
        None => None,
    }
}

fn page_count(fields: &Map<String, Value>) -> Option<u32> {
    PAGE_COUNT_KEYS
        .iter()
        .filter_map(|key| fields.get(*key))
        .find_map(|value| match value {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
        .map(|pages| u32::try_from(pages).unwrap_or(u32::MAX))
}

fn fragment(fields: Map<String, Value>) -> Option<Value> {
    (!fields.is_empty()).then_some(Value::Object(fields))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
