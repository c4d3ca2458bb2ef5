use anyhow::Context as _;
use axum::http::StatusCode;
use serde_json::Value;

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(actual, expected, "unexpected status for {context}");
}

/// `items` of a list response, checked against its `count`.
pub fn get_items(body: &Value) -> anyhow::Result<&Vec<Value>> {
    let items = body
        .get("items")
        .and_then(|v| v.as_array())
        .context("response has an items array")?;
    assert_eq!(
        body.get("count").and_then(|v| v.as_u64()),
        Some(items.len() as u64),
        "count must match the number of items"
    );
    Ok(items)
}

/// `encounter_id` of every item, in response order.
pub fn encounter_ids(body: &Value) -> anyhow::Result<Vec<String>> {
    Ok(get_items(body)?
        .iter()
        .filter_map(|item| item.get("encounter_id").and_then(|v| v.as_str()))
        .map(str::to_string)
        .collect())
}

/// Validation messages from a 400 response.
pub fn error_details(body: &Value) -> Vec<String> {
    body.get("details")
        .and_then(|v| v.as_array())
        .map(|details| {
            details
                .iter()
                .filter_map(|d| d.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
