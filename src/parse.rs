use chrono::{DateTime, SecondsFormat};
use serde_json::Value;

use crate::review::RawReviewRecord;
use crate::{Error, Result};

/// Attempts to parse a customer review feed document.
///
/// The feed leaves `feed.entry` out when there are no reviews and collapses it to a
/// bare object when there is exactly one, so all three shapes are accepted.
pub(crate) fn parse_feed(doc: &Value) -> Result<Vec<RawReviewRecord>> {
    let feed = doc
        .get("feed")
        .ok_or_else(|| Error::UnexpectedShape("document has no `feed`".into()))?;

    let entries: Vec<&Value> = match feed.get("entry") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries.iter().collect(),
        Some(entry @ Value::Object(_)) => vec![entry],
        Some(other) => {
            return Err(Error::UnexpectedShape(format!(
                "`feed.entry` is neither an object nor an array: {other}"
            )))
        }
    };

    Ok(entries.into_iter().map(parse_entry).collect())
}

/// Extracts the numeric track id from an app lookup response.
pub(crate) fn parse_lookup(doc: &Value) -> Result<Option<String>> {
    let results = doc
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::UnexpectedShape("lookup has no `results` array".into()))?;

    Ok(results
        .first()
        .and_then(|app| app.get("trackId"))
        .and_then(Value::as_u64)
        .map(|id| id.to_string()))
}

/// One page of a Play Store review batch together with the cursor to the next one.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct PlayPage {
    pub records: Vec<RawReviewRecord>,
    pub next_token: Option<String>,
}

/// Attempts to parse a Play Store `batchexecute` review response.
///
/// The body starts with an anti-hijacking `)]}'` line, the review payload is itself
/// a JSON string stored at `[0][2]` and is `null` when the app has no reviews.
pub(crate) fn parse_play_batch(body: &str) -> Result<PlayPage> {
    let body = body.trim_start();
    let body = body.strip_prefix(")]}'").unwrap_or(body);
    let envelope: Value = serde_json::from_str(body)?;

    let payload: Value = match at(&envelope, &[0, 2]) {
        None | Some(Value::Null) => return Ok(PlayPage::default()),
        Some(Value::String(payload)) => serde_json::from_str(payload)?,
        Some(other) => {
            return Err(Error::UnexpectedShape(format!(
                "review batch payload is not a string: {other}"
            )))
        }
    };

    let records = match payload.get(0) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries.iter().map(parse_play_entry).collect(),
        Some(other) => {
            return Err(Error::UnexpectedShape(format!(
                "review batch entries are not an array: {other}"
            )))
        }
    };
    let next_token = at(&payload, &[1, 1])
        .and_then(Value::as_str)
        .map(String::from);

    Ok(PlayPage { records, next_token })
}

/// Play entries are positional: `[id, [name, ..], score, _, text, [secs, nanos], ..,
/// version at 10]`.
fn parse_play_entry(entry: &Value) -> RawReviewRecord {
    let text = |path: &[usize]| at(entry, path).and_then(Value::as_str).map(String::from);

    RawReviewRecord {
        user_name: text(&[1, 0]),
        date: at(entry, &[5, 0])
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|date| date.to_rfc3339_opts(SecondsFormat::Millis, true)),
        updated: None,
        score: at(entry, &[2])
            .and_then(Value::as_u64)
            .and_then(|s| u32::try_from(s).ok()),
        text: text(&[4]),
        version: text(&[10]),
    }
}

#[inline]
fn at<'a>(node: &'a Value, path: &[usize]) -> Option<&'a Value> {
    path.iter().try_fold(node, |node, idx| node.get(idx))
}

fn parse_entry(entry: &Value) -> RawReviewRecord {
    RawReviewRecord {
        user_name: label(entry, &["author", "name"]),
        date: None,
        updated: label(entry, &["updated"]),
        score: label(entry, &["im:rating"]).and_then(|s| s.trim().parse().ok()),
        text: label(entry, &["content"]),
        version: label(entry, &["im:version"]),
    }
}

/// Follows `path` and returns the `label` string found there.
#[inline]
fn label(entry: &Value, path: &[&str]) -> Option<String> {
    let node = path.iter().try_fold(entry, |node, key| node.get(key))?;
    node.get("label")?.as_str().map(String::from)
}
