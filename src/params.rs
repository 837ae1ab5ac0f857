//! Tracking parameter preservation
//!
//! Carries the query string of an inbound click forward onto the chosen
//! destination URL, so tracking tags survive redirection no matter which
//! routing branch fired. Total: malformed input degrades to the destination
//! URL unchanged, never an error.

use std::collections::HashSet;
use url::Url;

/// Merges the incoming URL's query parameters onto the destination URL
///
/// Destination-native parameters win on key collision; incoming pairs are
/// appended only for keys the destination does not already carry. When
/// either URL fails to parse, or there is nothing to add, the destination
/// URL is returned unchanged (which also makes the merge idempotent).
pub fn preserve_params(incoming_url: &str, destination_url: &str) -> String {
    let Ok(mut destination) = Url::parse(destination_url) else {
        return destination_url.to_string();
    };
    let Some(incoming) = parse_incoming(incoming_url) else {
        return destination_url.to_string();
    };

    let existing: HashSet<String> = destination
        .query_pairs()
        .map(|(key, _)| key.into_owned())
        .collect();

    let carried: Vec<(String, String)> = incoming
        .query_pairs()
        .filter(|(key, _)| !existing.contains(key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if carried.is_empty() {
        return destination_url.to_string();
    }

    {
        let mut pairs = destination.query_pairs_mut();
        for (key, value) in &carried {
            pairs.append_pair(key, value);
        }
    }

    destination.into()
}

/// Parses the incoming request URL
///
/// Edge handlers usually observe a path-relative URI ("/abc123?utm=x"), so
/// relative input is resolved against a placeholder origin just to read its
/// query string.
fn parse_incoming(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse("http://click.invalid").ok()?.join(raw).ok()
        }
        Err(_) => None,
    }
}
