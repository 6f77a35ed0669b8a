//! Extraction of story metadata from a story page.
//!
//! Story pages are server-rendered and carry their hydration state as JSON in
//! a `<script id="__NEXT_DATA__" type="application/json">` element. Extraction
//! happens in two steps:
//!
//! 1. **Locate** the payload text inside the HTML. This is the fragile part and
//!    is swappable: [`RegexExtractor`] pattern-matches the raw markup,
//!    [`HtmlExtractor`] runs a DOM query.
//! 2. **Interpret** the JSON (shared by every strategy, see [`interpret`]).
//!
//! # Payload shape
//!
//! ```text
//! props.pageProps
//! ├── userProfile            absent => user not found
//! │   ├── $case              discriminator, e.g. "publicProfileInfo"
//! │   └── <$case>            the identity payload
//! └── story                  absent => no stories
//!     └── snapList[]     missing => malformed, empty => no stories
//!         ├── snapId.value
//!         ├── snapUrls.mediaUrl
//!         ├── snapMediaType
//!         └── timestampInSec.value
//! ```

use crate::models::{FetchResult, MediaType, StoryItem, UserIdentity};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

static NEXT_DATA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<script\s*id="__NEXT_DATA__"\s*type="application/json"[^>]*>(.*?)</script>"#)
        .unwrap()
});

static NEXT_DATA_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script#__NEXT_DATA__[type="application/json"]"#).unwrap());

/// Strategy for pulling story data out of a page body.
pub trait Extractor: Send + Sync {
    /// Return the raw text of the embedded-data payload, if the page has one.
    fn payload(&self, body: &str) -> Option<String>;

    /// Turn a page body into a [`FetchResult`] for `username`.
    fn extract(&self, username: &str, body: &str) -> FetchResult {
        match self.payload(body) {
            Some(text) => interpret(username, &text),
            None => FetchResult::malformed("no __NEXT_DATA__ script block in page"),
        }
    }
}

/// Finds the payload with a regular expression over the raw markup.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexExtractor;

impl Extractor for RegexExtractor {
    fn payload(&self, body: &str) -> Option<String> {
        let mut matches = NEXT_DATA_RE.captures_iter(body);
        let first = matches.next()?.get(1)?.as_str().to_string();
        let extra = matches.count();
        if extra > 0 {
            debug!(extra, "Multiple __NEXT_DATA__ blocks; using the first");
        }
        Some(first)
    }
}

/// Finds the payload by parsing the document and querying for the script element.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn payload(&self, body: &str) -> Option<String> {
        let document = Html::parse_document(body);
        document
            .select(&NEXT_DATA_SELECTOR)
            .next()
            .map(|element| element.text().collect::<String>())
    }
}

/// Interpret a decoded `__NEXT_DATA__` document.
///
/// Every structural problem collapses into [`FetchResult::MalformedResponse`];
/// only a missing `userProfile` means [`FetchResult::NotFound`].
pub fn interpret(username: &str, json_text: &str) -> FetchResult {
    let document: Value = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => return FetchResult::malformed(format!("payload is not valid JSON: {e}")),
    };

    let Some(page_props) = document.pointer("/props/pageProps") else {
        return FetchResult::malformed("payload has no props.pageProps");
    };

    let Some(profile) = page_props.get("userProfile") else {
        return FetchResult::NotFound;
    };

    let identity = match user_identity(username, profile) {
        Ok(identity) => identity,
        Err(reason) => return FetchResult::malformed(reason),
    };

    let Some(story) = page_props.get("story") else {
        return FetchResult::NoStories;
    };

    let snaps = match story.get("snapList").and_then(Value::as_array) {
        Some(list) => list,
        None => return FetchResult::malformed("story has no snapList array"),
    };
    if snaps.is_empty() {
        return FetchResult::NoStories;
    }

    match snaps.iter().map(story_item).collect::<Result<Vec<_>, _>>() {
        Ok(items) => FetchResult::Stories(items, identity),
        Err(reason) => {
            warn!(%username, %reason, "Rejecting snap list");
            FetchResult::malformed(reason)
        }
    }
}

fn user_identity(username: &str, profile: &Value) -> Result<UserIdentity, String> {
    let kind = profile
        .get("$case")
        .and_then(Value::as_str)
        .ok_or_else(|| "userProfile has no $case discriminator".to_string())?;
    let payload = profile
        .get(kind)
        .ok_or_else(|| format!("userProfile has no '{kind}' variant"))?;

    Ok(UserIdentity {
        username: username.to_string(),
        kind: kind.to_string(),
        profile: payload.clone(),
    })
}

fn story_item(snap: &Value) -> Result<StoryItem, String> {
    let id = snap
        .pointer("/snapId/value")
        .and_then(Value::as_str)
        .ok_or_else(|| "snap is missing snapId.value".to_string())?;

    let media_url = snap
        .pointer("/snapUrls/mediaUrl")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("snap {id} is missing snapUrls.mediaUrl"))?;
    Url::parse(media_url).map_err(|e| format!("snap {id} has an invalid media URL: {e}"))?;

    let media_type = snap
        .get("snapMediaType")
        .and_then(Value::as_i64)
        .map(MediaType::from_code)
        .ok_or_else(|| format!("snap {id} is missing snapMediaType"))?;

    let timestamp_secs = snap
        .pointer("/timestampInSec/value")
        .and_then(|v| match v {
            Value::String(s) => s.trim().parse::<i64>().ok(),
            other => other.as_i64(),
        })
        .ok_or_else(|| format!("snap {id} is missing a numeric timestampInSec.value"))?;

    Ok(StoryItem {
        id: id.to_string(),
        media_url: media_url.to_string(),
        media_type,
        timestamp_secs,
        raw: snap.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{next_data, snap, story_page};
    use serde_json::json;

    fn both() -> [Box<dyn Extractor>; 2] {
        [Box::new(RegexExtractor), Box::new(HtmlExtractor)]
    }

    #[test]
    fn test_extracts_stories_and_identity() {
        let body = story_page(&next_data(vec![
            snap("a1", 0, "1700000000"),
            snap("b2", 1, "1700000060"),
        ]));

        for extractor in both() {
            match extractor.extract("alice", &body) {
                FetchResult::Stories(items, identity) => {
                    assert_eq!(items.len(), 2);
                    assert_eq!(items[0].id, "a1");
                    assert_eq!(items[0].media_type, MediaType::Image);
                    assert_eq!(items[0].timestamp_secs, 1_700_000_000);
                    assert_eq!(items[0].media_url, "https://cf-st.sc-cdn.net/d/a1");
                    assert_eq!(items[1].id, "b2");
                    assert_eq!(items[1].media_type, MediaType::Video);
                    assert_eq!(identity.username, "alice");
                    assert_eq!(identity.kind, "publicProfileInfo");
                    assert_eq!(identity.profile["title"], "Alice");
                }
                other => panic!("expected stories, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_preserves_source_order() {
        let ids = ["z", "a", "m", "b"];
        let snaps = ids.iter().map(|id| snap(id, 0, "1700000000")).collect();
        let body = story_page(&next_data(snaps));

        let FetchResult::Stories(items, _) = RegexExtractor.extract("alice", &body) else {
            panic!("expected stories");
        };
        let got: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(got, ids);
    }

    #[test]
    fn test_missing_script_block_is_malformed() {
        let body = "<html><body><script>var x = 1;</script></body></html>";
        for extractor in both() {
            assert!(matches!(
                extractor.extract("alice", body),
                FetchResult::MalformedResponse { .. }
            ));
        }
    }

    #[test]
    fn test_undecodable_payload_is_malformed() {
        let body = r#"<script id="__NEXT_DATA__" type="application/json">{"props": </script>"#;
        for extractor in both() {
            assert!(matches!(
                extractor.extract("alice", body),
                FetchResult::MalformedResponse { .. }
            ));
        }
    }

    #[test]
    fn test_missing_page_props_is_malformed() {
        let body = story_page(&json!({ "props": {} }));
        assert!(matches!(
            RegexExtractor.extract("alice", &body),
            FetchResult::MalformedResponse { .. }
        ));
    }

    #[test]
    fn test_missing_user_profile_is_not_found() {
        let body = story_page(&json!({ "props": { "pageProps": { "story": { "snapList": [] } } } }));
        for extractor in both() {
            assert!(matches!(extractor.extract("ghost", &body), FetchResult::NotFound));
        }
    }

    #[test]
    fn test_missing_discriminator_variant_is_malformed() {
        let body = story_page(&json!({
            "props": { "pageProps": { "userProfile": { "$case": "publicProfileInfo" } } }
        }));
        assert!(matches!(
            RegexExtractor.extract("alice", &body),
            FetchResult::MalformedResponse { .. }
        ));
    }

    #[test]
    fn test_missing_story_is_no_stories() {
        let mut data = next_data(vec![]);
        data["props"]["pageProps"]
            .as_object_mut()
            .unwrap()
            .remove("story");
        let body = story_page(&data);
        assert!(matches!(RegexExtractor.extract("alice", &body), FetchResult::NoStories));
    }

    #[test]
    fn test_story_without_snap_list_is_malformed() {
        let mut data = next_data(vec![]);
        data["props"]["pageProps"]["story"]
            .as_object_mut()
            .unwrap()
            .remove("snapList");
        let body = story_page(&data);
        for extractor in both() {
            assert!(matches!(
                extractor.extract("alice", &body),
                FetchResult::MalformedResponse { .. }
            ));
        }
    }

    #[test]
    fn test_empty_snap_list_is_no_stories() {
        let body = story_page(&next_data(vec![]));
        for extractor in both() {
            assert!(matches!(extractor.extract("alice", &body), FetchResult::NoStories));
        }
    }

    #[test]
    fn test_snap_without_id_is_malformed() {
        let mut bad = snap("x", 0, "1700000000");
        bad.as_object_mut().unwrap().remove("snapId");
        let body = story_page(&next_data(vec![snap("ok", 0, "1700000000"), bad]));
        assert!(matches!(
            RegexExtractor.extract("alice", &body),
            FetchResult::MalformedResponse { .. }
        ));
    }

    #[test]
    fn test_snap_without_timestamp_is_malformed() {
        let mut bad = snap("x", 0, "1700000000");
        bad.as_object_mut().unwrap().remove("timestampInSec");
        let body = story_page(&next_data(vec![bad]));
        assert!(matches!(
            RegexExtractor.extract("alice", &body),
            FetchResult::MalformedResponse { .. }
        ));
    }

    #[test]
    fn test_non_numeric_timestamp_is_malformed() {
        let body = story_page(&next_data(vec![snap("x", 0, "yesterday")]));
        assert!(matches!(
            RegexExtractor.extract("alice", &body),
            FetchResult::MalformedResponse { .. }
        ));
    }

    #[test]
    fn test_numeric_timestamp_accepted() {
        let mut s = snap("x", 0, "0");
        s["timestampInSec"]["value"] = json!(1_700_000_123);
        let body = story_page(&next_data(vec![s]));
        let FetchResult::Stories(items, _) = RegexExtractor.extract("alice", &body) else {
            panic!("expected stories");
        };
        assert_eq!(items[0].timestamp_secs, 1_700_000_123);
    }

    #[test]
    fn test_unknown_media_type_is_kept() {
        let body = story_page(&next_data(vec![snap("x", 9, "1700000000")]));
        let FetchResult::Stories(items, _) = HtmlExtractor.extract("alice", &body) else {
            panic!("expected stories");
        };
        assert_eq!(items[0].media_type, MediaType::Other(9));
    }

    #[test]
    fn test_relative_media_url_is_malformed() {
        let mut s = snap("x", 0, "1700000000");
        s["snapUrls"]["mediaUrl"] = json!("/d/x");
        let body = story_page(&next_data(vec![s]));
        assert!(matches!(
            RegexExtractor.extract("alice", &body),
            FetchResult::MalformedResponse { .. }
        ));
    }

    #[test]
    fn test_raw_snap_is_retained() {
        let body = story_page(&next_data(vec![snap("x", 1, "1700000000")]));
        let FetchResult::Stories(items, _) = RegexExtractor.extract("alice", &body) else {
            panic!("expected stories");
        };
        assert_eq!(items[0].raw["snapIndex"], 0);
        assert_eq!(items[0].raw["snapId"]["value"], "x");
    }
}
