//! RSS 2.0 parsing into [`ArticleCandidate`]s.

use crate::models::ArticleCandidate;
use crate::utils::unwrap_cdata;
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::error::Error;
use tracing::debug;

static NAMED_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap());

/// Entities XML predefines; left for the XML parser.
const XML_ENTITIES: [&str; 5] = ["amp", "lt", "gt", "quot", "apos"];

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
}

/// Parse an RSS document, keeping entries in feed order.
///
/// Entries without a link are dropped: they cannot be keyed or fetched.
pub fn parse_feed(xml: &str, source_feed: &str) -> Result<Vec<ArticleCandidate>, Box<dyn Error>> {
    let xml = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml)?;

    let mut out = Vec::with_capacity(rss.channel.items.len());
    for item in rss.channel.items {
        let link = unwrap_cdata(item.link.as_deref().unwrap_or_default()).to_string();
        if link.is_empty() {
            debug!(source_feed, title = ?item.title, "Feed entry has no link; skipping");
            continue;
        }
        out.push(ArticleCandidate {
            title: unwrap_cdata(item.title.as_deref().unwrap_or_default()).to_string(),
            raw_description: unwrap_cdata(item.description.as_deref().unwrap_or_default()).to_string(),
            link,
            source_feed: source_feed.to_string(),
        });
    }
    Ok(out)
}

/// Replace HTML-only named entities that are not legal in XML.
///
/// A few common ones get plain-text stand-ins; any other known entity becomes
/// its character (re-escaped if that character is markup), and unknown names
/// are escaped so they read back literally.
fn scrub_html_entities_for_xml(s: &str) -> String {
    let s = s
        .replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-");
    NAMED_ENTITY
        .replace_all(&s, |caps: &Captures| {
            let name = &caps[1];
            if XML_ENTITIES.contains(&name) {
                return caps[0].to_string();
            }
            let decoded = html_escape::decode_html_entities(&caps[0]);
            if decoded == &caps[0] {
                format!("&amp;{name};")
            } else {
                html_escape::encode_safe(&decoded).into_owned()
            }
        })
        .into_owned()
}
