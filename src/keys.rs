//! Article key derivation.
//!
//! Feed links look like
//! `https://www.korea.kr/news/policyNewsView.do?newsId=148945904&call_from=rsslink`.
//! The key combines the routing page (`policyNewsView`) with the numeric
//! `newsId`, so the tracking parameters that vary between feeds do not affect
//! identity. Links without an id fall back to a short content hash.

use crate::models::ArticleKey;
use crate::utils::unwrap_cdata;
use tracing::debug;
use url::Url;

const PAGE_SUFFIX: &str = ".do";
const ID_PARAM: &str = "newsId";
const UNKNOWN_PAGE: &str = "unknown";

/// Derive the deduplication key for `link`.
///
/// Pure and infallible: the same link always yields the same key, and input
/// that cannot be parsed as an absolute URL degrades to `error_{hash}`.
pub fn derive_key(link: &str) -> ArticleKey {
    let link = unwrap_cdata(link);

    let url = match Url::parse(link) {
        Ok(url) => url,
        Err(e) => {
            debug!(%link, error = %e, "Link is not an absolute URL; using error key");
            return ArticleKey::new(format!("error_{}", short_hash(link)));
        }
    };

    let page_type = url
        .path_segments()
        .and_then(|segments| {
            segments
                .rev()
                .find_map(|segment| segment.strip_suffix(PAGE_SUFFIX))
                .filter(|page| !page.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| UNKNOWN_PAGE.to_string());

    let news_id = url
        .query_pairs()
        .find(|(name, _)| name == ID_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()));

    match news_id {
        Some(id) => ArticleKey::new(format!("{page_type}_{id}")),
        None => ArticleKey::new(format!("{page_type}_{}", short_hash(link))),
    }
}

/// First 8 hex characters of the MD5 digest of `input`.
fn short_hash(input: &str) -> String {
    let digest = format!("{:x}", md5::compute(input.as_bytes()));
    digest[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash8(s: &str) -> String {
        format!("{:x}", md5::compute(s.as_bytes()))[..8].to_string()
    }

    #[test]
    fn test_page_type_and_news_id() {
        let key = derive_key("https://example.org/news/policyNewsView.do?newsId=12345&call_from=rsslink");
        assert_eq!(key.as_str(), "policyNewsView_12345");
    }

    #[test]
    fn test_tracking_params_do_not_change_key() {
        let a = derive_key("https://www.korea.kr/briefing/stateCouncilView.do?newsId=148945654&call_from=rsslink");
        let b = derive_key("https://www.korea.kr/briefing/stateCouncilView.do?call_from=main&newsId=148945654");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "stateCouncilView_148945654");
    }

    #[test]
    fn test_missing_news_id_uses_hash() {
        let link = "https://example.org/news/policyNewsView.do?call_from=rsslink";
        assert_eq!(derive_key(link).as_str(), format!("policyNewsView_{}", hash8(link)));
    }

    #[test]
    fn test_non_numeric_news_id_uses_hash() {
        let link = "https://example.org/news/healthView.do?newsId=abc";
        assert_eq!(derive_key(link).as_str(), format!("healthView_{}", hash8(link)));
    }

    #[test]
    fn test_no_page_suffix_is_unknown() {
        let key = derive_key("https://example.org/articles?newsId=77");
        assert_eq!(key.as_str(), "unknown_77");
    }

    #[test]
    fn test_malformed_link_uses_error_key() {
        assert_eq!(derive_key("not a url").as_str(), format!("error_{}", hash8("not a url")));
        assert_eq!(derive_key("").as_str(), format!("error_{}", hash8("")));
    }

    #[test]
    fn test_cdata_wrapper_is_ignored() {
        let plain = derive_key("https://www.korea.kr/news/healthView.do?newsId=148945548");
        let wrapped = derive_key("<![CDATA[ https://www.korea.kr/news/healthView.do?newsId=148945548 ]]>");
        assert_eq!(plain, wrapped);
    }

    #[test]
    fn test_deterministic() {
        let link = "https://www.korea.kr/news/policyNewsView.do?call_from=rsslink";
        assert_eq!(derive_key(link), derive_key(link));
    }
}
