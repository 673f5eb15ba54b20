//! NXM URL parser (C9), spec §4.9: validates and decomposes
//! `nxm://` mod-download URIs and produces a downstream-safe encoding.

use crate::error::NxmError;

const MAX_URL_BYTES: usize = 2048;
const SCHEME: &str = "nxm://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NxmLink {
    ModDownload {
        game_domain: String,
        mod_id: u32,
        file_id: Option<u32>,
    },
    Collection {
        game_domain: String,
        collection_slug: String,
        revision_id: Option<u32>,
    },
    Unknown {
        game_domain: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NxmQuery {
    pub download_key: Option<String>,
    pub expires_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNxm {
    pub link: NxmLink,
    pub query: NxmQuery,
}

impl ParsedNxm {
    /// A mod link is valid iff `mod_id` is present (always true once
    /// parsed as `ModDownload`); a collection link is valid iff
    /// `collection_slug` is present (same). Absence of `revision_id` on
    /// a collection is *valid but incomplete* — callers must check this
    /// explicitly rather than treat it as invalid.
    pub fn is_incomplete_collection(&self) -> bool {
        matches!(self.link, NxmLink::Collection { revision_id: None, .. })
    }
}

pub fn parse(url: &str) -> Result<ParsedNxm, NxmError> {
    if url.is_empty() {
        return Err(NxmError::EmptyUrl);
    }
    if url.len() > MAX_URL_BYTES {
        return Err(NxmError::UrlTooLong);
    }
    let rest = url.strip_prefix(SCHEME).ok_or(NxmError::BadScheme)?;
    let rest = decode_host_escapes(rest);
    let rest = rest.as_str();

    let (path_part, query_part) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };

    let segments: Vec<&str> = path_part.split('/').collect();
    let game_domain = segments.first().copied().unwrap_or("");
    if game_domain.is_empty() {
        return Err(NxmError::MissingGameDomain);
    }

    let kind = segments.get(1).copied();
    let link = match kind {
        Some("mods") => parse_mods(game_domain, &segments)?,
        Some("collections") => parse_collections(game_domain, &segments)?,
        Some(_) | None => {
            return Err(NxmError::UnrecognizedKind);
        }
    };

    let query = query_part.map(parse_query).unwrap_or_default();

    Ok(ParsedNxm { link, query })
}

fn parse_mods(game_domain: &str, segments: &[&str]) -> Result<NxmLink, NxmError> {
    let mod_id: u32 = segments.get(2).ok_or(NxmError::InvalidModId)?.parse().map_err(|_| NxmError::InvalidModId)?;

    let file_id = match segments.get(3).copied() {
        None => None,
        Some("files") => {
            let raw = segments.get(4).ok_or(NxmError::InvalidFileId)?;
            Some(raw.parse::<u32>().map_err(|_| NxmError::InvalidFileId)?)
        }
        Some(numeric) => Some(numeric.parse::<u32>().map_err(|_| NxmError::InvalidFileId)?),
    };

    Ok(NxmLink::ModDownload {
        game_domain: game_domain.to_string(),
        mod_id,
        file_id,
    })
}

fn parse_collections(game_domain: &str, segments: &[&str]) -> Result<NxmLink, NxmError> {
    let collection_slug = segments.get(2).filter(|s| !s.is_empty()).ok_or(NxmError::MissingCollectionSlug)?;

    let revision_id = match segments.get(3).copied() {
        None => None,
        Some("revisions") => {
            let raw = segments.get(4).ok_or(NxmError::InvalidRevisionId)?;
            Some(raw.parse::<u32>().map_err(|_| NxmError::InvalidRevisionId)?)
        }
        Some(_) => None,
    };

    Ok(NxmLink::Collection {
        game_domain: game_domain.to_string(),
        collection_slug: collection_slug.to_string(),
        revision_id,
    })
}

fn parse_query(query_part: &str) -> NxmQuery {
    let mut q = NxmQuery::default();
    for pair in query_part.split('&') {
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => continue,
        };
        match key {
            "key" => q.download_key = Some(value.to_string()),
            "expires" => q.expires_at = value.parse::<u64>().ok(),
            _ => {}
        }
    }
    q
}

/// Inverse of `encode_for_host`'s escaping, applied to the tail on the way
/// in so that parsing an `encode_for_host`-produced URL recovers the exact
/// fields of the original (spec §4.9/§8).
fn decode_host_escapes(tail: &str) -> String {
    tail.replace("%2F", "/").replace("%20", " ").replace("%22", "\"")
}

/// Escape a string for safe embedding in a downstream command line,
/// notably Wine's — preserves the `nxm://` scheme verbatim and escapes
/// only `/`, space, and `"` in the tail (spec §4.9).
pub fn encode_for_host(input: &str) -> String {
    let tail = input.strip_prefix(SCHEME).unwrap_or(input);
    let mut out = String::with_capacity(input.len());
    if tail.len() != input.len() {
        out.push_str(SCHEME);
    }
    for c in tail.chars() {
        match c {
            '/' => out.push_str("%2F"),
            ' ' => out.push_str("%20"),
            '"' => out.push_str("%22"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_url_is_rejected() {
        assert!(matches!(parse(""), Err(NxmError::EmptyUrl)));
    }

    #[test]
    fn oversize_url_is_rejected() {
        let url = format!("nxm://{}", "a".repeat(MAX_URL_BYTES));
        assert!(matches!(parse(&url), Err(NxmError::UrlTooLong)));
    }

    #[test]
    fn bad_scheme_is_rejected() {
        assert!(matches!(parse("https://example.com"), Err(NxmError::BadScheme)));
    }

    #[test]
    fn basic_mod_download() {
        let parsed = parse("nxm://skyrimspecialedition/mods/12345/files/67890").unwrap();
        assert_eq!(
            parsed.link,
            NxmLink::ModDownload {
                game_domain: "skyrimspecialedition".into(),
                mod_id: 12345,
                file_id: Some(67890),
            }
        );
    }

    #[test]
    fn mod_download_bare_numeric_compat_branch() {
        let parsed = parse("nxm://skyrimspecialedition/mods/12345/67890").unwrap();
        assert_eq!(
            parsed.link,
            NxmLink::ModDownload {
                game_domain: "skyrimspecialedition".into(),
                mod_id: 12345,
                file_id: Some(67890),
            }
        );
    }

    #[test]
    fn mod_download_without_file_id() {
        let parsed = parse("nxm://fallout4/mods/100").unwrap();
        assert_eq!(
            parsed.link,
            NxmLink::ModDownload {
                game_domain: "fallout4".into(),
                mod_id: 100,
                file_id: None,
            }
        );
    }

    #[test]
    fn invalid_mod_id_is_rejected() {
        assert!(matches!(parse("nxm://fallout4/mods/notanumber"), Err(NxmError::InvalidModId)));
    }

    #[test]
    fn collection_with_revision() {
        let parsed = parse("nxm://fallout4/collections/my-collection/revisions/3").unwrap();
        assert_eq!(
            parsed.link,
            NxmLink::Collection {
                game_domain: "fallout4".into(),
                collection_slug: "my-collection".into(),
                revision_id: Some(3),
            }
        );
        assert!(!parsed.is_incomplete_collection());
    }

    #[test]
    fn collection_without_revision_is_valid_but_incomplete() {
        let parsed = parse("nxm://fallout4/collections/my-collection").unwrap();
        assert!(parsed.is_incomplete_collection());
    }

    #[test]
    fn missing_collection_slug_is_rejected() {
        assert!(matches!(parse("nxm://fallout4/collections"), Err(NxmError::MissingCollectionSlug)));
    }

    #[test]
    fn unrecognized_kind_is_rejected() {
        assert!(matches!(parse("nxm://fallout4/unknownkind/1"), Err(NxmError::UnrecognizedKind)));
    }

    #[test]
    fn query_keys_extracted_and_unknown_ignored() {
        let parsed = parse("nxm://fallout4/mods/1/files/2?key=abc123&expires=1700000000&foo=bar").unwrap();
        assert_eq!(parsed.query.download_key.as_deref(), Some("abc123"));
        assert_eq!(parsed.query.expires_at, Some(1700000000));
    }

    #[test]
    fn encode_for_host_escapes_only_slash_space_quote() {
        assert_eq!(encode_for_host("a/b c\"d"), "a%2Fb%20c%22d");
        assert_eq!(encode_for_host("unchanged-._~"), "unchanged-._~");
    }

    #[test]
    fn encode_for_host_preserves_scheme_on_a_full_url() {
        let url = "nxm://stardewvalley/collections/tckf0m/revisions/100";
        assert_eq!(
            encode_for_host(url),
            "nxm://stardewvalley%2Fcollections%2Ftckf0m%2Frevisions%2F100"
        );
    }

    #[test]
    fn encode_for_host_round_trips_through_parse() {
        let url = "nxm://stardewvalley/collections/tckf0m/revisions/100";
        let encoded = encode_for_host(url);
        assert!(encoded.starts_with(SCHEME));
        assert_eq!(parse(&encoded).unwrap(), parse(url).unwrap());
    }
}
