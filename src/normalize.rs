use crate::model::CitationMetadata;
use regex::Regex;
use url::Url;

/// URL-shaped spans: scheme plus non-whitespace, non-bracket characters.
/// Trailing punctuation is trimmed separately, see [`trim_url_match`].
pub fn url_pattern() -> Regex {
    Regex::new(r#"https?://[^\s<>\[\]{}"]+"#).expect("url pattern is valid")
}

/// Strip the punctuation that prose attaches to the end of a URL.
pub fn trim_url_match(candidate: &str) -> &str {
    candidate.trim_end_matches(['.', ',', ';', ':', ')', ']', '\'', '"'])
}

/// First URL-shaped substring of `text`, trailing punctuation trimmed.
pub fn find_url(text: &str) -> Option<&str> {
    let m = url_pattern().find(text)?;
    let trimmed = trim_url_match(m.as_str());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Canonical DOI form: lowercase, no "doi:" or resolver-URL prefix, trimmed.
pub fn normalize_doi(doi: &str) -> String {
    let mut doi = doi.trim().to_lowercase();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi.org/",
        "doi:",
    ] {
        if let Some(rest) = doi.strip_prefix(prefix) {
            doi = rest.trim().to_string();
            break;
        }
    }
    doi
}

/// Canonical URL form: lowercase, trimmed, query string and fragment
/// stripped, trailing slash removed.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_query = match Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => {
            let cut = trimmed.find(['?', '#']).unwrap_or(trimmed.len());
            trimmed[..cut].to_string()
        }
    };
    without_query.to_lowercase().trim_end_matches('/').to_string()
}

/// Stable identity key for a metadata record, in priority order:
/// DOI, URL, legal case+citation, title(+first author), case name alone.
/// `None` iff the record carries none of those.
pub fn source_key(meta: &CitationMetadata) -> Option<String> {
    if !meta.doi.is_empty() {
        return Some(format!("doi:{}", normalize_doi(&meta.doi)));
    }
    if !meta.url.is_empty() {
        return Some(format!("url:{}", normalize_url(&meta.url)));
    }
    if !meta.case_name.is_empty() && !meta.case_citation.is_empty() {
        return Some(format!("legal:{}|{}", meta.case_name, meta.case_citation));
    }
    if !meta.title.is_empty() {
        let mut key = format!("title:{}", meta.title.to_lowercase());
        if let Some(author) = meta.first_author() {
            key.push_str("|author:");
            key.push_str(&author.to_lowercase());
        }
        return Some(key);
    }
    if !meta.case_name.is_empty() {
        return Some(format!("case:{}", meta.case_name));
    }
    None
}

/// Two records cite the same source iff both yield non-null, equal keys.
pub fn sources_match(a: &CitationMetadata, b: &CitationMetadata) -> bool {
    match (source_key(a), source_key(b)) {
        (Some(ka), Some(kb)) => ka == kb,
        _ => false,
    }
}

/// URL equality under normalization.
pub fn urls_match(a: &str, b: &str) -> bool {
    !a.trim().is_empty() && !b.trim().is_empty() && normalize_url(a) == normalize_url(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_with(f: impl FnOnce(&mut CitationMetadata)) -> CitationMetadata {
        let mut m = CitationMetadata::default();
        f(&mut m);
        m
    }

    #[test]
    fn doi_prefixes_are_stripped() {
        assert_eq!(normalize_doi("doi:10.1037/0033-295X.84.2.191"), "10.1037/0033-295x.84.2.191");
        assert_eq!(
            normalize_doi("https://doi.org/10.1037/0033-295X.84.2.191"),
            "10.1037/0033-295x.84.2.191"
        );
        assert_eq!(normalize_doi("  10.1000/XYZ  "), "10.1000/xyz");
    }

    #[test]
    fn url_normalization_drops_query_and_trailing_slash() {
        assert_eq!(
            normalize_url("https://example.org/a?utm=x"),
            normalize_url("https://example.org/a/")
        );
        assert_eq!(normalize_url("https://Example.com/"), "https://example.com");
    }

    #[test]
    fn key_priority_is_doi_then_url_then_title() {
        let m = meta_with(|m| {
            m.doi = "10.1/a".into();
            m.url = "https://x.org".into();
            m.title = "T".into();
        });
        assert_eq!(source_key(&m).unwrap(), "doi:10.1/a");

        let m = meta_with(|m| {
            m.url = "https://x.org/".into();
            m.title = "T".into();
        });
        assert_eq!(source_key(&m).unwrap(), "url:https://x.org");

        let m = meta_with(|m| {
            m.title = "Self-Efficacy".into();
            m.authors = vec!["Bandura, A.".into()];
        });
        assert_eq!(source_key(&m).unwrap(), "title:self-efficacy|author:bandura, a.");
    }

    #[test]
    fn legal_key_requires_both_fields() {
        let m = meta_with(|m| {
            m.case_name = "Roe v. Wade".into();
            m.case_citation = "410 U.S. 113".into();
        });
        assert_eq!(source_key(&m).unwrap(), "legal:Roe v. Wade|410 U.S. 113");

        let m = meta_with(|m| m.case_name = "Roe v. Wade".into());
        assert_eq!(source_key(&m).unwrap(), "case:Roe v. Wade");
    }

    #[test]
    fn empty_records_have_no_key_and_never_match() {
        let a = CitationMetadata::default();
        let b = CitationMetadata::default();
        assert!(source_key(&a).is_none());
        assert!(!sources_match(&a, &b));
    }

    #[test]
    fn urls_are_found_and_trimmed_in_prose() {
        assert_eq!(
            find_url("See https://example.org/a?x=1, cited often."),
            Some("https://example.org/a?x=1")
        );
        assert_eq!(
            find_url("(available at https://example.org/b.)"),
            Some("https://example.org/b")
        );
        assert_eq!(find_url("no links here"), None);
    }

    #[test]
    fn key_is_stable_and_equality_implies_match() {
        let m = meta_with(|m| {
            m.doi = "DOI:10.5/Q".into();
            m.title = "Whatever".into();
        });
        assert_eq!(source_key(&m), source_key(&m));
        let same = meta_with(|m| m.doi = "https://doi.org/10.5/q".into());
        assert!(sources_match(&m, &same));
    }
}
