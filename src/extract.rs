use crate::model::AuthorYearCitation;
use indexmap::IndexMap;
use regex::Regex;

const HONORIFICS: [&str; 7] = ["Dr.", "Dr", "Prof.", "Prof", "Mr.", "Mrs.", "Ms."];

/// Recovers (author, year) citations from body prose.
///
/// Parenthetical groups are parsed first (splitting multi-work groups on
/// ";"), then the narrative patterns run over the spans that are still
/// unclaimed. Matches are reported in document order.
pub struct AuthorDateExtractor {
    paren_group: Regex,
    paren_two: Regex,
    paren_et_al: Regex,
    paren_single: Regex,
    narrative_two: Regex,
    narrative_et_al: Regex,
    narrative_single: Regex,
}

impl Default for AuthorDateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorDateExtractor {
    pub fn new() -> Self {
        // Surnames start uppercase and may carry accents, apostrophes, or
        // hyphens. The year is four digits or the literal "n.d.".
        const NAME: &str = r"\p{Lu}[\p{L}'’-]+";
        const YEAR: &str = r"(\d{4}|n\.d\.)";

        let re = |s: String| Regex::new(&s).expect("extractor pattern is valid");
        AuthorDateExtractor {
            paren_group: re(r"\(([^()]+)\)".to_string()),
            paren_two: re(format!(r"^({NAME})\s*(?:&|and)\s+({NAME}),\s*{YEAR}$")),
            paren_et_al: re(format!(r"^({NAME})\s+et\s+al\.?,\s*{YEAR}$")),
            paren_single: re(format!(r"^({NAME}),\s*{YEAR}$")),
            narrative_two: re(format!(r"({NAME})\s+and\s+({NAME})\s*\(\s*{YEAR}\s*\)")),
            narrative_et_al: re(format!(r"({NAME})\s+et\s+al\.?\s*\(\s*{YEAR}\s*\)")),
            narrative_single: re(format!(r"({NAME})\s*\(\s*{YEAR}\s*\)")),
        }
    }

    /// All citations found in `text`, in document order, duplicates kept.
    pub fn extract(&self, text: &str) -> Vec<AuthorYearCitation> {
        let mut found: Vec<(usize, AuthorYearCitation)> = Vec::new();
        let mut claimed: Vec<(usize, usize)> = Vec::new();

        // Parenthetical groups, multi-work groups split on ";".
        for group in self.paren_group.captures_iter(text) {
            let whole = group.get(0).unwrap();
            let inner = group.get(1).unwrap();
            let mut segment_start = inner.start();
            let mut group_citations = Vec::new();
            for segment in inner.as_str().split(';') {
                if let Some(citation) = self.parse_parenthetical_segment(segment) {
                    group_citations.push((segment_start, citation));
                }
                segment_start += segment.len() + 1;
            }
            // A group with no recognizable segment stays unclaimed so a
            // narrative pattern can still use its year, e.g. "Jones (2001)".
            if !group_citations.is_empty() {
                claimed.push((whole.start(), whole.end()));
                found.extend(group_citations);
            }
        }

        // Narrative patterns, most specific first.
        for (pattern, shape) in [
            (&self.narrative_two, Shape::Two),
            (&self.narrative_et_al, Shape::EtAl),
            (&self.narrative_single, Shape::Single),
        ] {
            for caps in pattern.captures_iter(text) {
                let m = caps.get(0).unwrap();
                if overlaps(&claimed, m.start(), m.end()) {
                    continue;
                }
                if let Some(citation) = self.build(&caps, shape, m.as_str()) {
                    claimed.push((m.start(), m.end()));
                    found.push((m.start(), citation));
                }
            }
        }

        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, c)| c).collect()
    }

    /// Deduplicated citations, first-seen order, keyed by
    /// (lowercased surname, year, lowercased second author or "").
    pub fn extract_unique(&self, text: &str) -> Vec<AuthorYearCitation> {
        let mut unique: IndexMap<(String, String, String), AuthorYearCitation> = IndexMap::new();
        for citation in self.extract(text) {
            unique.entry(citation.key()).or_insert(citation);
        }
        unique.into_values().collect()
    }

    fn parse_parenthetical_segment(&self, segment: &str) -> Option<AuthorYearCitation> {
        let segment = segment.trim();
        for (pattern, shape) in [
            (&self.paren_two, Shape::Two),
            (&self.paren_et_al, Shape::EtAl),
            (&self.paren_single, Shape::Single),
        ] {
            if let Some(caps) = pattern.captures(segment) {
                return self.build(&caps, shape, segment);
            }
        }
        None
    }

    fn build(&self, caps: &regex::Captures, shape: Shape, span: &str) -> Option<AuthorYearCitation> {
        let author = canonicalize_author(caps.get(1)?.as_str())?;
        let (second_author, et_al, year_idx) = match shape {
            Shape::Two => (canonicalize_author(caps.get(2)?.as_str()), false, 3),
            Shape::EtAl => (None, true, 2),
            Shape::Single => (None, false, 2),
        };
        Some(AuthorYearCitation {
            author,
            year: caps.get(year_idx)?.as_str().to_string(),
            second_author,
            et_al,
            span: span.trim().to_string(),
        })
    }
}

#[derive(Clone, Copy)]
enum Shape {
    Single,
    Two,
    EtAl,
}

fn overlaps(claimed: &[(usize, usize)], start: usize, end: usize) -> bool {
    claimed.iter().any(|&(s, e)| start < e && s < end)
}

/// Strip honorifics, collapse internal whitespace, keep accents. Rejects
/// all-lowercase tokens, which are almost always prose misfires.
pub fn canonicalize_author(name: &str) -> Option<String> {
    let mut name = name.trim();
    for honorific in HONORIFICS {
        // Only strip a full token; "Drake" keeps its "Dr".
        if let Some(rest) = name.strip_prefix(honorific) {
            if rest.starts_with(char::is_whitespace) {
                name = rest.trim_start();
                break;
            }
        }
    }
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() || collapsed.chars().all(|c| !c.is_uppercase()) {
        return None;
    }
    Some(collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(citations: &[AuthorYearCitation]) -> Vec<(String, String, String)> {
        citations.iter().map(|c| c.key()).collect()
    }

    #[test]
    fn mixed_prose_dedups_in_first_seen_order() {
        let x = AuthorDateExtractor::new();
        let prose =
            "(Bandura, 1977) and Kahneman and Tversky (1979) and (Diener et al., 2014)";
        let unique = x.extract_unique(prose);
        assert_eq!(
            keys(&unique),
            vec![
                ("bandura".into(), "1977".into(), "".into()),
                ("kahneman".into(), "1979".into(), "tversky".into()),
                ("diener".into(), "2014".into(), "".into()),
            ]
        );
        assert!(unique[2].et_al);
    }

    #[test]
    fn multi_work_parenthetical_splits_on_semicolons() {
        let x = AuthorDateExtractor::new();
        let found = x.extract("Several studies agree (Smith, 2001; Jones, 2003; Brown & Lee, 2005).");
        assert_eq!(
            keys(&found),
            vec![
                ("smith".into(), "2001".into(), "".into()),
                ("jones".into(), "2003".into(), "".into()),
                ("brown".into(), "2005".into(), "lee".into()),
            ]
        );
    }

    #[test]
    fn narrative_forms_including_nd() {
        let x = AuthorDateExtractor::new();
        let found = x.extract("Bandura (n.d.) argued, and Meyer et al. (1990) replied.");
        assert_eq!(
            keys(&found),
            vec![
                ("bandura".into(), "n.d.".into(), "".into()),
                ("meyer".into(), "1990".into(), "".into()),
            ]
        );
        assert!(found[1].et_al);
    }

    #[test]
    fn accented_surnames_survive() {
        let x = AuthorDateExtractor::new();
        let found = x.extract("(Gutiérrez, 2018) and Müller and Böhm (2019)");
        assert_eq!(found[0].author, "Gutiérrez");
        assert_eq!(found[1].author, "Müller");
        assert_eq!(found[1].second_author.as_deref(), Some("Böhm"));
    }

    #[test]
    fn prose_years_do_not_misfire() {
        let x = AuthorDateExtractor::new();
        assert!(x.extract("the (1977) study was repeated in (2001)").is_empty());
    }

    #[test]
    fn et_al_and_plain_keys_stay_distinct() {
        let x = AuthorDateExtractor::new();
        let unique = x.extract_unique("(Smith et al., 2001) but also (Smith, 2001)");
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn honorifics_are_stripped() {
        assert_eq!(canonicalize_author("Dr. Smith"), Some("Smith".into()));
        assert_eq!(canonicalize_author("Mrs. Dalloway"), Some("Dalloway".into()));
        assert_eq!(canonicalize_author("Drake"), Some("Drake".into()));
        assert_eq!(canonicalize_author("  van   der  Berg "), Some("van der Berg".into()));
        assert_eq!(canonicalize_author("the"), None);
    }
}
