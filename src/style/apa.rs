use super::{join_authors, push_piece, StyleFormatter};
use crate::model::{CitationKind, CitationMetadata};
use crate::normalize::normalize_doi;

/// APA (7th ed.). Reference-list form; also the registry fallback and the
/// formatter behind the ASA, AAA, and Turabian author-date style names.
pub struct Apa;

impl StyleFormatter for Apa {
    fn format(&self, meta: &CitationMetadata) -> String {
        let mut out = String::new();
        push_piece(&mut out, " ", &join_authors(&meta.authors));
        push_piece(&mut out, " ", &parenthesized_date(meta));

        match meta.kind {
            CitationKind::Book => {
                if !meta.title.is_empty() {
                    push_piece(&mut out, " ", &sentence(&format!("<i>{}</i>", meta.title)));
                }
                push_piece(&mut out, " ", &sentence(&meta.container));
            }
            CitationKind::Newspaper | CitationKind::Url => {
                push_piece(&mut out, " ", &sentence(&meta.title));
                if !meta.container.is_empty() {
                    push_piece(&mut out, " ", &sentence(&format!("<i>{}</i>", meta.container)));
                }
            }
            CitationKind::Legal => {
                if !meta.case_name.is_empty() {
                    push_piece(&mut out, " ", &sentence(&format!("<i>{}</i>", meta.case_name)));
                }
                push_piece(&mut out, " ", &sentence(&meta.case_citation));
            }
            _ => {
                push_piece(&mut out, " ", &sentence(&meta.title));
                let mut venue = String::new();
                if !meta.container.is_empty() {
                    venue.push_str(&format!("<i>{}</i>", meta.container));
                }
                if !meta.volume.is_empty() {
                    push_piece(&mut venue, ", ", &format!("<i>{}</i>", meta.volume));
                    if !meta.issue.is_empty() {
                        venue.push_str(&format!("({})", meta.issue));
                    }
                }
                push_piece(&mut venue, ", ", &meta.pages);
                push_piece(&mut out, " ", &sentence(&venue));
            }
        }

        if !meta.doi.is_empty() {
            push_piece(&mut out, " ", &format!("https://doi.org/{}", normalize_doi(&meta.doi)));
        } else if !meta.url.is_empty() {
            push_piece(&mut out, " ", &meta.url);
        }
        out.trim().to_string()
    }

    fn format_short(&self, meta: &CitationMetadata) -> String {
        let surname = meta.first_surname().unwrap_or_default();
        let year = if meta.year.is_empty() { "n.d." } else { &meta.year };
        match meta.authors.len() {
            0 | 1 => format!("({}, {})", surname, year),
            2 => {
                let second = meta.authors[1]
                    .split_once(',')
                    .map(|(family, _)| family.trim().to_string())
                    .unwrap_or_else(|| meta.authors[1].clone());
                format!("({} & {}, {})", surname, second, year)
            }
            _ => format!("({} et al., {})", surname, year),
        }
    }
}

/// "(1979)." or "(n.d.)." with the free-form date when one is present.
fn parenthesized_date(meta: &CitationMetadata) -> String {
    let inner = if !meta.date.is_empty() {
        meta.date.clone()
    } else if !meta.year.is_empty() {
        meta.year.clone()
    } else {
        "n.d.".to_string()
    };
    format!("({}).", inner)
}

/// Close a reference segment with a period unless one is already there.
fn sentence(text: &str) -> String {
    let trimmed = text.trim().trim_end_matches(',');
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.ends_with('.') || trimmed.ends_with("</i>") && trimmed.trim_end_matches("</i>").ends_with('.') {
        trimmed.to_string()
    } else {
        format!("{}.", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_reference() {
        let meta = CitationMetadata {
            kind: CitationKind::Journal,
            title: "Self-efficacy: Toward a unifying theory of behavioral change".into(),
            authors: vec!["Bandura, A.".into()],
            year: "1977".into(),
            container: "Psychological Review".into(),
            volume: "84".into(),
            issue: "2".into(),
            pages: "191-215".into(),
            doi: "10.1037/0033-295X.84.2.191".into(),
            ..Default::default()
        };
        let text = Apa.format(&meta);
        assert!(text.starts_with("Bandura, A. (1977)."));
        assert!(text.contains("<i>Psychological Review</i>, <i>84</i>(2), 191-215."));
        assert!(text.ends_with("https://doi.org/10.1037/0033-295x.84.2.191"));
    }

    #[test]
    fn book_reference() {
        let meta = CitationMetadata {
            kind: CitationKind::Book,
            title: "Thinking, Fast and Slow".into(),
            authors: vec!["Kahneman, D.".into()],
            year: "2011".into(),
            container: "Farrar, Straus and Giroux".into(),
            ..Default::default()
        };
        assert_eq!(
            Apa.format(&meta),
            "Kahneman, D. (2011). <i>Thinking, Fast and Slow</i>. Farrar, Straus and Giroux."
        );
    }

    #[test]
    fn missing_year_renders_nd() {
        let meta = CitationMetadata {
            title: "Untitled report".into(),
            authors: vec!["Smith, J.".into()],
            ..Default::default()
        };
        assert!(Apa.format(&meta).starts_with("Smith, J. (n.d.)."));
    }

    #[test]
    fn short_forms_by_author_count() {
        let mut meta = CitationMetadata {
            authors: vec!["Kahneman, D.".into()],
            year: "1979".into(),
            ..Default::default()
        };
        assert_eq!(Apa.format_short(&meta), "(Kahneman, 1979)");
        meta.authors.push("Tversky, A.".into());
        assert_eq!(Apa.format_short(&meta), "(Kahneman & Tversky, 1979)");
        meta.authors.push("Thaler, R.".into());
        assert_eq!(Apa.format_short(&meta), "(Kahneman et al., 1979)");
    }
}
