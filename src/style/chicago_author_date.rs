use super::{join_authors, push_piece, StyleFormatter};
use crate::model::{CitationKind, CitationMetadata};
use crate::normalize::normalize_doi;

/// Chicago author-date reference-list form.
pub struct ChicagoAuthorDate;

impl StyleFormatter for ChicagoAuthorDate {
    fn format(&self, meta: &CitationMetadata) -> String {
        let mut out = String::new();
        push_piece(&mut out, " ", &period(&join_authors(&meta.authors)));
        let year = if meta.year.is_empty() { "n.d." } else { &meta.year };
        push_piece(&mut out, " ", &format!("{}.", year));

        match meta.kind {
            CitationKind::Book => {
                if !meta.title.is_empty() {
                    push_piece(&mut out, " ", &period(&format!("<i>{}</i>", meta.title)));
                }
                push_piece(&mut out, " ", &period(&meta.container));
            }
            _ => {
                if !meta.title.is_empty() {
                    push_piece(&mut out, " ", &format!("\u{201c}{}.\u{201d}", meta.title.trim_end_matches('.')));
                }
                let mut venue = String::new();
                if !meta.container.is_empty() {
                    push_piece(&mut venue, " ", &format!("<i>{}</i>", meta.container));
                }
                push_piece(&mut venue, " ", &meta.volume);
                if !meta.issue.is_empty() {
                    push_piece(&mut venue, " ", &format!("({})", meta.issue));
                }
                if !meta.pages.is_empty() {
                    if venue.is_empty() {
                        venue = meta.pages.clone();
                    } else {
                        venue.push_str(": ");
                        venue.push_str(&meta.pages);
                    }
                }
                push_piece(&mut out, " ", &period(&venue));
            }
        }

        if !meta.doi.is_empty() {
            push_piece(&mut out, " ", &period(&format!("https://doi.org/{}", normalize_doi(&meta.doi))));
        } else if !meta.url.is_empty() {
            push_piece(&mut out, " ", &period(&meta.url));
        }
        out.trim().to_string()
    }

    fn format_short(&self, meta: &CitationMetadata) -> String {
        let surname = meta.first_surname().unwrap_or_default();
        let year = if meta.year.is_empty() { "n.d." } else { &meta.year };
        format!("({} {})", surname, year)
    }
}

fn period(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.ends_with('.') {
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
            title: "Prospect Theory".into(),
            authors: vec!["Kahneman, Daniel".into(), "Tversky, Amos".into()],
            year: "1979".into(),
            container: "Econometrica".into(),
            volume: "47".into(),
            issue: "2".into(),
            pages: "263-291".into(),
            ..Default::default()
        };
        assert_eq!(
            ChicagoAuthorDate.format(&meta),
            "Kahneman, Daniel and Tversky, Amos. 1979. \u{201c}Prospect Theory.\u{201d} <i>Econometrica</i> 47 (2): 263-291."
        );
    }
}
