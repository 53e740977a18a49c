use super::{join_authors, push_piece, StyleFormatter};
use crate::model::{CitationKind, CitationMetadata};

/// Harvard referencing.
pub struct Harvard;

impl StyleFormatter for Harvard {
    fn format(&self, meta: &CitationMetadata) -> String {
        let mut out = String::new();
        push_piece(&mut out, " ", &join_authors(&meta.authors));
        let year = if meta.year.is_empty() { "n.d." } else { &meta.year };
        push_piece(&mut out, " ", &format!("{},", year));

        match meta.kind {
            CitationKind::Book => {
                if !meta.title.is_empty() {
                    push_piece(&mut out, " ", &format!("<i>{}</i>,", meta.title));
                }
                push_piece(&mut out, " ", &trailing_comma(&meta.container));
            }
            _ => {
                if !meta.title.is_empty() {
                    push_piece(&mut out, " ", &format!("'{}',", meta.title));
                }
                if !meta.container.is_empty() {
                    push_piece(&mut out, " ", &format!("<i>{}</i>,", meta.container));
                }
                if !meta.volume.is_empty() {
                    push_piece(&mut out, " ", &format!("vol. {},", meta.volume));
                }
                if !meta.issue.is_empty() {
                    push_piece(&mut out, " ", &format!("no. {},", meta.issue));
                }
                if !meta.pages.is_empty() {
                    push_piece(&mut out, " ", &format!("pp. {},", meta.pages));
                }
            }
        }

        if !meta.url.is_empty() {
            push_piece(&mut out, " ", &format!("viewed at {},", meta.url));
        }
        let mut out = out.trim_end_matches([',', ' ']).to_string();
        out.push('.');
        out
    }

    fn format_short(&self, meta: &CitationMetadata) -> String {
        let surname = meta.first_surname().unwrap_or_default();
        let year = if meta.year.is_empty() { "n.d." } else { &meta.year };
        format!("({} {})", surname, year)
    }
}

fn trailing_comma(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("{},", text)
    }
}
