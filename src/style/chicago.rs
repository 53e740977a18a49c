use super::{join_authors, push_piece, short_title, StyleFormatter};
use crate::model::{CitationKind, CitationMetadata};

/// Chicago Manual of Style, full-note form. The default for note rewriting.
pub struct ChicagoNotes;

impl StyleFormatter for ChicagoNotes {
    fn format(&self, meta: &CitationMetadata) -> String {
        let mut out = String::new();
        match meta.kind {
            CitationKind::Legal => {
                push_piece(&mut out, ", ", &italic(&meta.case_name));
                push_piece(&mut out, ", ", &meta.case_citation);
                if !meta.year.is_empty() {
                    push_piece(&mut out, " ", &format!("({})", meta.year));
                }
            }
            CitationKind::Book => {
                push_piece(&mut out, ", ", &join_authors(&meta.authors));
                push_piece(&mut out, ", ", &italic(&meta.title));
                let mut imprint = String::new();
                push_piece(&mut imprint, ", ", &meta.container);
                push_piece(&mut imprint, ", ", &meta.year);
                if !imprint.is_empty() {
                    push_piece(&mut out, " ", &format!("({})", imprint));
                }
                push_piece(&mut out, ", ", &meta.pages);
            }
            CitationKind::Newspaper | CitationKind::Url => {
                push_piece(&mut out, ", ", &join_authors(&meta.authors));
                push_piece(&mut out, ", ", &quoted(&meta.title));
                push_piece(&mut out, " ", &italic(&meta.container));
                push_piece(&mut out, ", ", date_or_year(meta));
                push_piece(&mut out, ", ", &meta.url);
                if !meta.access_date.is_empty() {
                    push_piece(&mut out, " ", &format!("(accessed {})", meta.access_date));
                }
            }
            _ => {
                // Journal shape also covers medical, government, generic.
                push_piece(&mut out, ", ", &join_authors(&meta.authors));
                push_piece(&mut out, ", ", &quoted(&meta.title));
                push_piece(&mut out, " ", &italic(&meta.container));
                push_piece(&mut out, " ", &meta.volume);
                if !meta.issue.is_empty() {
                    push_piece(&mut out, ", ", &format!("no. {}", meta.issue));
                }
                if !meta.year.is_empty() {
                    push_piece(&mut out, " ", &format!("({})", meta.year));
                }
                if !meta.pages.is_empty() {
                    out.push_str(": ");
                    out.push_str(&meta.pages);
                }
                if !meta.doi.is_empty() {
                    push_piece(&mut out, ", ", &format!("https://doi.org/{}", crate::normalize::normalize_doi(&meta.doi)));
                } else {
                    push_piece(&mut out, ", ", &meta.url);
                }
            }
        }
        finish(out)
    }

    fn format_short(&self, meta: &CitationMetadata) -> String {
        if meta.kind == CitationKind::Legal {
            return finish(italic(&meta.case_name));
        }
        let mut out = String::new();
        if let Some(surname) = meta.first_surname() {
            push_piece(&mut out, ", ", &surname);
        }
        if !meta.title.is_empty() {
            let short = short_title(&meta.title);
            if meta.kind == CitationKind::Book {
                push_piece(&mut out, ", ", &italic(&short));
                push_piece(&mut out, ", ", &meta.pages);
            } else {
                push_piece(&mut out, ", ", &quoted(&short));
                push_piece(&mut out, " ", &meta.pages);
            }
        } else {
            push_piece(&mut out, ", ", &meta.pages);
        }
        finish(out)
    }
}

fn italic(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("<i>{}</i>", text)
    }
}

fn quoted(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("\u{201c}{},\u{201d}", text.trim_end_matches(['.', ',']))
    }
}

fn date_or_year(meta: &CitationMetadata) -> &str {
    if meta.date.is_empty() {
        &meta.year
    } else {
        &meta.date
    }
}

fn finish(mut out: String) -> String {
    while out.ends_with([',', ' ']) {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('.') {
        out.push('.');
    }
    out
}
