mod apa;
mod chicago;
mod chicago_author_date;
mod harvard;

pub use apa::Apa;
pub use chicago::ChicagoNotes;
pub use chicago_author_date::ChicagoAuthorDate;
pub use harvard::Harvard;

use crate::model::CitationMetadata;

/// A citation style. Output is plain text where italic spans are marked
/// with `<i>…</i>`; no other markup is allowed. The document mutator
/// translates the markers into native italic runs.
pub trait StyleFormatter: Send + Sync {
    /// Full citation, used the first time a source appears.
    fn format(&self, meta: &CitationMetadata) -> String;

    /// Shortened citation for a source cited earlier but not immediately
    /// prior.
    fn format_short(&self, meta: &CitationMetadata) -> String;

    /// Back-reference to the immediately preceding citation.
    fn format_ibid(&self, pinpoint: Option<&str>) -> String {
        match pinpoint {
            Some(range) => format!("Ibid., {}.", range.trim()),
            None => "Ibid.".to_string(),
        }
    }
}

/// Registered style names, as shown to users.
pub const STYLE_NAMES: [&str; 7] = [
    "APA (7th ed.)",
    "Harvard",
    "Chicago Author-Date",
    "Chicago Manual of Style",
    "ASA (Sociology)",
    "AAA (Anthropology)",
    "Turabian Author-Date",
];

/// Look up a formatter by human-readable style name. Unknown names fall
/// back to APA. ASA, AAA, and Turabian reuse the APA formatter.
pub fn formatter_for(style: &str) -> Box<dyn StyleFormatter> {
    match style.trim() {
        "Harvard" => Box::new(Harvard),
        "Chicago Author-Date" => Box::new(ChicagoAuthorDate),
        "Chicago Manual of Style" => Box::new(ChicagoNotes),
        _ => Box::new(Apa),
    }
}

/// Join surname-first author strings: "A", "A and B", "A, B, and C".
pub(crate) fn join_authors(authors: &[String]) -> String {
    match authors {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{} and {}", a, b),
        many => {
            let head = &many[..many.len() - 1];
            format!("{}, and {}", head.join(", "), many[many.len() - 1])
        }
    }
}

/// First few substantive words of a title, for short forms.
pub(crate) fn short_title(title: &str) -> String {
    const SKIP: [&str; 6] = ["a", "an", "the", "on", "of", "in"];
    let mut words: Vec<&str> = Vec::new();
    for word in title.split_whitespace() {
        if words.is_empty() && SKIP.contains(&word.to_lowercase().as_str()) {
            continue;
        }
        words.push(word);
        if words.len() == 4 {
            break;
        }
    }
    words.join(" ").trim_end_matches([',', '.', ':', ';']).to_string()
}

/// Append `piece` to `out`, separated by `sep`, skipping empty pieces.
pub(crate) fn push_piece(out: &mut String, sep: &str, piece: &str) {
    if piece.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push_str(sep);
    }
    out.push_str(piece);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_styles_fall_back_to_apa() {
        let meta = CitationMetadata {
            title: "Thinking".into(),
            authors: vec!["Kahneman, D.".into()],
            year: "2011".into(),
            ..Default::default()
        };
        let unknown = formatter_for("Vancouver").format(&meta);
        let apa = formatter_for("APA (7th ed.)").format(&meta);
        assert_eq!(unknown, apa);
    }

    #[test]
    fn author_joining() {
        let authors: Vec<String> =
            vec!["Jones, A.".into(), "Smith, B.".into(), "Lee, C.".into()];
        assert_eq!(join_authors(&authors[..1]), "Jones, A.");
        assert_eq!(join_authors(&authors[..2]), "Jones, A. and Smith, B.");
        assert_eq!(join_authors(&authors), "Jones, A., Smith, B., and Lee, C.");
    }

    #[test]
    fn short_titles_skip_leading_articles() {
        assert_eq!(short_title("The Structure of Scientific Revolutions"), "Structure of Scientific Revolutions");
        assert_eq!(short_title("Self-Efficacy: Toward a Unifying Theory of Change"), "Self-Efficacy: Toward a Unifying");
    }

    #[test]
    fn default_ibid_rendering() {
        let f = formatter_for("Chicago Manual of Style");
        assert_eq!(f.format_ibid(None), "Ibid.");
        assert_eq!(f.format_ibid(Some("45")), "Ibid., 45.");
    }
}
