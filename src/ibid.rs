use regex::Regex;

/// Recognizes explicit back-reference tokens: "Ibid.", "Ibidem", and the
/// Bluebook "Id." family, with an optional pinpoint page range.
pub struct IbidRecognizer {
    pattern: Regex,
}

impl Default for IbidRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl IbidRecognizer {
    pub fn new() -> Self {
        // "ibid", "ibid.", "ibidem", "id", "id." then optionally one of
        // "," "." "at", an optional "p."/"pp." and a page range, with an
        // optional closing period.
        let pattern = Regex::new(
            r"(?i)^(?:ibidem|ibid|id)\.?\s*(?:[,.]|at\b)?\s*(?:pp?\.?\s*)?(\d+(?:\s*[-–]\s*\d+)?)?\s*\.?$",
        )
        .expect("ibid pattern is valid");
        IbidRecognizer { pattern }
    }

    /// True iff the raw note text is an ibid token. Never errors.
    pub fn is_ibid(&self, raw: &str) -> bool {
        self.pattern.is_match(raw.trim())
    }

    /// The pinpoint range of an ibid token ("45", "123-125"), or None for
    /// a bare token or non-matching input.
    pub fn extract_pinpoint(&self, raw: &str) -> Option<String> {
        self.pattern
            .captures(raw.trim())?
            .get(1)
            .map(|m| m.as_str().to_string())
    }
}
