//! Log message sanitization for deduplicated logging.

use regex::Regex;

/// Sanitization rule with regex pattern and placeholder
struct Rule {
    re: Regex,
    placeholder: &'static str,
}

/// Sanitizer applies an ordered set of rules so that messages differing
/// only in volatile tokens collapse into one.
pub struct Sanitizer {
    rules: Vec<Rule>,
    collapse_spaces: bool,
}

/// Options for customizing Sanitizer
pub struct WithCollapseSpaces(pub bool);

const RULES: &[(&str, &str)] = &[
    // URLs go first so their hosts are not rewritten piecemeal.
    (r"\bhttps?://[^\s]+", "<url>"),
    (
        r"\b\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d{1,9})?(?:Z|[+-]\d{2}:\d{2})\b",
        "<ts>",
    ),
    (
        r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-5][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}\b",
        "<uuid>",
    ),
    (r"\b(?:\d{1,3}\.){3}\d{1,3}(?::\d{1,5})?\b", "<ip4>"),
    (r"\b(?:[A-Za-z0-9-]{1,63}\.)+[A-Za-z]{2,}(?::\d{1,5})?\b", "<host>"),
    (r"\b[0-9a-fA-F]{16,64}\b", "<hex>"),
    (r"\b\d+(?:\.\d+)?(?:ns|µs|us|ms|s)\b", "<dur>"),
];

impl Sanitizer {
    pub fn new(opts: WithCollapseSpaces) -> Self {
        let rules = RULES
            .iter()
            .filter_map(|&(pattern, placeholder)| {
                Regex::new(pattern).ok().map(|re| Rule { re, placeholder })
            })
            .collect();

        Self {
            rules,
            collapse_spaces: opts.0,
        }
    }

    pub fn sanitize(&self, msg: &str) -> String {
        if msg.is_empty() {
            return String::new();
        }

        let mut result = msg.to_string();
        for rule in &self.rules {
            result = rule.re.replace_all(&result, rule.placeholder).into_owned();
        }

        if self.collapse_spaces {
            result = result.split_whitespace().collect::<Vec<_>>().join(" ");
        }

        result
    }
}
