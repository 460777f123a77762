use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

struct Rule {
    detect: Regex,
    issue: &'static str,
}

static DENY_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    let rule = |pattern: &str, issue: &'static str| Rule {
        detect: Regex::new(pattern).expect("html deny-list regex"),
        issue,
    };
    vec![
        rule(r"(?i)<\s*/?\s*script\b", "Disallowed script tags"),
        rule(
            r#"(?i)<[^>]*\son[a-z]+\s*="#,
            "Disallowed inline event handler attributes",
        ),
        rule(r"(?i)javascript\s*:", "Disallowed javascript: URIs"),
        rule(r"(?i)vbscript\s*:", "Disallowed vbscript: URIs"),
        rule(r"(?i)data\s*:\s*text/html", "Disallowed data:text/html URIs"),
        rule(
            r"(?i)<\s*/?\s*(iframe|frame|frameset|object|embed|applet)\b",
            "Disallowed embedded frame or object tags",
        ),
        rule(
            r#"(?i)<\s*meta\b[^>]*http-equiv\s*=\s*["']?\s*refresh"#,
            "Disallowed meta refresh tags",
        ),
        rule(r"(?i)<\s*base\b", "Disallowed base tags"),
        rule(r"(?i)expression\s*\(", "Disallowed CSS expressions"),
    ]
});

static BLOCK_ELEMENTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "iframe", "object", "applet", "frameset"]
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<\s*{tag}\b[^>]*>.*?<\s*/\s*{tag}\s*>"))
                .expect("html block regex")
        })
        .collect()
});

static STRAY_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*/?\s*(script|iframe|frame|frameset|object|embed|applet|base)\b[^>]*>")
        .expect("html tag regex")
});

static META_REFRESH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<\s*meta\b[^>]*http-equiv\s*=\s*["']?\s*refresh[^>]*>"#)
        .expect("html meta regex")
});

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("html tag regex"));

static EVENT_HANDLERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).expect("html handler regex")
});

static DANGEROUS_URIS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(javascript|vbscript)\s*:|data\s*:\s*text/html").expect("html uri regex")
});

static CSS_EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)expression\s*\(").expect("html css regex"));

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HtmlReport {
    pub valid: bool,
    pub issues: Vec<String>,
}

pub fn validate_html_structure(html: &str) -> HtmlReport {
    let mut issues: Vec<String> = DENY_RULES
        .iter()
        .filter(|rule| rule.detect.is_match(html))
        .map(|rule| rule.issue.to_string())
        .collect();
    if html.contains('\0') {
        issues.push("Null bytes are not allowed".to_string());
    }
    HtmlReport {
        valid: issues.is_empty(),
        issues,
    }
}

// Sanitizing twice changes nothing further; the loop covers constructs that
// only appear once an enclosing one is removed.
pub fn sanitize_html(html: &str) -> String {
    let mut current = html.replace('\0', "");
    loop {
        let mut next = current.clone();
        for block in BLOCK_ELEMENTS.iter() {
            next = block.replace_all(&next, "").into_owned();
        }
        next = STRAY_TAGS.replace_all(&next, "").into_owned();
        next = META_REFRESH.replace_all(&next, "").into_owned();
        next = TAGS
            .replace_all(&next, |caps: &regex::Captures| {
                EVENT_HANDLERS.replace_all(&caps[0], "").into_owned()
            })
            .into_owned();
        next = DANGEROUS_URIS.replace_all(&next, "blocked:").into_owned();
        next = CSS_EXPRESSION.replace_all(&next, "blocked(").into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}
