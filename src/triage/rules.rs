use crate::models::{ErrorKind, Priority};

pub const ERRORS_CATEGORY: &str = "errors";
pub const UNKNOWN_CATEGORY: &str = "unknown";
pub const GENERAL_SUBCATEGORY: &str = "general";

/// Ordered rules; the first rule with a pattern starting a word of the unit id or data category wins.
pub const CATEGORY_RULES: &[(&str, &[&str])] = &[
    ("contacts", &["contact", "email", "social", "phone", "people"]),
    ("technology", &["tech", "framework", "stack", "software", "fingerprint"]),
    ("infrastructure", &["infra", "dns", "domain", "server", "host", "network", "ip"]),
    ("security", &["security", "vuln", "threat", "cert", "ssl", "tls", "exposure"]),
    ("content", &["content", "text", "meta", "keyword", "page"]),
];

pub const SUBCATEGORY_RULES: &[(&str, &[&str])] = &[
    ("email", &["email", "mail"]),
    ("social", &["social", "profile"]),
    ("phone", &["phone"]),
    ("subdomain", &["subdomain"]),
    ("domain", &["domain", "dns", "whois"]),
    ("server", &["server", "header"]),
    ("framework", &["framework", "library"]),
    ("cms", &["cms", "wordpress", "drupal"]),
    ("analytics", &["analytics", "tracking"]),
    ("certificate", &["cert", "ssl", "tls"]),
    ("vulnerability", &["vuln", "cve"]),
    ("metadata", &["meta"]),
];

fn first_match(rules: &[(&'static str, &[&str])], haystacks: &[&str]) -> Option<&'static str> {
    let words: Vec<String> = haystacks
        .iter()
        .flat_map(|h| h.split(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect();
    rules
        .iter()
        .find(|(_, patterns)| {
            patterns
                .iter()
                .any(|pattern| words.iter().any(|word| word.starts_with(pattern)))
        })
        .map(|(name, _)| *name)
}

/// Resolves a category from the unit id and the declared data category.
pub fn resolve_category(unit_id: &str, data_category: &str) -> &'static str {
    first_match(CATEGORY_RULES, &[unit_id, data_category]).unwrap_or(UNKNOWN_CATEGORY)
}

pub fn resolve_subcategory(unit_id: &str, data_category: &str) -> &'static str {
    first_match(SUBCATEGORY_RULES, &[unit_id, data_category]).unwrap_or(GENERAL_SUBCATEGORY)
}

pub fn error_subcategory(kind: Option<ErrorKind>) -> &'static str {
    match kind {
        Some(kind) if kind.is_validation() => "validation",
        Some(kind) if kind.is_network() => "network",
        _ => "generic",
    }
}

/// Deterministic priority from confidence, item count and category.
pub fn classify_priority(confidence: f64, item_count: usize, category: &str) -> Priority {
    if category == ERRORS_CATEGORY {
        return Priority::Low;
    }

    if (confidence >= 0.85 && item_count >= 10)
        || (confidence >= 0.9 && item_count >= 5)
        || (category == "security" && confidence >= 0.5)
    {
        return Priority::High;
    }

    if (confidence >= 0.7 && item_count >= 3)
        || confidence >= 0.8
        || (category == "contacts" && confidence >= 0.6)
    {
        return Priority::Medium;
    }

    Priority::Low
}
