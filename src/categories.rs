//! Keyword-based memory categorization and tagging.
//!
//! Categories are scored by keyword hits: an exact word match counts double,
//! a substring match counts once. Everything scoring at least half of the top
//! score survives, capped at three categories. Content with no hits at all
//! falls back to `other`.

/// Keyword table, in priority order for tie-breaking.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "personal_info",
        &[
            "name", "birthday", "age", "live", "from", "born", "address", "phone", "email",
            "location", "residence", "hometown",
        ],
    ),
    (
        "work",
        &[
            "work", "job", "company", "career", "office", "profession", "colleague", "boss",
            "employee", "business", "occupation", "employer",
        ],
    ),
    (
        "relationships",
        &[
            "friend", "family", "wife", "husband", "child", "parent", "sibling", "partner",
            "mother", "father", "brother", "sister", "son", "daughter", "relative",
        ],
    ),
    (
        "goals",
        &[
            "goal", "plan", "want", "wish", "dream", "aspire", "aim", "objective", "target",
            "ambition", "intention", "purpose",
        ],
    ),
    (
        "knowledge",
        &[
            "know", "learn", "understand", "fact", "information", "study", "research",
            "discover", "education", "knowledge", "skill",
        ],
    ),
    (
        "skills",
        &[
            "skill", "able", "can", "speak", "language", "expertise", "proficient",
            "experienced", "capability", "competence",
        ],
    ),
    (
        "dates_events",
        &[
            "date", "event", "meeting", "appointment", "schedule", "calendar", "tomorrow",
            "yesterday", "today", "week", "month", "year", "deadline", "anniversary",
        ],
    ),
    (
        "preferences",
        &[
            "like", "prefer", "favorite", "enjoy", "love", "hate", "dislike", "interest",
            "hobby", "passion", "taste",
        ],
    ),
    (
        "health",
        &[
            "health", "medical", "doctor", "medicine", "sick", "exercise", "diet", "sleep",
            "illness", "condition", "treatment", "wellness",
        ],
    ),
    (
        "hobbies",
        &[
            "hobby", "fun", "play", "game", "sport", "music", "art", "travel", "read",
            "watch", "leisure", "entertainment",
        ],
    ),
    (
        "technical",
        &[
            "code", "programming", "software", "hardware", "technology", "computer",
            "system", "database", "network", "algorithm",
        ],
    ),
    (
        "finance",
        &[
            "money", "budget", "expense", "income", "save", "invest", "loan", "credit",
            "debt", "financial", "bank", "payment",
        ],
    ),
];

/// Common words ignored during exact-word matching.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "about", "as", "into", "through", "during", "before", "after", "above", "below",
    "between", "under", "again", "further", "then", "once", "is", "am", "are", "was", "were",
    "be", "have", "has", "had", "do", "does", "did", "will", "would", "should", "could",
    "may", "might", "must", "can", "shall",
];

/// Maximum number of categories assigned to a single memory.
const MAX_CATEGORIES: usize = 3;

/// Assign up to three categories to `content`.
pub fn categorize(content: &str) -> Vec<String> {
    let content_lower = content.to_lowercase();
    let normalized: String = content_lower
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    let words: Vec<&str> = normalized
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .collect();

    let mut scores: Vec<(&str, u32)> = Vec::new();
    for (category, keywords) in CATEGORY_KEYWORDS {
        let mut score = 0;
        for keyword in *keywords {
            if words.contains(keyword) {
                score += 2;
            } else if content_lower.contains(keyword) {
                score += 1;
            }
        }
        if score > 0 {
            scores.push((category, score));
        }
    }

    if scores.is_empty() {
        return vec!["other".to_string()];
    }

    let top = scores.iter().map(|(_, score)| *score).max().unwrap_or(0);
    let threshold = (top as f64) * 0.5;
    scores.sort_by(|a, b| b.1.cmp(&a.1));
    scores
        .iter()
        .filter(|(_, score)| (*score as f64) >= threshold)
        .take(MAX_CATEGORIES)
        .map(|(category, _)| category.to_string())
        .collect()
}

/// Short display form of the two most likely categories, for previews.
pub fn suggest_category(content: &str) -> String {
    categorize(content)
        .into_iter()
        .take(2)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Append category tags to content, `"text [#work #goals]"` style.
/// Content that only matched the `other` fallback is left untouched.
pub fn format_with_tags(content: &str, categories: &[String]) -> String {
    if categories.is_empty() || (categories.len() == 1 && categories[0] == "other") {
        return content.to_string();
    }
    let tags = categories
        .iter()
        .map(|category| format!("#{category}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{content} [{tags}]")
}

/// Split a tagged memory back into clean content and its tag list.
/// Content without a trailing tag block is returned unchanged.
pub fn extract_tags(content: &str) -> (String, Vec<String>) {
    let Some(rest) = content.strip_suffix(']') else {
        return (content.to_string(), Vec::new());
    };
    let Some(start) = rest.rfind('[') else {
        return (content.to_string(), Vec::new());
    };

    let inner = &rest[start + 1..];
    let tokens: Vec<&str> = inner.split_whitespace().collect();
    let well_formed = !tokens.is_empty()
        && tokens.iter().all(|token| {
            token.len() > 1
                && token.starts_with('#')
                && token[1..].chars().all(|c| c.is_alphanumeric() || c == '_')
        });
    if !well_formed {
        return (content.to_string(), Vec::new());
    }

    let clean = rest[..start].trim().to_string();
    let tags = tokens
        .iter()
        .map(|token| token.trim_start_matches('#').to_string())
        .collect();
    (clean, tags)
}
