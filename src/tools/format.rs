//! Markdown rendering of tool results

use crate::search::{ScoredResult, SearchResponse, SearchableEntity, Suggestions};
use crate::store::{EntityKind, TrendingTerm};

/// Wrap every case-insensitive occurrence of a query word in `**bold**`.
/// Overlapping and adjacent matches merge into one range.
pub fn highlight(text: &str, query: &str) -> String {
    let lower = text.to_lowercase();
    // Lowercasing can change byte lengths; offsets would not line up
    if lower.len() != text.len() {
        return text.to_string();
    }

    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for word in query.split_whitespace() {
        let word = word.trim_start_matches(['#', '@', '-']).trim_matches('"');
        if word.is_empty() || word.contains(':') {
            continue;
        }
        let needle = word.to_lowercase();
        let mut idx = 0usize;
        while let Some(pos) = lower[idx..].find(&needle) {
            let start = idx + pos;
            ranges.push((start, start + needle.len()));
            idx = start + needle.len();
        }
    }

    if ranges.is_empty() {
        return text.to_string();
    }

    ranges.sort_by_key(|r| r.0);
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (s, e) in ranges {
        match merged.last_mut() {
            Some(last) if s <= last.1 => last.1 = last.1.max(e),
            _ => merged.push((s, e)),
        }
    }

    let mut res = String::with_capacity(text.len() + merged.len() * 4);
    let mut last_idx = 0usize;
    for (s, e) in merged {
        res.push_str(&text[last_idx..s]);
        res.push_str("**");
        res.push_str(&text[s..e]);
        res.push_str("**");
        last_idx = e;
    }
    res.push_str(&text[last_idx..]);
    res
}

fn heading(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Vibe => "Vibes",
        EntityKind::User => "Users",
        EntityKind::Tag => "Tags",
        EntityKind::Review => "Reviews",
        EntityKind::Action => "Actions",
    }
}

fn format_result(result: &ScoredResult, query: &str) -> String {
    let line = match &result.entity {
        SearchableEntity::Vibe(v) => {
            let rating = match v.rating_avg {
                Some(avg) => format!("★{:.1} ({})", avg, v.rating_count),
                None => "unrated".to_string(),
            };
            let tags: Vec<String> = v.tags.iter().map(|t| format!("#{}", t)).collect();
            let mut line = format!(
                "{} · {} · {}",
                highlight(&v.title, query),
                rating,
                v.created_at.format("%Y-%m-%d")
            );
            if !v.description.is_empty() {
                line.push_str(&format!("\n  > {}", highlight(&v.description, query)));
            }
            if !tags.is_empty() {
                line.push_str(&format!("\n  {}", tags.join(" ")));
            }
            line
        }
        SearchableEntity::User(u) => {
            let mut line = format!("@{}", highlight(&u.username, query));
            if let Some(name) = &u.full_name {
                line.push_str(&format!(" ({})", highlight(name, query)));
            }
            line.push_str(&format!(" · {} vibes", u.vibe_count));
            if let Some(bio) = &u.bio {
                line.push_str(&format!("\n  > {}", highlight(bio, query)));
            }
            line
        }
        SearchableEntity::Tag(t) => format!("#{} · used {} times", t.name, t.usage_count),
        SearchableEntity::Review(r) => format!(
            "{} {}/5 on {} · {}",
            r.emoji,
            r.value,
            r.vibe_id,
            highlight(&r.text, query)
        ),
        SearchableEntity::Action(a) => format!("{} **{}** · {}", a.icon, a.title, a.description),
    };
    format!("- {} `[{}]` score {:.2}\n", line, result.entity.id(), result.score)
}

/// Render one page of search results
pub fn format_search_response(response: &SearchResponse, query: &str) -> String {
    let mut md = String::new();
    let shown = if query.trim().is_empty() {
        "filters".to_string()
    } else {
        format!("'{}'", query.trim())
    };
    md.push_str(&format!(
        "# Search Results · {} for {}\n\n",
        response.total_count, shown
    ));

    if response.total_count == 0 {
        md.push_str("No matches.\n");
        return md;
    }

    for kind in EntityKind::ALL {
        let results = response.results(kind);
        if results.is_empty() {
            continue;
        }
        md.push_str(&format!(
            "## {} ({} of {})\n\n",
            heading(kind),
            results.len(),
            response.total_counts.get(kind)
        ));
        for result in results {
            md.push_str(&format_result(result, query));
        }
        md.push('\n');
    }

    let page = &response.pagination;
    md.push_str(&format!("---\n\nPage {} of {}", page.page, page.total_pages));
    if let Some(cursor) = &page.next_cursor {
        md.push_str(&format!(" · next cursor `{}`", cursor));
    }
    md.push('\n');
    md
}

pub fn format_suggestions(suggestions: &Suggestions) -> String {
    let mut md = String::new();

    if !suggestions.query.is_empty() {
        md.push_str(&format!("# Suggestions for '{}'\n\n", suggestions.query));
        let groups = [
            (EntityKind::Vibe, &suggestions.vibes),
            (EntityKind::User, &suggestions.users),
            (EntityKind::Tag, &suggestions.tags),
        ];
        for (kind, results) in groups {
            if results.is_empty() {
                continue;
            }
            md.push_str(&format!("## {}\n\n", heading(kind)));
            for result in results {
                md.push_str(&format_result(result, &suggestions.query));
            }
            md.push('\n');
        }
        if suggestions.is_empty() {
            md.push_str("No suggestions.\n");
        }
        return md;
    }

    md.push_str("# Suggestions\n\n");
    if !suggestions.recent_searches.is_empty() {
        md.push_str("## Recent searches\n\n");
        for query in &suggestions.recent_searches {
            md.push_str(&format!("- {}\n", query));
        }
        md.push('\n');
    }
    if !suggestions.trending.is_empty() {
        md.push_str("## Trending\n\n");
        md.push_str(&format_trending_list(&suggestions.trending));
        md.push('\n');
    }
    if !suggestions.popular_tags.is_empty() {
        md.push_str("## Popular tags\n\n");
        for tag in &suggestions.popular_tags {
            md.push_str(&format!("- #{} · used {} times\n", tag.name, tag.usage_count));
        }
        md.push('\n');
    }
    if suggestions.is_empty() {
        md.push_str("Nothing to suggest yet.\n");
    }
    md
}

fn format_trending_list(terms: &[TrendingTerm]) -> String {
    terms
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {} · {} searches\n", i + 1, t.term, t.count))
        .collect()
}

pub fn format_trending(terms: &[TrendingTerm]) -> String {
    let mut md = format!("# Trending Searches · {}\n\n", terms.len());
    if terms.is_empty() {
        md.push_str("No searches tracked yet.\n");
    } else {
        md.push_str(&format_trending_list(terms));
    }
    md
}
