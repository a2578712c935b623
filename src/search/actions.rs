//! Action suggestions
//!
//! A fixed keyword table maps query words to app shortcuts ("new" offers
//! to create a vibe). Entries are deterministic: fixed ids, titles and
//! icons, scored by how well a query term matches the trigger keyword.

use super::entity::ActionEntity;
use super::fuzzy::{fuzzy_match, fuzzy_score};
use super::parser::ParsedQuery;

struct ActionDef {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    icon: &'static str,
    keywords: &'static [&'static str],
}

const ACTIONS: &[ActionDef] = &[
    ActionDef {
        id: "create-vibe",
        title: "Create a vibe",
        description: "Share a new vibe",
        icon: "plus",
        keywords: &["create", "new", "add", "post"],
    },
    ActionDef {
        id: "view-profile",
        title: "View your profile",
        description: "See your vibes and ratings",
        icon: "user",
        keywords: &["profile", "me", "account"],
    },
    ActionDef {
        id: "open-settings",
        title: "Open settings",
        description: "Change your preferences",
        icon: "settings",
        keywords: &["settings", "preferences", "config"],
    },
    ActionDef {
        id: "discover",
        title: "Discover vibes",
        description: "Browse trending and top-rated vibes",
        icon: "compass",
        keywords: &["discover", "explore", "trending"],
    },
    ActionDef {
        id: "help",
        title: "Get help",
        description: "Guides and support",
        icon: "help",
        keywords: &["help", "support"],
    },
];

/// Actions triggered by the query's terms, in table order, each with its
/// best keyword score scaled by `exact_weight`. Empty when the query has
/// no plain terms.
pub fn suggest_actions(
    query: &ParsedQuery,
    threshold: f64,
    exact_weight: f64,
) -> Vec<(ActionEntity, f64)> {
    if query.terms.is_empty() {
        return Vec::new();
    }

    ACTIONS
        .iter()
        .filter_map(|def| {
            let best = def
                .keywords
                .iter()
                .flat_map(|keyword| query.terms.iter().map(move |term| (keyword, term)))
                .filter(|(keyword, term)| fuzzy_match(term, keyword, threshold))
                .map(|(keyword, term)| fuzzy_score(term, keyword))
                .fold(None, |best: Option<f64>, score| {
                    Some(best.map_or(score, |b| b.max(score)))
                })?;

            let entity = ActionEntity {
                id: def.id.to_string(),
                title: def.title.to_string(),
                description: def.description.to_string(),
                icon: def.icon.to_string(),
            };
            Some((entity, exact_weight * best / 100.0))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::fuzzy::DEFAULT_THRESHOLD;
    use crate::search::parser::QueryParser;

    fn ids(query: &str) -> Vec<String> {
        suggest_actions(&QueryParser::parse(query), DEFAULT_THRESHOLD, 10.0)
            .into_iter()
            .map(|(action, _)| action.id)
            .collect()
    }

    #[test]
    fn test_keyword_triggers_action() {
        assert_eq!(ids("new"), vec!["create-vibe"]);
        assert_eq!(ids("settings"), vec!["open-settings"]);
        assert_eq!(ids("help me"), vec!["view-profile", "help"]);
    }

    #[test]
    fn test_typo_still_triggers() {
        assert_eq!(ids("setings"), vec!["open-settings"]);
    }

    #[test]
    fn test_no_actions_without_terms() {
        assert!(ids("").is_empty());
        assert!(ids("#funny @alice").is_empty());
        assert!(ids("sunset").is_empty());
    }

    #[test]
    fn test_exact_keyword_gets_full_weight() {
        let actions = suggest_actions(&QueryParser::parse("create"), DEFAULT_THRESHOLD, 10.0);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].1, 10.0);
    }
}
