//! Engine router (C3): a pure, total function `Intent -> EnginePlan` (§4.3).
//!
//! The registry is closed by design — adding an engine is a recompilation,
//! not a config change (§4.3).

use crate::types::{EnginePlan, Intent};

pub fn plan_for(intent: Intent) -> EnginePlan {
    let (engines, categories): (&[&'static str], &[&'static str]) = match intent {
        Intent::Research => (&["arxiv", "semantic_scholar", "duckduckgo"], &["science"]),
        Intent::Biomedical => (&["pubmed", "arxiv", "duckduckgo"], &["science"]),
        Intent::Code => (&["github", "stackoverflow", "duckduckgo"], &["it"]),
        Intent::News => (
            &["bing_news", "duckduckgo_news", "duckduckgo"],
            &["news"],
        ),
        Intent::General => (&["duckduckgo", "bing", "brave"], &["general"]),
    };

    EnginePlan {
        engines: engines.to_vec(),
        categories: categories.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_intent_yields_a_nonempty_plan() {
        for intent in [
            Intent::Research,
            Intent::Biomedical,
            Intent::Code,
            Intent::News,
            Intent::General,
        ] {
            let plan = plan_for(intent);
            assert!(!plan.engines.is_empty());
            assert!(!plan.categories.is_empty());
        }
    }

    #[test]
    fn unknown_intent_string_routes_to_general_plan() {
        let intent = Intent::from_label("xyz");
        assert_eq!(intent, Intent::General);
        let plan = plan_for(intent);
        assert_eq!(plan.engines, vec!["duckduckgo", "bing", "brave"]);
    }

    #[test]
    fn research_plan_matches_registry() {
        let plan = plan_for(Intent::Research);
        assert_eq!(plan.engines, vec!["arxiv", "semantic_scholar", "duckduckgo"]);
        assert_eq!(plan.categories, vec!["science"]);
    }
}
