use serde::Serialize;

use crate::config::Config;

const HEAVY_KEYWORDS: &[&str] = &[
    "create", "build", "database", "authentication", "auth", "login", "dashboard",
    "backend", "api", "payment", "integrate", "deploy", "full", "complete",
];
const CONJUNCTIONS: &[&str] = &["and", "also", "then", "plus", "additionally", "with"];

const SHORT_PROMPT_CHARS: usize = 50;
const LONG_PROMPT_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Cheap,
    Expensive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub tier: Tier,
    pub model: String,
    pub max_tokens: u32,
}

fn words(prompt: &str) -> impl Iterator<Item = String> + '_ {
    prompt
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

pub fn is_heavy(prompt: &str) -> bool {
    if prompt.chars().count() > LONG_PROMPT_CHARS {
        return true;
    }
    if words(prompt).any(|w| HEAVY_KEYWORDS.contains(&w.as_str())) {
        return true;
    }
    words(prompt).filter(|w| CONJUNCTIONS.contains(&w.as_str())).count() > 2
}

/// Pick the tier. Order matters: short follow-ups are cheap even if they name a
/// heavy keyword; an image on the first turn is always expensive.
pub fn select_tier(prompt: &str, has_image: bool, first_turn: bool) -> Tier {
    let short = prompt.chars().count() < SHORT_PROMPT_CHARS;
    if short && !has_image && !first_turn {
        return Tier::Cheap;
    }
    if has_image && first_turn {
        return Tier::Expensive;
    }
    if is_heavy(prompt) {
        return Tier::Expensive;
    }
    Tier::Cheap
}

pub fn select(prompt: &str, has_image: bool, first_turn: bool, cfg: &Config) -> Route {
    match select_tier(prompt, has_image, first_turn) {
        Tier::Cheap => Route { tier: Tier::Cheap, model: cfg.cheap_model.clone(), max_tokens: cfg.cheap_max_tokens },
        Tier::Expensive => Route {
            tier: Tier::Expensive,
            model: cfg.expensive_model.clone(),
            max_tokens: cfg.expensive_max_tokens,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_follow_up_is_cheap() {
        assert_eq!(select_tier("make the button blue", false, false), Tier::Cheap);
        assert_eq!(select_tier("create a login page", false, false), Tier::Cheap);
    }

    #[test]
    fn image_on_first_turn_is_expensive() {
        assert_eq!(select_tier("copy this", true, true), Tier::Expensive);
    }

    #[test]
    fn heavy_keywords_and_length_are_expensive() {
        assert_eq!(select_tier("create a todo app", false, true), Tier::Expensive);
        assert_eq!(select_tier(&"x".repeat(101), false, false), Tier::Expensive);
        assert_eq!(
            select_tier("please add a header and a footer and a sidebar and icons", false, false),
            Tier::Expensive
        );
    }

    #[test]
    fn plain_first_turn_is_cheap() {
        assert_eq!(select_tier("a small red square", false, true), Tier::Cheap);
        assert!(!is_heavy("recreate")); // whole words only
    }

    #[test]
    fn route_uses_configured_models() {
        let cfg = Config::default();
        let r = select("hello there", false, false, &cfg);
        assert_eq!(r.model, cfg.cheap_model);
        assert_eq!(r.max_tokens, cfg.cheap_max_tokens);
        let r = select("build a dashboard", false, true, &cfg);
        assert_eq!(r.tier, Tier::Expensive);
        assert_eq!(r.max_tokens, cfg.expensive_max_tokens);
    }
}
