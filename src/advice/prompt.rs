//! Prompt text and markdown cleanup for advice replies

use std::sync::OnceLock;

use regex::Regex;

/// Human-readable form of a class label: `"Potato___Late_blight"` -> `"Potato Late blight"`
pub fn display_label(label: &str) -> String {
    label
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// First message of a session: short cause / treatment / prevention advice
pub fn initial_prompt(crop: &str, label: &str) -> String {
    format!(
        "You are an experienced agricultural expert providing highly concise and practical advice to farmers.\n\
         My {crop} plant has {disease}.\n\
         \n\
         Provide actionable advice, formatted clearly with bullet points.\n\
         Keep the entire response very short and to the point (under 80 words). \
         Avoid any introductory or concluding sentences.\n\
         \n\
         Focus on:\n\
         - **Cause:** (1 sentence max)\n\
         - **Treatment:** (1-2 very short points)\n\
         - **Prevention:** (1-2 very short points)",
        disease = display_label(label),
    )
}

/// Follow-up question within a session
pub fn follow_up_prompt(crop: &str, question: &str) -> String {
    format!(
        "You are an experienced agricultural expert providing highly concise and practical advice to farmers.\n\
         Please answer the following question about {crop} plants.\n\
         Keep the entire response very short and to the point (under 80 words). \
         Avoid any introductory or concluding sentences.\n\
         \n\
         User's question: {question}",
        question = question.trim(),
    )
}

struct Patterns {
    strong_stars: Regex,
    em_stars: Regex,
    strong_underscores: Regex,
    em_underscores: Regex,
    bullets: Regex,
    links: Regex,
    headings: Regex,
    whitespace: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |pattern: &str| Regex::new(pattern).unwrap_or_else(|e| panic!("{pattern}: {e}"));
        Patterns {
            strong_stars: re(r"\*\*([^*]+)\*\*"),
            em_stars: re(r"\*([^*]+)\*"),
            strong_underscores: re(r"__([^_]+)__"),
            em_underscores: re(r"_([^_]+)_"),
            bullets: re(r"(?m)^\s*[-*]\s+"),
            links: re(r"\[(.*?)\]\(.*?\)"),
            headings: re(r"#{1,6} "),
            whitespace: re(r"\s+"),
        }
    })
}

/// Strip markdown emphasis, bullets, headings and link syntax, collapsing
/// whitespace to single spaces
pub fn clean_markdown(text: &str) -> String {
    let p = patterns();
    let text = p.strong_stars.replace_all(text, "$1");
    let text = p.em_stars.replace_all(&text, "$1");
    let text = p.strong_underscores.replace_all(&text, "$1");
    let text = p.em_underscores.replace_all(&text, "$1");
    let text = p.bullets.replace_all(&text, "");
    let text = p.links.replace_all(&text, "$1");
    let text = p.headings.replace_all(&text, "");
    let text = text.replace('*', "");
    p.whitespace.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_label() {
        assert_eq!(display_label("Potato___Late_blight"), "Potato Late blight");
        assert_eq!(display_label("Cashew red rust"), "Cashew red rust");
        assert_eq!(display_label("Leafsmut"), "Leafsmut");
    }

    #[test]
    fn test_prompts_embed_crop_and_disease() {
        let prompt = initial_prompt("Potato", "Potato___Early_blight");
        assert!(prompt.contains("My Potato plant has Potato Early blight."));
        assert!(prompt.contains("under 80 words"));
        assert!(prompt.contains("**Prevention:**"));

        let follow = follow_up_prompt("Rice", "  How often should I spray?  ");
        assert!(follow.contains("about Rice plants"));
        assert!(follow.ends_with("User's question: How often should I spray?"));
    }

    #[test]
    fn test_clean_markdown() {
        let text = "### Advice\n\
                    - **Cause:** Fungus *Alternaria solani*.\n\
                    * __Treatment__: spray _copper_ weekly\n\
                    - See [the guide](https://example.org) for more.";
        assert_eq!(
            clean_markdown(text),
            "Advice Cause: Fungus Alternaria solani. Treatment: spray copper weekly See the guide for more."
        );
    }

    #[test]
    fn test_clean_markdown_plain_text_is_untouched() {
        assert_eq!(clean_markdown("  Rotate crops   yearly. "), "Rotate crops yearly.");
    }
}
