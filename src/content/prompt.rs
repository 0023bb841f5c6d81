//! Request composition for the content service: per-surface style policy
//! combined with the batch settings.
use crate::content::{ImageRequest, RefineRequest, TextRequest};
use crate::model::{RefinementAction, Surface};

/// Upper bound on how much generated text is echoed into an image prompt.
pub const IMAGE_CONTEXT_CHARS: usize = 300;

pub fn surface_rules(surface: Surface, thread_mode: bool) -> &'static str {
    match (surface, thread_mode) {
        (Surface::LinkedIn, true) => {
            "- Create a carousel-style text breakdown (Slide 1, Slide 2, etc.). Professional and structured."
        }
        (Surface::LinkedIn, false) => {
            "- Professional tone, structured, uses paragraphs. Approx 100-150 words."
        }
        (Surface::Twitter, true) => {
            "- Create a numbered thread (1/X, 2/X). Punchy and concise per tweet."
        }
        (Surface::Twitter, false) => {
            "- Under 280 characters. Punchy. Use 1-2 relevant hashtags."
        }
        (Surface::Instagram, true) => {
            "- Create text suitable for a carousel post (Slide 1, Slide 2...). Engaging hooks."
        }
        (Surface::Instagram, false) => {
            "- Engaging hook, emoji friendly, includes a block of 5-10 relevant hashtags at the end."
        }
        (Surface::Threads, true) => "- Create a numbered thread. Conversational and authentic.",
        (Surface::Threads, false) => {
            "- Conversational, authentic tone. Up to 500 characters, concise preferred. No hashtags or very few."
        }
    }
}

pub fn refine_task(action: RefinementAction) -> &'static str {
    match action {
        RefinementAction::Shorten => "Shorten this significantly while keeping the core message.",
        RefinementAction::Expand => {
            "Expand on this with more details, examples, or emotional depth."
        }
        RefinementAction::Funnier => "Make this funnier, wittier, and more lighthearted.",
        RefinementAction::Rewrite => {
            "Rewrite this completely with a fresh perspective but same meaning."
        }
    }
}

/// System instruction for text generation. The topic itself travels as the
/// user content.
pub fn text_instruction(req: &TextRequest) -> String {
    let mut out = format!(
        "You are a social media expert.\n\
         Write a {tone} post for {surface} about the user's topic.\n\n\
         Language: Write strictly in {language}.\n\n\
         Rules for {surface}:\n{rules}\n",
        tone = req.tone,
        surface = req.surface,
        language = req.language,
        rules = surface_rules(req.surface, req.thread_mode),
    );
    let keywords = req.keywords.trim();
    if !keywords.is_empty() {
        out.push_str(&format!("\nMUST INCLUDE these keywords: {}\n", keywords));
    }
    let voice = req.brand_voice.trim();
    if !voice.is_empty() {
        out.push_str(&format!("\nBrand Voice/Style Instructions: {}\n", voice));
    }
    out.push_str("\nDo not include any preamble like \"Here is the post\". Just return the content.");
    out
}

pub fn refine_instruction(req: &RefineRequest) -> String {
    format!(
        "You are a social media editor.\n\
         Platform: {surface}\n\
         Target Tone: {tone}\n\
         Language: {language}\n\n\
         Task: {task}\n\n\
         Maintain platform best practices (length, hashtags, formatting).\n\
         Return ONLY the refined text.",
        surface = req.surface,
        tone = req.tone,
        language = req.language,
        task = refine_task(req.action),
    )
}

pub fn refine_content(req: &RefineRequest) -> String {
    format!("Original Text:\n{}", req.current_text)
}

pub fn image_prompt(req: &ImageRequest) -> String {
    format!(
        "Create a high-quality, photorealistic image to accompany a social media post.\n\n\
         Topic: {topic}\n\
         Vibe/Tone: {tone}\n\n\
         Context from the post text: \"{context}...\"\n\n\
         The image should be optimized for {surface} audiences.\n\
         No text overlays on the image. High fidelity, cinematic lighting.",
        topic = req.topic,
        tone = req.tone,
        context = excerpt(&req.context_text, IMAGE_CONTEXT_CHARS),
        surface = req.surface,
    )
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Language, ModelTier, Tone};

    fn text_req() -> TextRequest {
        TextRequest {
            surface: Surface::Twitter,
            topic: "Bamboo cups".into(),
            tone: Tone::Witty,
            language: Language::Spanish,
            keywords: String::new(),
            brand_voice: String::new(),
            thread_mode: false,
            model_tier: ModelTier::Flash25,
        }
    }

    #[test]
    fn text_instruction_carries_settings_and_rules() {
        let s = text_instruction(&text_req());
        assert!(s.contains("Witty post for Twitter"));
        assert!(s.contains("strictly in Spanish"));
        assert!(s.contains("Under 280 characters"));
        assert!(!s.contains("MUST INCLUDE"));
        assert!(!s.contains("Brand Voice"));
    }

    #[test]
    fn optional_constraints_only_when_present() {
        let mut req = text_req();
        req.keywords = " eco, bamboo ".into();
        req.brand_voice = "playful".into();
        req.thread_mode = true;
        let s = text_instruction(&req);
        assert!(s.contains("MUST INCLUDE these keywords: eco, bamboo"));
        assert!(s.contains("Brand Voice/Style Instructions: playful"));
        assert!(s.contains("numbered thread (1/X, 2/X)"));
    }

    #[test]
    fn excerpt_is_char_bounded() {
        assert_eq!(excerpt("hello", 10), "hello");
        assert_eq!(excerpt("hello", 2), "he");
        assert_eq!(excerpt("héllo", 2), "hé");
        let long = "a".repeat(IMAGE_CONTEXT_CHARS + 50);
        assert_eq!(excerpt(&long, IMAGE_CONTEXT_CHARS).len(), IMAGE_CONTEXT_CHARS);
    }

    #[test]
    fn image_prompt_truncates_context() {
        let req = ImageRequest {
            surface: Surface::Instagram,
            topic: "Launch".into(),
            context_text: format!("{}TAIL", "x".repeat(IMAGE_CONTEXT_CHARS)),
            tone: Tone::Casual,
            model_tier: ModelTier::Pro30,
        };
        let s = image_prompt(&req);
        assert!(s.contains("Topic: Launch"));
        assert!(s.contains("Vibe/Tone: Casual"));
        assert!(!s.contains("TAIL"));
    }

    #[test]
    fn refine_instruction_maps_action() {
        let req = RefineRequest {
            surface: Surface::LinkedIn,
            current_text: "Original".into(),
            action: RefinementAction::Shorten,
            tone: Tone::Professional,
            language: Language::English,
            model_tier: ModelTier::Flash25,
        };
        assert!(refine_instruction(&req).contains("Task: Shorten this significantly"));
        assert_eq!(refine_content(&req), "Original Text:\nOriginal");
    }
}
