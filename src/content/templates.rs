use super::ContentProvider;
use async_trait::async_trait;
use rand::seq::IndexedRandom;

pub const FALLBACK_TOPIC: &str = "Should online debates be limited to 10 minutes?";

const TOPICS: &[(&str, &[&str])] = &[
    (
        "politics",
        &[
            "Should voting be mandatory?",
            "Is a two-party political system effective?",
            "Should the electoral college be abolished?",
        ],
    ),
    (
        "technology",
        &[
            "Is AI development moving too quickly without proper regulation?",
            "Should social media platforms be held responsible for user content?",
            "Is cryptocurrency the future of finance?",
        ],
    ),
    (
        "ethics",
        &[
            "Is it ethical to use animals for scientific research?",
            "Should euthanasia be legalized?",
            "Is capital punishment justified?",
        ],
    ),
    (
        "environment",
        &[
            "Should nuclear energy be a primary solution to climate change?",
            "Are carbon taxes effective in reducing emissions?",
            "Should single-use plastics be banned globally?",
        ],
    ),
    (
        "education",
        &[
            "Should college education be free?",
            "Are standardized tests an effective measure of student ability?",
            "Should schools eliminate homework?",
        ],
    ),
    (
        "health",
        &[
            "Should healthcare be universal and government-provided?",
            "Should vaccines be mandatory?",
            "Is alternative medicine a legitimate form of healthcare?",
        ],
    ),
    (
        "economics",
        &[
            "Is a universal basic income a viable economic policy?",
            "Should there be a maximum wage cap?",
            "Is globalization beneficial for developing countries?",
        ],
    ),
    (
        "social",
        &[
            "Should social media have age restrictions?",
            "Is cancel culture harmful to society?",
            "Should hate speech be protected as free speech?",
        ],
    ),
];

/// Topics from the built-in bank, feedback from canned templates
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateContentProvider;

impl TemplateContentProvider {
    /// Every topic belonging to one of the given categories
    pub fn topics_for(categories: &[String]) -> Vec<&'static str> {
        categories
            .iter()
            .filter_map(|category| TOPICS.iter().find(|(id, _)| id == category))
            .flat_map(|(_, topics)| topics.iter().copied())
            .collect()
    }

    fn feedback_templates(topic: &str) -> [String; 3] {
        [
            format!(
                "The debate on \"{}\" was well-structured with strong arguments from both sides. \
                 The pro side effectively used statistical evidence, while the con side excelled in addressing ethical implications. \
                 For improvement, both sides could benefit from more concrete examples and addressing counterarguments more directly.",
                topic
            ),
            format!(
                "In this debate on \"{}\", participants demonstrated good knowledge of the subject matter. \
                 The arguments were generally logical, though at times emotional appeals overshadowed factual analysis. \
                 The most compelling points were those backed by real-world examples and clear reasoning. \
                 Future debates would benefit from more structured rebuttals.",
                topic
            ),
            format!(
                "The debate regarding \"{}\" showed passionate engagement from all participants. \
                 Strong points were made about societal impacts and practical implementation. \
                 However, some claims lacked sufficient evidence, and there were moments where participants talked over each other. \
                 More focused questioning during the counter-questioning round would enhance the quality of discourse.",
                topic
            ),
        ]
    }
}

#[async_trait]
impl ContentProvider for TemplateContentProvider {
    async fn generate_topic(&self, categories: &[String]) -> String {
        let topics = Self::topics_for(categories);
        topics
            .choose(&mut rand::rng())
            .map(|topic| topic.to_string())
            .unwrap_or_else(|| FALLBACK_TOPIC.to_string())
    }

    async fn generate_feedback(&self, topic: &str, _notes: &str) -> String {
        Self::feedback_templates(topic)
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_default()
    }

    fn name(&self) -> &str {
        "templates"
    }
}
