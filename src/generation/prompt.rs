// file: src/generation/prompt.rs
// description: deterministic rendering of the grounded relief-assistant prompt
// reference: retrieval-augmented prompt construction

use crate::models::{Document, Location};
use std::fmt::Write;

const PREAMBLE: &str = "You are a compassionate disaster relief assistant providing accurate, \
actionable information to people who may be in urgent situations.";

/// Numbered response rules appended to every prompt, in order.
pub const RESPONSE_DIRECTIVES: [&str; 7] = [
    "Answer the user's question directly using the retrieved information first; do not simply refer them to links or websites.",
    "Extract concrete facts from the retrieved information, such as phone numbers, addresses, shelter locations and step-by-step instructions, instead of deflecting.",
    "Organize the response with bullet points so it is easy to scan.",
    "Cite sources only at the end of the response, as markdown links to their URLs.",
    "Use a compassionate tone that acknowledges the stress of a disaster situation.",
    "When choosing which facts to surface, prefer official government sources and recognized relief organizations.",
    "If the retrieved information is incomplete or you are uncertain, say so explicitly and suggest reliable alternative resources.",
];

/// Everything the prompt is rendered from.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub query: &'a str,
    pub documents: &'a [Document],
    pub location: Option<&'a Location>,
}

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(query: &str, documents: &[Document], location: Option<&Location>) -> String {
        Self::render(&PromptInput {
            query,
            documents,
            location,
        })
    }

    /// Renders preamble, query, optional location, evidence and directives.
    pub fn render(input: &PromptInput<'_>) -> String {
        let mut prompt = String::new();

        prompt.push_str(PREAMBLE);
        prompt.push_str("\n\n");

        let _ = writeln!(prompt, "USER QUERY: \"{}\"", input.query);
        prompt.push('\n');

        if let Some(block) = input.location.and_then(Self::location_block) {
            prompt.push_str(&block);
            prompt.push('\n');
        }

        prompt.push_str("RETRIEVED INFORMATION:\n```json\n");
        prompt.push_str(&Self::serialize_documents(input.documents));
        prompt.push_str("\n```\n\n");

        prompt.push_str("Please provide a clear, concise, and empathetic response that follows these rules:\n");
        for (idx, directive) in RESPONSE_DIRECTIVES.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}", idx + 1, directive);
        }

        prompt
    }

    /// Lists only the known parts of the location; `None` when nothing is known.
    fn location_block(location: &Location) -> Option<String> {
        let mut lines = String::new();
        for (label, value) in [
            ("City", location.city()),
            ("State", location.state()),
            ("Country", location.country()),
        ] {
            if !value.is_empty() {
                let _ = writeln!(lines, "- {}: {}", label, value);
            }
        }
        if let Some((lat, lng)) = location.coordinates() {
            let _ = writeln!(lines, "- Coordinates: {:.4}, {:.4}", lat, lng);
        }
        (!lines.is_empty()).then(|| format!("USER LOCATION:\n{}", lines))
    }

    fn serialize_documents(documents: &[Document]) -> String {
        // Documents hold only strings, so serialization cannot fail.
        serde_json::to_string_pretty(documents).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shelter_docs() -> Vec<Document> {
        vec![
            Document::new(
                "Evacuation shelters",
                "Pasadena Convention Center, 300 E Green St. Call 211.",
                "www.ca.gov",
                "https://www.ca.gov/lafires/",
            ),
            Document::new(
                "Red Cross shelters",
                "Call 1-800-RED-CROSS for shelter availability.",
                "www.redcross.org",
                "https://www.redcross.org/get-help.html",
            ),
        ]
    }

    #[test]
    fn test_renders_full_prompt_without_location() {
        let docs = vec![Document::new("T", "C", "S", "https://u")];
        let prompt = PromptBuilder::build("need water", &docs, None);

        let expected = format!(
            "{}\n\nUSER QUERY: \"need water\"\n\nRETRIEVED INFORMATION:\n```json\n[\n  {{\n    \"title\": \"T\",\n    \"content\": \"C\",\n    \"source\": \"S\",\n    \"url\": \"https://u\"\n  }}\n]\n```\n\nPlease provide a clear, concise, and empathetic response that follows these rules:\n{}",
            PREAMBLE,
            RESPONSE_DIRECTIVES
                .iter()
                .enumerate()
                .map(|(i, d)| format!("{}. {}\n", i + 1, d))
                .collect::<String>()
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_location_block_absent_when_no_location() {
        let prompt = PromptBuilder::build("shelter", &shelter_docs(), None);
        assert!(!prompt.contains("USER LOCATION"));
        assert!(!prompt.contains("Unknown"));
    }

    #[test]
    fn test_blank_location_renders_like_no_location() {
        let blank = Location::default();
        assert_eq!(
            PromptBuilder::build("shelter", &[], Some(&blank)),
            PromptBuilder::build("shelter", &[], None)
        );
        assert!(!PromptBuilder::build("shelter", &[], Some(&blank)).contains("USER LOCATION"));
    }

    #[test]
    fn test_coordinates_alone_keep_the_block() {
        let location = Location::default().with_coordinates(34.0522, -118.2437);
        let prompt = PromptBuilder::build("shelter", &[], Some(&location));
        assert!(prompt.contains("USER LOCATION:\n- Coordinates: 34.0522, -118.2437\n\n"));
    }

    #[test]
    fn test_location_block_lists_known_fields_in_order() {
        let location = Location::new("Los Angeles", "CA", "US").with_coordinates(34.0522, -118.2437);
        let prompt = PromptBuilder::build("shelter", &shelter_docs(), Some(&location));

        let query_at = prompt.find("USER QUERY").unwrap();
        let location_at = prompt.find("USER LOCATION").unwrap();
        let docs_at = prompt.find("RETRIEVED INFORMATION").unwrap();
        let rules_at = prompt.find("1. ").unwrap();
        assert!(query_at < location_at && location_at < docs_at && docs_at < rules_at);

        assert!(prompt.contains("- City: Los Angeles\n- State: CA\n- Country: US\n"));
        assert!(prompt.contains("- Coordinates: 34.0522, -118.2437"));
    }

    #[test]
    fn test_partial_location_omits_unknown_fields() {
        let location = Location::new("", "TX", "");
        let prompt = PromptBuilder::build("flood", &[], Some(&location));
        assert!(prompt.contains("USER LOCATION:\n- State: TX\n\n"));
        assert!(!prompt.contains("City:"));
    }

    #[test]
    fn test_query_echoed_verbatim() {
        let query = "I need water & shelter near me \"today\"";
        let prompt = PromptBuilder::build(query, &shelter_docs(), None);
        assert!(prompt.contains(query));
    }

    #[test]
    fn test_empty_documents_still_well_formed() {
        let prompt = PromptBuilder::build("shelter", &[], None);
        assert!(prompt.contains("RETRIEVED INFORMATION:\n```json\n[]\n```"));
        assert!(prompt.ends_with(&format!("7. {}\n", RESPONSE_DIRECTIVES[6])));
    }

    #[test]
    fn test_documents_rendered_in_retrieval_order() {
        let prompt = PromptBuilder::build("shelter", &shelter_docs(), None);
        let first = prompt.find("https://www.ca.gov/lafires/").unwrap();
        let second = prompt.find("https://www.redcross.org/get-help.html").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let location = Location::new("Austin", "TX", "US");
        let a = PromptBuilder::build("flood", &shelter_docs(), Some(&location));
        let b = PromptBuilder::build("flood", &shelter_docs(), Some(&location));
        assert_eq!(a, b);
    }
}
