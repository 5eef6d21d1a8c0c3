// file: src/pipeline/orchestrator.rs
// description: sequences locate, enrich, retrieve, prompt and generate for one query
// reference: orchestrates the retrieval-augmented answer workflow

use crate::config::Config;
use crate::database::VectorStore;
use crate::error::{PipelineError, Result};
use crate::generation::{OpenAiChatClient, PromptBuilder, ResponseGenerator};
use crate::geo::{IpInfoResolver, LocationResolver, NoopLocationResolver};
use crate::models::{Document, LocationLookup};
use crate::pipeline::stage::PipelineStage;
use crate::retrieval::{ContextRetriever, QueryEnricher};
use crate::utils::Validator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

const DEFAULT_LOCATE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// The generated response plus the evidence it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub query_id: Uuid,
    pub text: String,
    pub enriched_query: String,
    pub location: LocationLookup,
    pub documents: Vec<Document>,
}

/// Stateless per call; holds only shared, immutable collaborator handles.
#[derive(Clone)]
pub struct RagPipeline {
    locator: Arc<dyn LocationResolver>,
    retriever: ContextRetriever,
    generator: Arc<dyn ResponseGenerator>,
    locate_timeout: Duration,
    deadline: Duration,
}

impl RagPipeline {
    pub fn new(
        locator: Arc<dyn LocationResolver>,
        retriever: ContextRetriever,
        generator: Arc<dyn ResponseGenerator>,
    ) -> Self {
        Self {
            locator,
            retriever,
            generator,
            locate_timeout: DEFAULT_LOCATE_TIMEOUT,
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Wires the production collaborators around an already opened store.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn VectorStore>,
        use_location: bool,
    ) -> Result<Self> {
        let locator: Arc<dyn LocationResolver> = if use_location && config.location.enabled {
            Arc::new(IpInfoResolver::new(&config.location)?)
        } else {
            Arc::new(NoopLocationResolver)
        };
        let retriever = ContextRetriever::with_limit(store, config.vector_store.result_limit)?;
        let generator = Arc::new(OpenAiChatClient::new(&config.model)?);

        Ok(Self::new(locator, retriever, generator)
            .with_locate_timeout(Duration::from_secs(config.location.timeout_secs))
            .with_deadline(Duration::from_secs(config.pipeline.timeout_secs)))
    }

    pub fn with_locate_timeout(mut self, timeout: Duration) -> Self {
        self.locate_timeout = timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn retriever(&self) -> &ContextRetriever {
        &self.retriever
    }

    pub fn locator(&self) -> &Arc<dyn LocationResolver> {
        &self.locator
    }

    pub fn generator(&self) -> &Arc<dyn ResponseGenerator> {
        &self.generator
    }

    /// Like [`RagPipeline::answer`] but bounded by the configured deadline.
    pub async fn answer_with_deadline(&self, query: &str) -> Result<Answer> {
        tokio::time::timeout(self.deadline, self.answer(query))
            .await
            .map_err(|_| PipelineError::Timeout {
                stage: "pipeline".to_string(),
                secs: self.deadline.as_secs(),
            })?
    }

    /// Runs one query end to end. Retrieval and generation failures abort
    /// this query only; a failed location lookup just skips enrichment.
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        Validator::validate_query(query)?;

        let query_id = Uuid::new_v4();
        let span = info_span!("rag_query", %query_id);
        self.run(query_id, query).instrument(span).await
    }

    async fn run(&self, query_id: Uuid, query: &str) -> Result<Answer> {
        let mut stage = PipelineStage::Start;
        info!("Answering query: {}", query);

        advance(&mut stage);
        let location = tokio::time::timeout(self.locate_timeout, self.locator.resolve())
            .await
            .unwrap_or_else(|_| {
                warn!("{} location lookup timed out", self.locator.name());
                LocationLookup::Absent
            });
        // Resolvers may hand back a location with no place names.
        let location = match location {
            LocationLookup::Resolved(found) => LocationLookup::from(Some(found)),
            LocationLookup::Absent => LocationLookup::Absent,
        };

        advance(&mut stage);
        let enriched_query = QueryEnricher::enrich(query, location.as_location());
        debug!("Enriched query: {}", enriched_query);

        advance(&mut stage);
        let documents = self
            .retriever
            .retrieve(&enriched_query)
            .await
            .map_err(|e| fail(&mut stage, e))?;

        advance(&mut stage);
        let prompt = PromptBuilder::build(query, &documents, location.as_location());

        advance(&mut stage);
        let text = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| fail(&mut stage, e))?;

        advance(&mut stage);
        info!(
            "Answered with {} documents from {}",
            documents.len(),
            self.retriever.store().collection()
        );

        Ok(Answer {
            query_id,
            text,
            enriched_query,
            location,
            documents,
        })
    }
}

fn advance(stage: &mut PipelineStage) {
    let next = stage.advance();
    debug!("{} -> {}", stage, next);
    *stage = next;
}

fn fail(stage: &mut PipelineStage, error: PipelineError) -> PipelineError {
    warn!("{} failed: {}", stage, error);
    *stage = stage.fail();
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::RESPONSE_DIRECTIVES;
    use crate::models::{DisasterRecord, Location};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedLocation(LocationLookup);

    #[async_trait]
    impl LocationResolver for FixedLocation {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn resolve(&self) -> LocationLookup {
            self.0.clone()
        }
    }

    struct HangingLocation;

    #[async_trait]
    impl LocationResolver for HangingLocation {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn resolve(&self) -> LocationLookup {
            tokio::time::sleep(Duration::from_secs(30)).await;
            LocationLookup::Resolved(Location::new("Nowhere", "NA", "NA"))
        }
    }

    /// Ranks records by how many query words they contain, ties by insertion order.
    struct KeywordStore {
        records: Vec<DisasterRecord>,
        queries: Mutex<Vec<String>>,
        fail_next: AtomicUsize,
    }

    impl KeywordStore {
        fn new(records: Vec<DisasterRecord>) -> Self {
            Self {
                records,
                queries: Mutex::new(Vec::new()),
                fail_next: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VectorStore for KeywordStore {
        fn name(&self) -> &'static str {
            "keyword"
        }

        fn collection(&self) -> &str {
            "DisasterInfo"
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn ensure_collection(&self) -> Result<bool> {
            Ok(false)
        }

        async fn insert(&self, _record: &DisasterRecord) -> Result<()> {
            Ok(())
        }

        async fn near_text(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
            self.queries.lock().unwrap().push(query.to_string());
            if self.fail_next.load(Ordering::SeqCst) > 0 {
                self.fail_next.fetch_sub(1, Ordering::SeqCst);
                return Err(PipelineError::Retrieval("collection unreachable".to_string()));
            }

            let words: HashSet<String> = query
                .split_whitespace()
                .map(|w| w.to_lowercase())
                .collect();
            let mut scored: Vec<(usize, usize, &DisasterRecord)> = self
                .records
                .iter()
                .enumerate()
                .map(|(idx, record)| {
                    let text = format!("{} {}", record.title, record.content).to_lowercase();
                    let score = words.iter().filter(|w| text.contains(w.as_str())).count();
                    (score, idx, record)
                })
                .filter(|(score, _, _)| *score > 0)
                .collect();
            scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

            Ok(scored
                .into_iter()
                .take(limit)
                .map(|(_, _, record)| record.to_document())
                .collect())
        }
    }

    /// Answers from the evidence embedded in the prompt, citing urls at the end.
    struct GroundedGenerator {
        prompts: Mutex<Vec<String>>,
        fail_next: AtomicUsize,
    }

    impl GroundedGenerator {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                fail_next: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ResponseGenerator for GroundedGenerator {
        fn model(&self) -> &str {
            "grounded-fake"
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail_next.load(Ordering::SeqCst) > 0 {
                self.fail_next.fetch_sub(1, Ordering::SeqCst);
                return Err(PipelineError::Generation("rate limited".to_string()));
            }

            let start = prompt.find("```json\n").unwrap() + "```json\n".len();
            let end = start + prompt[start..].find("\n```").unwrap();
            let docs: Vec<Document> = serde_json::from_str(&prompt[start..end]).unwrap();

            let mut answer = String::from("I'm sorry you're dealing with this. Here is what I found:\n");
            for doc in &docs {
                answer.push_str(&format!("- {}: {}\n", doc.title, doc.content));
            }
            answer.push_str("\nSources:\n");
            for doc in &docs {
                answer.push_str(&format!("- [{}]({})\n", doc.title, doc.url));
            }
            Ok(answer)
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl ResponseGenerator for SlowGenerator {
        fn model(&self) -> &str {
            "slow"
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("late".to_string())
        }
    }

    fn record(title: &str, content: &str, url: &str) -> DisasterRecord {
        DisasterRecord {
            url: url.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            source: url.split('/').nth(2).unwrap_or_default().to_string(),
            timestamp: "2025-01-10 12:00:00".to_string(),
        }
    }

    fn shelter_records() -> Vec<DisasterRecord> {
        vec![
            record(
                "Los Angeles evacuation shelters",
                "Shelter and water available at Pasadena Convention Center, 300 E Green St.",
                "https://www.ca.gov/lafires/",
            ),
            record(
                "Red Cross shelter near you",
                "Call 1-800-RED-CROSS to find a shelter.",
                "https://www.redcross.org/get-help.html",
            ),
        ]
    }

    fn la() -> LocationLookup {
        LocationLookup::Resolved(Location::new("Los Angeles", "CA", "US"))
    }

    fn pipeline(
        location: LocationLookup,
        store: Arc<KeywordStore>,
        generator: Arc<GroundedGenerator>,
    ) -> RagPipeline {
        RagPipeline::new(
            Arc::new(FixedLocation(location)),
            ContextRetriever::new(store),
            generator,
        )
    }

    #[tokio::test]
    async fn test_end_to_end_answer_is_grounded() {
        let store = Arc::new(KeywordStore::new(shelter_records()));
        let generator = Arc::new(GroundedGenerator::new());
        let pipeline = pipeline(la(), store.clone(), generator.clone());

        let answer = pipeline
            .answer("I need water and shelter near me")
            .await
            .unwrap();

        assert_eq!(
            answer.enriched_query,
            "I need water and shelter near me in Los Angeles CA US"
        );
        assert_eq!(
            *store.queries.lock().unwrap(),
            vec!["I need water and shelter near me in Los Angeles CA US".to_string()]
        );
        assert_eq!(answer.documents.len(), 2);
        assert!(!answer.text.trim().is_empty());
        assert!(answer.text.contains("https://www.ca.gov/lafires/"));
        for directive in RESPONSE_DIRECTIVES {
            assert!(!answer.text.contains(directive));
        }

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("USER QUERY: \"I need water and shelter near me\""));
        assert!(prompts[0].contains("- City: Los Angeles"));
    }

    #[tokio::test]
    async fn test_absent_location_uses_raw_query() {
        let store = Arc::new(KeywordStore::new(shelter_records()));
        let generator = Arc::new(GroundedGenerator::new());
        let pipeline = pipeline(LocationLookup::Absent, store.clone(), generator.clone());

        let answer = pipeline.answer("shelter").await.unwrap();
        assert_eq!(answer.enriched_query, "shelter");
        assert!(answer.location.is_absent());
        assert!(!generator.prompts.lock().unwrap()[0].contains("USER LOCATION"));
    }

    #[tokio::test]
    async fn test_blank_resolved_location_is_treated_as_absent() {
        let store = Arc::new(KeywordStore::new(shelter_records()));
        let generator = Arc::new(GroundedGenerator::new());
        let pipeline = pipeline(
            LocationLookup::Resolved(Location::default()),
            store,
            generator.clone(),
        );

        let answer = pipeline.answer("shelter").await.unwrap();
        assert!(answer.location.is_absent());
        assert_eq!(answer.enriched_query, "shelter");
        assert!(!generator.prompts.lock().unwrap()[0].contains("USER LOCATION"));
    }

    #[tokio::test]
    async fn test_hanging_locator_degrades_to_absent() {
        let store = Arc::new(KeywordStore::new(shelter_records()));
        let pipeline = RagPipeline::new(
            Arc::new(HangingLocation),
            ContextRetriever::new(store),
            Arc::new(GroundedGenerator::new()),
        )
        .with_locate_timeout(Duration::from_millis(20));

        let answer = pipeline.answer("shelter").await.unwrap();
        assert!(answer.location.is_absent());
        assert_eq!(answer.enriched_query, "shelter");
    }

    #[tokio::test]
    async fn test_no_matches_still_generates() {
        let store = Arc::new(KeywordStore::new(shelter_records()));
        let generator = Arc::new(GroundedGenerator::new());
        let pipeline = pipeline(LocationLookup::Absent, store, generator.clone());

        let answer = pipeline.answer("earthquake").await.unwrap();
        assert!(answer.documents.is_empty());
        assert!(generator.prompts.lock().unwrap()[0].contains("```json\n[]\n```"));
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_query() {
        let store = Arc::new(KeywordStore::new(shelter_records()));
        let generator = Arc::new(GroundedGenerator::new());
        let pipeline = pipeline(la(), store.clone(), generator.clone());

        store.fail_next.store(1, Ordering::SeqCst);
        let err = pipeline.answer("shelter").await.unwrap_err();
        assert!(matches!(err, PipelineError::Retrieval(_)));
        assert!(generator.prompts.lock().unwrap().is_empty());

        generator.fail_next.store(1, Ordering::SeqCst);
        let err = pipeline.answer("shelter").await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));

        assert!(pipeline.answer("shelter").await.is_ok());
    }

    #[tokio::test]
    async fn test_retrieval_is_idempotent() {
        let store = Arc::new(KeywordStore::new(shelter_records()));
        let retriever = ContextRetriever::new(store);

        let first = retriever.retrieve("shelter water").await.unwrap();
        let second = retriever.retrieve("shelter water").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].url, "https://www.ca.gov/lafires/");
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let store = Arc::new(KeywordStore::new(shelter_records()));
        let pipeline = pipeline(la(), store.clone(), Arc::new(GroundedGenerator::new()));

        assert!(matches!(
            pipeline.answer("   ").await,
            Err(PipelineError::Validation(_))
        ));
        assert!(store.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deadline_bounds_whole_pipeline() {
        let store = Arc::new(KeywordStore::new(shelter_records()));
        let pipeline = RagPipeline::new(
            Arc::new(FixedLocation(LocationLookup::Absent)),
            ContextRetriever::new(store),
            Arc::new(SlowGenerator),
        )
        .with_deadline(Duration::from_millis(50));

        let err = pipeline.answer_with_deadline("shelter").await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { .. }));
    }
}
