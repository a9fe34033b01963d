//! Search orchestration.
//!
//! One linear pipeline per request: load the extraction payload, launch a
//! browser session, land on the search page, deal with a challenge if one is
//! present, then run every query strictly in order and normalize whatever
//! the payload produced. The browser is torn down before the response is
//! assembled, on every path.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::captcha::{ChallengeSolver, TwoCaptcha};
use crate::config::AppConfig;
use crate::envelope::{self, EnvelopeContext, SearchOutcome};
use crate::page::{BrowserPage, SearchPage};
use crate::payload::ExtractionPayload;
use crate::poll::{poll_until, PollPolicy, Probe};
use crate::request::SearchRequest;
use crate::session::BrowserSession;
use crate::Result;

/// Query used for the warmup navigation that lands the session on a SERP
/// before payloads run.
const WARMUP_QUERY: &str = "latest technology news";

/// Marker Bing renders on blocked result pages.
const BLOCK_MARKER: &str = "Our systems have detected";

/// Settle delay after the challenge step, before queries run.
const CHALLENGE_SETTLE: Duration = Duration::from_secs(5);

/// The landing URL for a fresh session.
pub fn warmup_url() -> String {
    format!(
        "https://www.bing.com/search?q={}",
        urlencoding::encode(WARMUP_QUERY)
    )
}

/// Drives the per-query execution loop against one page.
pub struct SearchRunner<'a, P: SearchPage> {
    page: &'a P,
    solver: Option<Arc<dyn ChallengeSolver>>,
    result_poll: PollPolicy,
}

impl<'a, P: SearchPage> SearchRunner<'a, P> {
    /// Creates a runner over a navigated page.
    pub fn new(
        page: &'a P,
        solver: Option<Arc<dyn ChallengeSolver>>,
        result_poll: PollPolicy,
    ) -> Self {
        Self {
            page,
            solver,
            result_poll,
        }
    }

    /// Detects and solves a challenge when one blocks the page. Every
    /// failure in here is logged and swallowed: the search continues
    /// without a solved challenge.
    pub async fn handle_challenge(&self) {
        if let Err(e) = self.try_challenge().await {
            warn!("Challenge handling failed: {}", e);
        }
        if let Ok(source) = self.page.content().await {
            if source.contains(BLOCK_MARKER) {
                error!("Challenge failed; results page is blocked");
            }
        }
    }

    async fn try_challenge(&self) -> Result<()> {
        let Some(challenge) = self.page.probe_challenge().await? else {
            return Ok(());
        };
        debug!("Challenge widget detected, site key {}", challenge.site_key);

        let Some(solver) = &self.solver else {
            warn!("Challenge present but no solver is configured");
            return Ok(());
        };

        match solver.solve(&challenge).await? {
            Some(token) => {
                self.page.inject_challenge_token(&token).await?;
                debug!("Challenge token injected");
            }
            None => warn!("Challenge unsolved; continuing without a token"),
        }
        Ok(())
    }

    /// Runs every query in order and returns one envelope per query.
    pub async fn run(&self, request: &SearchRequest, payload: &ExtractionPayload) -> Vec<Value> {
        let search_type = payload.kind();
        let mut envelopes = Vec::with_capacity(request.queries.len());

        for (index, descriptor) in request.queries.iter().enumerate() {
            debug!(
                "Processing query {} of {}: {}",
                index + 1,
                request.queries.len(),
                descriptor.query()
            );

            let slot = self
                .extract(
                    payload,
                    descriptor.query(),
                    &request.cc,
                    request.qft.as_deref(),
                )
                .await;

            let ctx = EnvelopeContext {
                batch_id: request.batch_id.as_ref(),
                query_id: descriptor.query_id(),
                query: descriptor.query(),
                search_type,
            };
            envelopes.push(envelope::from_slot(slot, &ctx));
        }

        envelopes
    }

    /// Invokes the payload for one query and polls the result slot until it
    /// is populated or the budget runs out.
    async fn extract(
        &self,
        payload: &ExtractionPayload,
        query: &str,
        cc: &str,
        qft: Option<&str>,
    ) -> Option<Value> {
        if let Err(e) = self.page.clear_result_slot().await {
            warn!("Failed to clear result slot: {}", e);
            return None;
        }
        if let Err(e) = self.page.evaluate(&payload.invocation(query, cc, qft)).await {
            warn!("Extraction payload failed to start: {}", e);
            return None;
        }

        poll_until(self.result_poll, |_| async move {
            match self.page.read_result_slot().await {
                Ok(Some(value)) => Probe::Ready(value),
                Ok(None) => Probe::NotReady,
                Err(e) => {
                    warn!("Result slot read failed: {}", e);
                    Probe::Abort
                }
            }
        })
        .await
    }
}

/// Executes a full search request: payload selection, session bootstrap,
/// challenge handling, the per-query loop, and unconditional teardown.
pub async fn execute(config: &AppConfig, request: &SearchRequest) -> Result<SearchOutcome> {
    let search_type = request.search_type();

    let payload = match ExtractionPayload::load(&config.scripts_dir, search_type) {
        Ok(payload) => payload,
        Err(e) => {
            error!("{}", e);
            return Ok(SearchOutcome::Single(envelope::config_failure(
                request.batch_id.as_ref(),
                search_type,
                "Failed to load JavaScript file",
            )));
        }
    };

    let session = BrowserSession::launch(config).await?;
    let result = drive(&session, config, request, &payload).await;
    session.shutdown().await;
    result.map(SearchOutcome::from)
}

async fn drive(
    session: &BrowserSession,
    config: &AppConfig,
    request: &SearchRequest,
    payload: &ExtractionPayload,
) -> Result<Vec<Value>> {
    let page = BrowserPage::new(session.open(&warmup_url()).await?);

    let solver = config.captcha_api_key.as_deref().map(|key| {
        Arc::new(TwoCaptcha::new(key).with_poll_policy(config.challenge_poll))
            as Arc<dyn ChallengeSolver>
    });

    let runner = SearchRunner::new(&page, solver, config.result_poll);
    runner.handle_challenge().await;
    tokio::time::sleep(CHALLENGE_SETTLE).await;

    match page.title().await {
        Ok(title) => debug!("Page title: {}", title),
        Err(e) => warn!("Failed to read page title: {}", e),
    }

    Ok(runner.run(request, payload).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::Challenge;
    use crate::payload::read_slot_script;
    use crate::request::{QueryDescriptor, SearchType};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// A page whose result slot becomes ready after a fixed number of reads.
    struct MockPage {
        scripts: Mutex<Vec<String>>,
        slot_value: Option<Value>,
        ready_after_reads: u32,
        reads: AtomicU32,
        challenge: Option<Challenge>,
        content: String,
    }

    impl MockPage {
        fn new(slot_value: Option<Value>) -> Self {
            Self {
                scripts: Mutex::new(Vec::new()),
                slot_value,
                ready_after_reads: 0,
                reads: AtomicU32::new(0),
                challenge: None,
                content: String::new(),
            }
        }

        fn ready_after(mut self, reads: u32) -> Self {
            self.ready_after_reads = reads;
            self
        }

        fn with_challenge(mut self, challenge: Challenge) -> Self {
            self.challenge = Some(challenge);
            self
        }

        fn scripts(&self) -> Vec<String> {
            self.scripts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchPage for MockPage {
        async fn evaluate(&self, script: &str) -> Result<Option<Value>> {
            self.scripts.lock().unwrap().push(script.to_string());
            if script == read_slot_script() {
                let reads = self.reads.fetch_add(1, Ordering::SeqCst);
                if reads >= self.ready_after_reads {
                    return Ok(self.slot_value.clone());
                }
            }
            Ok(None)
        }

        async fn title(&self) -> Result<String> {
            Ok("Bing".to_string())
        }

        async fn content(&self) -> Result<String> {
            Ok(self.content.clone())
        }

        async fn probe_challenge(&self) -> Result<Option<Challenge>> {
            Ok(self.challenge.clone())
        }
    }

    struct FixedSolver {
        token: Option<String>,
    }

    #[async_trait]
    impl ChallengeSolver for FixedSolver {
        async fn solve(&self, _challenge: &Challenge) -> Result<Option<String>> {
            Ok(self.token.clone())
        }
    }

    struct FailingSolver;

    #[async_trait]
    impl ChallengeSolver for FailingSolver {
        async fn solve(&self, _challenge: &Challenge) -> Result<Option<String>> {
            Err(crate::SerpError::Challenge("service unreachable".to_string()))
        }
    }

    fn fast_poll() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(1), 3)
    }

    fn challenge() -> Challenge {
        Challenge {
            site_key: "site-key".to_string(),
            data_s: None,
            page_url: "https://www.bing.com/".to_string(),
        }
    }

    fn request_with(queries: Vec<QueryDescriptor>) -> SearchRequest {
        SearchRequest {
            queries,
            cc: "US".to_string(),
            batch_id: Some(json!("b1")),
            search_type: Some("image".to_string()),
            qft: None,
        }
    }

    #[tokio::test]
    async fn test_run_one_envelope_per_query_in_order() {
        let page = MockPage::new(Some(json!([{"position": 1}])));
        let runner = SearchRunner::new(&page, None, fast_poll());
        let request = request_with(vec![
            QueryDescriptor::Tagged {
                query: "a".to_string(),
                query_id: Some(json!(1)),
            },
            QueryDescriptor::Tagged {
                query: "b".to_string(),
                query_id: Some(json!(2)),
            },
        ]);
        let payload = ExtractionPayload::from_source(SearchType::Image, "// p");

        let envelopes = runner.run(&request, &payload).await;
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0]["query_id"], json!(1));
        assert_eq!(envelopes[0]["query"], json!("a"));
        assert_eq!(envelopes[1]["query_id"], json!(2));
        assert_eq!(envelopes[1]["query"], json!("b"));
    }

    #[tokio::test]
    async fn test_run_bare_string_query_has_null_id() {
        let page = MockPage::new(Some(json!(["r"])));
        let runner = SearchRunner::new(&page, None, fast_poll());
        let request = request_with(vec![QueryDescriptor::Text("cats".to_string())]);
        let payload = ExtractionPayload::from_source(SearchType::Image, "// p");

        let envelopes = runner.run(&request, &payload).await;
        assert_eq!(envelopes[0]["query_id"], Value::Null);
        assert_eq!(envelopes[0]["batch_id"], json!("b1"));
        assert_eq!(envelopes[0]["success"], json!(true));
        assert_eq!(envelopes[0]["image_results"], json!(["r"]));
    }

    #[tokio::test]
    async fn test_run_clears_slot_before_each_query() {
        let page = MockPage::new(Some(json!([1])));
        let runner = SearchRunner::new(&page, None, fast_poll());
        let request = request_with(vec![
            QueryDescriptor::Text("a".to_string()),
            QueryDescriptor::Text("b".to_string()),
        ]);
        let payload = ExtractionPayload::from_source(SearchType::Image, "// p");

        runner.run(&request, &payload).await;
        let scripts = page.scripts();
        let clears = scripts
            .iter()
            .filter(|s| s.as_str() == "window.fetchResults = null;")
            .count();
        assert_eq!(clears, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_timeout_yields_failure_envelope() {
        // The slot never populates; the full 60-attempt budget elapses on
        // the paused clock.
        let page = MockPage::new(None);
        let runner = SearchRunner::new(&page, None, PollPolicy::result_slot());
        let request = request_with(vec![QueryDescriptor::Text("slow".to_string())]);
        let payload = ExtractionPayload::from_source(SearchType::Image, "// p");

        let envelopes = runner.run(&request, &payload).await;
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0]["success"], json!(false));
        assert_eq!(envelopes[0]["image_results"], json!([]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_timeout_does_not_abort_remaining_queries() {
        // Slot readiness is keyed off total reads: the first query burns the
        // whole 60-attempt budget, the second finds the slot populated.
        let page = MockPage::new(Some(json!([1]))).ready_after(60);
        let runner = SearchRunner::new(&page, None, PollPolicy::result_slot());
        let request = request_with(vec![
            QueryDescriptor::Text("slow".to_string()),
            QueryDescriptor::Text("fast".to_string()),
        ]);
        let payload = ExtractionPayload::from_source(SearchType::Image, "// p");

        let envelopes = runner.run(&request, &payload).await;
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0]["success"], json!(false));
        assert_eq!(envelopes[1]["success"], json!(true));
    }

    #[tokio::test]
    async fn test_run_slot_ready_after_polls() {
        let page = MockPage::new(Some(json!([1, 2]))).ready_after(2);
        let runner = SearchRunner::new(&page, None, fast_poll());
        let request = request_with(vec![QueryDescriptor::Text("q".to_string())]);
        let payload = ExtractionPayload::from_source(SearchType::Image, "// p");

        let envelopes = runner.run(&request, &payload).await;
        assert_eq!(envelopes[0]["success"], json!(true));
        assert_eq!(envelopes[0]["image_results"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_challenge_solved_and_injected() {
        let page = MockPage::new(None).with_challenge(challenge());
        let solver: Arc<dyn ChallengeSolver> = Arc::new(FixedSolver {
            token: Some("tok-1".to_string()),
        });
        let runner = SearchRunner::new(&page, Some(solver), fast_poll());

        runner.handle_challenge().await;
        let scripts = page.scripts();
        assert!(scripts.iter().any(|s| s.contains(r#"field.value = "tok-1";"#)));
    }

    #[tokio::test]
    async fn test_challenge_absent_is_silent() {
        let page = MockPage::new(None);
        let solver: Arc<dyn ChallengeSolver> = Arc::new(FixedSolver {
            token: Some("tok".to_string()),
        });
        let runner = SearchRunner::new(&page, Some(solver), fast_poll());

        runner.handle_challenge().await;
        assert!(page.scripts().is_empty());
    }

    #[tokio::test]
    async fn test_challenge_unsolved_continues() {
        let page = MockPage::new(None).with_challenge(challenge());
        let solver: Arc<dyn ChallengeSolver> = Arc::new(FixedSolver { token: None });
        let runner = SearchRunner::new(&page, Some(solver), fast_poll());

        runner.handle_challenge().await;
        assert!(page.scripts().is_empty());
    }

    #[tokio::test]
    async fn test_challenge_solver_error_is_swallowed() {
        let page = MockPage::new(None).with_challenge(challenge());
        let solver: Arc<dyn ChallengeSolver> = Arc::new(FailingSolver);
        let runner = SearchRunner::new(&page, Some(solver), fast_poll());

        // Must not panic or propagate.
        runner.handle_challenge().await;
        assert!(page.scripts().is_empty());
    }

    #[tokio::test]
    async fn test_run_empty_queries_is_zero_envelopes() {
        let page = MockPage::new(Some(json!([1])));
        let runner = SearchRunner::new(&page, None, fast_poll());
        let request = request_with(Vec::new());
        let payload = ExtractionPayload::from_source(SearchType::Image, "// p");

        let envelopes = runner.run(&request, &payload).await;
        assert!(envelopes.is_empty());
    }

    #[test]
    fn test_warmup_url_is_encoded() {
        let url = warmup_url();
        assert!(url.starts_with("https://www.bing.com/search?q="));
        assert!(!url.contains(' '));
    }
}
