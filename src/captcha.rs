//! reCAPTCHA challenge solving via the 2Captcha service.
//!
//! Solving is entirely delegated: the site key and page context are submitted
//! to `in.php`, then `res.php` is polled for the token at a fixed interval.
//! `CAPCHA_NOT_READY` (the literal status the API returns) means retry;
//! any other failure aborts the poll and the search proceeds unsolved.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::poll::{poll_until, PollPolicy, Probe};
use crate::Result;

/// A detected reCAPTCHA widget and the page context needed to solve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// The widget's `data-sitekey` attribute.
    pub site_key: String,
    /// The widget's `data-s` attribute, a one-time token some pages carry.
    pub data_s: Option<String>,
    /// URL of the page hosting the widget.
    pub page_url: String,
}

/// Trait seam for challenge solving, so the orchestrator can be exercised
/// without network access.
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    /// Attempts to solve the challenge. `Ok(None)` means the budget was
    /// exhausted or the service reported a hard error; the caller proceeds
    /// without a token.
    async fn solve(&self, challenge: &Challenge) -> Result<Option<String>>;
}

/// 2Captcha HTTP API client.
pub struct TwoCaptcha {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    poll: PollPolicy,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: i32,
    request: String,
}

impl TwoCaptcha {
    /// Creates a client with the production endpoint and the standard
    /// 5s x 30 polling budget.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://2captcha.com".to_string(),
            http: reqwest::Client::new(),
            poll: PollPolicy::challenge(),
        }
    }

    /// Overrides the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the polling budget.
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Submits the challenge, returning the solving-task id.
    async fn submit(&self, challenge: &Challenge) -> Result<Option<String>> {
        let mut params = vec![
            ("key", self.api_key.as_str()),
            ("method", "userrecaptcha"),
            ("googlekey", challenge.site_key.as_str()),
            ("pageurl", challenge.page_url.as_str()),
            ("json", "1"),
        ];
        if let Some(data_s) = &challenge.data_s {
            params.push(("data-s", data_s.as_str()));
        }

        let response: ApiResponse = self
            .http
            .get(format!("{}/in.php", self.base_url))
            .query(&params)
            .send()
            .await?
            .json()
            .await?;

        if response.status == 1 {
            debug!("Challenge submitted, task id {}", response.request);
            Ok(Some(response.request))
        } else {
            warn!("Challenge submission rejected: {}", response.request);
            Ok(None)
        }
    }

    /// Polls for the solved token.
    async fn await_token(&self, task_id: &str) -> Option<String> {
        poll_until(self.poll, |attempt| async move {
            let result = self
                .http
                .get(format!("{}/res.php", self.base_url))
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("action", "get"),
                    ("id", task_id),
                    ("json", "1"),
                ])
                .send()
                .await;

            let response: ApiResponse = match result {
                Ok(r) => match r.json().await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("Challenge result unreadable: {}", e);
                        return Probe::Abort;
                    }
                },
                Err(e) => {
                    warn!("Challenge result request failed: {}", e);
                    return Probe::Abort;
                }
            };

            if response.status == 1 {
                Probe::Ready(response.request)
            } else if response.request == "CAPCHA_NOT_READY" {
                debug!("Challenge not ready, attempt {}", attempt + 1);
                Probe::NotReady
            } else {
                warn!("Challenge solving failed: {}", response.request);
                Probe::Abort
            }
        })
        .await
    }
}

#[async_trait]
impl ChallengeSolver for TwoCaptcha {
    async fn solve(&self, challenge: &Challenge) -> Result<Option<String>> {
        let Some(task_id) = self.submit(challenge).await? else {
            return Ok(None);
        };
        Ok(self.await_token(&task_id).await)
    }
}

/// JavaScript that injects a solved token into the page's hidden response
/// field and triggers the page's own submission callback.
pub fn injection_script(token: &str) -> String {
    let token_lit = serde_json::Value::String(token.trim().to_string()).to_string();
    format!(
        r#"(function() {{
    const field = document.getElementById('g-recaptcha-response');
    field.setAttribute('style', 'type: text; visibility:visible;');
    field.value = {token_lit};
    field.setAttribute('style', 'display:none;');
    submitCallback();
}})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn challenge() -> Challenge {
        Challenge {
            site_key: "6LfwuyUTAAAAAOAmoS0fdqijC2PbbdH4kjq62Y1b".to_string(),
            data_s: Some("data-s-token".to_string()),
            page_url: "https://www.bing.com/search?q=warmup".to_string(),
        }
    }

    fn fast_poll() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(10), 5)
    }

    #[tokio::test]
    async fn test_solve_returns_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/in.php"))
            .and(query_param("method", "userrecaptcha"))
            .and(query_param("data-s", "data-s-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 1, "request": "42"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .and(query_param("id", "42"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 1, "request": "solved-token"})),
            )
            .mount(&server)
            .await;

        let solver = TwoCaptcha::new("api-key")
            .with_base_url(server.uri())
            .with_poll_policy(fast_poll());
        let token = solver.solve(&challenge()).await.unwrap();
        assert_eq!(token.as_deref(), Some("solved-token"));
    }

    #[tokio::test]
    async fn test_solve_retries_while_not_ready() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/in.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 1, "request": "7"})),
            )
            .mount(&server)
            .await;
        // First two polls report not-ready, then the token arrives.
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 0, "request": "CAPCHA_NOT_READY"})),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 1, "request": "tok"})),
            )
            .mount(&server)
            .await;

        let solver = TwoCaptcha::new("api-key")
            .with_base_url(server.uri())
            .with_poll_policy(fast_poll());
        let token = solver.solve(&challenge()).await.unwrap();
        assert_eq!(token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_solve_aborts_on_hard_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/in.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 1, "request": "9"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": 0, "request": "ERROR_CAPTCHA_UNSOLVABLE"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let solver = TwoCaptcha::new("api-key")
            .with_base_url(server.uri())
            .with_poll_policy(fast_poll());
        let token = solver.solve(&challenge()).await.unwrap();
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn test_solve_submission_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/in.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": 0, "request": "ERROR_WRONG_USER_KEY"}),
            ))
            .mount(&server)
            .await;

        let solver = TwoCaptcha::new("bad-key")
            .with_base_url(server.uri())
            .with_poll_policy(fast_poll());
        let token = solver.solve(&challenge()).await.unwrap();
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn test_solve_exhausts_budget() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/in.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 1, "request": "5"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 0, "request": "CAPCHA_NOT_READY"})),
            )
            .expect(5)
            .mount(&server)
            .await;

        let solver = TwoCaptcha::new("api-key")
            .with_base_url(server.uri())
            .with_poll_policy(fast_poll());
        let token = solver.solve(&challenge()).await.unwrap();
        assert!(token.is_none());
    }

    #[test]
    fn test_injection_script_embeds_token() {
        let js = injection_script("  tok-123\n");
        assert!(js.contains(r#"field.value = "tok-123";"#));
        assert!(js.contains("submitCallback();"));
        assert!(js.contains("g-recaptcha-response"));
    }

    #[test]
    fn test_injection_script_escapes_token() {
        let js = injection_script(r#"a"b\c"#);
        assert!(js.contains(r#"field.value = "a\"b\\c";"#));
    }
}
