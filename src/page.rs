//! Page-execution channel.
//!
//! The extraction payloads hand results back through a page-global slot.
//! `SearchPage` wraps that handoff (plus challenge probing and token
//! injection) behind a trait so the orchestrator never touches ambient page
//! state directly and can be exercised against a scripted fake.

use async_trait::async_trait;
use chromiumoxide::Page;
use serde_json::Value;
use tracing::{debug, warn};

use crate::captcha::{injection_script, Challenge};
use crate::payload::{clear_slot_script, read_slot_script};
use crate::{Result, SerpError};

/// CSS selector of the challenge widget on the landing page.
const CHALLENGE_SELECTOR: &str = "div#recaptcha";

/// Operations the per-query loop needs from the page-execution context.
#[async_trait]
pub trait SearchPage: Send + Sync {
    /// Evaluates a script in page context, returning its value if any.
    async fn evaluate(&self, script: &str) -> Result<Option<Value>>;

    /// Reads the page title.
    async fn title(&self) -> Result<String>;

    /// Reads the rendered page source.
    async fn content(&self) -> Result<String>;

    /// Probes for a challenge widget. `None` is the common case and not an
    /// error.
    async fn probe_challenge(&self) -> Result<Option<Challenge>>;

    /// Clears the result slot ahead of a query.
    async fn clear_result_slot(&self) -> Result<()> {
        self.evaluate(&clear_slot_script()).await?;
        Ok(())
    }

    /// Reads the result slot; `None` while the payload has not populated it.
    async fn read_result_slot(&self) -> Result<Option<Value>> {
        let value = self.evaluate(&read_slot_script()).await?;
        Ok(value.filter(|v| !v.is_null()))
    }

    /// Injects a solved token and triggers the page's submission callback.
    async fn inject_challenge_token(&self, token: &str) -> Result<()> {
        self.evaluate(&injection_script(token)).await?;
        Ok(())
    }
}

/// `SearchPage` over a live chromiumoxide page.
pub struct BrowserPage {
    page: Page,
}

impl BrowserPage {
    /// Wraps a navigated page.
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Returns the underlying CDP page handle.
    pub fn inner(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl SearchPage for BrowserPage {
    async fn evaluate(&self, script: &str) -> Result<Option<Value>> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| SerpError::Browser(format!("Script evaluation failed: {}", e)))?;
        Ok(result.value().cloned())
    }

    async fn title(&self) -> Result<String> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| SerpError::Browser(format!("Failed to read page title: {}", e)))?;
        Ok(title.unwrap_or_default())
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| SerpError::Browser(format!("Failed to read page content: {}", e)))
    }

    async fn probe_challenge(&self) -> Result<Option<Challenge>> {
        let widget = match self.page.find_element(CHALLENGE_SELECTOR).await {
            Ok(element) => element,
            Err(_) => {
                debug!("No challenge widget on page");
                return Ok(None);
            }
        };

        let site_key = match widget.attribute("data-sitekey").await {
            Ok(Some(key)) if !key.is_empty() => key,
            Ok(_) => {
                warn!("Challenge widget present but data-sitekey missing");
                return Ok(None);
            }
            Err(e) => {
                warn!("Failed to read challenge site key: {}", e);
                return Ok(None);
            }
        };
        let data_s = widget.attribute("data-s").await.unwrap_or(None);

        let page_url = self
            .page
            .url()
            .await
            .map_err(|e| SerpError::Browser(format!("Failed to read page URL: {}", e)))?
            .unwrap_or_default();

        Ok(Some(Challenge {
            site_key,
            data_s,
            page_url,
        }))
    }
}
