//! # serp-driver
//!
//! A headless-browser SERP extraction service. Each request drives one
//! Chrome session: navigate to the search engine, solve a blocking
//! reCAPTCHA if one appears, then run a batch of queries through in-page
//! extraction payloads and return a uniform result envelope per query.
//!
//! The crate exposes the full pipeline as a library plus an HTTP binary:
//!
//! - Batch requests with legacy bare-string or id-carrying query objects
//! - Image, web and news search payloads selected by filename convention
//! - 2Captcha-backed challenge solving with a bounded polling budget
//! - Guaranteed browser teardown before the response is emitted
//!
//! ## Example
//!
//! ```rust,no_run
//! use serp_driver::{execute, AppConfig, SearchRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::from_env();
//!     let request = SearchRequest::single("rust programming");
//!
//!     let outcome = execute(&config, &request).await?;
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!     Ok(())
//! }
//! ```

mod captcha;
mod config;
mod envelope;
mod error;
mod page;
mod payload;
mod poll;
mod request;
mod runner;
mod server;
mod session;

pub use captcha::{Challenge, ChallengeSolver, TwoCaptcha};
pub use config::{AppConfig, CloudCredentials, Deployment};
pub use envelope::{EnvelopeContext, SearchOutcome};
pub use error::{Result, SerpError};
pub use page::{BrowserPage, SearchPage};
pub use payload::ExtractionPayload;
pub use poll::{poll_until, PollPolicy, Probe};
pub use request::{QueryDescriptor, SearchRequest, SearchType};
pub use runner::{execute, SearchRunner};
pub use server::{handle_event, router, serve};
pub use session::BrowserSession;
