//! # kruize-e2e-core
//!
//! End-to-end test harness for the Kruize REST API.
//!
//! The harness creates experiments, pushes metric results, generates and
//! lists recommendations, and asserts on status codes, envelope messages
//! and response shapes:
//!
//! - [`schema`]: a small structural validator plus the catalog of Kruize
//!   response schemas.
//! - [`payload`]: typed builders and tera templates for request bodies.
//! - [`client`]: one method per endpoint over a pluggable [`Transport`].
//! - [`response`] and [`checks`]: envelope assertions and semantic checks.
//! - [`workflow`]: scenarios, their per-run context and the runner.
//!
//! ## Example
//!
//! ```no_run
//! use kruize_e2e_core::client::http::HttpTransport;
//! use kruize_e2e_core::workflow::{scenarios, Runner, Selection, Suite};
//! use kruize_e2e_core::{HarnessConfig, KruizeClient};
//!
//! let config = HarnessConfig::default().apply_env()?;
//! let client = KruizeClient::new(HttpTransport::from_config(&config)?);
//! let runner = Runner::new(client, config)?;
//!
//! let all = scenarios::all();
//! let selection = Selection { suite: Some(Suite::Remote), ..Selection::default() };
//! let report = runner.run_all(selection.apply(&all));
//! assert!(report.is_success());
//! # Ok::<(), kruize_e2e_core::HarnessError>(())
//! ```

pub mod cases;
pub mod checks;
pub mod client;
pub mod config;
pub mod error;
pub mod messages;
pub mod payload;
pub mod response;
pub mod schema;
pub mod workflow;

pub use client::{ApiRequest, ApiResponse, KruizeClient, Method, Transport};
pub use config::{ClusterType, HarnessConfig};
pub use error::{HarnessError, Result};
pub use payload::{Renderer, TemplateValue, TemplateVars};
pub use schema::{ensure_valid, Schema, Violation};
pub use workflow::{Report, Runner, Scenario, Selection, Suite, Tag};
