//! Instana provider
//!
//! A provider plugin that manages Instana configuration (alerting channels,
//! application perspectives, alert configurations, custom events, RBAC,
//! SLIs, dashboards and more) declaratively through a Terraform style host.
//!
//! # Overview
//!
//! - **[`tagfilter`]**: parser, normalizer and wire mapping of tag filter expressions
//! - **[`restapi`]**: typed client for the Instana REST API with retries and throttling
//! - **[`resource`]**: the resource handle contract and the generic lifecycle engine
//! - **[`resources`]**, **[`datasources`]**: the resource catalog and the data sources
//! - **[`provider`]**: provider configuration with environment fallback and dispatch
//! - **[`server`]**: the gRPC plugin protocol and the handshake
//!
//! # Quick Start
//!
//! ```no_run
//! use terraform_provider_instana::{init_logging, serve, InstanaProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(InstanaProvider::new()).await
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! Once listening, the process prints one line to stdout:
//!
//! ```text
//! INSTANA_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `INSTANA_PROVIDER|<protocol_version>|<address>`. The host spawns
//! the provider as a subprocess and connects to the address via gRPC.
//!
//! # Provider Protocol
//!
//! - **GetMetadata**: type name, version, resource and data source names
//! - **GetSchema**: schemas of the provider configuration, resources and data sources
//! - **ValidateProviderConfig** / **Configure**: credentials and endpoint
//! - **Stop**: cancels in-flight API calls
//! - **ValidateResourceConfig**, **UpgradeResourceState**, **Plan**
//! - **Create/Read/Update/Delete** and **ImportResourceState**
//! - **ValidateDataSourceConfig** / **ReadDataSource**

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod datasources;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resource;
pub mod resources;
pub mod restapi;
pub mod schema;
pub mod server;
pub mod tagfilter;
pub mod testing;
pub mod types;
pub mod validation;
pub mod value;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::InstanaProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_listener, serve_on_with_options, serve_with_options,
    ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX,
    PROTOCOL_VERSION, PROVIDER_TYPE_NAME,
};
pub use validation::validate;
