//! # Custodian Middleware
//!
//! The interceptor pipeline of the Custodian HTTP client.
//!
//! Every request passes through an ordered list of [`SerializedStage`]s.
//! Request hooks run in order, then the transport, then response or error
//! hooks in reverse order:
//!
//! ```text
//! send → retry → csrf → transport
//!                          ↓
//! result ← retry ← csrf ←──┘
//! ```
//!
//! Each stage admits one request at a time, in arrival order, and keeps it
//! until the request has left the stage again. A stage that refreshes a
//! credential therefore holds every later request at its door until the
//! refresh is done.
//!
//! ## Example
//!
//! ```
//! use custodian_core::RequestSpec;
//! use custodian_middleware::{Flow, FnInterceptor, Pipeline};
//! use custodian_test::{Reply, ScriptedTransport};
//!
//! # tokio_test::block_on(async {
//! let transport = ScriptedTransport::new();
//! transport.reply("/items", Reply::ok());
//!
//! let pipeline = Pipeline::builder(transport.clone())
//!     .interceptor(FnInterceptor::new("tag", |r: RequestSpec| {
//!         Flow::Proceed(r.query("source", "sdk"))
//!     }))
//!     .build();
//!
//! let response = pipeline.send(RequestSpec::get("/items")).await.unwrap();
//! assert!(response.is_success());
//! assert_eq!(transport.requests()[0].query["source"], "sdk");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/custodian-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod interceptor;
pub mod pipeline;
pub mod queue;
pub mod stage;
pub mod stages;

pub use interceptor::{
    ErrorFlow, Flow, FnInterceptor, Hook, Interceptor, RequestFlow, ResponseFlow,
};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use queue::{Activation, StageQueue};
pub use stage::SerializedStage;
pub use stages::{CsrfInterceptor, RefreshRequest, RetryInterceptor, DEFAULT_CREDENTIAL_HEADER};
