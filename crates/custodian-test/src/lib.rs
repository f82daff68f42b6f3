//! # Custodian Test
//!
//! Test utilities for Custodian pipelines, providing a scripted in-memory
//! [`Transport`](custodian_core::Transport) so pipeline and interceptor tests
//! run without network connections.
//!
//! ## Key Features
//!
//! - **Per-path scripts**: each path answers from its own FIFO of replies
//! - **Call log**: every request is recorded as it arrived at the transport
//! - **Timing control**: replies can be delayed or held behind a [`Gate`]
//!
//! ## Example
//!
//! ```ignore
//! use custodian_test::{Reply, ScriptedTransport};
//!
//! let transport = ScriptedTransport::new();
//! transport
//!     .reply("/x", Reply::ok().header("x-csrf-token", "t1"))
//!     .replies("/y", [Reply::unauthorized(), Reply::ok()])
//!     .reply("/", Reply::ok().header("x-csrf-token", "t2"));
//!
//! let pipeline = Pipeline::builder(transport.clone()) /* stages */ .build();
//! pipeline.send(RequestSpec::get("/x")).await?;
//!
//! assert_eq!(transport.calls_to("/x"), 1);
//! ```

#![doc(html_root_url = "https://docs.rs/custodian-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod reply;
mod transport;

pub use error::{TestError, TestResult};
pub use reply::{Gate, Reply};
pub use transport::ScriptedTransport;
