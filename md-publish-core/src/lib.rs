#![doc = "md-publish-core: resolve Markdown references and publish them with md2conf."]

//! All business logic of md-publish lives here: reference parsing, the GitHub
//! fetch fallback, parameter resolution, command construction, process
//! execution and outcome mapping. The `md-publish` crate only adds
//! configuration loading and the CLI/HTTP surfaces.
//!
//! # Usage
//! Build a [`config::Settings`] once, wrap it in an `Arc`, create a
//! [`publish::Publisher`] and call [`publish::Publisher::publish`] per request.

pub mod command;
pub mod config;
pub mod contract;
pub mod download;
pub mod error;
pub mod execute;
pub mod outcome;
pub mod publish;
pub mod reference;
pub mod resolve;
pub mod scratch;

pub use contract::{PublishOutcome, PublishRequest};
pub use error::PublishError;
pub use publish::{JobKind, Publisher};
