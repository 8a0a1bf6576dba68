// opsview-api: Async Rust client for the Opsview monitoring server web API

pub mod admin;
pub mod client;
pub mod command;
pub mod document;
pub mod error;
pub mod facade;
pub mod filter;
pub mod node;
pub mod rest;
pub mod session;
pub mod status;
pub mod transport;

pub use client::{ClientConfig, OpsviewClient, XML_CONTENT_TYPE};
pub use command::{AckOptions, AckTarget, Acknowledgements, FieldValue, Fields, Target, fields};
pub use document::{BodyFormat, Document, Element};
pub use error::Error;
pub use facade::{Host, Server, Service};
pub use filter::StatusFilter;
pub use node::{AttrValue, NodeKind, StatusNode};
pub use rest::RestClient;
pub use session::{AUTH_COOKIE, Session};
pub use status::ServiceStatus;
pub use transport::{TlsMode, TransportConfig};
