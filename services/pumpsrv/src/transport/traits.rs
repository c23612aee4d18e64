//! Transport Layer Traits
//!
//! A transport delivers one request envelope to a controller endpoint and
//! hands back the parsed reply. It never retries; that policy belongs to the
//! scheduler.

use async_trait::async_trait;
use std::fmt;

use crate::error::TransportError;
use crate::protocol::{RequestEnvelope, ResponseEnvelope};

#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Short name used in logs and error messages
    fn name(&self) -> &str;

    /// One request/response round-trip
    async fn send(&self, envelope: &RequestEnvelope) -> Result<ResponseEnvelope, TransportError>;
}
