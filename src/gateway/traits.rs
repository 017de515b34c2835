//! Payment gateway trait definition.
//!
//! Envelope preparation and dispatch are separate steps so the transaction
//! log can persist the outbound payload before any network I/O happens.

use async_trait::async_trait;

use crate::error::AppResult;
use crate::gateway::types::{
    CommitRequest, GatewayResponse, HostedLinkRequest, PreauthorizeRequest, ServiceRequest,
};

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Build the preauthorization envelope. Fails on unsupported currency
    /// without any network call.
    fn prepare_preauthorize(&self, request: &PreauthorizeRequest) -> AppResult<ServiceRequest>;

    /// Build the commit envelope for a previously preauthorized hold
    fn prepare_commit(&self, request: &CommitRequest) -> AppResult<ServiceRequest>;

    /// Build the hosted-payment-page purchase envelope
    fn prepare_hosted_link(&self, request: &HostedLinkRequest) -> AppResult<ServiceRequest>;

    /// Send one envelope: exactly one outbound POST, no retries. Transport
    /// failures surface as `GatewayTransport`; business rejections come
    /// back as a parsed response for the caller to evaluate.
    async fn dispatch(&self, envelope: &ServiceRequest) -> AppResult<GatewayResponse>;
}
