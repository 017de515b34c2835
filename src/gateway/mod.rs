//! WaafiPay gateway client: envelope construction, HTTP dispatch, and
//! response interpretation.

pub mod traits;
pub mod types;
pub mod waafipay;

pub use traits::PaymentGateway;
pub use types::{
    CommitRequest, GatewayResponse, HostedLinkRequest, PreauthorizeRequest, ServiceRequest,
};
pub use waafipay::WaafiPayGateway;
