//! Secure request dispatch: framing, the HTTP seam, and the per-request
//! seal/send/open pipeline.

pub mod dispatcher;
pub mod request;
pub mod transport;

pub use dispatcher::{
    DispatchError, EncryptionContext, ResponsePayload, SecureDispatcher, Stage,
};
pub use request::{Framing, SecureRequest, SessionContext};
pub use transport::{HttpTransport, InboundResponse, OutboundRequest, ReqwestTransport, TransportError};
