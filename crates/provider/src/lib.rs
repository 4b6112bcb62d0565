//! Provider abstractions for the Courier notification dispatcher.
//!
//! A [`Provider`] owns the delivery of one channel family. HTTP-based
//! vendors do not implement delivery by hand: they supply a
//! [`Transformer`] that turns a typed message into a [`RequestSpec`] plus a
//! [`ResponseHandler`], and the generic [`HttpProvider`] shell does the
//! rest: account selection, request execution, response classification,
//! result assembly. Non-HTTP vendors (SMTP email) implement [`Provider`]
//! directly.

pub mod http;
pub mod provider;
pub mod request;
pub mod response;
pub mod transformer;

pub use http::HttpProvider;
pub use provider::{Provider, ProviderSendOptions};
pub use request::{BodyType, FormPart, PartData, RequestSpec};
pub use response::{ResponseBodyType, ResponseHandler, ResponseHandlerConfig};
pub use transformer::{BaseTransformer, Transformer};
