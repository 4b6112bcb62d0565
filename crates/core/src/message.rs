use std::any::Any;

use crate::error::SendError;
use crate::provider_type::ProviderType;

/// Mint a new message identifier.
///
/// Generated once per message at construction; the id never changes for the
/// lifetime of the message and is unique per construction.
pub fn new_msg_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The capability set every dispatchable message exposes.
///
/// Concrete message types (one per vendor family) implement this trait and
/// are narrowed back to their concrete shape via [`as_any`](Self::as_any)
/// inside their transformer, the single downcast choke point in the
/// system.
pub trait Message: Send + Sync {
    /// The channel family this message is routed to.
    fn provider_type(&self) -> ProviderType;

    /// Stable per-message identifier.
    fn msg_id(&self) -> &str;

    /// Full validation of required fields. Runs before any I/O.
    fn validate(&self) -> Result<(), SendError>;

    /// Optional vendor discriminator inside the channel family.
    ///
    /// A message that pins a sub-vendor (e.g. `resend` under `emailapi`) is
    /// only matched by that vendor's transformer, and account selection is
    /// narrowed to accounts of that sub-type.
    fn sub_provider(&self) -> Option<&str> {
        None
    }

    /// Downcast support for transformers.
    fn as_any(&self) -> &dyn Any;
}
