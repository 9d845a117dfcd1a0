//! Mail provider implementations.
//!
//! This module contains the [`MailProvider`] trait and the [`ResendProvider`]
//! implementation used in production. The provider handles:
//!
//! - Retrieving emails received by the intake mailbox
//! - Sending confirmation emails from the branded sender

mod resend;
mod traits;

pub use resend::{ResendProvider, RESEND_API_BASE};
pub use traits::{MailProvider, OutgoingEmail, ProviderError, ReceivedEmail, Result, SendReceipt};

#[cfg(test)]
pub use traits::MockMailProvider;
