use shared::{domain::AccountAddress, protocol::TransactionHash};

use crate::{dispatcher::FailureKind, intent::ViewIntent};

/// Notifications for the presentation layer. Mutation outcomes carry the
/// notice text to show; view events say which slot changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    MutationSucceeded {
        operation: String,
        hash: TransactionHash,
    },
    MutationFailed {
        operation: String,
        kind: FailureKind,
        notice: String,
    },
    ViewUpdated(ViewIntent),
    ViewFailed {
        intent: ViewIntent,
        reason: String,
    },
    IdentityChanged(Option<AccountAddress>),
}
