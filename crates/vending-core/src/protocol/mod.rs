//! Protocol client: request assembly, headers, and session operations.

pub(crate) mod assemble;
pub(crate) mod headers;
mod session;

pub use session::{
    AcknowledgeOutcome, AcquireOutcome, AcquireParams, AuthProofOutcome, HistoryItem,
    HistoryOutcome, ProtocolSession, SkuDetailsItem, SkuDetailsOutcome,
};
