//! The domain event model produced by the parsing pipeline.
//!
//! Events are immutable once constructed, except for the controlled late
//! attachment of a decoded log payload during log cross-referencing. The
//! storage collaborator consumes them grouped by source then kind.

use crate::protocols::moonshot::{
    MoonshotCompleteMeta, MoonshotInfoMeta, MoonshotInstruction, MoonshotMintMeta,
    MoonshotTradeEvent, MoonshotTradeMeta,
};
use crate::protocols::pumpfun::{
    PumpfunInstruction, PumpfunLogEvent, PumpfunLogMeta, PumpfunTradeMeta,
};
use crate::protocols::raydium::{
    RayLog, RaydiumInstruction, RaydiumMintMeta, RaydiumTradeMeta,
};
use crate::protocols::solana::{
    BalanceChangeMeta, SolTransferMeta, SplBalanceChange, SplTokenInstruction, SplTransferMeta,
    SystemInstruction,
};
use serde::Serialize;

/// Program family an event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventSource {
    Pumpfun,
    Moonshot,
    Raydium,
    Solana,
}

/// Closed set of event kinds shared by all sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    Mint,
    Trade,
    Info,
    Transfer,
    SplTokenBalanceChange,
    SplTokenTransfer,
    SolTransfer,
    Complete,
}

/// Processing order the storage layer applies per block: a trade referencing
/// a mint created in the same block must see the mint row first. The core
/// keeps stable original ordering within each kind so a stable sort by this
/// priority is deterministic.
pub const EVENT_KIND_PRIORITY: [EventKind; 8] = [
    EventKind::Mint,
    EventKind::Trade,
    EventKind::Info,
    EventKind::Transfer,
    EventKind::SplTokenBalanceChange,
    EventKind::SplTokenTransfer,
    EventKind::SolTransfer,
    EventKind::Complete,
];

pub const EVENT_SOURCE_PRIORITY: [EventSource; 4] = [
    EventSource::Pumpfun,
    EventSource::Moonshot,
    EventSource::Raydium,
    EventSource::Solana,
];

impl EventKind {
    pub fn storage_priority(self) -> usize {
        EVENT_KIND_PRIORITY
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or(EVENT_KIND_PRIORITY.len())
    }
}

impl EventSource {
    pub fn storage_priority(self) -> usize {
        EVENT_SOURCE_PRIORITY
            .iter()
            .position(|source| *source == self)
            .unwrap_or(EVENT_SOURCE_PRIORITY.len())
    }
}

/// Stable sort into the storage layer's per-kind processing order. Original
/// ordering is preserved within each kind.
pub fn sort_for_storage(events: &mut [IndexerEvent]) {
    events.sort_by_key(|event| event.kind.storage_priority());
}

/// One typed domain event.
#[derive(Debug, Clone, Serialize)]
pub struct IndexerEvent {
    pub source: EventSource,
    pub kind: EventKind,
    pub slot: u64,
    pub signature: String,
    /// Fields decoded from instruction bytes (or, for log-only events, from
    /// the program's self-emitted payload).
    pub payload: EventPayload,
    /// Addresses and flags resolved from the instruction's account positions
    /// and the transaction meta.
    pub metadata: EventMetadata,
    /// Richer payload decoded from the program's own log output, attached
    /// after log cross-referencing. Absent for failed or legacy
    /// transactions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_payload: Option<LogPayload>,
}

/// Decoded instruction (or log-only) payload, one closed variant set per
/// protocol.
#[derive(Debug, Clone, Serialize)]
pub enum EventPayload {
    Moonshot(MoonshotInstruction),
    Pumpfun(PumpfunInstruction),
    PumpfunLog(PumpfunLogEvent),
    Raydium(RaydiumInstruction),
    SplToken(SplTokenInstruction),
    System(SystemInstruction),
    SplBalanceChange(SplBalanceChange),
}

/// Protocol- and kind-specific resolved addresses and flags.
#[derive(Debug, Clone, Serialize)]
pub enum EventMetadata {
    MoonshotTrade(MoonshotTradeMeta),
    MoonshotMint(MoonshotMintMeta),
    MoonshotComplete(MoonshotCompleteMeta),
    MoonshotInfo(MoonshotInfoMeta),
    PumpfunTrade(PumpfunTradeMeta),
    PumpfunLog(PumpfunLogMeta),
    RaydiumMint(RaydiumMintMeta),
    RaydiumTrade(RaydiumTradeMeta),
    SplTransfer(SplTransferMeta),
    SolTransfer(SolTransferMeta),
    BalanceChange(BalanceChangeMeta),
}

/// Log-decoded payload attached to an instruction-derived event.
#[derive(Debug, Clone, Serialize)]
pub enum LogPayload {
    MoonshotTrade(MoonshotTradeEvent),
    RayLog(RayLog),
}
