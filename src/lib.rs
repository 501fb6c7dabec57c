//! Solana block parser: turns raw RPC block JSON into typed domain events.
//!
//! A block is parsed transaction by transaction. For each transaction the
//! parser builds the unified address table, reconstructs per-instruction log
//! groups from the flat `logMessages` array, and walks top-level and inner
//! instructions in execution order, handing each one (with its log group) to
//! every protocol parser. Supported protocols: the Moonshot mint-curve and
//! PumpFun bonding-curve programs, Raydium AMM v4, and the native SPL Token
//! and System program transfer primitives.
//!
//! ```no_run
//! use sol_block_parser::{default_parsers, parse_block, RawBlock};
//!
//! fn handle(slot: u64, raw: &str) -> Result<(), serde_json::Error> {
//!     let block: RawBlock = serde_json::from_str(raw)?;
//!     let parsers = default_parsers();
//!     let parsed = parse_block(slot, &block, &parsers);
//!     for event in &parsed.events {
//!         println!("{:?} {:?} at slot {}", event.source, event.kind, event.slot);
//!     }
//!     Ok(())
//! }
//! ```

pub mod block;
pub mod error;
pub mod events;
pub mod logtree;
pub mod parser;
pub mod protocols;
pub mod reader;

pub use block::{Instruction, RawBlock, TransactionMeta, TransactionWithMeta};
pub use error::{DecodeError, LogTreeError};
pub use events::{
    sort_for_storage, EventKind, EventMetadata, EventPayload, EventSource, IndexerEvent,
    LogPayload,
};
pub use logtree::{parse_log_messages, parse_transaction_logs, InstructionLogs};
pub use parser::{parse_block, parse_transaction, ParsedBlock};
pub use protocols::{default_parsers, ProtocolParser};
pub use reader::{Decoded, Reader};
