//! Protocol parsers.
//!
//! One parser per supported program family. Each receives every instruction
//! of every transaction and rejects cheaply on program id; recognized
//! instructions are classified by discriminator, decoded, and combined with
//! account positions and (for successful transactions) the matching program
//! log payload into [`IndexerEvent`]s.

pub mod moonshot;
pub mod pumpfun;
pub mod raydium;
pub mod solana;

use crate::block::{Instruction, TransactionMeta};
use crate::events::IndexerEvent;
use crate::logtree::InstructionLogs;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Per-transaction context shared by both parser hooks.
pub struct TxContext<'a> {
    pub slot: u64,
    pub block_time: Option<i64>,
    pub signature: &'a str,
    pub meta: &'a TransactionMeta,
    /// Unified address table; every instruction account reference indexes
    /// into it.
    pub addresses: &'a [String],
    pub failed: bool,
}

/// One (inner) instruction as seen by a parser's instruction hook.
pub struct InstructionView<'a> {
    pub instruction: &'a Instruction,
    /// Program invoked by this instruction, already resolved through the
    /// address table.
    pub program_id: &'a str,
    /// The log group belonging to this instruction, if log parsing produced
    /// one. Parsers may read it but consumption is owned by the walker.
    pub log_group: Option<&'a InstructionLogs>,
}

/// A protocol parser's two hooks. Both return zero or more events and must
/// never abort the surrounding walk; per-instruction problems degrade to
/// fewer fields or fewer events.
pub trait ProtocolParser {
    /// Called for every top-level and inner instruction.
    fn parse_instruction(&self, tx: &TxContext<'_>, ix: &InstructionView<'_>)
        -> Vec<IndexerEvent>;

    /// Called once per transaction, before the instruction walk, for
    /// patterns only visible across the whole transaction (balance deltas,
    /// log-only events).
    fn parse_transaction(
        &self,
        tx: &TxContext<'_>,
        log_groups: &[InstructionLogs],
    ) -> Vec<IndexerEvent>;
}

/// The full parser set, in the order they are consulted.
pub fn default_parsers() -> Vec<Box<dyn ProtocolParser>> {
    vec![
        Box::new(pumpfun::PumpfunParser),
        Box::new(moonshot::MoonshotParser),
        Box::new(raydium::RaydiumParser),
        Box::new(solana::SolanaParser),
    ]
}

/// Resolves the account at `position` in the instruction's account list to
/// its address. A position beyond the instruction's account count resolves
/// to `None`: failed or partial transactions legitimately omit trailing
/// optional accounts.
pub(crate) fn account_address<'a>(
    instruction: &Instruction,
    addresses: &'a [String],
    position: usize,
) -> Option<&'a str> {
    let table_index = *instruction.accounts.get(position)?;
    addresses.get(table_index).map(String::as_str)
}

/// The address-table index of the account at `position`, for balance
/// lookups keyed by account index.
pub(crate) fn account_index(instruction: &Instruction, position: usize) -> Option<usize> {
    instruction.accounts.get(position).copied()
}

pub(crate) const PROGRAM_DATA_PREFIX: &str = "Program data: ";

/// Base64 payload of a `Program data:` log line, if this line is one.
pub(crate) fn extract_program_data(line: &str) -> Option<Vec<u8>> {
    let encoded = line.strip_prefix(PROGRAM_DATA_PREFIX)?;
    BASE64.decode(encoded.trim()).ok()
}

/// Hex form of a log payload's 8-byte discriminator. Log-event
/// discriminators live in their own namespace, distinct from instruction
/// discriminators even within the same program.
pub(crate) fn log_discriminator(data: &[u8]) -> Option<String> {
    data.get(..8).map(hex::encode)
}

/// The instruction discriminator as an 8-byte little-endian unsigned
/// integer, for the protocols that use the 8-byte namespace.
pub(crate) fn instruction_discriminator(data: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = data.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}
