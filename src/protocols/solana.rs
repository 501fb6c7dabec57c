//! Native transfer primitives: SPL Token and System program transfers, plus
//! the per-transaction token balance sweep.

use serde::Serialize;

use crate::block::TokenBalance;
use crate::events::{
    EventKind, EventMetadata, EventPayload, EventSource, IndexerEvent,
};
use crate::logtree::InstructionLogs;
use crate::reader::{Decoded, Reader};

use super::{account_address, account_index, InstructionView, ProtocolParser, TxContext};

pub const SPL_TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const ASSOCIATED_TOKEN_ACCOUNT_PROGRAM_ID: &str =
    "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SplTokenInstruction {
    Transfer(Decoded<SplTransferArgs>),
    TransferChecked(Decoded<SplTransferCheckedArgs>),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplTransferArgs {
    pub amount: u64,
}

impl SplTransferArgs {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self { amount: reader.u64_le()? })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplTransferCheckedArgs {
    pub amount: u64,
    pub decimals: u8,
}

impl SplTransferCheckedArgs {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            amount: reader.u64_le()?,
            decimals: reader.u8()?,
        })
    }
}

/// SPL Token instructions are tagged by their first byte.
pub fn decode_spl_token_instruction(data: &[u8]) -> SplTokenInstruction {
    let Some(&tag) = data.first() else {
        return SplTokenInstruction::Unknown;
    };
    let mut reader = Reader::new(&data[1..]);
    match tag {
        3 => SplTokenInstruction::Transfer(Decoded::from_result(SplTransferArgs::read(
            &mut reader,
        ))),
        12 => SplTokenInstruction::TransferChecked(Decoded::from_result(
            SplTransferCheckedArgs::read(&mut reader),
        )),
        _ => SplTokenInstruction::Unknown,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SystemInstruction {
    Transfer(Decoded<SystemTransferArgs>),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemTransferArgs {
    pub lamports: u64,
}

impl SystemTransferArgs {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self { lamports: reader.u64_le()? })
    }
}

/// System program instructions are tagged by a little-endian u32.
pub fn decode_system_instruction(data: &[u8]) -> SystemInstruction {
    let mut reader = Reader::new(data);
    let Ok(tag) = reader.u32_le() else {
        return SystemInstruction::Unknown;
    };
    match tag {
        2 => SystemInstruction::Transfer(Decoded::from_result(SystemTransferArgs::read(
            &mut reader,
        ))),
        _ => SystemInstruction::Unknown,
    }
}

/// One token account whose balance moved during the transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplBalanceChange {
    pub owner: String,
    pub mint: String,
    pub token_account: String,
    pub old_amount: u64,
    pub new_amount: u64,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplTransferMeta {
    pub source: String,
    pub destination: String,
    pub authority: String,
    pub mint: String,
    pub from_address: String,
    pub to_address: String,
    pub from_token_account: String,
    pub to_token_account: String,
    pub decimals: u8,
    pub failed_transaction: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolTransferMeta {
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub failed_transaction: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChangeMeta {
    pub failed_transaction: bool,
}

pub struct SolanaParser;

/// Owner, mint and decimals of a token account, taken from its post balance
/// when present and its pre balance otherwise.
fn balance_facts(balance: Option<&TokenBalance>) -> (Option<&str>, Option<&str>, Option<u8>) {
    match balance {
        Some(balance) => (
            balance.owner.as_deref(),
            Some(balance.mint.as_str()),
            Some(balance.ui_token_amount.decimals),
        ),
        None => (None, None, None),
    }
}

impl SolanaParser {
    /// Builds the transfer meta, resolving the human-level from/to wallets
    /// through token balances. A transfer whose wallets cannot be resolved
    /// produces no event.
    fn spl_transfer_meta(
        &self,
        tx: &TxContext<'_>,
        ix: &InstructionView<'_>,
        source_position: usize,
        destination_position: usize,
        authority_position: usize,
    ) -> Option<SplTransferMeta> {
        let instruction = ix.instruction;
        let source = account_address(instruction, tx.addresses, source_position)?;
        let destination = account_address(instruction, tx.addresses, destination_position)?;
        let authority = account_address(instruction, tx.addresses, authority_position)?;

        let source_balance = account_index(instruction, source_position)
            .and_then(|index| {
                tx.meta
                    .post_token_balance(index)
                    .or_else(|| tx.meta.pre_token_balance(index))
            });
        let destination_balance = account_index(instruction, destination_position)
            .and_then(|index| {
                tx.meta
                    .post_token_balance(index)
                    .or_else(|| tx.meta.pre_token_balance(index))
            });

        let (source_owner, source_mint, source_decimals) = balance_facts(source_balance);
        let (destination_owner, destination_mint, destination_decimals) =
            balance_facts(destination_balance);

        let mint = source_mint.or(destination_mint)?;
        let from_address = source_owner.unwrap_or(authority);
        let to_address = destination_owner?;
        let decimals = source_decimals.or(destination_decimals)?;

        Some(SplTransferMeta {
            source: source.to_string(),
            destination: destination.to_string(),
            authority: authority.to_string(),
            mint: mint.to_string(),
            from_address: from_address.to_string(),
            to_address: to_address.to_string(),
            from_token_account: source.to_string(),
            to_token_account: destination.to_string(),
            decimals,
            failed_transaction: tx.failed,
        })
    }

    fn parse_spl_token(&self, tx: &TxContext<'_>, ix: &InstructionView<'_>) -> Vec<IndexerEvent> {
        let decoded = decode_spl_token_instruction(&ix.instruction.data);
        // Account layout differs between the two transfer forms:
        // Transfer is source, destination, authority; TransferChecked is
        // source, mint, destination, authority.
        let meta = match decoded {
            SplTokenInstruction::Transfer(_) => self.spl_transfer_meta(tx, ix, 0, 1, 2),
            SplTokenInstruction::TransferChecked(_) => self.spl_transfer_meta(tx, ix, 0, 2, 3),
            SplTokenInstruction::Unknown => return Vec::new(),
        };
        let Some(meta) = meta else {
            return Vec::new();
        };
        vec![IndexerEvent {
            source: EventSource::Solana,
            kind: EventKind::SplTokenTransfer,
            slot: tx.slot,
            signature: tx.signature.to_string(),
            payload: EventPayload::SplToken(decoded),
            metadata: EventMetadata::SplTransfer(meta),
            log_payload: None,
        }]
    }

    fn parse_system(&self, tx: &TxContext<'_>, ix: &InstructionView<'_>) -> Vec<IndexerEvent> {
        let decoded = decode_system_instruction(&ix.instruction.data);
        if !matches!(decoded, SystemInstruction::Transfer(_)) {
            return Vec::new();
        }
        let instruction = ix.instruction;
        vec![IndexerEvent {
            source: EventSource::Solana,
            kind: EventKind::SolTransfer,
            slot: tx.slot,
            signature: tx.signature.to_string(),
            payload: EventPayload::System(decoded),
            metadata: EventMetadata::SolTransfer(SolTransferMeta {
                from_address: account_address(instruction, tx.addresses, 0).map(str::to_string),
                to_address: account_address(instruction, tx.addresses, 1).map(str::to_string),
                failed_transaction: tx.failed,
            }),
            log_payload: None,
        }]
    }
}

impl ProtocolParser for SolanaParser {
    fn parse_instruction(
        &self,
        tx: &TxContext<'_>,
        ix: &InstructionView<'_>,
    ) -> Vec<IndexerEvent> {
        match ix.program_id {
            SPL_TOKEN_PROGRAM_ID => self.parse_spl_token(tx, ix),
            SYSTEM_PROGRAM_ID => self.parse_system(tx, ix),
            // Account creation on its own is not an event; the resulting
            // balance movement surfaces through the balance sweep.
            ASSOCIATED_TOKEN_ACCOUNT_PROGRAM_ID => Vec::new(),
            _ => Vec::new(),
        }
    }

    /// Balance sweep: one event per token account whose balance moved.
    /// Failed transactions move no balances, so the sweep skips them.
    fn parse_transaction(
        &self,
        tx: &TxContext<'_>,
        _log_groups: &[InstructionLogs],
    ) -> Vec<IndexerEvent> {
        if tx.failed {
            return Vec::new();
        }
        let mut events = Vec::new();
        for (index, address) in tx.addresses.iter().enumerate() {
            let pre = tx.meta.pre_token_balance(index);
            let post = tx.meta.post_token_balance(index);
            if pre.is_none() && post.is_none() {
                continue;
            }
            let reference = post.or(pre);
            let (owner, mint, decimals) = balance_facts(reference);
            let (Some(owner), Some(mint), Some(decimals)) = (owner, mint, decimals) else {
                tracing::warn!(
                    signature = tx.signature,
                    token_account = %address,
                    "token balance entry without owner or mint"
                );
                continue;
            };
            let old_amount = pre.map(|b| b.ui_token_amount.raw_amount()).unwrap_or(0);
            let new_amount = post.map(|b| b.ui_token_amount.raw_amount()).unwrap_or(0);
            if old_amount == new_amount {
                continue;
            }
            events.push(IndexerEvent {
                source: EventSource::Solana,
                kind: EventKind::SplTokenBalanceChange,
                slot: tx.slot,
                signature: tx.signature.to_string(),
                payload: EventPayload::SplBalanceChange(SplBalanceChange {
                    owner: owner.to_string(),
                    mint: mint.to_string(),
                    token_account: address.clone(),
                    old_amount,
                    new_amount,
                    decimals,
                }),
                metadata: EventMetadata::BalanceChange(BalanceChangeMeta {
                    failed_transaction: tx.failed,
                }),
                log_payload: None,
            });
        }
        events
    }
}
