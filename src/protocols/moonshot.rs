//! Moonshot mint-curve program.
//!
//! Trades and token mints are decoded from instruction data; successful
//! trades additionally carry the program's self-emitted trade log, decoded
//! from the `Program data:` line of the instruction's log group.

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::events::{
    EventKind, EventMetadata, EventPayload, EventSource, IndexerEvent, LogPayload,
};
use crate::logtree::InstructionLogs;
use crate::reader::{Decoded, Reader};

use super::{
    account_address, account_index, extract_program_data, instruction_discriminator,
    log_discriminator, InstructionView, ProtocolParser, TxContext,
};

pub const PROGRAM_ID: &str = "MoonCVVNZFSYkqNXP6bxHLPL6QQJiMagDL3qcqUQTrG";

/// Instruction discriminators, little-endian u64 over the leading 8 bytes.
pub mod discriminators {
    pub const BUY: u64 = 16927863322537952870;
    pub const SELL: u64 = 12502976635542562355;
    pub const TOKEN_MINT: u64 = 12967285527113116675;
    pub const MIGRATE_FUNDS: u64 = 12592415018450609450;
    pub const CONFIG_INIT: u64 = 13377095427818843149;
    pub const CONFIG_UPDATE: u64 = 17391080224613803344;

    /// Log-event namespace, hex over the leading 8 bytes.
    pub const TRADE_EVENT: &str = "bddb7fd34ee661ee";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MoonshotInstruction {
    Buy(Decoded<TradeArgs>),
    Sell(Decoded<TradeArgs>),
    TokenMint(Decoded<TokenMintArgs>),
    MigrateFunds,
    ConfigInit(Decoded<ConfigArgs>),
    ConfigUpdate(Decoded<ConfigArgs>),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeArgs {
    pub token_amount: u64,
    pub collateral_amount: u64,
    pub fixed_side: u8,
    pub slippage_bps: u64,
}

impl TradeArgs {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            token_amount: reader.u64_le()?,
            collateral_amount: reader.u64_le()?,
            fixed_side: reader.u8()?,
            slippage_bps: reader.u64_le()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenMintArgs {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub decimals: u8,
    pub collateral_currency: u8,
    pub amount: u64,
    pub curve_type: u8,
    pub migration_target: u8,
}

impl TokenMintArgs {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            name: reader.string()?,
            symbol: reader.string()?,
            uri: reader.string()?,
            decimals: reader.u8()?,
            collateral_currency: reader.u8()?,
            amount: reader.u64_le()?,
            curve_type: reader.u8()?,
            migration_target: reader.u8()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigArgs {
    pub migration_authority: Pubkey,
    pub backend_authority: Pubkey,
    pub config_authority: Pubkey,
    pub helio_fee: Pubkey,
    pub dex_fee: Pubkey,
    pub fee_bps: u16,
    pub dex_fee_share: u8,
    pub migration_fee: u64,
    pub marketcap_threshold: u64,
    pub marketcap_currency: u8,
    pub min_supported_decimal_places: u8,
    pub max_supported_decimal_places: u8,
    pub min_supported_token_supply: u64,
    pub max_supported_token_supply: u64,
    pub coef_b: u32,
}

impl ConfigArgs {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            migration_authority: reader.pubkey()?,
            backend_authority: reader.pubkey()?,
            config_authority: reader.pubkey()?,
            helio_fee: reader.pubkey()?,
            dex_fee: reader.pubkey()?,
            fee_bps: reader.u16_le()?,
            dex_fee_share: reader.u8()?,
            migration_fee: reader.u64_le()?,
            marketcap_threshold: reader.u64_le()?,
            marketcap_currency: reader.u8()?,
            min_supported_decimal_places: reader.u8()?,
            max_supported_decimal_places: reader.u8()?,
            min_supported_token_supply: reader.u64_le()?,
            max_supported_token_supply: reader.u64_le()?,
            coef_b: reader.u32_le()?,
        })
    }
}

/// Self-emitted trade log payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoonshotTradeEvent {
    pub amount: u64,
    pub collateral_amount: u64,
    pub dex_fee: u64,
    pub helio_fee: u64,
    pub allocation: u64,
    pub curve: Pubkey,
    pub cost_token: Pubkey,
    pub sender: Pubkey,
    pub trade_type: u8,
    pub label: String,
}

impl MoonshotTradeEvent {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            amount: reader.u64_le()?,
            collateral_amount: reader.u64_le()?,
            dex_fee: reader.u64_le()?,
            helio_fee: reader.u64_le()?,
            allocation: reader.u64_le()?,
            curve: reader.pubkey()?,
            cost_token: reader.pubkey()?,
            sender: reader.pubkey()?,
            trade_type: reader.u8()?,
            label: reader.cstr()?,
        })
    }
}

/// Classifies and decodes an instruction's data. Anything shorter than a
/// discriminator, or carrying an unrecognized one, is [`Unknown`].
///
/// [`Unknown`]: MoonshotInstruction::Unknown
pub fn decode_instruction(data: &[u8]) -> MoonshotInstruction {
    let Some(discriminator) = instruction_discriminator(data) else {
        return MoonshotInstruction::Unknown;
    };
    let mut reader = Reader::new(&data[8..]);
    match discriminator {
        discriminators::BUY => {
            MoonshotInstruction::Buy(Decoded::from_result(TradeArgs::read(&mut reader)))
        }
        discriminators::SELL => {
            MoonshotInstruction::Sell(Decoded::from_result(TradeArgs::read(&mut reader)))
        }
        discriminators::TOKEN_MINT => {
            MoonshotInstruction::TokenMint(Decoded::from_result(TokenMintArgs::read(&mut reader)))
        }
        discriminators::MIGRATE_FUNDS => MoonshotInstruction::MigrateFunds,
        discriminators::CONFIG_INIT => {
            MoonshotInstruction::ConfigInit(Decoded::from_result(ConfigArgs::read(&mut reader)))
        }
        discriminators::CONFIG_UPDATE => {
            MoonshotInstruction::ConfigUpdate(Decoded::from_result(ConfigArgs::read(&mut reader)))
        }
        _ => MoonshotInstruction::Unknown,
    }
}

fn decode_trade_log(data: &[u8]) -> Decoded<MoonshotTradeEvent> {
    let mut reader = Reader::new(&data[8..]);
    Decoded::from_result(MoonshotTradeEvent::read(&mut reader))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoonshotTradeMeta {
    pub block_time: Option<i64>,
    pub sender: Option<String>,
    pub mint: Option<String>,
    pub curve_token_post_balance: u64,
    pub curve_sol_post_balance: u64,
    pub failed_transaction: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoonshotMintMeta {
    pub sender: Option<String>,
    pub curve_account: Option<String>,
    pub mint: Option<String>,
    pub mint_metadata: Option<String>,
    pub curve_token_account: Option<String>,
    pub config_account: Option<String>,
    pub failed_transaction: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoonshotCompleteMeta {
    pub curve_account: Option<String>,
    pub curve_token_account: Option<String>,
    pub mint: Option<String>,
    pub failed_transaction: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoonshotInfoMeta {
    pub failed_transaction: bool,
}

pub struct MoonshotParser;

impl MoonshotParser {
    fn trade_meta(&self, tx: &TxContext<'_>, ix: &InstructionView<'_>) -> MoonshotTradeMeta {
        let instruction = ix.instruction;
        let curve_sol_post_balance = account_index(instruction, 2)
            .and_then(|index| tx.meta.post_lamports(index))
            .unwrap_or(0);
        let curve_token_post_balance = account_index(instruction, 3)
            .and_then(|index| tx.meta.post_token_balance(index))
            .map(|balance| balance.ui_token_amount.raw_amount())
            .unwrap_or(0);
        MoonshotTradeMeta {
            block_time: tx.block_time,
            sender: account_address(instruction, tx.addresses, 0).map(str::to_string),
            mint: account_address(instruction, tx.addresses, 6).map(str::to_string),
            curve_token_post_balance,
            curve_sol_post_balance,
            failed_transaction: tx.failed,
        }
    }

    /// Pulls the trade log out of the instruction's log group, if the group
    /// belongs to this program and carries a well-formed payload.
    fn trade_log_payload(
        &self,
        tx: &TxContext<'_>,
        log_group: Option<&InstructionLogs>,
    ) -> Option<LogPayload> {
        let group = log_group?;
        if group.address != PROGRAM_ID {
            tracing::error!(
                signature = tx.signature,
                group_address = %group.address,
                "log group does not belong to the trade instruction's program"
            );
            return None;
        }
        for line in &group.log_messages {
            let Some(data) = extract_program_data(line) else {
                continue;
            };
            if log_discriminator(&data).as_deref() != Some(discriminators::TRADE_EVENT) {
                continue;
            }
            match decode_trade_log(&data) {
                Decoded::Ok(event) => return Some(LogPayload::MoonshotTrade(event)),
                Decoded::Malformed(reason) => {
                    tracing::warn!(
                        signature = tx.signature,
                        %reason,
                        "malformed moonshot trade log payload"
                    );
                    return None;
                }
            }
        }
        None
    }
}

impl ProtocolParser for MoonshotParser {
    fn parse_instruction(
        &self,
        tx: &TxContext<'_>,
        ix: &InstructionView<'_>,
    ) -> Vec<IndexerEvent> {
        if ix.program_id != PROGRAM_ID {
            return Vec::new();
        }
        let decoded = decode_instruction(&ix.instruction.data);
        let instruction = ix.instruction;
        let mut event = match decoded {
            MoonshotInstruction::Buy(_) | MoonshotInstruction::Sell(_) => IndexerEvent {
                source: EventSource::Moonshot,
                kind: EventKind::Trade,
                slot: tx.slot,
                signature: tx.signature.to_string(),
                payload: EventPayload::Moonshot(decoded),
                metadata: EventMetadata::MoonshotTrade(self.trade_meta(tx, ix)),
                log_payload: None,
            },
            MoonshotInstruction::TokenMint(_) if !tx.failed => IndexerEvent {
                source: EventSource::Moonshot,
                kind: EventKind::Mint,
                slot: tx.slot,
                signature: tx.signature.to_string(),
                payload: EventPayload::Moonshot(decoded),
                metadata: EventMetadata::MoonshotMint(MoonshotMintMeta {
                    sender: account_address(instruction, tx.addresses, 0).map(str::to_string),
                    curve_account: account_address(instruction, tx.addresses, 2)
                        .map(str::to_string),
                    mint: account_address(instruction, tx.addresses, 3).map(str::to_string),
                    mint_metadata: account_address(instruction, tx.addresses, 4)
                        .map(str::to_string),
                    curve_token_account: account_address(instruction, tx.addresses, 5)
                        .map(str::to_string),
                    config_account: account_address(instruction, tx.addresses, 6)
                        .map(str::to_string),
                    failed_transaction: tx.failed,
                }),
                log_payload: None,
            },
            MoonshotInstruction::MigrateFunds if !tx.failed => IndexerEvent {
                source: EventSource::Moonshot,
                kind: EventKind::Complete,
                slot: tx.slot,
                signature: tx.signature.to_string(),
                payload: EventPayload::Moonshot(decoded),
                metadata: EventMetadata::MoonshotComplete(MoonshotCompleteMeta {
                    curve_account: account_address(instruction, tx.addresses, 2)
                        .map(str::to_string),
                    curve_token_account: account_address(instruction, tx.addresses, 3)
                        .map(str::to_string),
                    mint: account_address(instruction, tx.addresses, 5).map(str::to_string),
                    failed_transaction: tx.failed,
                }),
                log_payload: None,
            },
            MoonshotInstruction::ConfigInit(_) | MoonshotInstruction::ConfigUpdate(_)
                if !tx.failed =>
            {
                IndexerEvent {
                    source: EventSource::Moonshot,
                    kind: EventKind::Info,
                    slot: tx.slot,
                    signature: tx.signature.to_string(),
                    payload: EventPayload::Moonshot(decoded),
                    metadata: EventMetadata::MoonshotInfo(MoonshotInfoMeta {
                        failed_transaction: tx.failed,
                    }),
                    log_payload: None,
                }
            }
            _ => return Vec::new(),
        };
        if !tx.failed {
            event.log_payload = self.trade_log_payload(tx, ix.log_group);
        }
        vec![event]
    }

    fn parse_transaction(
        &self,
        _tx: &TxContext<'_>,
        _log_groups: &[InstructionLogs],
    ) -> Vec<IndexerEvent> {
        Vec::new()
    }
}
