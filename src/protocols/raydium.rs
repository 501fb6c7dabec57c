//! Raydium AMM v4 program.
//!
//! Instructions use a single-byte discriminator. Execution results (actual
//! swap amounts, pool states) are only visible in the program's `ray_log`
//! lines, base64 payloads tagged by a leading log-type byte.

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::events::{
    EventKind, EventMetadata, EventPayload, EventSource, IndexerEvent, LogPayload,
};
use crate::logtree::InstructionLogs;
use crate::reader::{Decoded, Reader};

use super::{account_address, InstructionView, ProtocolParser, TxContext};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

pub const PROGRAM_ID: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

pub const RAY_LOG_PREFIX: &str = "Program log: ray_log: ";

pub mod discriminators {
    pub const INITIALIZE: u8 = 0;
    pub const INITIALIZE2: u8 = 1;
    pub const MONITOR_STEP: u8 = 2;
    pub const DEPOSIT: u8 = 3;
    pub const WITHDRAW: u8 = 4;
    pub const MIGRATE_TO_OPEN_BOOK: u8 = 5;
    pub const SET_PARAMS: u8 = 6;
    pub const WITHDRAW_PNL: u8 = 7;
    pub const WITHDRAW_SRM: u8 = 8;
    pub const SWAP_BASE_IN: u8 = 9;
    pub const PRE_INITIALIZE: u8 = 10;
    pub const SWAP_BASE_OUT: u8 = 11;
    pub const SIMULATE_INFO: u8 = 12;
    pub const ADMIN_CANCEL_ORDERS: u8 = 13;
    pub const CREATE_CONFIG_ACCOUNT: u8 = 14;
    pub const UPDATE_CONFIG_ACCOUNT: u8 = 15;
}

/// Instructions whose execution writes a `ray_log` line.
const INSTRUCTIONS_WITH_RAY_LOG: [u8; 5] = [
    discriminators::INITIALIZE2,
    discriminators::DEPOSIT,
    discriminators::WITHDRAW,
    discriminators::SWAP_BASE_IN,
    discriminators::SWAP_BASE_OUT,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RaydiumInstruction {
    Initialize,
    Initialize2(Decoded<Initialize2Args>),
    MonitorStep,
    Deposit,
    Withdraw,
    MigrateToOpenBook,
    SetParams,
    WithdrawPnl,
    WithdrawSrm,
    SwapBaseIn(Decoded<SwapBaseInArgs>),
    PreInitialize,
    SwapBaseOut(Decoded<SwapBaseOutArgs>),
    SimulateInfo,
    AdminCancelOrders,
    CreateConfigAccount,
    UpdateConfigAccount,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Initialize2Args {
    pub nonce: u8,
    pub open_time: u64,
    pub init_pc_amount: u64,
    pub init_coin_amount: u64,
}

impl Initialize2Args {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            nonce: reader.u8()?,
            open_time: reader.u64_le()?,
            init_pc_amount: reader.u64_le()?,
            init_coin_amount: reader.u64_le()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapBaseInArgs {
    pub amount_in: u64,
    pub minimum_amount_out: u64,
}

impl SwapBaseInArgs {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            amount_in: reader.u64_le()?,
            minimum_amount_out: reader.u64_le()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapBaseOutArgs {
    pub max_amount_in: u64,
    pub amount_out: u64,
}

impl SwapBaseOutArgs {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            max_amount_in: reader.u64_le()?,
            amount_out: reader.u64_le()?,
        })
    }
}

pub fn decode_instruction(data: &[u8]) -> RaydiumInstruction {
    let Some(&discriminator) = data.first() else {
        return RaydiumInstruction::Unknown;
    };
    let mut reader = Reader::new(&data[1..]);
    match discriminator {
        discriminators::INITIALIZE => RaydiumInstruction::Initialize,
        discriminators::INITIALIZE2 => RaydiumInstruction::Initialize2(Decoded::from_result(
            Initialize2Args::read(&mut reader),
        )),
        discriminators::MONITOR_STEP => RaydiumInstruction::MonitorStep,
        discriminators::DEPOSIT => RaydiumInstruction::Deposit,
        discriminators::WITHDRAW => RaydiumInstruction::Withdraw,
        discriminators::MIGRATE_TO_OPEN_BOOK => RaydiumInstruction::MigrateToOpenBook,
        discriminators::SET_PARAMS => RaydiumInstruction::SetParams,
        discriminators::WITHDRAW_PNL => RaydiumInstruction::WithdrawPnl,
        discriminators::WITHDRAW_SRM => RaydiumInstruction::WithdrawSrm,
        discriminators::SWAP_BASE_IN => RaydiumInstruction::SwapBaseIn(Decoded::from_result(
            SwapBaseInArgs::read(&mut reader),
        )),
        discriminators::PRE_INITIALIZE => RaydiumInstruction::PreInitialize,
        discriminators::SWAP_BASE_OUT => RaydiumInstruction::SwapBaseOut(Decoded::from_result(
            SwapBaseOutArgs::read(&mut reader),
        )),
        discriminators::SIMULATE_INFO => RaydiumInstruction::SimulateInfo,
        discriminators::ADMIN_CANCEL_ORDERS => RaydiumInstruction::AdminCancelOrders,
        discriminators::CREATE_CONFIG_ACCOUNT => RaydiumInstruction::CreateConfigAccount,
        discriminators::UPDATE_CONFIG_ACCOUNT => RaydiumInstruction::UpdateConfigAccount,
        _ => RaydiumInstruction::Unknown,
    }
}

/// Decoded `ray_log` payload, tagged by its leading log-type byte.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RayLog {
    Init(InitLog),
    Deposit,
    Withdraw,
    SwapBaseIn(SwapBaseInLog),
    SwapBaseOut(SwapBaseOutLog),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitLog {
    pub time: u64,
    pub pc_decimals: u8,
    pub coin_decimals: u8,
    pub pc_lot_size: u64,
    pub coin_lot_size: u64,
    pub pc_amount: u64,
    pub coin_amount: u64,
    pub market: Pubkey,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapBaseInLog {
    pub amount_in: u64,
    pub minimum_out: u64,
    pub direction: u64,
    pub user_source: u64,
    pub pool_coin: u64,
    pub pool_pc: u64,
    pub out_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapBaseOutLog {
    pub max_in: u64,
    pub amount_out: u64,
    pub direction: u64,
    pub user_source: u64,
    pub pool_coin: u64,
    pub pool_pc: u64,
    pub deduct_in: u64,
}

/// Decodes the base64 payload of a `ray_log` line. Unknown tags and short
/// payloads are dropped rather than surfaced.
pub fn decode_ray_log(encoded: &str) -> Option<RayLog> {
    let data = BASE64.decode(encoded.trim()).ok()?;
    let mut reader = Reader::new(&data);
    let tag = reader.u8().ok()?;
    let log = match tag {
        0 => RayLog::Init(InitLog {
            time: reader.u64_le().ok()?,
            pc_decimals: reader.u8().ok()?,
            coin_decimals: reader.u8().ok()?,
            pc_lot_size: reader.u64_le().ok()?,
            coin_lot_size: reader.u64_le().ok()?,
            pc_amount: reader.u64_le().ok()?,
            coin_amount: reader.u64_le().ok()?,
            market: reader.pubkey().ok()?,
        }),
        1 => RayLog::Deposit,
        2 => RayLog::Withdraw,
        3 => RayLog::SwapBaseIn(SwapBaseInLog {
            amount_in: reader.u64_le().ok()?,
            minimum_out: reader.u64_le().ok()?,
            direction: reader.u64_le().ok()?,
            user_source: reader.u64_le().ok()?,
            pool_coin: reader.u64_le().ok()?,
            pool_pc: reader.u64_le().ok()?,
            out_amount: reader.u64_le().ok()?,
        }),
        4 => RayLog::SwapBaseOut(SwapBaseOutLog {
            max_in: reader.u64_le().ok()?,
            amount_out: reader.u64_le().ok()?,
            direction: reader.u64_le().ok()?,
            user_source: reader.u64_le().ok()?,
            pool_coin: reader.u64_le().ok()?,
            pool_pc: reader.u64_le().ok()?,
            deduct_in: reader.u64_le().ok()?,
        }),
        _ => return None,
    };
    Some(log)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaydiumMintMeta {
    pub amm: Option<String>,
    pub amm_open_orders: Option<String>,
    pub lp_mint: Option<String>,
    pub coin_mint: Option<String>,
    pub pc_mint: Option<String>,
    pub pool_coin_token_account: Option<String>,
    pub pool_pc_token_account: Option<String>,
    pub pool_withdraw_queue: Option<String>,
    pub amm_target_orders: Option<String>,
    pub pool_temp_lp: Option<String>,
    pub failed_transaction: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaydiumTradeMeta {
    pub amm: Option<String>,
    pub user: Option<String>,
    pub timestamp: Option<i64>,
    pub failed_transaction: bool,
}

pub struct RaydiumParser;

impl RaydiumParser {
    /// The `ray_log` payload of this instruction's log group, if the
    /// instruction is one that writes one and the group matches.
    fn ray_log(
        &self,
        tx: &TxContext<'_>,
        ix: &InstructionView<'_>,
    ) -> Option<RayLog> {
        let discriminator = *ix.instruction.data.first()?;
        if !INSTRUCTIONS_WITH_RAY_LOG.contains(&discriminator) {
            return None;
        }
        let group = ix.log_group?;
        if group.address != PROGRAM_ID {
            tracing::warn!(
                signature = tx.signature,
                group_address = %group.address,
                "log group does not belong to the raydium instruction"
            );
            return None;
        }
        let line = group
            .log_messages
            .iter()
            .find_map(|line| line.strip_prefix(RAY_LOG_PREFIX))?;
        decode_ray_log(line)
    }
}

impl ProtocolParser for RaydiumParser {
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
            RaydiumInstruction::Initialize2(_) if !tx.failed => IndexerEvent {
                source: EventSource::Raydium,
                kind: EventKind::Mint,
                slot: tx.slot,
                signature: tx.signature.to_string(),
                payload: EventPayload::Raydium(decoded),
                metadata: EventMetadata::RaydiumMint(RaydiumMintMeta {
                    amm: account_address(instruction, tx.addresses, 4).map(str::to_string),
                    amm_open_orders: account_address(instruction, tx.addresses, 6)
                        .map(str::to_string),
                    lp_mint: account_address(instruction, tx.addresses, 7).map(str::to_string),
                    coin_mint: account_address(instruction, tx.addresses, 8).map(str::to_string),
                    pc_mint: account_address(instruction, tx.addresses, 9).map(str::to_string),
                    pool_coin_token_account: account_address(instruction, tx.addresses, 10)
                        .map(str::to_string),
                    pool_pc_token_account: account_address(instruction, tx.addresses, 11)
                        .map(str::to_string),
                    pool_withdraw_queue: account_address(instruction, tx.addresses, 12)
                        .map(str::to_string),
                    amm_target_orders: account_address(instruction, tx.addresses, 13)
                        .map(str::to_string),
                    pool_temp_lp: account_address(instruction, tx.addresses, 14)
                        .map(str::to_string),
                    failed_transaction: tx.failed,
                }),
                log_payload: None,
            },
            RaydiumInstruction::SwapBaseIn(_) | RaydiumInstruction::SwapBaseOut(_) => {
                // The user wallet is the last account; the account list is 17
                // or 18 entries depending on whether the pool carries a
                // target-orders account.
                let user_position = instruction.accounts.len().checked_sub(1);
                IndexerEvent {
                    source: EventSource::Raydium,
                    kind: EventKind::Trade,
                    slot: tx.slot,
                    signature: tx.signature.to_string(),
                    payload: EventPayload::Raydium(decoded),
                    metadata: EventMetadata::RaydiumTrade(RaydiumTradeMeta {
                        amm: account_address(instruction, tx.addresses, 1).map(str::to_string),
                        user: user_position
                            .and_then(|position| {
                                account_address(instruction, tx.addresses, position)
                            })
                            .map(str::to_string),
                        timestamp: tx.block_time,
                        failed_transaction: tx.failed,
                    }),
                    log_payload: None,
                }
            }
            _ => return Vec::new(),
        };
        if let Some(log) = self.ray_log(tx, ix) {
            // Init logs describe pool creation and are kept even on retries;
            // swap logs report executed amounts, which only exist for
            // successful transactions.
            let attach = matches!(log, RayLog::Init(_)) || !tx.failed;
            if attach {
                event.log_payload = Some(LogPayload::RayLog(log));
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Instruction, TransactionMeta};

    fn swap_base_in_data() -> Vec<u8> {
        let mut data = vec![discriminators::SWAP_BASE_IN];
        data.extend_from_slice(&1_000u64.to_le_bytes());
        data.extend_from_slice(&990u64.to_le_bytes());
        data
    }

    fn swap_base_in_log() -> String {
        let mut payload = vec![3u8];
        for value in [1_000u64, 990, 0, 5_000, 70_000, 80_000, 995] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        format!("{RAY_LOG_PREFIX}{}", BASE64.encode(payload))
    }

    #[test]
    fn every_discriminator_is_classified() {
        for discriminator in 0u8..16 {
            let decoded = decode_instruction(&[discriminator]);
            assert_ne!(decoded, RaydiumInstruction::Unknown, "byte {discriminator}");
        }
        assert_eq!(decode_instruction(&[16]), RaydiumInstruction::Unknown);
        assert_eq!(decode_instruction(&[]), RaydiumInstruction::Unknown);
    }

    #[test]
    fn swap_decodes_args_and_ray_log() {
        let meta = TransactionMeta::default();
        let addresses: Vec<String> = (0..18).map(|i| format!("acct{i}")).collect();
        let tx = TxContext {
            slot: 9,
            block_time: Some(1_700_000_100),
            signature: "sig",
            meta: &meta,
            addresses: &addresses,
            failed: false,
        };
        let instruction = Instruction {
            program_id_index: 0,
            accounts: (0..17).collect(),
            data: swap_base_in_data(),
        };
        let group = InstructionLogs {
            address: PROGRAM_ID.to_string(),
            log_messages: vec![swap_base_in_log()],
        };
        let events = RaydiumParser.parse_instruction(
            &tx,
            &InstructionView {
                instruction: &instruction,
                program_id: PROGRAM_ID,
                log_group: Some(&group),
            },
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Trade);
        match &events[0].metadata {
            EventMetadata::RaydiumTrade(meta) => {
                assert_eq!(meta.amm.as_deref(), Some("acct1"));
                assert_eq!(meta.user.as_deref(), Some("acct16"));
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
        match &events[0].log_payload {
            Some(LogPayload::RayLog(RayLog::SwapBaseIn(log))) => {
                assert_eq!(log.amount_in, 1_000);
                assert_eq!(log.out_amount, 995);
            }
            other => panic!("unexpected log payload: {other:?}"),
        }
    }

    #[test]
    fn failed_swap_keeps_trade_but_drops_ray_log() {
        let meta = TransactionMeta::default();
        let addresses: Vec<String> = (0..18).map(|i| format!("acct{i}")).collect();
        let tx = TxContext {
            slot: 9,
            block_time: None,
            signature: "sig",
            meta: &meta,
            addresses: &addresses,
            failed: true,
        };
        let instruction = Instruction {
            program_id_index: 0,
            accounts: (0..17).collect(),
            data: swap_base_in_data(),
        };
        let group = InstructionLogs {
            address: PROGRAM_ID.to_string(),
            log_messages: vec![swap_base_in_log()],
        };
        let events = RaydiumParser.parse_instruction(
            &tx,
            &InstructionView {
                instruction: &instruction,
                program_id: PROGRAM_ID,
                log_group: Some(&group),
            },
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Trade);
        assert!(events[0].log_payload.is_none());
    }

    #[test]
    fn initialize2_emits_mint_with_pool_accounts() {
        let meta = TransactionMeta::default();
        let addresses: Vec<String> = (0..20).map(|i| format!("acct{i}")).collect();
        let tx = TxContext {
            slot: 9,
            block_time: None,
            signature: "sig",
            meta: &meta,
            addresses: &addresses,
            failed: false,
        };
        let mut data = vec![discriminators::INITIALIZE2, 254];
        data.extend_from_slice(&0u64.to_le_bytes());
        data.extend_from_slice(&123u64.to_le_bytes());
        data.extend_from_slice(&456u64.to_le_bytes());
        let instruction = Instruction {
            program_id_index: 0,
            accounts: (0..20).collect(),
            data,
        };
        let events = RaydiumParser.parse_instruction(
            &tx,
            &InstructionView {
                instruction: &instruction,
                program_id: PROGRAM_ID,
                log_group: None,
            },
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Mint);
        match &events[0].payload {
            EventPayload::Raydium(RaydiumInstruction::Initialize2(Decoded::Ok(args))) => {
                assert_eq!(args.nonce, 254);
                assert_eq!(args.init_pc_amount, 123);
                assert_eq!(args.init_coin_amount, 456);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        match &events[0].metadata {
            EventMetadata::RaydiumMint(meta) => {
                assert_eq!(meta.amm.as_deref(), Some("acct4"));
                assert_eq!(meta.lp_mint.as_deref(), Some("acct7"));
                assert_eq!(meta.pool_temp_lp.as_deref(), Some("acct14"));
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
    }

    #[test]
    fn ray_log_rejects_garbage() {
        assert_eq!(decode_ray_log("not-base64!!"), None);
        assert_eq!(decode_ray_log(&BASE64.encode([9u8])), None);
        assert_eq!(decode_ray_log(&BASE64.encode([3u8, 1, 2])), None);
        assert_eq!(decode_ray_log(&BASE64.encode([1u8])), Some(RayLog::Deposit));
    }
}
