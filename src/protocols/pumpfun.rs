//! PumpFun bonding-curve program.
//!
//! On successful transactions the program's self-emitted `Program data:`
//! logs are authoritative and instruction data is ignored; on failed
//! transactions no logs were emitted, so trades are reconstructed from
//! instruction data alone.

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::events::{
    EventKind, EventMetadata, EventPayload, EventSource, IndexerEvent,
};
use crate::logtree::InstructionLogs;
use crate::reader::{Decoded, Reader};

use super::{
    account_address, extract_program_data, instruction_discriminator, log_discriminator,
    InstructionView, ProtocolParser, TxContext,
};

pub const PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

pub mod discriminators {
    pub const INITIALIZE: u64 = 17121445590508351407;
    pub const SET_PARAMS: u64 = 18411476951383809957;
    pub const CREATE: u64 = 8576854823835016728;
    pub const BUY: u64 = 16927863322537952870;
    pub const SELL: u64 = 12502976635542562355;
    pub const WITHDRAW: u64 = 2495396153584390839;

    pub const CREATE_EVENT: &str = "1b72a94ddeeb6376";
    pub const TRADE_EVENT: &str = "bddb7fd34ee661ee";
    pub const COMPLETE_EVENT: &str = "5f72619cd42e9808";
    pub const SET_PARAMS_EVENT: &str = "dfc39ff63e308f83";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PumpfunInstruction {
    Initialize,
    SetParams,
    Create(Decoded<CreateArgs>),
    Buy(Decoded<BuyArgs>),
    Sell(Decoded<SellArgs>),
    Withdraw,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyArgs {
    pub amount: u64,
    pub max_sol_cost: u64,
}

impl BuyArgs {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            amount: reader.u64_le()?,
            max_sol_cost: reader.u64_le()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellArgs {
    pub amount: u64,
    pub min_sol_output: u64,
}

impl SellArgs {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            amount: reader.u64_le()?,
            min_sol_output: reader.u64_le()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateArgs {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

impl CreateArgs {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            name: reader.string()?,
            symbol: reader.string()?,
            uri: reader.string()?,
        })
    }
}

/// Self-emitted log payloads, one per log discriminator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PumpfunLogEvent {
    Trade(PumpfunTradeEvent),
    Create(PumpfunCreateEvent),
    Complete(PumpfunCompleteEvent),
    SetParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpfunTradeEvent {
    pub mint: Pubkey,
    pub sol_amount: u64,
    pub token_amount: u64,
    pub is_buy: bool,
    pub user: Pubkey,
    pub timestamp: i64,
    pub virtual_sol_reserves: u64,
    pub virtual_token_reserves: u64,
    pub real_sol_reserves: u64,
    pub real_token_reserves: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpfunCreateEvent {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub mint: Pubkey,
    pub bonding_curve: Pubkey,
    pub user: Pubkey,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpfunCompleteEvent {
    pub user: Pubkey,
    pub mint: Pubkey,
    pub bonding_curve: Pubkey,
    pub timestamp: i64,
}

impl PumpfunTradeEvent {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            mint: reader.pubkey()?,
            sol_amount: reader.u64_le()?,
            token_amount: reader.u64_le()?,
            is_buy: reader.bool()?,
            user: reader.pubkey()?,
            timestamp: reader.i64_le()?,
            virtual_sol_reserves: reader.u64_le()?,
            virtual_token_reserves: reader.u64_le()?,
            real_sol_reserves: reader.u64_le()?,
            real_token_reserves: reader.u64_le()?,
        })
    }
}

impl PumpfunCreateEvent {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            name: reader.string()?,
            symbol: reader.string()?,
            uri: reader.string()?,
            mint: reader.pubkey()?,
            bonding_curve: reader.pubkey()?,
            user: reader.pubkey()?,
        })
    }
}

impl PumpfunCompleteEvent {
    fn read(reader: &mut Reader<'_>) -> Result<Self, crate::error::DecodeError> {
        Ok(Self {
            user: reader.pubkey()?,
            mint: reader.pubkey()?,
            bonding_curve: reader.pubkey()?,
            timestamp: reader.i64_le()?,
        })
    }
}

pub fn decode_instruction(data: &[u8]) -> PumpfunInstruction {
    let Some(discriminator) = instruction_discriminator(data) else {
        return PumpfunInstruction::Unknown;
    };
    let mut reader = Reader::new(&data[8..]);
    match discriminator {
        discriminators::INITIALIZE => PumpfunInstruction::Initialize,
        discriminators::SET_PARAMS => PumpfunInstruction::SetParams,
        discriminators::CREATE => {
            PumpfunInstruction::Create(Decoded::from_result(CreateArgs::read(&mut reader)))
        }
        discriminators::BUY => {
            PumpfunInstruction::Buy(Decoded::from_result(BuyArgs::read(&mut reader)))
        }
        discriminators::SELL => {
            PumpfunInstruction::Sell(Decoded::from_result(SellArgs::read(&mut reader)))
        }
        discriminators::WITHDRAW => PumpfunInstruction::Withdraw,
        _ => PumpfunInstruction::Unknown,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpfunTradeMeta {
    pub block_time: Option<i64>,
    pub mint: String,
    pub bonding_curve: String,
    pub associated_bonding_curve: String,
    pub user: String,
    pub side: TradeSide,
    pub failed_transaction: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpfunLogMeta {
    pub failed_transaction: bool,
}

pub struct PumpfunParser;

impl PumpfunParser {
    fn log_event(&self, tx: &TxContext<'_>, data: &[u8]) -> Option<(EventKind, PumpfunLogEvent)> {
        let discriminator = log_discriminator(data)?;
        let mut reader = Reader::new(&data[8..]);
        let decoded = match discriminator.as_str() {
            discriminators::TRADE_EVENT => PumpfunTradeEvent::read(&mut reader)
                .map(|event| (EventKind::Trade, PumpfunLogEvent::Trade(event))),
            discriminators::CREATE_EVENT => PumpfunCreateEvent::read(&mut reader)
                .map(|event| (EventKind::Mint, PumpfunLogEvent::Create(event))),
            discriminators::COMPLETE_EVENT => PumpfunCompleteEvent::read(&mut reader)
                .map(|event| (EventKind::Complete, PumpfunLogEvent::Complete(event))),
            // Recognized so it never logs as unexpected, but produces no
            // event.
            discriminators::SET_PARAMS_EVENT => return None,
            _ => return None,
        };
        match decoded {
            Ok(pair) => Some(pair),
            Err(error) => {
                tracing::warn!(
                    signature = tx.signature,
                    %error,
                    "malformed pumpfun log payload"
                );
                None
            }
        }
    }
}

impl ProtocolParser for PumpfunParser {
    /// Failed transactions only: the program emitted no logs, so the trade
    /// intent is recovered from instruction data and account positions. All
    /// referenced accounts must resolve or no event is produced.
    fn parse_instruction(
        &self,
        tx: &TxContext<'_>,
        ix: &InstructionView<'_>,
    ) -> Vec<IndexerEvent> {
        if ix.program_id != PROGRAM_ID || !tx.failed {
            return Vec::new();
        }
        let decoded = decode_instruction(&ix.instruction.data);
        let side = match decoded {
            PumpfunInstruction::Buy(_) => TradeSide::Buy,
            PumpfunInstruction::Sell(_) => TradeSide::Sell,
            _ => return Vec::new(),
        };
        let instruction = ix.instruction;
        let (Some(mint), Some(bonding_curve), Some(associated_bonding_curve), Some(user)) = (
            account_address(instruction, tx.addresses, 2),
            account_address(instruction, tx.addresses, 3),
            account_address(instruction, tx.addresses, 4),
            account_address(instruction, tx.addresses, 6),
        ) else {
            return Vec::new();
        };
        vec![IndexerEvent {
            source: EventSource::Pumpfun,
            kind: EventKind::Trade,
            slot: tx.slot,
            signature: tx.signature.to_string(),
            payload: EventPayload::Pumpfun(decoded),
            metadata: EventMetadata::PumpfunTrade(PumpfunTradeMeta {
                block_time: tx.block_time,
                mint: mint.to_string(),
                bonding_curve: bonding_curve.to_string(),
                associated_bonding_curve: associated_bonding_curve.to_string(),
                user: user.to_string(),
                side,
                failed_transaction: tx.failed,
            }),
            log_payload: None,
        }]
    }

    /// Successful transactions only: every `Program data:` line across this
    /// program's log groups becomes its own event.
    fn parse_transaction(
        &self,
        tx: &TxContext<'_>,
        log_groups: &[InstructionLogs],
    ) -> Vec<IndexerEvent> {
        if tx.failed {
            return Vec::new();
        }
        let mut events = Vec::new();
        for group in log_groups {
            if group.address != PROGRAM_ID {
                continue;
            }
            for line in &group.log_messages {
                let Some(data) = extract_program_data(line) else {
                    continue;
                };
                let Some((kind, payload)) = self.log_event(tx, &data) else {
                    continue;
                };
                events.push(IndexerEvent {
                    source: EventSource::Pumpfun,
                    kind,
                    slot: tx.slot,
                    signature: tx.signature.to_string(),
                    payload: EventPayload::PumpfunLog(payload),
                    metadata: EventMetadata::PumpfunLog(PumpfunLogMeta {
                        failed_transaction: tx.failed,
                    }),
                    log_payload: None,
                });
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Instruction, TransactionMeta};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    fn trade_event_payload(is_buy: bool) -> Vec<u8> {
        let mut data = hex::decode(discriminators::TRADE_EVENT).unwrap();
        data.extend_from_slice(&[7u8; 32]);
        data.extend_from_slice(&1_000u64.to_le_bytes());
        data.extend_from_slice(&2_000u64.to_le_bytes());
        data.push(is_buy as u8);
        data.extend_from_slice(&[8u8; 32]);
        data.extend_from_slice(&1_700_000_000i64.to_le_bytes());
        data.extend_from_slice(&30u64.to_le_bytes());
        data.extend_from_slice(&40u64.to_le_bytes());
        data.extend_from_slice(&50u64.to_le_bytes());
        data.extend_from_slice(&60u64.to_le_bytes());
        data
    }

    fn context<'a>(
        meta: &'a TransactionMeta,
        addresses: &'a [String],
        failed: bool,
    ) -> TxContext<'a> {
        TxContext {
            slot: 42,
            block_time: Some(1_700_000_000),
            signature: "sig",
            meta,
            addresses,
            failed,
        }
    }

    #[test]
    fn successful_transaction_emits_log_events_only() {
        let meta = TransactionMeta::default();
        let addresses: Vec<String> = vec![PROGRAM_ID.into()];
        let tx = context(&meta, &addresses, false);
        let groups = vec![InstructionLogs {
            address: PROGRAM_ID.to_string(),
            log_messages: vec![
                "Program log: Instruction: Buy".to_string(),
                format!("Program data: {}", BASE64.encode(trade_event_payload(true))),
            ],
        }];
        let events = PumpfunParser.parse_transaction(&tx, &groups);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Trade);
        match &events[0].payload {
            EventPayload::PumpfunLog(PumpfunLogEvent::Trade(event)) => {
                assert!(event.is_buy);
                assert_eq!(event.sol_amount, 1_000);
                assert_eq!(event.token_amount, 2_000);
            }
            other => panic!("unexpected payload: {other:?}"),
        }

        // The instruction hook stays silent for the same successful tx.
        let instruction = Instruction {
            program_id_index: 0,
            accounts: vec![0, 0, 0, 0, 0, 0, 0],
            data: {
                let mut data = discriminators::BUY.to_le_bytes().to_vec();
                data.extend_from_slice(&[0u8; 16]);
                data
            },
        };
        let none = PumpfunParser.parse_instruction(
            &tx,
            &InstructionView {
                instruction: &instruction,
                program_id: PROGRAM_ID,
                log_group: None,
            },
        );
        assert!(none.is_empty());
    }

    #[test]
    fn failed_transaction_recovers_trade_from_instruction() {
        let meta = TransactionMeta::default();
        let addresses: Vec<String> = vec![
            "global".into(),
            "fee".into(),
            "mint".into(),
            "curve".into(),
            "curveAta".into(),
            "userAta".into(),
            "user".into(),
            PROGRAM_ID.into(),
        ];
        let tx = context(&meta, &addresses, true);
        let mut data = discriminators::SELL.to_le_bytes().to_vec();
        data.extend_from_slice(&777u64.to_le_bytes());
        data.extend_from_slice(&1u64.to_le_bytes());
        let instruction = Instruction {
            program_id_index: 7,
            accounts: vec![0, 1, 2, 3, 4, 5, 6],
            data,
        };
        let events = PumpfunParser.parse_instruction(
            &tx,
            &InstructionView {
                instruction: &instruction,
                program_id: PROGRAM_ID,
                log_group: None,
            },
        );
        assert_eq!(events.len(), 1);
        match &events[0].metadata {
            EventMetadata::PumpfunTrade(meta) => {
                assert_eq!(meta.mint, "mint");
                assert_eq!(meta.user, "user");
                assert_eq!(meta.side, TradeSide::Sell);
                assert!(meta.failed_transaction);
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
    }

    #[test]
    fn failed_trade_with_missing_accounts_emits_nothing() {
        let meta = TransactionMeta::default();
        let addresses: Vec<String> = vec!["a".into(), PROGRAM_ID.into()];
        let tx = context(&meta, &addresses, true);
        let mut data = discriminators::BUY.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; 16]);
        let instruction = Instruction {
            program_id_index: 1,
            accounts: vec![0, 0, 0],
            data,
        };
        let events = PumpfunParser.parse_instruction(
            &tx,
            &InstructionView {
                instruction: &instruction,
                program_id: PROGRAM_ID,
                log_group: None,
            },
        );
        assert!(events.is_empty());
    }

    #[test]
    fn set_params_log_is_recognized_without_event() {
        let meta = TransactionMeta::default();
        let addresses: Vec<String> = Vec::new();
        let tx = context(&meta, &addresses, false);
        let payload = hex::decode(discriminators::SET_PARAMS_EVENT).unwrap();
        let groups = vec![InstructionLogs {
            address: PROGRAM_ID.to_string(),
            log_messages: vec![format!("Program data: {}", BASE64.encode(payload))],
        }];
        assert!(PumpfunParser.parse_transaction(&tx, &groups).is_empty());
    }

    #[test]
    fn create_event_decodes_as_mint() {
        let meta = TransactionMeta::default();
        let addresses: Vec<String> = Vec::new();
        let tx = context(&meta, &addresses, false);
        let mut payload = hex::decode(discriminators::CREATE_EVENT).unwrap();
        for text in ["Dog", "DOG", "ipfs://dog"] {
            payload.extend_from_slice(&(text.len() as u32).to_le_bytes());
            payload.extend_from_slice(text.as_bytes());
        }
        payload.extend_from_slice(&[1u8; 32]);
        payload.extend_from_slice(&[2u8; 32]);
        payload.extend_from_slice(&[3u8; 32]);
        let groups = vec![InstructionLogs {
            address: PROGRAM_ID.to_string(),
            log_messages: vec![format!("Program data: {}", BASE64.encode(payload))],
        }];
        let events = PumpfunParser.parse_transaction(&tx, &groups);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Mint);
        match &events[0].payload {
            EventPayload::PumpfunLog(PumpfunLogEvent::Create(event)) => {
                assert_eq!(event.name, "Dog");
                assert_eq!(event.symbol, "DOG");
                assert_eq!(event.uri, "ipfs://dog");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn truncated_log_payload_is_skipped() {
        let meta = TransactionMeta::default();
        let addresses: Vec<String> = Vec::new();
        let tx = context(&meta, &addresses, false);
        let payload = trade_event_payload(true);
        let groups = vec![InstructionLogs {
            address: PROGRAM_ID.to_string(),
            log_messages: vec![format!(
                "Program data: {}",
                BASE64.encode(&payload[..payload.len() - 10])
            )],
        }];
        assert!(PumpfunParser.parse_transaction(&tx, &groups).is_empty());
    }
}
