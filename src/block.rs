//! Raw block data model.
//!
//! Blocks arrive as JSON from two historical sources (`blockSubscribe`
//! notifications and on-demand block fetches) whose transaction shapes
//! differ slightly: the message exposes either `accountKeys` or
//! `staticAccountKeys`, instructions live under `instructions` or
//! `compiledInstructions`, and an instruction's account indices are either
//! `accounts` or `accountKeyIndexes`. Both shapes are accepted here and
//! normalized exactly once, at the transaction boundary; nothing downstream
//! ever branches on shape again.

use serde::Deserialize;

/// One block as delivered by the block-fetch collaborator. Read-only input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub transactions: Vec<TransactionWithMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionWithMeta {
    pub transaction: RawTransaction,
    pub meta: TransactionMeta,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(default)]
    pub signatures: Vec<String>,
    pub message: RawMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default)]
    pub account_keys: Option<Vec<String>>,
    #[serde(default)]
    pub static_account_keys: Option<Vec<String>>,
    #[serde(default)]
    pub instructions: Option<Vec<RawInstruction>>,
    #[serde(default)]
    pub compiled_instructions: Option<Vec<RawInstruction>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInstruction {
    pub program_id_index: usize,
    #[serde(default)]
    pub accounts: Option<Vec<usize>>,
    #[serde(default)]
    pub account_key_indexes: Option<Vec<usize>>,
    pub data: InstructionData,
}

/// Instruction data is a base58 string in JSON-shaped messages and raw bytes
/// in already-decoded ones.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InstructionData {
    Base58(String),
    Bytes(Vec<u8>),
}

impl InstructionData {
    pub fn decode(&self) -> Vec<u8> {
        match self {
            InstructionData::Base58(s) => bs58::decode(s).into_vec().unwrap_or_default(),
            InstructionData::Bytes(b) => b.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    /// `null` for successful transactions, an error object otherwise.
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub inner_instructions: Vec<InnerInstructions>,
    #[serde(default)]
    pub log_messages: Vec<String>,
    #[serde(default)]
    pub pre_token_balances: Vec<TokenBalance>,
    #[serde(default)]
    pub post_token_balances: Vec<TokenBalance>,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
    #[serde(default)]
    pub loaded_addresses: LoadedAddresses,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerInstructions {
    pub index: usize,
    #[serde(default)]
    pub instructions: Vec<RawInstruction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedAddresses {
    #[serde(default)]
    pub writable: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub account_index: usize,
    pub mint: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub ui_token_amount: UiTokenAmount,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    /// Raw integer amount as a decimal string.
    pub amount: String,
    pub decimals: u8,
}

impl UiTokenAmount {
    pub fn raw_amount(&self) -> u64 {
        self.amount.parse().unwrap_or(0)
    }
}

/// Canonical instruction view after shape normalization: account positions
/// are indices into the transaction's unified address table, data is decoded
/// bytes.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub program_id_index: usize,
    pub accounts: Vec<usize>,
    pub data: Vec<u8>,
}

impl RawInstruction {
    pub fn normalize(&self) -> Instruction {
        let accounts = self
            .accounts
            .as_ref()
            .or(self.account_key_indexes.as_ref())
            .cloned()
            .unwrap_or_default();
        Instruction {
            program_id_index: self.program_id_index,
            accounts,
            data: self.data.decode(),
        }
    }
}

impl RawMessage {
    /// Top-level instructions regardless of which historical field carried
    /// them.
    pub fn raw_instructions(&self) -> &[RawInstruction] {
        self.instructions
            .as_deref()
            .or(self.compiled_instructions.as_deref())
            .unwrap_or(&[])
    }

    fn keys(&self) -> &[String] {
        self.account_keys
            .as_deref()
            .or(self.static_account_keys.as_deref())
            .unwrap_or(&[])
    }
}

impl TransactionWithMeta {
    /// The complete view of accounts referenced by all instructions of this
    /// transaction, including inner ones:
    /// `static keys ++ loaded writable ++ loaded readonly`. Every
    /// instruction account reference indexes into this concatenation.
    pub fn address_table(&self) -> Vec<String> {
        let message = &self.transaction.message;
        let loaded = &self.meta.loaded_addresses;
        let mut addresses = Vec::with_capacity(
            message.keys().len() + loaded.writable.len() + loaded.readonly.len(),
        );
        addresses.extend_from_slice(message.keys());
        addresses.extend_from_slice(&loaded.writable);
        addresses.extend_from_slice(&loaded.readonly);
        addresses
    }

    /// Primary signature, empty for malformed input.
    pub fn signature(&self) -> &str {
        self.transaction
            .signatures
            .first()
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn failed(&self) -> bool {
        self.meta.err.is_some()
    }

}

impl TransactionMeta {
    pub fn inner_instructions_at(&self, index: usize) -> Option<&InnerInstructions> {
        self.inner_instructions
            .iter()
            .find(|group| group.index == index)
    }

    pub fn pre_token_balance(&self, account_index: usize) -> Option<&TokenBalance> {
        self.pre_token_balances
            .iter()
            .find(|b| b.account_index == account_index)
    }

    pub fn post_token_balance(&self, account_index: usize) -> Option<&TokenBalance> {
        self.post_token_balances
            .iter()
            .find(|b| b.account_index == account_index)
    }

    pub fn post_lamports(&self, account_index: usize) -> Option<u64> {
        self.post_balances.get(account_index).copied()
    }
}
