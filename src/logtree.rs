//! Reconstruction of the program invocation tree from flat log lines.
//!
//! The runtime emits `Program <addr> invoke [n]`, `Program <addr> success`
//! and `Program <addr> failed: <reason>` lines with no indentation; nesting
//! is recovered with a stack. A pre-order walk over the resulting forest
//! yields one [`InstructionLogs`] group per invocation, in exactly the order
//! the instruction walker visits (instruction, inner instruction) pairs.
//! That 1:1 alignment is load-bearing: the walker consumes one group per
//! instruction, ignored programs included.

use crate::block::TransactionWithMeta;
use crate::error::LogTreeError;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::error;

// Program ComputeBudget111111111111111111111111111111 invoke [1]
static INVOKE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Program\s([1-9A-HJ-NP-Za-km-z]{32,44})\sinvoke\s\[(\d+)\]$")
        .expect("invoke regex")
});

// Program 8BR3zs8zSXetpnDjCtHWnkpSkNSydWb3PTTDuVKku2uu failed: custom program error: 0x2
static RESULT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Program\s([1-9A-HJ-NP-Za-km-z]{32,44})\s(success|failed:.*)$")
        .expect("result regex")
});

/// The runtime stops logging for a transaction after this marker; everything
/// past it is permanently lost.
const LOG_TRUNCATION_MARKER: &str = "Log truncated";

/// Log lines belonging directly to one program invocation, in arrival order.
/// Child invocations appear as their own later groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionLogs {
    pub address: String,
    pub log_messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Success,
    Failed(String),
    Truncated,
}

struct InvokeNode {
    address: String,
    logs: Vec<String>,
    children: Vec<usize>,
    outcome: Option<Outcome>,
}

impl InvokeNode {
    fn new(line: &str, address: String) -> Self {
        InvokeNode {
            address,
            logs: vec![line.to_string()],
            children: Vec::new(),
            outcome: None,
        }
    }

    fn close(&mut self, line: &str, closing: &str, outcome: Outcome) -> Result<(), LogTreeError> {
        if self.address != closing {
            return Err(LogTreeError::ClosingDifferentNode {
                open: self.address.clone(),
                closing: closing.to_string(),
            });
        }
        if self.outcome.is_some() {
            return Err(LogTreeError::ClosingNodeTwice {
                address: self.address.clone(),
            });
        }
        self.logs.push(line.to_string());
        self.outcome = Some(outcome);
        Ok(())
    }
}

/// Parses one transaction's log lines into per-invocation groups.
///
/// Structural violations are fatal to this transaction's parse. An
/// incomplete stream (open invocations left at the end without a truncation
/// marker) produces zero groups instead of an error, so a malformed log
/// cannot abort the surrounding block.
pub fn parse_log_messages(log_messages: &[String]) -> Result<Vec<InstructionLogs>, LogTreeError> {
    let mut nodes: Vec<InvokeNode> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut truncated = false;

    for line in log_messages {
        if let Some(caps) = INVOKE_RE.captures(line) {
            let address = caps[1].to_string();
            let idx = nodes.len();
            nodes.push(InvokeNode::new(line, address));
            match stack.last() {
                Some(&parent) => nodes[parent].children.push(idx),
                None => roots.push(idx),
            }
            stack.push(idx);
        } else if let Some(caps) = RESULT_RE.captures(line) {
            let Some(&current) = stack.last() else {
                return Err(LogTreeError::NoCurrentNode { line: line.clone() });
            };
            let outcome = match &caps[2] {
                "success" => Outcome::Success,
                reason => Outcome::Failed(reason.to_string()),
            };
            nodes[current].close(line, &caps[1], outcome)?;
            stack.pop();
        } else if line == LOG_TRUNCATION_MARKER {
            // The marker may appear before any invocation at depth 1. Every
            // still-open invocation loses the rest of its subtree, so all of
            // them are marked truncated, not just the innermost.
            truncated = true;
            while let Some(open) = stack.pop() {
                nodes[open].outcome = Some(Outcome::Truncated);
            }
            break;
        } else {
            let Some(&current) = stack.last() else {
                return Err(LogTreeError::NoCurrentNode { line: line.clone() });
            };
            nodes[current].logs.push(line.clone());
        }
    }

    if !truncated && !stack.is_empty() {
        error!(open = stack.len(), "log parsing incomplete, discarding groups");
        return Ok(Vec::new());
    }

    let mut groups = Vec::with_capacity(nodes.len());
    for &root in &roots {
        emit_pre_order(&nodes, root, &mut groups);
    }
    Ok(groups)
}

fn emit_pre_order(nodes: &[InvokeNode], index: usize, groups: &mut Vec<InstructionLogs>) {
    let node = &nodes[index];
    groups.push(InstructionLogs {
        address: node.address.clone(),
        log_messages: node.logs.clone(),
    });
    for &child in &node.children {
        emit_pre_order(nodes, child, groups);
    }
}

/// Transaction-level wrapper: structural errors are reported and absorbed
/// here so one corrupt transaction never takes down the block walk.
pub fn parse_transaction_logs(tx: &TransactionWithMeta) -> Vec<InstructionLogs> {
    match parse_log_messages(&tx.meta.log_messages) {
        Ok(groups) => groups,
        Err(err) => {
            error!(signature = tx.signature(), %err, "log tree parse failed");
            Vec::new()
        }
    }
}

/// Read cursor over the ordered log groups of one transaction. Groups are
/// consumed strictly from the front, one per (instruction, inner
/// instruction) visit; the cursor replaces the destructive shared-queue
/// mutation this parse historically relied on.
#[derive(Debug)]
pub struct LogGroupCursor<'a> {
    groups: &'a [InstructionLogs],
    pos: usize,
}

impl<'a> LogGroupCursor<'a> {
    pub fn new(groups: &'a [InstructionLogs]) -> Self {
        LogGroupCursor { groups, pos: 0 }
    }

    /// The group belonging to the instruction currently being parsed.
    pub fn peek(&self) -> Option<&'a InstructionLogs> {
        self.groups.get(self.pos)
    }

    pub fn advance(&mut self) {
        if self.pos < self.groups.len() {
            self.pos += 1;
        }
    }

    pub fn remaining(&self) -> usize {
        self.groups.len() - self.pos
    }
}
