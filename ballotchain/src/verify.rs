//! Chain verification.
//!
//! Both modes are pure functions over a snapshot of blocks. Tampering is an
//! expected outcome and is reported in the returned structures, never as an `Err`.

use crate::*;

/// Result of checking one block
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlockVerification {
    pub index: u64,
    pub valid: bool,
    pub violations: Vec<IntegrityViolation>,
}

/// Result of checking a whole chain
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    pub valid: bool,
    pub first_invalid_index: Option<u64>,
    pub results: Vec<BlockVerification>,
}

impl ChainVerification {
    /// Every violation found, in chain order
    pub fn violations(&self) -> impl Iterator<Item = &IntegrityViolation> {
        self.results.iter().flat_map(|r| r.violations.iter())
    }
}

/// Result of checking the neighbourhood of one vote
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PointVerification {
    pub found: bool,
    pub block_index: Option<u64>,
    pub timestamp: Option<u64>,
    pub chain_valid: bool,
    pub violations: Vec<IntegrityViolation>,
}

impl PointVerification {
    /// The vote hash is not in the chain
    pub fn not_found() -> Self {
        PointVerification {
            found: false,
            block_index: None,
            timestamp: None,
            chain_valid: false,
            violations: vec![],
        }
    }
}

/// Check a block against the block before it (`None` for the first block)
fn check_block(
    block: &HashBlock,
    previous: Option<&HashBlock>,
    violations: &mut Vec<IntegrityViolation>,
) {
    match previous {
        None => {
            if block.index != 0 || block.previous_hash != GENESIS {
                violations.push(IntegrityViolation::GenesisMismatch { index: block.index });
            }
        }
        Some(previous) => {
            match previous.index.checked_add(1) {
                Some(expected) if expected == block.index => {}
                Some(expected) => violations.push(IntegrityViolation::IndexDiscontinuity {
                    expected,
                    found: block.index,
                }),
                None => violations.push(IntegrityViolation::IndexOverflow {
                    previous: previous.index,
                    found: block.index,
                }),
            }
            if block.previous_hash != previous.block_hash {
                violations.push(IntegrityViolation::LinkageBroken {
                    index: block.index,
                    previous: previous.index,
                });
            }
        }
    }

    check_self_hash(block, violations);
}

fn check_self_hash(block: &HashBlock, violations: &mut Vec<IntegrityViolation>) {
    let expected = block.compute_hash();
    if expected != block.block_hash {
        violations.push(IntegrityViolation::BlockHashMismatch {
            index: block.index,
            expected,
            found: block.block_hash.clone(),
        });
    }
}

/// Verify a whole chain.
///
/// `blocks` must be ordered by index. Every block is checked even after a
/// failure, so one tampered block cannot hide another.
pub fn verify_chain(blocks: &[HashBlock]) -> ChainVerification {
    let mut results = Vec::with_capacity(blocks.len());
    let mut first_invalid_index = None;

    for (i, block) in blocks.iter().enumerate() {
        let previous = if i == 0 { None } else { blocks.get(i - 1) };

        let mut violations = vec![];
        check_block(block, previous, &mut violations);

        let valid = violations.is_empty();
        if !valid && first_invalid_index.is_none() {
            first_invalid_index = Some(block.index);
        }
        results.push(BlockVerification {
            index: block.index,
            valid,
            violations,
        });
    }

    ChainVerification {
        valid: first_invalid_index.is_none(),
        first_invalid_index,
        results,
    }
}

/// Verify the block holding `vote_hash` and its immediate neighbours.
///
/// This lets a voter check a receipt without auditing the whole chain. It
/// cannot see tampering further away; only `verify_chain` is authoritative.
pub fn verify_around(blocks: &[HashBlock], vote_hash: &str) -> PointVerification {
    let position = match blocks.iter().position(|b| b.vote_hash == vote_hash) {
        Some(position) => position,
        None => return PointVerification::not_found(),
    };
    verify_window(blocks, position)
}

/// Point verification over a window of blocks, where `position` is the
/// offset of the voter's block within `window`.
///
/// The window holds the block's predecessor and successor when they exist.
pub fn verify_window(window: &[HashBlock], position: usize) -> PointVerification {
    let block = match window.get(position) {
        Some(block) => block,
        None => return PointVerification::not_found(),
    };
    let mut violations = vec![];

    let previous = if position == 0 {
        None
    } else {
        window.get(position - 1)
    };
    match previous {
        Some(previous) => check_self_hash(previous, &mut violations),
        None if block.index != 0 => {
            // Caller did not hand us the predecessor of a non-genesis block
            violations.push(IntegrityViolation::IndexDiscontinuity {
                expected: 0,
                found: block.index,
            });
        }
        None => {}
    }
    check_block(block, previous, &mut violations);

    if let Some(next) = window.get(position + 1) {
        check_block(next, Some(block), &mut violations);
    }

    PointVerification {
        found: true,
        block_index: Some(block.index),
        timestamp: Some(block.timestamp),
        chain_valid: violations.is_empty(),
        violations,
    }
}
