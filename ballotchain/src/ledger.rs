use crate::*;

/// `previous_hash` of the first block in every election's chain
pub const GENESIS: &str = "0";

/// One entry in an election's append-only hash chain
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HashBlock {
    pub index: u64,
    pub vote_hash: String,
    pub previous_hash: String,
    pub block_hash: String,
    pub class_id: String,
    pub timestamp: u64,
}

impl HashBlock {
    /// Build the block that follows `head`
    pub fn next(head: &ChainHead, vote_hash: String, class_id: &str, timestamp: u64) -> Self {
        let index = head.next_index();
        let previous_hash = head.block_hash.clone();
        let block_hash = block_hash(index, timestamp, &vote_hash, &previous_hash);

        HashBlock {
            index,
            vote_hash,
            previous_hash,
            block_hash,
            class_id: class_id.to_owned(),
            timestamp,
        }
    }

    /// Recompute this block's hash from its contents
    pub fn compute_hash(&self) -> String {
        block_hash(
            self.index,
            self.timestamp,
            &self.vote_hash,
            &self.previous_hash,
        )
    }

    /// The head of a chain that ends with this block
    pub fn as_head(&self) -> ChainHead {
        ChainHead {
            index: Some(self.index),
            block_hash: self.block_hash.clone(),
        }
    }
}

/// The tail of an election's chain.
///
/// An empty chain is `index: None` with `block_hash: GENESIS`, the `(-1, "0")` sentinel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    pub index: Option<u64>,
    pub block_hash: String,
}

impl ChainHead {
    pub fn empty() -> Self {
        ChainHead {
            index: None,
            block_hash: GENESIS.to_owned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_none()
    }

    /// Index the next appended block will get
    pub fn next_index(&self) -> u64 {
        match self.index {
            Some(index) => index + 1,
            None => 0,
        }
    }
}

impl Default for ChainHead {
    fn default() -> Self {
        ChainHead::empty()
    }
}

/// `H(index ‖ timestamp ‖ vote_hash ‖ previous_hash)`
pub fn block_hash(index: u64, timestamp: u64, vote_hash: &str, previous_hash: &str) -> String {
    let data = format!("{}{}{}{}", index, timestamp, vote_hash, previous_hash);
    hash(data.as_bytes())
}

/// `H(ballot ‖ timestamp ‖ previous_hash)`
///
/// `ballot` is the stored ballot ciphertext, never the plaintext choice.
pub fn vote_hash(ballot: &str, timestamp: u64, previous_hash: &str) -> String {
    let data = format!("{}{}{}", ballot, timestamp, previous_hash);
    hash(data.as_bytes())
}
