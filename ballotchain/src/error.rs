use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("ballotchain: invalid voter code - expected {0} characters from the voter-code alphabet")]
    InvalidFormat(usize),

    #[error("ballotchain: voter code not found")]
    CodeNotFound,

    #[error("ballotchain: voter code has already been used")]
    AlreadyUsed,

    #[error("ballotchain: election {0} not found")]
    ElectionNotFound(String),

    #[error("ballotchain: election {0} is not accepting votes")]
    ElectionNotActive(String),

    #[error("ballotchain: configuration error: {0}")]
    ConfigurationError(String),

    #[error("ballotchain: failed to decrypt ballot")]
    DecryptionError,

    #[error("ballotchain: vote could not be recorded after {attempts} attempts, please try again")]
    TransactionConflict { attempts: usize },

    #[error("ballotchain: vote timed out before it could be recorded")]
    Timeout,

    #[error("ballotchain: voter code already exists in election {0}")]
    DuplicateCode(String),

    #[error("ballotchain: cannot generate {count} codes at once, the limit is {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    #[error("ballotchain: invalid key - expected 64 hexidecimal characters")]
    InvalidKey,

    #[error("ballotchain: store error: {0}")]
    Store(String),

    #[error("ballotchain: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a conditional vote commit was refused by the store.
///
/// These never reach the caller of `cast_vote` directly, the casting loop
/// re-reads state and either retries or reports the matching `Error`.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("ballotchain commit: voter code not found")]
    CodeNotFound,

    #[error("ballotchain commit: voter code was redeemed concurrently")]
    CodeAlreadyUsed,

    #[error("ballotchain commit: chain head moved (expected next index {expected}, found {found})")]
    HeadMoved { expected: u64, found: u64 },

    #[error("ballotchain commit: election is no longer accepting votes")]
    ElectionNotActive,

    #[error("{0}")]
    Store(#[from] Error),
}

/// A problem found while verifying the ledger.
///
/// Integrity violations are reported as data so an audit can list every
/// problem in one pass.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityViolation {
    #[error("block {index}: genesis block must have index 0 and previous hash \"0\"")]
    GenesisMismatch { index: u64 },

    #[error("block index discontinuity: expected {expected}, found {found}")]
    IndexDiscontinuity { expected: u64, found: u64 },

    #[error("block index overflow: no index can follow {previous}, found {found}")]
    IndexOverflow { previous: u64, found: u64 },

    #[error("block {index}: previous hash does not match the hash of block {previous}")]
    LinkageBroken { index: u64, previous: u64 },

    #[error("block {index}: stored hash {found} does not match recomputed hash {expected}")]
    BlockHashMismatch {
        index: u64,
        expected: String,
        found: String,
    },

    #[error("count mismatch: {what} is {found}, expected {expected}")]
    CountMismatch {
        what: String,
        expected: u64,
        found: u64,
    },
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::Store(format!("lock poisoned: {}", e))
    }
}
