use crate::*;
use rand::Rng;

const SALT_LENGTH: usize = 16;

/// What a voter chose, before encryption.
///
/// The random salt keeps two ballots for the same candidate from being
/// distinguishable by anything but their IVs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BallotContent {
    pub candidate_id: String,
    pub class_id: String,

    #[serde(with = "hex_serde")]
    pub salt: Vec<u8>,
}

impl BallotContent {
    pub fn new(candidate_id: &str, class_id: &str) -> Self {
        let mut salt = vec![0u8; SALT_LENGTH];
        rand::thread_rng().fill(salt.as_mut_slice());

        BallotContent {
            candidate_id: candidate_id.to_owned(),
            class_id: class_id.to_owned(),
            salt,
        }
    }

    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encrypt into a ballot ready to store
    pub fn seal(
        &self,
        election_id: &str,
        key: Option<&BallotKey>,
        timestamp: u64,
    ) -> Result<EncryptedBallot> {
        let ciphertext = encrypt_ballot(&self.as_bytes()?, key)?;

        Ok(EncryptedBallot {
            election_id: election_id.to_owned(),
            class_id: self.class_id.clone(),
            ciphertext,
            timestamp,
        })
    }
}

/// A stored vote.
///
/// It carries neither the voter code nor the block index, so it cannot be
/// joined back to a voter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBallot {
    pub election_id: String,
    pub class_id: String,
    pub ciphertext: String,
    pub timestamp: u64,
}

impl EncryptedBallot {
    /// Decrypt for tallying
    pub fn open(&self, key: &BallotKey) -> Result<BallotContent> {
        let plaintext = decrypt_ballot(&self.ciphertext, key)?;
        BallotContent::from_bytes(&plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_open() {
        let key = BallotKey::generate();
        let content = BallotContent::new("cand-2", "5a");
        assert_eq!(content.salt.len(), SALT_LENGTH);

        let ballot = content.seal("e1", Some(&key), 42).unwrap();
        assert_eq!(ballot.election_id, "e1");
        assert_eq!(ballot.class_id, "5a");
        assert_eq!(ballot.timestamp, 42);
        assert!(!ballot.ciphertext.contains("cand-2"));

        let opened = ballot.open(&key).unwrap();
        assert_eq!(opened, content);

        assert!(ballot.open(&BallotKey::generate()).is_err());
    }

    #[test]
    fn test_salt_differs() {
        let first = BallotContent::new("cand-1", "5a");
        let second = BallotContent::new("cand-1", "5a");
        assert_ne!(first.salt, second.salt);
    }

    #[test]
    fn test_seal_without_key() {
        let content = BallotContent::new("cand-1", "5a");
        assert!(matches!(
            content.seal("e1", None, 1),
            Err(Error::ConfigurationError(_))
        ));
    }
}
