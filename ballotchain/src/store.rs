use crate::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Everything written by one successful vote.
///
/// A store applies a commit all-or-nothing, and only if the code is still
/// unused and the chain head is still `expected_head`.
#[derive(Debug, Clone)]
pub struct VoteCommit {
    pub election_id: String,
    pub code_hash: String,
    pub expected_head: ChainHead,
    pub block: HashBlock,
    pub ballot: EncryptedBallot,
}

/// Storage for elections, voter codes, the hash chain and ballots.
///
/// Reads return snapshots and never block a concurrent commit for longer than
/// a copy. `commit_vote` is the only write on the voting path.
pub trait Store {
    /// Get an election
    fn get_election(&self, election_id: &str) -> Result<Option<Election>>;

    /// Insert or replace an election
    fn put_election(&self, election: Election) -> Result<()>;

    /// Look up a voter code by its hash
    fn lookup_code(&self, election_id: &str, code_hash: &str) -> Result<Option<VoterCode>>;

    /// Insert a batch of codes, all or nothing.
    ///
    /// Fails with `Error::DuplicateCode` if any hash is already present.
    fn bulk_create_codes(&self, election_id: &str, codes: Vec<VoterCode>) -> Result<()>;

    /// All codes of an election
    fn codes(&self, election_id: &str) -> Result<Vec<VoterCode>>;

    /// Atomically redeem a code outside of a vote
    fn redeem_code(&self, election_id: &str, code_hash: &str, now: u64) -> Result<()>;

    /// Tail of the election's chain, `ChainHead::empty()` if it has no blocks
    fn head(&self, election_id: &str) -> Result<ChainHead>;

    /// Get a block by its index
    fn get_block(&self, election_id: &str, index: u64) -> Result<Option<HashBlock>>;

    /// Blocks `from..=to` ordered by index, clamped to the chain
    fn get_range(&self, election_id: &str, from: u64, to: u64) -> Result<Vec<HashBlock>>;

    /// Get the block that records `vote_hash`
    fn find_block_by_vote_hash(
        &self,
        election_id: &str,
        vote_hash: &str,
    ) -> Result<Option<HashBlock>>;

    /// All encrypted ballots of an election
    fn ballots(&self, election_id: &str) -> Result<Vec<EncryptedBallot>>;

    /// Election, codes, chain and ballots read together under one lock
    fn election_snapshot(&self, election_id: &str) -> Result<ElectionData>;

    /// Apply a vote: redeem the code, append the block, store the ballot and
    /// bump `total_voted`, as one atomic step.
    fn commit_vote(&self, commit: VoteCommit) -> Result<(), CommitError>;

    /// The whole chain of an election
    fn blocks(&self, election_id: &str) -> Result<Vec<HashBlock>> {
        self.get_range(election_id, 0, u64::MAX)
    }
}

/// One election's data.
///
/// In a `MemStore` its lock is the serialization point for appends.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ElectionData {
    pub election: Election,
    pub codes: BTreeMap<String, VoterCode>,
    pub blocks: Vec<HashBlock>,
    pub ballots: Vec<EncryptedBallot>,
}

impl ElectionData {
    fn new(election: Election) -> Self {
        ElectionData {
            election,
            codes: BTreeMap::new(),
            blocks: vec![],
            ballots: vec![],
        }
    }

    fn head(&self) -> ChainHead {
        match self.blocks.last() {
            Some(block) => block.as_head(),
            None => ChainHead::empty(),
        }
    }
}

/// Serialized form of a `MemStore`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub elections: Vec<ElectionData>,
}

/// A simple in-memory store.
///
/// Each election sits behind its own lock, so votes in different elections
/// never wait on each other.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<HashMap<String, Arc<RwLock<ElectionData>>>>,

    // vote_hash -> position in the election's block list
    vote_index: RwLock<HashMap<String, HashMap<String, u64>>>,
}

impl MemStore {
    fn election_data(&self, election_id: &str) -> Result<Arc<RwLock<ElectionData>>> {
        let inner = self.inner.read()?;
        inner
            .get(election_id)
            .cloned()
            .ok_or_else(|| Error::ElectionNotFound(election_id.to_owned()))
    }

    /// Run `f` on a read-locked election
    fn read<T, F: FnOnce(&ElectionData) -> T>(&self, election_id: &str, f: F) -> Result<T> {
        let data = self.election_data(election_id)?;
        let data = data.read()?;
        Ok(f(&*data))
    }

    /// Export everything for persistence
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        let inner = self.inner.read()?;
        let mut elections = Vec::with_capacity(inner.len());
        for data in inner.values() {
            elections.push(data.read()?.clone());
        }
        elections.sort_by(|a, b| a.election.id.cmp(&b.election.id));
        Ok(StoreSnapshot { elections })
    }

    /// Overwrite a stored block in place, simulating tampering with the
    /// backing storage
    #[cfg(test)]
    pub(crate) fn tamper_block<F: FnOnce(&mut HashBlock)>(
        &self,
        election_id: &str,
        index: u64,
        f: F,
    ) -> Result<()> {
        let data = self.election_data(election_id)?;
        let mut data = data.write()?;
        if let Some(block) = data.blocks.get_mut(index as usize) {
            f(block);
        }
        Ok(())
    }
}

impl From<StoreSnapshot> for MemStore {
    fn from(snapshot: StoreSnapshot) -> Self {
        let mut inner = HashMap::new();
        let mut vote_index = HashMap::new();
        for data in snapshot.elections {
            let id = data.election.id.clone();
            let hashes = data
                .blocks
                .iter()
                .enumerate()
                .map(|(position, b)| (b.vote_hash.clone(), position as u64))
                .collect::<HashMap<_, _>>();
            vote_index.insert(id.clone(), hashes);
            inner.insert(id, Arc::new(RwLock::new(data)));
        }
        MemStore {
            inner: RwLock::new(inner),
            vote_index: RwLock::new(vote_index),
        }
    }
}

impl Store for MemStore {
    fn get_election(&self, election_id: &str) -> Result<Option<Election>> {
        match self.read(election_id, |d| d.election.clone()) {
            Ok(election) => Ok(Some(election)),
            Err(Error::ElectionNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn put_election(&self, election: Election) -> Result<()> {
        let mut inner = self.inner.write()?;
        match inner.get(&election.id) {
            Some(data) => data.write()?.election = election,
            None => {
                let id = election.id.clone();
                inner.insert(id, Arc::new(RwLock::new(ElectionData::new(election))));
            }
        }
        Ok(())
    }

    fn lookup_code(&self, election_id: &str, code_hash: &str) -> Result<Option<VoterCode>> {
        self.read(election_id, |d| d.codes.get(code_hash).cloned())
    }

    fn bulk_create_codes(&self, election_id: &str, codes: Vec<VoterCode>) -> Result<()> {
        let data = self.election_data(election_id)?;
        let mut data = data.write()?;

        let mut seen = std::collections::HashSet::with_capacity(codes.len());
        for code in codes.iter() {
            if code.election_id != election_id
                || data.codes.contains_key(&code.code_hash)
                || !seen.insert(code.code_hash.as_str())
            {
                return Err(Error::DuplicateCode(election_id.to_owned()));
            }
        }

        for code in codes {
            data.codes.insert(code.code_hash.clone(), code);
        }
        Ok(())
    }

    fn codes(&self, election_id: &str) -> Result<Vec<VoterCode>> {
        self.read(election_id, |d| d.codes.values().cloned().collect())
    }

    fn redeem_code(&self, election_id: &str, code_hash: &str, now: u64) -> Result<()> {
        let data = self.election_data(election_id)?;
        let mut data = data.write()?;
        data.codes
            .get_mut(code_hash)
            .ok_or(Error::CodeNotFound)?
            .redeem(now)
    }

    fn head(&self, election_id: &str) -> Result<ChainHead> {
        self.read(election_id, |d| d.head())
    }

    fn get_block(&self, election_id: &str, index: u64) -> Result<Option<HashBlock>> {
        self.read(election_id, |d| d.blocks.get(index as usize).cloned())
    }

    fn get_range(&self, election_id: &str, from: u64, to: u64) -> Result<Vec<HashBlock>> {
        self.read(election_id, |d| {
            if from > to || from as usize >= d.blocks.len() {
                return vec![];
            }
            let end = std::cmp::min(to.saturating_add(1), d.blocks.len() as u64) as usize;
            d.blocks[from as usize..end].to_vec()
        })
    }

    fn find_block_by_vote_hash(
        &self,
        election_id: &str,
        vote_hash: &str,
    ) -> Result<Option<HashBlock>> {
        let position = {
            let vote_index = self.vote_index.read()?;
            vote_index
                .get(election_id)
                .and_then(|hashes| hashes.get(vote_hash))
                .copied()
        };
        self.read(election_id, |d| {
            let indexed = position
                .and_then(|position| d.blocks.get(position as usize))
                .filter(|block| block.vote_hash == vote_hash);
            match indexed {
                Some(block) => Some(block.clone()),
                // The index is stale if the stored blocks were rewritten
                None => d.blocks.iter().find(|b| b.vote_hash == vote_hash).cloned(),
            }
        })
    }

    fn ballots(&self, election_id: &str) -> Result<Vec<EncryptedBallot>> {
        self.read(election_id, |d| d.ballots.clone())
    }

    fn election_snapshot(&self, election_id: &str) -> Result<ElectionData> {
        self.read(election_id, |d| d.clone())
    }

    fn commit_vote(&self, commit: VoteCommit) -> Result<(), CommitError> {
        let data = self.election_data(&commit.election_id)?;
        let mut data = data.write().map_err(Error::from)?;

        if !data.election.is_active() {
            return Err(CommitError::ElectionNotActive);
        }

        let head = data.head();
        if head != commit.expected_head || commit.block.index != head.next_index() {
            return Err(CommitError::HeadMoved {
                expected: commit.block.index,
                found: head.next_index(),
            });
        }

        let code = data
            .codes
            .get_mut(&commit.code_hash)
            .ok_or(CommitError::CodeNotFound)?;
        if code.redeem(commit.block.timestamp).is_err() {
            return Err(CommitError::CodeAlreadyUsed);
        }

        // Nothing below can fail, so the commit is all-or-nothing
        self.vote_index
            .write()
            .map_err(Error::from)?
            .entry(commit.election_id.clone())
            .or_insert_with(HashMap::new)
            .insert(commit.block.vote_hash.clone(), data.blocks.len() as u64);
        data.blocks.push(commit.block);
        data.ballots.push(commit.ballot);
        data.election.total_voted += 1;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_store() -> MemStore {
        let store = MemStore::default();
        let mut election = Election::with_id("e1", "Class rep", 2);
        election.status = ElectionStatus::Active;
        store.put_election(election).unwrap();
        store
            .bulk_create_codes(
                "e1",
                vec![
                    VoterCode::new(hash(b"one"), "e1", "5a", 1),
                    VoterCode::new(hash(b"two"), "e1", "5a", 2),
                ],
            )
            .unwrap();
        store
    }

    fn commit_for(store: &MemStore, code: &[u8], timestamp: u64) -> VoteCommit {
        let head = store.head("e1").unwrap();
        let ballot = EncryptedBallot {
            election_id: "e1".to_owned(),
            class_id: "5a".to_owned(),
            ciphertext: "00:00".to_owned(),
            timestamp,
        };
        let vh = vote_hash(&ballot.ciphertext, timestamp, &head.block_hash);
        VoteCommit {
            election_id: "e1".to_owned(),
            code_hash: hash(code),
            block: HashBlock::next(&head, vh, "5a", timestamp),
            expected_head: head,
            ballot,
        }
    }

    #[test]
    fn test_commit_vote() {
        let store = active_store();
        assert_eq!(store.head("e1").unwrap(), ChainHead::empty());

        store.commit_vote(commit_for(&store, b"one", 10)).unwrap();

        let head = store.head("e1").unwrap();
        assert_eq!(head.index, Some(0));
        assert!(store.lookup_code("e1", &hash(b"one")).unwrap().unwrap().used);
        assert_eq!(store.ballots("e1").unwrap().len(), 1);
        assert_eq!(store.get_election("e1").unwrap().unwrap().total_voted, 1);

        let block = store.get_block("e1", 0).unwrap().unwrap();
        assert_eq!(
            store
                .find_block_by_vote_hash("e1", &block.vote_hash)
                .unwrap(),
            Some(block)
        );
    }

    #[test]
    fn test_commit_conflicts() {
        let store = active_store();

        // Two commits prepared against the same head: only the first lands
        let first = commit_for(&store, b"one", 10);
        let stale = commit_for(&store, b"two", 11);
        store.commit_vote(first).unwrap();
        assert!(matches!(
            store.commit_vote(stale),
            Err(CommitError::HeadMoved { .. })
        ));
        assert!(!store.lookup_code("e1", &hash(b"two")).unwrap().unwrap().used);

        // Same code twice
        let again = commit_for(&store, b"one", 12);
        assert!(matches!(
            store.commit_vote(again),
            Err(CommitError::CodeAlreadyUsed)
        ));

        // Unknown code
        let unknown = commit_for(&store, b"three", 13);
        assert!(matches!(
            store.commit_vote(unknown),
            Err(CommitError::CodeNotFound)
        ));

        // Nothing from the failed commits was written
        assert_eq!(store.blocks("e1").unwrap().len(), 1);
        assert_eq!(store.ballots("e1").unwrap().len(), 1);
        assert_eq!(store.get_election("e1").unwrap().unwrap().total_voted, 1);
    }

    #[test]
    fn test_commit_closed_election() {
        let store = active_store();
        let mut election = store.get_election("e1").unwrap().unwrap();
        election.status = ElectionStatus::Closed;
        store.put_election(election).unwrap();

        assert!(matches!(
            store.commit_vote(commit_for(&store, b"one", 10)),
            Err(CommitError::ElectionNotActive)
        ));
    }

    #[test]
    fn test_bulk_create_duplicates() {
        let store = active_store();
        let result = store.bulk_create_codes(
            "e1",
            vec![
                VoterCode::new(hash(b"three"), "e1", "5a", 3),
                VoterCode::new(hash(b"one"), "e1", "5a", 4),
            ],
        );
        assert!(matches!(result, Err(Error::DuplicateCode(_))));

        // All or nothing
        assert!(store.lookup_code("e1", &hash(b"three")).unwrap().is_none());

        // Duplicates inside one batch
        let result = store.bulk_create_codes(
            "e1",
            vec![
                VoterCode::new(hash(b"four"), "e1", "5a", 4),
                VoterCode::new(hash(b"four"), "e1", "5a", 5),
            ],
        );
        assert!(result.is_err());
        assert_eq!(store.codes("e1").unwrap().len(), 2);
    }

    #[test]
    fn test_redeem_code() {
        let store = active_store();
        store.redeem_code("e1", &hash(b"one"), 5).unwrap();
        assert!(matches!(
            store.redeem_code("e1", &hash(b"one"), 6),
            Err(Error::AlreadyUsed)
        ));
        assert!(matches!(
            store.redeem_code("e1", &hash(b"nope"), 6),
            Err(Error::CodeNotFound)
        ));
    }

    #[test]
    fn test_get_range() {
        let store = active_store();
        store.commit_vote(commit_for(&store, b"one", 10)).unwrap();
        store.commit_vote(commit_for(&store, b"two", 11)).unwrap();

        assert_eq!(store.get_range("e1", 0, 1).unwrap().len(), 2);
        assert_eq!(store.get_range("e1", 1, 100).unwrap().len(), 1);
        assert_eq!(store.get_range("e1", 1, 100).unwrap()[0].index, 1);
        assert!(store.get_range("e1", 2, 5).unwrap().is_empty());
        assert!(store.get_range("e1", 1, 0).unwrap().is_empty());
        assert_eq!(store.blocks("e1").unwrap().len(), 2);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let store = active_store();
        store.commit_vote(commit_for(&store, b"one", 10)).unwrap();

        let snapshot = store.snapshot().unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: MemStore = serde_json::from_str::<StoreSnapshot>(&json).unwrap().into();

        assert_eq!(restored.head("e1").unwrap(), store.head("e1").unwrap());
        let block = restored.get_block("e1", 0).unwrap().unwrap();
        assert!(restored
            .find_block_by_vote_hash("e1", &block.vote_hash)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_find_block_after_removal() {
        let store = active_store();
        store.commit_vote(commit_for(&store, b"one", 10)).unwrap();
        store.commit_vote(commit_for(&store, b"two", 11)).unwrap();
        let second = store.get_block("e1", 1).unwrap().unwrap();

        let mut snapshot = store.snapshot().unwrap();
        snapshot.elections[0].blocks.remove(0);
        let restored = MemStore::from(snapshot);
        assert_eq!(
            restored
                .find_block_by_vote_hash("e1", &second.vote_hash)
                .unwrap(),
            Some(second.clone())
        );

        // A block rewritten in place is still found by a linear search
        store
            .tamper_block("e1", 0, |block| block.vote_hash = hash(b"forged"))
            .unwrap();
        assert!(store
            .find_block_by_vote_hash("e1", &hash(b"forged"))
            .unwrap()
            .is_some());
        assert_eq!(
            store
                .find_block_by_vote_hash("e1", &second.vote_hash)
                .unwrap(),
            Some(second)
        );
    }

    #[test]
    fn test_unknown_election() {
        let store = MemStore::default();
        assert!(store.get_election("nope").unwrap().is_none());
        assert!(matches!(store.head("nope"), Err(Error::ElectionNotFound(_))));
    }
}
