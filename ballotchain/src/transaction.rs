use crate::*;
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

/// Most codes a single `generate_codes` call will issue
pub const MAX_CODES_PER_BATCH: usize = 10_000;

/// What a voter gets back after casting a vote.
///
/// It is enough to find the vote in the chain later, and says nothing about
/// the choice or the position in the chain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub vote_hash: String,
    pub timestamp: u64,
}

/// Stages of the vote-casting transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastStage {
    CodeValidated,
    BallotEncrypted,
    ChainAppended,
    Committed,
    Aborted,
}

impl fmt::Display for CastStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            CastStage::CodeValidated => "code_validated",
            CastStage::BallotEncrypted => "ballot_encrypted",
            CastStage::ChainAppended => "chain_appended",
            CastStage::Committed => "committed",
            CastStage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Full audit of an election: the chain plus cross-checks of how many votes
/// each part of the store thinks were cast.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub election_id: String,
    pub valid: bool,
    pub chain: ChainVerification,
    pub blocks: u64,
    pub ballots: u64,
    pub used_codes: u64,
    pub total_voted: u64,
    pub count_violations: Vec<IntegrityViolation>,
}

/// The vote-integrity ledger.
///
/// Wraps a `Store` and an `AuditLog` and exposes the operations the rest of
/// the application calls: issuing codes, casting votes and verifying the chain.
pub struct BallotBox<S: Store, A: AuditLog = MemAuditLog> {
    store: S,
    audit_log: A,
    config: Config,
}

impl<S: Store, A: AuditLog> BallotBox<S, A> {
    pub fn new(store: S, audit_log: A, config: Config) -> Self {
        BallotBox {
            store,
            audit_log,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit_log(&self) -> &A {
        &self.audit_log
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get an election, or `Error::ElectionNotFound`
    pub fn election(&self, election_id: &str) -> Result<Election> {
        self.store
            .get_election(election_id)?
            .ok_or_else(|| Error::ElectionNotFound(election_id.to_owned()))
    }

    /// Register a new draft election
    pub fn create_election(&self, name: &str, total_voters: u32) -> Result<Election> {
        let election = Election::new(name, total_voters);
        self.store.put_election(election.clone())?;
        info!("ballotchain: created election {} ({})", election.id, name);
        Ok(election)
    }

    /// Move an election to a new status
    pub fn set_status(&self, election_id: &str, status: ElectionStatus) -> Result<Election> {
        let mut election = self.election(election_id)?;
        election.status = status;
        self.store.put_election(election.clone())?;
        info!("ballotchain: election {} is now {}", election_id, status);
        Ok(election)
    }

    /// Generate `count` fresh codes for a class.
    ///
    /// The plaintext codes are returned once and never stored; only their
    /// hashes are kept. Student numbers continue after the highest number
    /// already issued in the class.
    pub fn generate_codes(
        &self,
        election_id: &str,
        class_id: &str,
        count: usize,
    ) -> Result<Vec<IssuedCode>> {
        if count > MAX_CODES_PER_BATCH {
            return Err(Error::BatchTooLarge {
                count,
                limit: MAX_CODES_PER_BATCH,
            });
        }
        self.election(election_id)?;

        let existing = self.store.codes(election_id)?;
        let mut student_number = existing
            .iter()
            .filter(|c| c.class_id == class_id)
            .map(|c| c.student_number)
            .max()
            .unwrap_or(0);
        let mut hashes: HashSet<String> = existing.into_iter().map(|c| c.code_hash).collect();

        let mut rng = rand::thread_rng();
        let mut issued = Vec::with_capacity(count);
        let mut records = Vec::with_capacity(count);
        while issued.len() < count {
            let code = generate_code(&mut rng);
            let code_hash = self.config.code_hasher.hash_code(&code);
            if !hashes.insert(code_hash.clone()) {
                continue;
            }

            student_number += 1;
            records.push(VoterCode::new(
                code_hash,
                election_id,
                class_id,
                student_number,
            ));
            issued.push(IssuedCode {
                code,
                student_number,
            });
        }

        self.store.bulk_create_codes(election_id, records)?;
        info!(
            "ballotchain: generated {} codes for class {} in election {}",
            count, class_id, election_id
        );

        self.record_audit(
            AuditLogEntry::new(
                AuditAction::CodesGenerated,
                election_id,
                format!("{} codes generated", count),
                now_millis(),
            )
            .class(class_id),
        );

        Ok(issued)
    }

    /// Cast a vote with a one-time code
    pub fn cast_vote(
        &self,
        code: &str,
        election_id: &str,
        candidate_id: &str,
    ) -> Result<VoteReceipt> {
        self.cast_vote_from(code, election_id, candidate_id, None)
    }

    /// Cast a vote, recording a hash of `actor` (for example the client's IP)
    /// in the audit log.
    ///
    /// The code is redeemed, the ballot stored, the block appended and the
    /// election's vote count bumped in a single conditional commit. If another
    /// vote commits first the whole attempt is rebuilt from fresh reads, up
    /// to `Config::max_attempts` times. At least one attempt is always made.
    pub fn cast_vote_from(
        &self,
        code: &str,
        election_id: &str,
        candidate_id: &str,
        actor: Option<&str>,
    ) -> Result<VoteReceipt> {
        let started = Instant::now();
        let max_attempts = self.config.max_attempts.max(1);

        let code = normalize_code(code)?;
        let code_hash = self.config.code_hasher.hash_code(&code);

        let election = self.election(election_id)?;
        if !election.is_active() {
            return Err(Error::ElectionNotActive(election_id.to_owned()));
        }

        for attempt in 1..=max_attempts {
            let voter = self
                .store
                .lookup_code(election_id, &code_hash)?
                .ok_or(Error::CodeNotFound)?;
            if voter.used {
                return Err(Error::AlreadyUsed);
            }
            trace_stage(election_id, attempt, CastStage::CodeValidated);

            let head = self.store.head(election_id)?;
            let timestamp = now_millis();

            let ballot = BallotContent::new(candidate_id, &voter.class_id).seal(
                election_id,
                self.config.encryption_key.as_ref(),
                timestamp,
            )?;
            trace_stage(election_id, attempt, CastStage::BallotEncrypted);

            let vote_hash = vote_hash(&ballot.ciphertext, timestamp, &head.block_hash);
            let block = HashBlock::next(&head, vote_hash, &voter.class_id, timestamp);
            trace_stage(election_id, attempt, CastStage::ChainAppended);

            if let Some(timeout) = self.config.cast_timeout {
                if started.elapsed() > timeout {
                    trace_stage(election_id, attempt, CastStage::Aborted);
                    return Err(Error::Timeout);
                }
            }

            let receipt = VoteReceipt {
                vote_hash: block.vote_hash.clone(),
                timestamp,
            };
            let commit = VoteCommit {
                election_id: election_id.to_owned(),
                code_hash: code_hash.clone(),
                expected_head: head,
                block,
                ballot,
            };

            match self.store.commit_vote(commit) {
                Ok(()) => {
                    trace_stage(election_id, attempt, CastStage::Committed);
                    info!("ballotchain: vote recorded in election {}", election_id);

                    let mut entry = AuditLogEntry::new(
                        AuditAction::VoteCast,
                        election_id,
                        "vote cast".to_owned(),
                        timestamp,
                    )
                    .class(&voter.class_id);
                    if let Some(actor) = actor {
                        entry = entry.actor(actor);
                    }
                    self.record_audit(entry);

                    return Ok(receipt);
                }
                Err(CommitError::Store(e)) => {
                    trace_stage(election_id, attempt, CastStage::Aborted);
                    return Err(e);
                }
                Err(CommitError::ElectionNotActive) => {
                    trace_stage(election_id, attempt, CastStage::Aborted);
                    return Err(Error::ElectionNotActive(election_id.to_owned()));
                }
                Err(conflict) => {
                    // Re-read the code and head and try again
                    debug!(
                        "ballotchain: election {} attempt {} conflicted: {}",
                        election_id, attempt, conflict
                    );
                    std::thread::yield_now();
                }
            }
        }

        warn!(
            "ballotchain: giving up on vote in election {} after {} attempts",
            election_id, max_attempts
        );
        Err(Error::TransactionConflict {
            attempts: max_attempts,
        })
    }

    /// Let a voter check their receipt against the chain.
    ///
    /// Only the voter's block and its neighbours are checked; use
    /// `verify_chain` or `audit` for an authoritative answer.
    pub fn verify_vote(&self, election_id: &str, vote_hash: &str) -> Result<PointVerification> {
        self.election(election_id)?;

        let block = match self.store.find_block_by_vote_hash(election_id, vote_hash)? {
            Some(block) => block,
            None => return Ok(PointVerification::not_found()),
        };

        let from = block.index.saturating_sub(1);
        let window = self
            .store
            .get_range(election_id, from, block.index.saturating_add(1))?;
        let position = (block.index - from) as usize;

        // Blocks only sit at their own index in an intact chain. If the
        // window does not line up, check the block where it actually is.
        let aligned = window
            .get(position)
            .map_or(false, |b| b.vote_hash == block.vote_hash);
        let result = if aligned {
            verify_window(&window, position)
        } else {
            verify_around(&self.store.blocks(election_id)?, vote_hash)
        };
        if !result.chain_valid {
            warn!(
                "ballotchain: integrity violation near block {} in election {}",
                block.index, election_id
            );
        }
        Ok(result)
    }

    /// Verify every block of an election's chain
    pub fn verify_chain(&self, election_id: &str) -> Result<ChainVerification> {
        self.election(election_id)?;
        let blocks = self.store.blocks(election_id)?;
        let result = verify_chain(&blocks);
        log_chain_result(election_id, &result);
        Ok(result)
    }

    /// Verify the chain and check that blocks, ballots, redeemed codes and
    /// the election's vote count all agree.
    pub fn audit(&self, election_id: &str) -> Result<AuditReport> {
        let data = self.store.election_snapshot(election_id)?;

        let chain = verify_chain(&data.blocks);
        log_chain_result(election_id, &chain);

        let blocks = data.blocks.len() as u64;
        let ballots = data.ballots.len() as u64;
        let used_codes = data.codes.values().filter(|c| c.used).count() as u64;
        let total_voted = data.election.total_voted as u64;

        let mut count_violations = vec![];
        for (what, found) in &[
            ("ballots", ballots),
            ("used codes", used_codes),
            ("total voted", total_voted),
        ] {
            if *found != blocks {
                count_violations.push(IntegrityViolation::CountMismatch {
                    what: (*what).to_owned(),
                    expected: blocks,
                    found: *found,
                });
            }
        }
        for violation in count_violations.iter() {
            warn!("ballotchain: election {}: {}", election_id, violation);
        }

        Ok(AuditReport {
            election_id: election_id.to_owned(),
            valid: chain.valid && count_violations.is_empty(),
            chain,
            blocks,
            ballots,
            used_codes,
            total_voted,
            count_violations,
        })
    }

    /// All encrypted ballots of an election, for tallying
    pub fn ballots(&self, election_id: &str) -> Result<Vec<EncryptedBallot>> {
        self.election(election_id)?;
        self.store.ballots(election_id)
    }

    fn record_audit(&self, entry: AuditLogEntry) {
        if let Err(e) = self.audit_log.record(entry) {
            warn!("ballotchain: failed to write audit log entry: {}", e);
        }
    }
}

fn trace_stage(election_id: &str, attempt: usize, stage: CastStage) {
    debug!(
        "ballotchain: election {} attempt {}: {}",
        election_id, attempt, stage
    );
}

fn log_chain_result(election_id: &str, result: &ChainVerification) {
    match result.first_invalid_index {
        Some(index) => warn!(
            "ballotchain: election {} chain is invalid, first bad block {}",
            election_id, index
        ),
        None => debug!(
            "ballotchain: election {} chain verified, {} blocks",
            election_id,
            result.results.len()
        ),
    }
}
