use super::*;
use std::sync::Arc;
use std::thread;

fn ballot_box(max_attempts: usize) -> BallotBox<MemStore> {
    let mut config = Config::new(Some(BallotKey::generate()), b"end to end secret").unwrap();
    config.max_attempts = max_attempts;
    BallotBox::new(MemStore::default(), MemAuditLog::default(), config)
}

fn open_election(bb: &BallotBox<MemStore>, id: &str) {
    let mut election = Election::with_id(id, "Student council", 30);
    election.status = ElectionStatus::Active;
    bb.store().put_election(election).unwrap();
}

fn assert_chain_invariants(blocks: &[HashBlock]) {
    for (i, block) in blocks.iter().enumerate() {
        assert_eq!(block.index, i as u64);
        assert_eq!(block.block_hash, block.compute_hash());
        if i == 0 {
            assert_eq!(block.previous_hash, GENESIS);
        } else {
            assert_eq!(block.previous_hash, blocks[i - 1].block_hash);
        }
    }
}

#[test]
fn end_to_end_election() {
    let bb = ballot_box(10);

    // An administrator issues the code AB3D9F to a student
    open_election(&bb, "e1");
    let code_hash = bb.config().code_hasher.hash_code("AB3D9F");
    bb.store()
        .bulk_create_codes("e1", vec![VoterCode::new(code_hash, "e1", "7c", 1)])
        .unwrap();

    // The student votes
    let receipt = bb.cast_vote("AB3D9F", "e1", "cand-2").unwrap();
    assert_eq!(receipt.vote_hash.len(), 64);
    assert!(receipt.vote_hash.chars().all(|c| c.is_ascii_hexdigit()));

    // The code cannot be used again
    assert!(matches!(
        bb.cast_vote("AB3D9F", "e1", "cand-1"),
        Err(Error::AlreadyUsed)
    ));

    // The student checks their receipt
    let check = bb.verify_vote("e1", &receipt.vote_hash).unwrap();
    assert!(check.found);
    assert!(check.chain_valid);
    assert_eq!(check.timestamp, Some(receipt.timestamp));

    // Empty chain plus one vote is a single genesis block
    let blocks = bb.store().blocks("e1").unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].index, 0);
    assert_eq!(blocks[0].previous_hash, GENESIS);

    // Tallying decrypts the stored ballots
    let key = bb.config().encryption_key.clone().unwrap();
    let ballots = bb.ballots("e1").unwrap();
    let content = ballots[0].open(&key).unwrap();
    assert_eq!(content.candidate_id, "cand-2");
    assert_eq!(content.class_id, "7c");

    assert!(bb.audit("e1").unwrap().valid);
}

#[test]
fn concurrent_votes_with_one_code() {
    let bb = Arc::new(ballot_box(64));
    open_election(&bb, "e1");
    let codes = bb.generate_codes("e1", "5a", 1).unwrap();
    let code = codes[0].code.clone();

    let threads = 16;
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let bb = bb.clone();
            let code = code.clone();
            thread::spawn(move || bb.cast_vote(&code, "e1", &format!("cand-{}", i % 3)))
        })
        .collect();

    let results: Vec<Result<VoteReceipt>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let already_used = results
        .iter()
        .filter(|r| matches!(r, Err(Error::AlreadyUsed)))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(already_used, threads - 1);

    assert_eq!(bb.store().blocks("e1").unwrap().len(), 1);
    assert_eq!(bb.ballots("e1").unwrap().len(), 1);
    assert_eq!(bb.election("e1").unwrap().total_voted, 1);
}

#[test]
fn concurrent_votes_keep_chain_linear() {
    let threads = 24;
    // Every round of contention lets at least one vote through, so this many
    // attempts is always enough
    let bb = Arc::new(ballot_box(threads + 1));
    open_election(&bb, "e1");
    let codes = bb.generate_codes("e1", "5a", threads).unwrap();

    let handles: Vec<_> = codes
        .into_iter()
        .map(|issued| {
            let bb = bb.clone();
            thread::spawn(move || bb.cast_vote(&issued.code, "e1", "cand-1"))
        })
        .collect();

    let receipts: Vec<VoteReceipt> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    let blocks = bb.store().blocks("e1").unwrap();
    assert_eq!(blocks.len(), threads);
    assert_chain_invariants(&blocks);

    // Every receipt is in the chain exactly once
    for receipt in receipts.iter() {
        assert_eq!(
            blocks
                .iter()
                .filter(|b| b.vote_hash == receipt.vote_hash)
                .count(),
            1
        );
    }

    let report = bb.audit("e1").unwrap();
    assert!(report.valid);
    assert_eq!(report.total_voted, threads as u64);
}

#[test]
fn elections_have_separate_chains() {
    let bb = ballot_box(10);
    open_election(&bb, "e1");
    open_election(&bb, "e2");
    let first = bb.generate_codes("e1", "5a", 2).unwrap();
    let second = bb.generate_codes("e2", "6b", 1).unwrap();

    // A code from one election is unknown in another
    assert!(matches!(
        bb.cast_vote(&first[0].code, "e2", "cand-1"),
        Err(Error::CodeNotFound)
    ));

    bb.cast_vote(&first[0].code, "e1", "cand-1").unwrap();
    bb.cast_vote(&first[1].code, "e1", "cand-1").unwrap();
    bb.cast_vote(&second[0].code, "e2", "cand-1").unwrap();

    assert_eq!(bb.store().head("e1").unwrap().index, Some(1));
    let e2 = bb.store().blocks("e2").unwrap();
    assert_eq!(e2.len(), 1);
    assert_eq!(e2[0].index, 0);
    assert_eq!(e2[0].previous_hash, GENESIS);
}

#[test]
fn tampering_is_reported() {
    let bb = ballot_box(10);
    open_election(&bb, "e1");
    let codes = bb.generate_codes("e1", "5a", 5).unwrap();
    let receipts: Vec<VoteReceipt> = codes
        .iter()
        .map(|c| bb.cast_vote(&c.code, "e1", "cand-1").unwrap())
        .collect();

    let clean = bb.verify_chain("e1").unwrap();
    assert!(clean.valid);
    assert_eq!(clean, bb.verify_chain("e1").unwrap());

    bb.store()
        .tamper_block("e1", 2, |block| block.vote_hash = hash(b"forged"))
        .unwrap();

    let result = bb.verify_chain("e1").unwrap();
    assert!(!result.valid);
    assert_eq!(result.first_invalid_index, Some(2));
    assert!(result.results[0].valid);
    assert!(result.results[1].valid);
    assert!(!result.results[2].valid);

    // Running it again gives the same answer
    assert_eq!(result, bb.verify_chain("e1").unwrap());

    // The forged receipt no longer matches anything
    let forged_receipt = bb.verify_vote("e1", &receipts[2].vote_hash).unwrap();
    assert!(!forged_receipt.found);

    // Neighbours of the tampered block see the damage, distant votes do not
    assert!(!bb.verify_vote("e1", &receipts[1].vote_hash).unwrap().chain_valid);
    assert!(!bb.verify_vote("e1", &receipts[3].vote_hash).unwrap().chain_valid);
    assert!(bb.verify_vote("e1", &receipts[0].vote_hash).unwrap().chain_valid);

    assert!(!bb.audit("e1").unwrap().valid);
}

#[test]
fn ledger_survives_a_snapshot() {
    let bb = ballot_box(10);
    open_election(&bb, "e1");
    let codes = bb.generate_codes("e1", "5a", 3).unwrap();
    bb.cast_vote(&codes[0].code, "e1", "cand-1").unwrap();

    let json = serde_json::to_string_pretty(&bb.store().snapshot().unwrap()).unwrap();
    let snapshot: StoreSnapshot = serde_json::from_str(&json).unwrap();
    let restored = BallotBox::new(
        MemStore::from(snapshot),
        MemAuditLog::default(),
        bb.config().clone(),
    );

    // The used code stays used, the others still work and extend the chain
    assert!(matches!(
        restored.cast_vote(&codes[0].code, "e1", "cand-1"),
        Err(Error::AlreadyUsed)
    ));
    let receipt = restored.cast_vote(&codes[1].code, "e1", "cand-2").unwrap();
    let check = restored.verify_vote("e1", &receipt.vote_hash).unwrap();
    assert_eq!(check.block_index, Some(1));
    assert!(check.chain_valid);
    assert!(restored.audit("e1").unwrap().valid);
}
