use super::{expand, fail, BallotBox};
use tallystick::plurality::DefaultPluralityTally;

pub fn command_tally(matches: &clap::ArgMatches, ballot_box: &BallotBox) {
    let election_id = expand(matches.value_of("ELECTION-ID").unwrap());

    let key = match ballot_box.config().encryption_key.as_ref() {
        Some(key) => key,
        None => fail("tally", "BALLOTCHAIN_ENCRYPTION_KEY must be set to tally"),
    };

    let ballots = ballot_box
        .ballots(&election_id)
        .unwrap_or_else(|e| fail("tally", e));

    let mut tally = DefaultPluralityTally::new(1);
    for ballot in ballots.iter() {
        let content = ballot.open(key).unwrap_or_else(|e| fail("tally", e));
        tally.add(content.candidate_id);
    }

    println!("Tally ({} ballots):", ballots.len());
    for (candidate, num_votes) in tally.totals().iter() {
        println!("  {} got {} votes", candidate, num_votes);
    }
}
