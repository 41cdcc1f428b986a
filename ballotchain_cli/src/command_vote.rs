use super::{expand, fail, print_json, BallotBox};

pub fn command_vote(matches: &clap::ArgMatches, ballot_box: &BallotBox) {
    let election_id = expand(matches.value_of("ELECTION-ID").unwrap());
    let code = matches.value_of("CODE").unwrap();
    let candidate_id = expand(matches.value_of("CANDIDATE-ID").unwrap());

    let receipt = ballot_box
        .cast_vote(code, &election_id, &candidate_id)
        .unwrap_or_else(|e| fail("vote", e));

    print_json("vote", &receipt);
}
