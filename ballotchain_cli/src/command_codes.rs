use super::{expand, fail, print_json, BallotBox};

pub fn command_codes(matches: &clap::ArgMatches, ballot_box: &BallotBox) {
    let election_id = expand(matches.value_of("ELECTION-ID").unwrap());
    let class_id = expand(matches.value_of("CLASS-ID").unwrap());
    let count: usize = matches
        .value_of("COUNT")
        .unwrap()
        .parse()
        .unwrap_or_else(|e| fail("codes", e));

    let codes = ballot_box
        .generate_codes(&election_id, &class_id, count)
        .unwrap_or_else(|e| fail("codes", e));

    // This is the only time the plaintext codes are ever shown
    print_json("codes", &codes);
}
