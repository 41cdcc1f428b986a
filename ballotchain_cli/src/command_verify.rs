use super::{expand, fail, print_json, BallotBox};

pub fn command_verify(matches: &clap::ArgMatches, ballot_box: &BallotBox) {
    let election_id = expand(matches.value_of("ELECTION-ID").unwrap());

    let valid = match matches.value_of("VOTE-HASH") {
        Some(vote_hash) => {
            let result = ballot_box
                .verify_vote(&election_id, vote_hash.trim())
                .unwrap_or_else(|e| fail("verify", e));
            print_json("verify", &result);
            result.found && result.chain_valid
        }
        None => {
            let result = ballot_box
                .verify_chain(&election_id)
                .unwrap_or_else(|e| fail("verify", e));
            print_json("verify", &result);
            result.valid
        }
    };

    if !valid {
        eprintln!("ballotchain verify: verification FAILED");
        std::process::exit(2);
    }
}

pub fn command_audit(matches: &clap::ArgMatches, ballot_box: &BallotBox) {
    let election_id = expand(matches.value_of("ELECTION-ID").unwrap());

    let report = ballot_box
        .audit(&election_id)
        .unwrap_or_else(|e| fail("audit", e));
    print_json("audit", &report);

    if report.valid {
        eprintln!("> Election {} verified OK", election_id);
    } else {
        for violation in report
            .chain
            .violations()
            .chain(report.count_violations.iter())
        {
            eprintln!("  {}", violation);
        }
        eprintln!("ballotchain audit: verification FAILED");
        std::process::exit(2);
    }
}
