use super::{expand, fail, print_json, BallotBox};
use ballotchain::ElectionStatus;

pub fn command_election(matches: &clap::ArgMatches, ballot_box: &BallotBox) {
    match matches.subcommand() {
        ("create", Some(matches)) => command_election_create(matches, ballot_box),
        ("open", Some(matches)) => {
            command_election_status(matches, ballot_box, ElectionStatus::Active)
        }
        ("close", Some(matches)) => {
            command_election_status(matches, ballot_box, ElectionStatus::Closed)
        }
        ("show", Some(matches)) => command_election_show(matches, ballot_box),
        _ => unreachable!("clap requires a subcommand"),
    }
}

pub fn command_election_create(matches: &clap::ArgMatches, ballot_box: &BallotBox) {
    let name = expand(matches.value_of("NAME").unwrap());
    let total_voters: u32 = matches
        .value_of("TOTAL-VOTERS")
        .unwrap()
        .parse()
        .unwrap_or_else(|e| fail("election create", e));

    let election = ballot_box
        .create_election(&name, total_voters)
        .unwrap_or_else(|e| fail("election create", e));

    print_json("election create", &election);
}

pub fn command_election_status(
    matches: &clap::ArgMatches,
    ballot_box: &BallotBox,
    status: ElectionStatus,
) {
    let election_id = expand(matches.value_of("ELECTION-ID").unwrap());
    let election = ballot_box
        .set_status(&election_id, status)
        .unwrap_or_else(|e| fail("election", e));

    print_json("election", &election);
}

pub fn command_election_show(matches: &clap::ArgMatches, ballot_box: &BallotBox) {
    let election_id = expand(matches.value_of("ELECTION-ID").unwrap());
    let election = ballot_box
        .election(&election_id)
        .unwrap_or_else(|e| fail("election show", e));

    print_json("election show", &election);
}
