use ballotchain::{Config, MemStore};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

mod command_codes;
mod command_election;
mod command_keygen;
mod command_tally;
mod command_verify;
mod command_vote;
mod state;

pub use command_codes::*;
pub use command_election::*;
pub use command_keygen::*;
pub use command_tally::*;
pub use command_verify::*;
pub use command_vote::*;
pub use state::*;

pub type BallotBox = ballotchain::BallotBox<MemStore, ballotchain::LogAuditLog>;

fn main() {
    let matches = app().get_matches();

    let level = match matches.occurrences_of("v") {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    // keygen needs no configuration
    if let Some(matches) = matches.subcommand_matches("keygen") {
        command_keygen(matches);
        std::process::exit(0);
    }

    let mut config = Config::from_env().unwrap_or_else(|e| fail("config", e));
    if let Some(state) = matches.value_of("state") {
        config.state_path = expand(state);
    }

    // Held until the end of main, a failing command exits without saving
    let state = StateFile::open(&config.state_path, access_for(&matches))
        .unwrap_or_else(|e| fail("state", e));
    let store = state.load().unwrap_or_else(|e| fail("state", e));
    let ballot_box = BallotBox::new(store, ballotchain::LogAuditLog, config);

    // Subcommands
    match matches.subcommand() {
        ("election", Some(matches)) => command_election(matches, &ballot_box),
        ("codes", Some(matches)) => command_codes(matches, &ballot_box),
        ("vote", Some(matches)) => command_vote(matches, &ballot_box),
        ("verify", Some(matches)) => command_verify(matches, &ballot_box),
        ("audit", Some(matches)) => command_audit(matches, &ballot_box),
        ("tally", Some(matches)) => command_tally(matches, &ballot_box),
        _ => unreachable!("clap requires a subcommand"),
    }

    if state.access() == Access::Write {
        state
            .save(ballot_box.store())
            .unwrap_or_else(|e| fail("state", e));
    }
}

fn app() -> App<'static, 'static> {
    App::new("ballotchain")
        .version("0.1")
        .about("Issues voter codes, records votes and audits the vote ledger")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("state")
                .long("state")
                .takes_value(true)
                .help("State file - can also be set with BALLOTCHAIN_STATE_PATH"),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(SubCommand::with_name("keygen").about("Generate a ballot encryption key"))
        .subcommand(
            SubCommand::with_name("election")
                .about("Manage elections")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("create")
                        .about("Create a draft election")
                        .arg(Arg::with_name("NAME").index(1).required(true))
                        .arg(
                            Arg::with_name("TOTAL-VOTERS")
                                .index(2)
                                .required(true)
                                .help("Number of students eligible to vote"),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("open")
                        .about("Start accepting votes")
                        .arg(Arg::with_name("ELECTION-ID").index(1).required(true)),
                )
                .subcommand(
                    SubCommand::with_name("close")
                        .about("Stop accepting votes")
                        .arg(Arg::with_name("ELECTION-ID").index(1).required(true)),
                )
                .subcommand(
                    SubCommand::with_name("show")
                        .about("Print an election")
                        .arg(Arg::with_name("ELECTION-ID").index(1).required(true)),
                ),
        )
        .subcommand(
            SubCommand::with_name("codes")
                .about("Generate one-time voter codes for a class")
                .arg(Arg::with_name("ELECTION-ID").index(1).required(true))
                .arg(Arg::with_name("CLASS-ID").index(2).required(true))
                .arg(Arg::with_name("COUNT").index(3).required(true)),
        )
        .subcommand(
            SubCommand::with_name("vote")
                .about("Cast a vote with a voter code")
                .arg(Arg::with_name("ELECTION-ID").index(1).required(true))
                .arg(Arg::with_name("CODE").index(2).required(true))
                .arg(Arg::with_name("CANDIDATE-ID").index(3).required(true)),
        )
        .subcommand(
            SubCommand::with_name("verify")
                .about("Verify the whole chain, or the block holding one receipt")
                .arg(Arg::with_name("ELECTION-ID").index(1).required(true))
                .arg(
                    Arg::with_name("VOTE-HASH")
                        .index(2)
                        .required(false)
                        .help("Vote hash from a receipt"),
                ),
        )
        .subcommand(
            SubCommand::with_name("audit")
                .about("Verify the chain and cross-check vote counts")
                .arg(Arg::with_name("ELECTION-ID").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("tally")
                .about("Decrypt and count the ballots of an election")
                .arg(Arg::with_name("ELECTION-ID").index(1).required(true)),
        )
}

/// Commands that change the ledger take the state file exclusively
fn access_for(matches: &ArgMatches) -> Access {
    match matches.subcommand() {
        ("election", Some(matches)) => match matches.subcommand_name() {
            Some("show") => Access::Read,
            _ => Access::Write,
        },
        ("codes", _) | ("vote", _) => Access::Write,
        _ => Access::Read,
    }
}

/// Expand `~` and environment variables in an argument
pub fn expand(input: &str) -> String {
    shellexpand::full(input)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| input.to_owned())
}

/// Print an error the same way for every command and exit
pub fn fail<E: std::fmt::Display>(command: &str, e: E) -> ! {
    eprintln!("ballotchain {}: {}", command, e);
    std::process::exit(1);
}

/// Print a value as pretty JSON
pub fn print_json<T: serde::Serialize>(command: &str, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(command, e),
    }
}
