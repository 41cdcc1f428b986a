use rand::Rng;

pub fn command_keygen(_matches: &clap::ArgMatches) {
    let key = ballotchain::BallotKey::generate();

    let mut code_secret = [0u8; 32];
    rand::thread_rng().fill(&mut code_secret);

    println!("BALLOTCHAIN_ENCRYPTION_KEY={}", key.to_hex());
    println!("BALLOTCHAIN_CODE_SECRET={}", hex::encode(code_secret));
}
