use crate::*;
use std::env::var;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: usize = 10;
pub const DEFAULT_STATE_PATH: &str = "./ballotchain.json";

#[derive(Debug, Clone)]
pub struct Config {
    /// Ballot encryption key. Casting fails with a configuration error without it.
    pub encryption_key: Option<BallotKey>,
    pub code_hasher: CodeHasher,

    /// How many times a conflicting vote is retried before giving up
    pub max_attempts: usize,

    /// Give up on a vote that has not committed after this long
    pub cast_timeout: Option<Duration>,
    pub state_path: String,
}

impl Config {
    pub fn new(encryption_key: Option<BallotKey>, code_secret: &[u8]) -> Result<Self> {
        Ok(Config {
            encryption_key,
            code_hasher: CodeHasher::new(code_secret)?,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cast_timeout: None,
            state_path: DEFAULT_STATE_PATH.to_owned(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let encryption_key = match var("BALLOTCHAIN_ENCRYPTION_KEY") {
            Ok(val) => Some(val.parse::<BallotKey>().map_err(|_| {
                Error::ConfigurationError(
                    "BALLOTCHAIN_ENCRYPTION_KEY must be 64 hexidecimal characters".to_owned(),
                )
            })?),
            Err(_e) => None,
        };

        let code_secret = match var("BALLOTCHAIN_CODE_SECRET") {
            Ok(val) => val,
            Err(_e) => {
                return Err(Error::ConfigurationError(
                    "BALLOTCHAIN_CODE_SECRET environment variable must be set".to_owned(),
                ))
            }
        };

        let mut config = Config::new(encryption_key, code_secret.as_bytes())?;

        if let Ok(val) = var("BALLOTCHAIN_MAX_ATTEMPTS") {
            config.max_attempts = parse_env("BALLOTCHAIN_MAX_ATTEMPTS", &val)?;
            if config.max_attempts == 0 {
                return Err(Error::ConfigurationError(
                    "BALLOTCHAIN_MAX_ATTEMPTS must be at least 1".to_owned(),
                ));
            }
        }

        if let Ok(val) = var("BALLOTCHAIN_CAST_TIMEOUT_MS") {
            let millis: u64 = parse_env("BALLOTCHAIN_CAST_TIMEOUT_MS", &val)?;
            config.cast_timeout = Some(Duration::from_millis(millis));
        }

        if let Ok(val) = var("BALLOTCHAIN_STATE_PATH") {
            config.state_path = val;
        }

        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, val: &str) -> Result<T> {
    val.trim()
        .parse()
        .map_err(|_| Error::ConfigurationError(format!("{} has an invalid value: {}", name, val)))
}
