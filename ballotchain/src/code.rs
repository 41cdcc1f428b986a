use crate::*;
use rand::Rng;

/// Number of characters in a voter code
pub const CODE_LENGTH: usize = 6;

/// Characters a voter code may contain.
///
/// `0`, `O`, `1` and `I` are left out because they are easily confused on a
/// printed slip.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// A one-time voter code as it is stored: only the hash of the plaintext is kept.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoterCode {
    pub code_hash: String,
    pub election_id: String,
    pub class_id: String,
    pub student_number: u32,
    pub used: bool,
    pub used_at: Option<u64>,
}

impl VoterCode {
    /// Create a fresh, unused code record
    pub fn new(code_hash: String, election_id: &str, class_id: &str, student_number: u32) -> Self {
        VoterCode {
            code_hash,
            election_id: election_id.to_owned(),
            class_id: class_id.to_owned(),
            student_number,
            used: false,
            used_at: None,
        }
    }

    /// Mark this code as redeemed.
    ///
    /// Returns `Error::AlreadyUsed` if it was redeemed before; `used` never reverts.
    pub fn redeem(&mut self, now: u64) -> Result<()> {
        if self.used {
            return Err(Error::AlreadyUsed);
        }
        self.used = true;
        self.used_at = Some(now);
        Ok(())
    }
}

/// A plaintext code handed to a student.
///
/// This is returned exactly once, from code generation, and never stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub code: String,
    pub student_number: u32,
}

/// Trim and upper-case a code as typed by a voter, then check its format
pub fn normalize_code(code: &str) -> Result<String> {
    let code = code.trim().to_ascii_uppercase();
    validate_code(&code)?;
    Ok(code)
}

/// Check that a code has the right length and only uses the code alphabet
pub fn validate_code(code: &str) -> Result<()> {
    if code.len() != CODE_LENGTH || !code.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
        return Err(Error::InvalidFormat(CODE_LENGTH));
    }
    Ok(())
}

/// Draw a random code uniformly from the code alphabet
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0, CODE_ALPHABET.len())] as char)
        .collect()
}
