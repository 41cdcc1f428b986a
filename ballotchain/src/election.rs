use crate::*;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of an election.
///
/// Only `Active` elections accept votes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ElectionStatus {
    Draft,
    Active,
    Closed,
}

impl ElectionStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ElectionStatus::Draft => "draft",
            ElectionStatus::Active => "active",
            ElectionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ElectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElectionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(ElectionStatus::Draft),
            "active" => Ok(ElectionStatus::Active),
            "closed" => Ok(ElectionStatus::Closed),
            _ => Err(Error::ConfigurationError(format!(
                "unknown election status {}",
                s
            ))),
        }
    }
}

/// The parts of an election the ledger reads and writes.
///
/// Everything else about an election (candidates, grades, schedule) is owned
/// by the election-management side.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Election {
    pub id: String,
    pub name: String,
    pub status: ElectionStatus,
    pub total_voters: u32,
    pub total_voted: u32,
}

impl Election {
    /// Create a new draft election with a random id
    pub fn new(name: &str, total_voters: u32) -> Self {
        Election {
            id: Uuid::new_v4().to_simple().to_string(),
            name: name.to_owned(),
            status: ElectionStatus::Draft,
            total_voters,
            total_voted: 0,
        }
    }

    pub fn with_id(id: &str, name: &str, total_voters: u32) -> Self {
        Election {
            id: id.to_owned(),
            ..Election::new(name, total_voters)
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ElectionStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_new_election() {
        let election = Election::new("Student council 2026", 120);
        assert_eq!(election.id.len(), 32);
        assert_eq!(election.status, ElectionStatus::Draft);
        assert!(!election.is_active());
        assert_eq!(election.total_voted, 0);

        let other = Election::new("Student council 2026", 120);
        assert_ne!(election.id, other.id);

        let named = Election::with_id("e1", "Class rep", 30);
        assert_eq!(named.id, "e1");
        assert_eq!(named.total_voters, 30);
    }

    #[test]
    fn status_names() {
        for status in &[
            ElectionStatus::Draft,
            ElectionStatus::Active,
            ElectionStatus::Closed,
        ] {
            assert_eq!(status.to_string().parse::<ElectionStatus>().unwrap(), *status);
        }
        assert!("open".parse::<ElectionStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&ElectionStatus::Active).unwrap(),
            "\"active\""
        );
    }
}
