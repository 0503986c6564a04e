/// Job status definitions for the crawl frontier
///
/// Every frontier row carries one of these statuses. Transitions:
///
/// ```text
/// pending --claim--> in_progress --success--> done
///                    in_progress --failure (attempts <= max)--> pending
///                    in_progress --failure (attempts >  max)--> error
///                    in_progress --quota deferral--> pending
/// done --revisit due--> pending
/// ```
use std::fmt;

/// Current status of a crawl job in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobStatus {
    /// Waiting for dispatch once `next_fetch_at` has passed
    Pending,

    /// Claimed by exactly one worker
    InProgress,

    /// Fetched successfully; revisit scheduled
    Done,

    /// Retries exhausted; never dispatched again
    Error,
}

impl JobStatus {
    /// Returns true if no automatic transition leaves this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Returns true if the job still belongs to the live frontier
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    /// Returns true if `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Done)
                | (Self::InProgress, Self::Pending)
                | (Self::InProgress, Self::Error)
                | (Self::Done, Self::Pending)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// All statuses in lifecycle order
    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::InProgress, Self::Done, Self::Error]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
