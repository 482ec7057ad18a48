/// Stage and status definitions for tracking mirror progress
use std::fmt;

/// Represents where a resource is inside the fetch/publish pipeline
///
/// A resource moves strictly forward:
/// `Queued → HeaderFetch → Transferring → Evaluating → Publishing → Expanding → Done`.
/// Any failure along the way moves it straight to `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceStage {
    // ===== Active States =====
    /// Resource is waiting in the queue
    Queued,

    /// Connection opened, waiting for status and headers
    HeaderFetch,

    /// Body is streaming through the rewrite transform into the staging file
    Transferring,

    /// Staging file is compared against an existing local copy
    Evaluating,

    /// Aliases are linked and the staging file is renamed into place
    Publishing,

    /// Discovered children are handed back to the orchestrator
    Expanding,

    // ===== Terminal States =====
    /// Resource was mirrored (or found unchanged)
    Done,

    /// Resource failed somewhere in the pipeline and will not be retried
    Skipped,
}

impl ResourceStage {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }

    /// Returns true if the pipeline is still running for this resource
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns the stage that follows this one on the success path
    ///
    /// Terminal stages have no successor.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Queued => Some(Self::HeaderFetch),
            Self::HeaderFetch => Some(Self::Transferring),
            Self::Transferring => Some(Self::Evaluating),
            Self::Evaluating => Some(Self::Publishing),
            Self::Publishing => Some(Self::Expanding),
            Self::Expanding => Some(Self::Done),
            Self::Done | Self::Skipped => None,
        }
    }

    /// Returns true if moving from `self` to `to` is allowed
    pub fn can_transition_to(&self, to: Self) -> bool {
        match to {
            Self::Skipped => self.is_active(),
            _ => self.next() == Some(to),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::HeaderFetch => "header_fetch",
            Self::Transferring => "transferring",
            Self::Evaluating => "evaluating",
            Self::Publishing => "publishing",
            Self::Expanding => "expanding",
            Self::Done => "done",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ResourceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Crawl-level status of a URL
///
/// A URL is in at most one status at a time. `Downloaded` and `Skipped` are
/// terminal: such a URL is never processed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlStatus {
    /// Admitted and waiting for (or currently in) the pipeline
    Queued,

    /// Pipeline finished successfully
    Downloaded,

    /// Pipeline failed
    Skipped,
}

impl UrlStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Downloaded | Self::Skipped)
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Downloaded => "downloaded",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}
