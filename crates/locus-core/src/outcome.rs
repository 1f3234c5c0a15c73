//! Comparison outcomes and the reasons behind them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the reconciler should do with an incoming Locus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonOutcome {
    /// Adopt the incoming revision as the new working copy.
    UseIncoming,
    /// Keep the working copy; the incoming revision carries nothing new.
    KeepCurrent,
    /// History is broken; stop and fetch a full Locus.
    Desync,
    /// The incoming revision extends one that has not arrived yet.
    Wait,
    /// The resource moved; adopt the incoming revision at its new URL.
    LocusUrlChanged,
}

impl ComparisonOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOutcome::UseIncoming => "USE_INCOMING",
            ComparisonOutcome::KeepCurrent => "KEEP_CURRENT",
            ComparisonOutcome::Desync => "DESYNC",
            ComparisonOutcome::Wait => "WAIT",
            ComparisonOutcome::LocusUrlChanged => "LOCUS_URL_CHANGED",
        }
    }

    /// True when the incoming revision replaces the working copy.
    pub fn adopts(&self) -> bool {
        matches!(
            self,
            ComparisonOutcome::UseIncoming | ComparisonOutcome::LocusUrlChanged
        )
    }
}

impl fmt::Display for ComparisonOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for outcome names that are not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOutcome(pub String);

impl fmt::Display for UnknownOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not a recognized comparison outcome", self.0)
    }
}

impl std::error::Error for UnknownOutcome {}

impl FromStr for ComparisonOutcome {
    type Err = UnknownOutcome;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USE_INCOMING" => Ok(ComparisonOutcome::UseIncoming),
            // older servers and logs spell it USE_CURRENT
            "KEEP_CURRENT" | "USE_CURRENT" => Ok(ComparisonOutcome::KeepCurrent),
            "DESYNC" => Ok(ComparisonOutcome::Desync),
            "WAIT" => Ok(ComparisonOutcome::Wait),
            "LOCUS_URL_CHANGED" => Ok(ComparisonOutcome::LocusUrlChanged),
            other => Err(UnknownOutcome(other.to_string())),
        }
    }
}

/// Diagnostic code recording which rule produced an outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    /// No working copy existed yet.
    NoWorkingCopy,
    /// Both sequences were empty.
    EmptySequences,
    /// Incoming had a higher terminal sequence (full locus, no base).
    NoBaseSequence,
    /// Working copy sequence was empty, nothing to be contiguous with.
    Bootstrap,
    /// Base sequence overlaps or abuts the working copy.
    Contiguous,
    /// Incoming was older than the working copy.
    IncomingStale,
    /// Same terminal sequence number on both sides.
    SameTerminal,
    /// Base sequence ends before the working copy begins.
    Gap,
    /// Base sequence carries no usable span.
    EmptyBase,
    /// Base sequence starts after the working copy ends.
    PredecessorPending,
    /// Newer revision at a different URL.
    Relocated,
    /// Older or equal revision at a different URL.
    StaleRelocation,
    /// Held event belongs to a URL the Locus has moved away from.
    AbandonedUrl,
    /// No working copy yet and the incoming sequence is empty.
    EmptyIncoming,
    /// A held event outlived its hold limit.
    HoldExpired,
    /// Too many events were held at once.
    HoldOverflow,
}

impl Reason {
    pub fn code(&self) -> &'static str {
        match self {
            Reason::NoWorkingCopy => "C000",
            Reason::EmptySequences => "C001",
            Reason::NoBaseSequence => "C002",
            Reason::Bootstrap => "C003",
            Reason::Contiguous => "D001",
            Reason::IncomingStale => "S001",
            Reason::SameTerminal => "S002",
            Reason::Gap => "D002",
            Reason::EmptyBase => "D003",
            Reason::PredecessorPending => "W001",
            Reason::Relocated => "U001",
            Reason::StaleRelocation => "U002",
            Reason::AbandonedUrl => "U003",
            Reason::EmptyIncoming => "C004",
            Reason::HoldExpired => "W002",
            Reason::HoldOverflow => "W003",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Reason::NoWorkingCopy => "no working copy yet, incoming is adopted",
            Reason::EmptySequences => "both sequences are empty, incoming replaces current",
            Reason::NoBaseSequence => "incoming is newer and carries no base sequence",
            Reason::Bootstrap => "working copy sequence is empty, incoming is adopted",
            Reason::Contiguous => "incoming is newer and its base touches the working copy",
            Reason::IncomingStale => "working copy is newer than incoming",
            Reason::SameTerminal => "both sides end on the same sequence number",
            Reason::Gap => "base sequence ends before the working copy range",
            Reason::EmptyBase => "base sequence has neither entries nor range",
            Reason::PredecessorPending => "base sequence starts after the working copy range",
            Reason::Relocated => "incoming is newer and lives at a different url",
            Reason::StaleRelocation => "incoming at a different url is not newer",
            Reason::AbandonedUrl => "held event belongs to a url the locus moved away from",
            Reason::EmptyIncoming => "no working copy yet and incoming has no sequence",
            Reason::HoldExpired => "held event waited too long for its predecessor",
            Reason::HoldOverflow => "hold buffer is full",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome plus the rule that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub outcome: ComparisonOutcome,
    pub reason: Reason,
}

impl Comparison {
    pub fn new(outcome: ComparisonOutcome, reason: Reason) -> Self {
        Self { outcome, reason }
    }
}

impl fmt::Display for Comparison {
    /// Packed `OUTCOME:CODE` form used in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.outcome, self.reason)
    }
}
