use std::fmt;

use pro_macro::FromInner;
use serde::{Deserialize, Serialize};

/// Index of a peer in the fixed membership list.
#[derive(
    Debug, Copy, Clone, FromInner, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct PeerId(usize);

/// Sequence number of an agreement instance. Instances count up from 0;
/// the done watermark uses -1 for "never reported".
#[derive(
    Debug, Copy, Clone, FromInner, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Seq(i64);

impl Seq {
    pub(crate) const NONE: Seq = Seq(-1);

    pub(crate) fn succ(self) -> Seq {
        Seq(self.0 + 1)
    }
}

/// Proposal number. The derived order compares `(stamp, peer)`
/// lexicographically; stamps are strictly increasing on each peer and the
/// peer id breaks ties across peers, so ballots are globally unique and
/// totally ordered. `Option<Ballot>` stands in for "no proposal yet":
/// `None` sorts below every generated ballot.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ballot {
    stamp: u64,
    peer: PeerId,
}

impl Ballot {
    pub(crate) fn new(stamp: u64, peer: PeerId) -> Self {
        Self { stamp, peer }
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.stamp, self.peer)
    }
}
