use serde::{Deserialize, Serialize};

use crate::types::{Ballot, PeerId, Seq, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareArgs {
    pub(crate) seq: Seq,
    pub(crate) ballot: Ballot,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "C: Value")]
pub struct PrepareReply<C>
where
    C: Value,
{
    pub(crate) ok: bool,
    /// Ballot of the acceptor's highest accepted proposal, if any.
    pub(crate) accepted: Option<Ballot>,
    pub(crate) value: Option<C>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "C: Value")]
pub struct AcceptArgs<C>
where
    C: Value,
{
    pub(crate) seq: Seq,
    pub(crate) ballot: Ballot,
    pub(crate) value: C,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptReply {
    pub(crate) ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "C: Value")]
pub struct DecideArgs<C>
where
    C: Value,
{
    pub(crate) seq: Seq,
    pub(crate) ballot: Ballot,
    pub(crate) value: C,
    pub(crate) from: PeerId,
    /// The sender's own done watermark, piggybacked for garbage
    /// collection on every decide.
    pub(crate) done: Seq,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecideReply {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "C: Value")]
pub enum Request<C>
where
    C: Value,
{
    Prepare(PrepareArgs),
    Accept(AcceptArgs<C>),
    Decide(DecideArgs<C>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "C: Value")]
pub enum Reply<C>
where
    C: Value,
{
    Prepare(PrepareReply<C>),
    Accept(AcceptReply),
    Decide(DecideReply),
}
