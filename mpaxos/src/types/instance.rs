use super::{id::Ballot, value::Value};

/// What the local peer knows about one agreement instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    /// A value has been chosen and this peer knows it.
    Decided,
    /// Agreement has not been reached, or not reached this peer yet.
    Pending,
    /// The instance is below the forget threshold; its state is gone.
    Forgotten,
}

/// Acceptor state for a single sequence number. `Forgotten` is never
/// stored here; it is inferred from absence below the forget threshold.
#[derive(Debug)]
pub(crate) struct Instance<C>
where
    C: Value,
{
    pub(crate) fate: Fate,
    /// Highest ballot promised to a prepare.
    pub(crate) promised: Option<Ballot>,
    /// Ballot of the highest accepted proposal; never exceeds `promised`.
    pub(crate) accepted: Option<Ballot>,
    /// Value of the highest accepted proposal.
    pub(crate) value: Option<C>,
}

impl<C> Instance<C>
where
    C: Value,
{
    pub(crate) fn fresh() -> Self {
        Self {
            fate: Fate::Pending,
            promised: None,
            accepted: None,
            value: None,
        }
    }
}
