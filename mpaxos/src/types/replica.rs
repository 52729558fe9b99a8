use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use log::trace;

use super::{
    id::{Ballot, PeerId, Seq},
    instance::{Fate, Instance},
    value::Value,
};

/// Per-peer protocol state: the instance store, the done watermarks and
/// the ballot generator. Every transition is a synchronous method run
/// under the peer's mutex; nothing in here blocks or touches the network.
pub(crate) struct Replica<C>
where
    C: Value,
{
    me: PeerId,
    instances: HashMap<Seq, Instance<C>>,
    /// Highest seq each peer has reported safe to forget. The local slot
    /// moves on `record_done`, remote slots on incoming decides.
    dones: Vec<Seq>,
    last_stamp: u64,
}

impl<C> Replica<C>
where
    C: Value,
{
    pub(crate) fn new(me: PeerId, peer_cnt: usize) -> Self {
        Self {
            me,
            instances: HashMap::new(),
            dones: vec![Seq::NONE; peer_cnt],
            last_stamp: 0,
        }
    }

    /// Fresh ballot, strictly above every ballot this peer handed out
    /// before. The wall clock keeps competing proposers roughly ordered
    /// in real time; the peer id breaks ties across peers.
    pub(crate) fn next_ballot(&mut self) -> Ballot {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64);
        self.last_stamp = now.max(self.last_stamp + 1);
        Ballot::new(self.last_stamp, self.me)
    }

    /// Phase-one vote. The instance is created on first reference with no
    /// promise, so a first-ever prepare always wins the comparison.
    pub(crate) fn prepare(
        &mut self,
        seq: Seq,
        ballot: Ballot,
    ) -> (bool, Option<Ballot>, Option<C>) {
        let inst = self.instances.entry(seq).or_insert_with(Instance::fresh);
        if Some(ballot) > inst.promised {
            inst.promised = Some(ballot);
            (true, inst.accepted, inst.value.clone())
        } else {
            trace!("reject prepare {} at seq {}", ballot, seq);
            (false, None, None)
        }
    }

    /// Phase-two vote. `>=` rather than `>`: an accept carrying the ballot
    /// we promised is the second half of that same proposal.
    pub(crate) fn accept(&mut self, seq: Seq, ballot: Ballot, value: C) -> bool {
        let inst = self.instances.entry(seq).or_insert_with(Instance::fresh);
        if Some(ballot) >= inst.promised {
            inst.promised = Some(ballot);
            inst.accepted = Some(ballot);
            inst.value = Some(value);
            true
        } else {
            trace!("reject accept {} at seq {}", ballot, seq);
            false
        }
    }

    /// Remote decide: record the chosen value and the sender's piggybacked
    /// done watermark.
    pub(crate) fn decide(&mut self, seq: Seq, ballot: Ballot, value: C, from: PeerId, done: Seq) {
        self.mark_decided(seq, ballot, value);
        self.dones[*from] = done;
    }

    /// Record a chosen value. Replays are harmless: only one value can
    /// ever be chosen for a seq, so a second decide stores the same one.
    pub(crate) fn mark_decided(&mut self, seq: Seq, ballot: Ballot, value: C) {
        let inst = self.instances.entry(seq).or_insert_with(Instance::fresh);
        inst.value = Some(value);
        inst.accepted = Some(ballot);
        inst.promised = Some(ballot);
        inst.fate = Fate::Decided;
    }

    /// The application is done with every instance at or below `seq`.
    /// Lower calls after higher ones are no-ops.
    pub(crate) fn record_done(&mut self, seq: Seq) {
        if seq > self.dones[*self.me] {
            self.dones[*self.me] = seq;
        }
    }

    pub(crate) fn local_done(&self) -> Seq {
        self.dones[*self.me]
    }

    /// One more than the lowest done watermark across all peers. As a side
    /// effect, decided instances at or below that watermark are erased.
    /// Pending ones stay, so a late decide can still land.
    pub(crate) fn forget(&mut self) -> Seq {
        let floor = self.dones.iter().copied().min().unwrap_or(Seq::NONE);
        self.instances
            .retain(|&seq, inst| seq > floor || inst.fate != Fate::Decided);
        floor.succ()
    }

    /// Highest seq currently stored, or 0 when the store is empty.
    pub(crate) fn max_seq(&self) -> Seq {
        self.instances.keys().copied().max().unwrap_or_else(|| Seq::from(0))
    }

    pub(crate) fn status(&mut self, seq: Seq) -> (Fate, Option<C>) {
        if seq < self.forget() {
            return (Fate::Forgotten, None);
        }
        match self.instances.get(&seq) {
            Some(inst) => (inst.fate, inst.value.clone()),
            None => (Fate::Pending, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replica() -> Replica<String> {
        Replica::new(PeerId::from(0), 3)
    }

    fn ballot(stamp: u64, peer: usize) -> Ballot {
        Ballot::new(stamp, PeerId::from(peer))
    }

    #[test]
    fn first_prepare_is_promised() {
        let mut r = replica();
        let (ok, accepted, value) = r.prepare(Seq::from(0), ballot(1, 1));
        assert!(ok);
        assert_eq!(accepted, None);
        assert_eq!(value, None);
    }

    #[test]
    fn prepare_rejects_stale_ballots() {
        let mut r = replica();
        assert!(r.prepare(Seq::from(0), ballot(5, 1)).0);
        assert!(!r.prepare(Seq::from(0), ballot(5, 1)).0);
        assert!(!r.prepare(Seq::from(0), ballot(4, 2)).0);
        assert!(r.prepare(Seq::from(0), ballot(6, 2)).0);
    }

    #[test]
    fn prepare_reports_highest_accepted_proposal() {
        let mut r = replica();
        assert!(r.accept(Seq::from(0), ballot(3, 1), "w".to_owned()));
        let (ok, accepted, value) = r.prepare(Seq::from(0), ballot(4, 2));
        assert!(ok);
        assert_eq!(accepted, Some(ballot(3, 1)));
        assert_eq!(value.as_deref(), Some("w"));
    }

    #[test]
    fn accept_honors_the_promised_ballot() {
        let mut r = replica();
        assert!(r.prepare(Seq::from(0), ballot(5, 1)).0);
        assert!(r.accept(Seq::from(0), ballot(5, 1), "v".to_owned()));
    }

    #[test]
    fn accept_rejects_below_promise() {
        let mut r = replica();
        assert!(r.prepare(Seq::from(0), ballot(5, 1)).0);
        assert!(!r.accept(Seq::from(0), ballot(4, 2), "v".to_owned()));
        let (fate, value) = r.status(Seq::from(0));
        assert_eq!(fate, Fate::Pending);
        assert_eq!(value, None);
    }

    #[test]
    fn accept_on_fresh_instance_is_honored() {
        let mut r = replica();
        assert!(r.accept(Seq::from(2), ballot(1, 1), "v".to_owned()));
    }

    #[test]
    fn accepted_never_exceeds_promised() {
        let mut r = replica();
        r.prepare(Seq::from(0), ballot(2, 0));
        r.accept(Seq::from(0), ballot(2, 0), "a".to_owned());
        r.prepare(Seq::from(0), ballot(9, 1));
        let inst = r.instances.get(&Seq::from(0)).unwrap();
        assert!(inst.accepted <= inst.promised);
        assert_eq!(inst.accepted, Some(ballot(2, 0)));
        assert_eq!(inst.promised, Some(ballot(9, 1)));
    }

    #[test]
    fn decide_is_idempotent() {
        let mut r = replica();
        r.decide(Seq::from(1), ballot(3, 2), "v".to_owned(), PeerId::from(2), Seq::from(0));
        r.decide(Seq::from(1), ballot(3, 2), "v".to_owned(), PeerId::from(2), Seq::from(0));
        let (fate, value) = r.status(Seq::from(1));
        assert_eq!(fate, Fate::Decided);
        assert_eq!(value.as_deref(), Some("v"));
    }

    #[test]
    fn decide_overwrites_the_sender_done_slot() {
        let mut r = replica();
        r.decide(Seq::from(0), ballot(1, 1), "v".to_owned(), PeerId::from(1), Seq::from(4));
        r.record_done(Seq::from(4));
        r.decide(Seq::from(1), ballot(2, 2), "w".to_owned(), PeerId::from(2), Seq::from(4));
        assert_eq!(r.forget(), Seq::from(5));
    }

    #[test]
    fn record_done_is_monotonic() {
        let mut r = replica();
        r.record_done(Seq::from(8));
        r.record_done(Seq::from(3));
        assert_eq!(r.local_done(), Seq::from(8));
    }

    #[test]
    fn forget_erases_only_decided_instances() {
        let mut r = replica();
        r.mark_decided(Seq::from(0), ballot(1, 0), "a".to_owned());
        r.prepare(Seq::from(1), ballot(2, 0));
        r.mark_decided(Seq::from(2), ballot(3, 0), "c".to_owned());
        for peer in 0..3 {
            r.decide(
                Seq::from(3),
                ballot(4, peer),
                "d".to_owned(),
                PeerId::from(peer),
                Seq::from(1),
            );
        }
        r.record_done(Seq::from(1));

        assert_eq!(r.forget(), Seq::from(2));
        // seq 0 was decided and below the floor, seq 1 is still pending
        assert!(!r.instances.contains_key(&Seq::from(0)));
        assert!(r.instances.contains_key(&Seq::from(1)));
        assert!(r.instances.contains_key(&Seq::from(2)));
    }

    #[test]
    fn forget_stalls_on_a_silent_peer() {
        let mut r = replica();
        r.record_done(Seq::from(100));
        r.decide(Seq::from(0), ballot(1, 1), "v".to_owned(), PeerId::from(1), Seq::from(100));
        // peer 2 never reported done
        assert_eq!(r.forget(), Seq::from(0));
        assert!(r.instances.contains_key(&Seq::from(0)));
    }

    #[test]
    fn status_below_threshold_is_forgotten() {
        let mut r = replica();
        for peer in 0..3 {
            r.decide(
                Seq::from(0),
                ballot(1, peer),
                "v".to_owned(),
                PeerId::from(peer),
                Seq::from(0),
            );
        }
        r.record_done(Seq::from(0));
        assert_eq!(r.status(Seq::from(0)).0, Fate::Forgotten);
    }

    #[test]
    fn status_of_unknown_instance_is_pending() {
        let mut r = replica();
        let (fate, value) = r.status(Seq::from(7));
        assert_eq!(fate, Fate::Pending);
        assert_eq!(value, None);
    }

    #[test]
    fn max_seq_tracks_the_store() {
        let mut r = replica();
        assert_eq!(r.max_seq(), Seq::from(0));
        r.prepare(Seq::from(4), ballot(1, 0));
        r.prepare(Seq::from(2), ballot(1, 0));
        assert_eq!(r.max_seq(), Seq::from(4));
    }

    #[test]
    fn ballots_are_strictly_increasing() {
        let mut r = replica();
        let a = r.next_ballot();
        let b = r.next_ballot();
        let c = r.next_ballot();
        assert!(a < b && b < c);
    }

    #[test]
    fn ballots_from_distinct_peers_never_collide() {
        let mut r0 = Replica::<String>::new(PeerId::from(0), 3);
        let mut r1 = Replica::<String>::new(PeerId::from(1), 3);
        let a = r0.next_ballot();
        let b = r1.next_ballot();
        assert_ne!(a, b);
    }
}
