use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use futures::future::join_all;
use log::{debug, trace};
use rand::Rng;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::Mutex,
    task::JoinHandle,
};

use crate::{
    client::{TcpTransport, Transport},
    config::Configure,
    error::RpcError,
    message::{
        AcceptArgs, AcceptReply, DecideArgs, DecideReply, PrepareArgs, PrepareReply, Reply,
        Request,
    },
    types::{Ballot, Fate, PeerId, Replica, Seq, Value},
    util,
};

/// One Paxos peer. Construction binds this peer's listener and spawns the
/// RPC accept loop; agreement is driven with `start` and observed through
/// `status`.
pub struct Peer<C, T = TcpTransport>
where
    C: Value,
    T: Transport<C> + 'static,
{
    inner: Arc<InnerPeer<C, T>>,
    serve_handle: JoinHandle<()>,
}

pub type DefaultPeer<C> = Peer<C>;

impl<C> Peer<C, TcpTransport>
where
    C: Value,
{
    pub async fn new(conf: Configure) -> Self {
        Self::with_transport(conf, TcpTransport::default()).await
    }
}

impl<C, T> Peer<C, T>
where
    C: Value,
    T: Transport<C> + 'static,
{
    /// Bind the listener for this peer's slot and start serving. A bind
    /// failure aborts construction; nothing later is fatal.
    pub async fn with_transport(conf: Configure, transport: T) -> Self {
        let listener = TcpListener::bind(&conf[conf.index])
            .await
            .map_err(|e| panic!("bind {} failed, {}", &conf[conf.index], e))
            .unwrap();

        let inner = Arc::new(InnerPeer::new(conf, transport));
        let serve_handle = tokio::spawn(RpcServer::new(inner.clone(), listener).serve());

        Self {
            inner,
            serve_handle,
        }
    }

    /// Begin agreement on `seq` with this peer proposing `value`. Returns
    /// immediately; completion is observed through `status`. A seq that
    /// already fell below the forget threshold is silently ignored.
    pub fn start(&self, seq: Seq, value: C) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            if seq < inner.replica.lock().await.forget() {
                return;
            }
            inner.run_proposer(seq, value).await;
        });
    }

    /// Local view of an instance. Never contacts other peers.
    pub async fn status(&self, seq: Seq) -> (Fate, Option<C>) {
        self.inner.replica.lock().await.status(seq)
    }

    /// Declare every instance at or below `seq` unneeded by this peer.
    pub async fn done(&self, seq: Seq) {
        self.inner.replica.lock().await.record_done(seq);
    }

    /// Highest instance seq currently present on this peer.
    pub async fn max(&self) -> Seq {
        self.inner.replica.lock().await.max_seq()
    }

    /// One more than the minimum done watermark across all peers. Decided
    /// instances below the returned seq are erased as a side effect.
    pub async fn min(&self) -> Seq {
        self.inner.replica.lock().await.forget()
    }

    /// Shut the peer down: stop the accept loop. Running proposers wind
    /// down on their own once their calls start failing.
    pub fn kill(&self) {
        self.inner.dead.store(true, Ordering::SeqCst);
        self.serve_handle.abort();
    }

    /// Test hook: drop incoming requests and outgoing replies at random,
    /// the way a lossy network would.
    pub fn set_unreliable(&self, unreliable: bool) {
        self.inner.unreliable.store(unreliable, Ordering::SeqCst);
    }

    /// Number of RPC requests this peer has served.
    pub fn rpc_count(&self) -> u64 {
        self.inner.rpc_count.load(Ordering::SeqCst)
    }
}

struct InnerPeer<C, T>
where
    C: Value,
    T: Transport<C>,
{
    conf: Configure,
    me: PeerId,
    replica: Mutex<Replica<C>>,
    transport: T,
    dead: AtomicBool,
    unreliable: AtomicBool,
    rpc_count: AtomicU64,
}

impl<C, T> InnerPeer<C, T>
where
    C: Value,
    T: Transport<C>,
{
    fn new(conf: Configure, transport: T) -> Self {
        let me = PeerId::from(conf.index);
        let peer_cnt = conf.peer_cnt;
        Self {
            conf,
            me,
            replica: Mutex::new(Replica::new(me, peer_cnt)),
            transport,
            dead: AtomicBool::new(false),
            unreliable: AtomicBool::new(false),
            rpc_count: AtomicU64::new(0),
        }
    }

    fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    fn majority(&self) -> usize {
        self.conf.peer_cnt / 2 + 1
    }

    // Acceptor handlers. The rpc dispatcher and the proposer's self-call
    // path both land here; each locks the replica for its whole body, so
    // the proposer must not hold the lock when it self-invokes.

    async fn prepare(&self, args: PrepareArgs) -> PrepareReply<C> {
        trace!("peer {} handle prepare seq {}", self.me, args.seq);
        let mut replica = self.replica.lock().await;
        let (ok, accepted, value) = replica.prepare(args.seq, args.ballot);
        PrepareReply {
            ok,
            accepted,
            value,
        }
    }

    async fn accept(&self, args: AcceptArgs<C>) -> AcceptReply {
        trace!("peer {} handle accept seq {}", self.me, args.seq);
        let mut replica = self.replica.lock().await;
        AcceptReply {
            ok: replica.accept(args.seq, args.ballot, args.value),
        }
    }

    async fn decide(&self, args: DecideArgs<C>) -> DecideReply {
        trace!("peer {} handle decide seq {}", self.me, args.seq);
        let mut replica = self.replica.lock().await;
        replica.decide(args.seq, args.ballot, args.value, args.from, args.done);
        DecideReply {}
    }

    async fn handle_request(&self, request: Request<C>) -> Reply<C> {
        match request {
            Request::Prepare(args) => Reply::Prepare(self.prepare(args).await),
            Request::Accept(args) => Reply::Accept(self.accept(args).await),
            Request::Decide(args) => Reply::Decide(self.decide(args).await),
        }
    }

    // Proposer driver: one full prepare/accept/decide round per ballot,
    // restarted until some proposal, not necessarily ours, gets through.

    async fn run_proposer(&self, seq: Seq, value: C) {
        loop {
            let ballot = self.replica.lock().await.next_ballot();

            if let Some(chosen) = self.send_prepare(seq, ballot, &value).await {
                if self.send_accept(seq, ballot, chosen.clone()).await {
                    self.send_decide(seq, ballot, chosen).await;
                    return;
                }
            }

            let (fate, _) = self.replica.lock().await.status(seq);
            if fate == Fate::Decided {
                debug!("peer {} observed decided seq {}", self.me, seq);
                return;
            }
            if self.is_dead() {
                return;
            }
        }
    }

    /// Phase one. On a majority of promises, yields the value to carry
    /// into the accept phase: the value of the highest accepted proposal
    /// any peer reported, or our own when nobody accepted anything yet.
    async fn send_prepare(&self, seq: Seq, ballot: Ballot, value: &C) -> Option<C> {
        let args = PrepareArgs { seq, ballot };
        let replies = join_all(self.conf.peer.iter().enumerate().map(|(id, addr)| {
            let args = args.clone();
            async move {
                if id == *self.me {
                    Some(self.prepare(args).await)
                } else {
                    match self.transport.call(addr, Request::Prepare(args)).await {
                        Ok(Reply::Prepare(reply)) => Some(reply),
                        _ => None,
                    }
                }
            }
        }))
        .await;

        let mut oks = 0;
        let mut max_accepted: Option<Ballot> = None;
        let mut adopted: Option<C> = None;
        for reply in replies.into_iter().flatten() {
            if !reply.ok {
                continue;
            }
            oks += 1;
            if reply.accepted > max_accepted {
                max_accepted = reply.accepted;
                adopted = reply.value;
            }
        }

        if oks < self.majority() {
            return None;
        }
        Some(adopted.unwrap_or_else(|| value.clone()))
    }

    /// Phase two: ask every peer to accept the chosen value under our
    /// ballot. True on a majority of acks.
    async fn send_accept(&self, seq: Seq, ballot: Ballot, value: C) -> bool {
        let args = AcceptArgs { seq, ballot, value };
        let replies = join_all(self.conf.peer.iter().enumerate().map(|(id, addr)| {
            let args = args.clone();
            async move {
                if id == *self.me {
                    Some(self.accept(args).await)
                } else {
                    match self.transport.call(addr, Request::Accept(args)).await {
                        Ok(Reply::Accept(reply)) => Some(reply),
                        _ => None,
                    }
                }
            }
        }))
        .await;

        let oks = replies.into_iter().flatten().filter(|r| r.ok).count();
        oks >= self.majority()
    }

    /// Phase three: record the choice locally, then inform every other
    /// peer. Our done watermark rides along on each decide; delivery
    /// failures are ignored, a later proposer will fill the gap.
    async fn send_decide(&self, seq: Seq, ballot: Ballot, value: C) {
        let done = {
            let mut replica = self.replica.lock().await;
            replica.mark_decided(seq, ballot, value.clone());
            replica.local_done()
        };

        debug!("peer {} decided seq {} at {}", self.me, seq, ballot);

        let args = DecideArgs {
            seq,
            ballot,
            value,
            from: self.me,
            done,
        };
        join_all(
            self.conf
                .peer
                .iter()
                .enumerate()
                .filter(|(id, _)| *id != *self.me)
                .map(|(_, addr)| {
                    let args = args.clone();
                    async move {
                        let _ = self.transport.call(addr, Request::Decide(args)).await;
                    }
                }),
        )
        .await;
    }
}

struct RpcServer<C, T>
where
    C: Value,
    T: Transport<C> + 'static,
{
    inner: Arc<InnerPeer<C, T>>,
    listener: TcpListener,
}

impl<C, T> RpcServer<C, T>
where
    C: Value,
    T: Transport<C> + 'static,
{
    fn new(inner: Arc<InnerPeer<C, T>>, listener: TcpListener) -> Self {
        Self { inner, listener }
    }

    async fn serve(self) {
        loop {
            let (stream, _) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    if self.inner.is_dead() {
                        return;
                    }
                    debug!("peer {} accept error, {}", self.inner.me, e);
                    continue;
                }
            };
            if self.inner.is_dead() {
                return;
            }

            let inner = self.inner.clone();
            tokio::spawn(async move {
                let roll = if inner.unreliable.load(Ordering::SeqCst) {
                    rand::thread_rng().gen_range(0..1000)
                } else {
                    1000
                };
                if roll < 100 {
                    // discard the request
                    return;
                }
                inner.rpc_count.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = Self::handle_conn(inner, stream, roll < 200).await {
                    trace!("connection dropped, {}", e);
                }
            });
        }
    }

    async fn handle_conn(
        inner: Arc<InnerPeer<C, T>>,
        mut stream: TcpStream,
        discard_reply: bool,
    ) -> Result<(), RpcError> {
        let request: Request<C> = util::recv_message(&mut stream).await?;
        let reply = inner.handle_request(request).await;
        if discard_reply {
            // the request took effect but the caller never hears back
            return Ok(());
        }
        util::send_message(&mut stream, &reply).await
    }
}
