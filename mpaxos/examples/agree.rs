//! Three in-process peers agreeing on a handful of values.

use std::time::Duration;

use log::info;
use mpaxos::{config::Configure, DefaultPeer, Fate, Seq};

#[tokio::main]
async fn main() {
    env_logger::init();

    let peer: Vec<String> = vec![
        "127.0.0.1:9600".to_owned(),
        "127.0.0.1:9601".to_owned(),
        "127.0.0.1:9602".to_owned(),
    ];

    let mut nodes = Vec::with_capacity(3);
    for index in 0..3 {
        nodes.push(DefaultPeer::<String>::new(Configure::new(3, peer.clone(), index)).await);
    }

    for seq in 0..3i64 {
        nodes[seq as usize % 3].start(Seq::from(seq), format!("value-{}", seq));
    }

    for seq in 0..3i64 {
        loop {
            if let (Fate::Decided, Some(v)) = nodes[0].status(Seq::from(seq)).await {
                info!("seq {} decided {}", seq, v);
                println!("seq {} decided {}", seq, v);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    for node in &nodes {
        node.kill();
    }
}
