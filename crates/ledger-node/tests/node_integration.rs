mod helpers;

use std::time::{Duration, Instant};

use helpers::*;
use ledger_core::{chain::genesis_block, cumulative_difficulty, Block, Transaction};
use ledger_node::{sync_with_peers, PeerTransport, TransportConfig, TransportError};
use serde_json::json;
use tokio::{io::AsyncWriteExt, net::TcpStream, time::sleep};

#[tokio::test]
async fn get_chain_returns_all_blocks_in_order() {
    let chain = build_chain(6, "served");
    let node = spawn_node(chain.clone(), vec![]).await;

    let fetched = transport().fetch_chain(&node.peer()).await.unwrap();
    assert_eq!(fetched.len(), 6);
    assert_eq!(fetched, chain);
}

#[tokio::test]
async fn linked_block_is_appended_and_persisted() {
    let mut chain = build_chain(2, "main");
    let node = spawn_node(chain.clone(), vec![]).await;

    extend_chain(&mut chain, 1, "main");
    transport()
        .send_block(&node.peer(), &chain[2])
        .await
        .unwrap();

    assert!(wait_for_len(node.ledger(), 3).await);
    assert_eq!(node.ledger().snapshot().await, chain);
    assert_eq!(node.store.persist_count(), 1);
}

#[tokio::test]
async fn block_below_difficulty_is_dropped() {
    let genesis = genesis_block();
    let node = spawn_node(vec![genesis.clone()], vec![]).await;

    let mut weak = Block::with_timestamp(1, genesis.hash.clone(), vec![], 1_700_000_000);
    while weak.hash.starts_with('0') {
        weak.nonce += 1;
        weak.seal();
    }
    transport().send_block(&node.peer(), &weak).await.unwrap();
    sleep(Duration::from_millis(200)).await;

    assert_eq!(node.ledger().len().await, 1);
    assert_eq!(node.store.persist_count(), 0);
}

#[tokio::test]
async fn unlinked_block_triggers_sync_and_reorganization() {
    let peer_chain = build_chain(5, "peer");
    let peer = spawn_node(peer_chain.clone(), vec![]).await;
    let node = spawn_node(build_chain(2, "local"), vec![peer.peer()]).await;

    // The peer's tip does not link onto the node's tip.
    transport()
        .send_block(&node.peer(), &peer_chain[4])
        .await
        .unwrap();

    assert!(wait_for_len(node.ledger(), 5).await);
    assert_eq!(node.ledger().snapshot().await, peer_chain);
    assert_eq!(node.store.persist_count(), 1);
    assert_eq!(node.store.snapshot(), peer_chain);
}

#[tokio::test]
async fn first_eligible_peer_wins() {
    let first = spawn_node(build_chain(4, "first"), vec![]).await;
    let second = spawn_node(build_chain(6, "second"), vec![]).await;
    let node = spawn_node(build_chain(2, "local"), vec![]).await;

    let peers = vec![first.peer(), second.peer()];
    assert!(sync_with_peers(node.ledger(), &peers, &transport()).await);
    assert_eq!(
        node.ledger().snapshot().await,
        first.ledger().snapshot().await
    );
    assert_eq!(node.store.persist_count(), 1);
}

#[tokio::test]
async fn sync_skips_failing_peers() {
    let dead = dead_peer().await;
    let (stalled, _stalled_task) = stalled_peer().await;
    let (garbage, _garbage_task) = scripted_peer(b"{\"type\":\"chain\",\"data\":[").await;
    let (wrong_kind, _wrong_task) = scripted_peer(br#"{"type":"get_chain"}"#).await;
    let good_chain = build_chain(4, "good");
    let good = spawn_node(good_chain.clone(), vec![]).await;
    let node = spawn_node(build_chain(2, "local"), vec![]).await;

    let peers = vec![dead, stalled, garbage, wrong_kind, good.peer()];
    let started = Instant::now();
    assert!(sync_with_peers(node.ledger(), &peers, &transport()).await);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(node.ledger().snapshot().await, good_chain);
}

#[tokio::test]
async fn sync_without_better_peer_leaves_chain_untouched() {
    let local = build_chain(5, "local");
    let shorter = spawn_node(local[..3].to_vec(), vec![]).await;
    let same = spawn_node(local.clone(), vec![]).await;
    let mut invalid_chain = build_chain(8, "invalid");
    invalid_chain[3].prev_hash = "00".into();
    let invalid = spawn_node(invalid_chain, vec![]).await;
    let node = spawn_node(local.clone(), vec![]).await;

    let peers = vec![shorter.peer(), same.peer(), invalid.peer()];
    assert!(!sync_with_peers(node.ledger(), &peers, &transport()).await);
    assert_eq!(node.ledger().snapshot().await, local);
    assert_eq!(node.store.persist_count(), 0);
}

#[tokio::test]
async fn longer_chain_is_adopted_even_when_lighter() {
    let mut local = vec![genesis_block()];
    // Two heavy blocks against four light ones.
    for _ in 0..2 {
        let prev = local.last().unwrap().clone();
        let block = Block::with_timestamp(prev.index + 1, prev.hash, vec![], 1_700_000_000);
        local.push(ledger_core::pow::mine_block(block, 3));
    }
    let mut light = vec![genesis_block()];
    while light.len() < 5 {
        let prev = light.last().unwrap().clone();
        let mut block = Block::with_timestamp(prev.index + 1, prev.hash, vec![], 1_700_000_001);
        while block.hash.starts_with('0') {
            block.nonce += 1;
            block.seal();
        }
        light.push(block);
    }
    assert!(cumulative_difficulty(&light) < cumulative_difficulty(&local));

    let peer = spawn_node(light.clone(), vec![]).await;
    let node = spawn_node(local, vec![]).await;
    assert!(sync_with_peers(node.ledger(), &[peer.peer()], &transport()).await);
    assert_eq!(node.ledger().snapshot().await, light);
}

#[tokio::test]
async fn broadcast_transaction_reaches_live_peers() {
    let a = spawn_node(build_chain(1, "a"), vec![]).await;
    let b = spawn_node(build_chain(1, "b"), vec![]).await;
    let peers = vec![a.peer(), dead_peer().await, b.peer()];
    let tx = Transaction::new(json!({"from": "alice", "to": "bob", "amount": 7}));

    assert_eq!(transport().broadcast_transaction(&peers, &tx).await, 2);
    // A second round is deduplicated by every node.
    assert_eq!(transport().broadcast_transaction(&peers, &tx).await, 2);

    for node in [&a, &b] {
        let ledger = node.ledger().clone();
        let expected = tx.clone();
        assert!(
            eventually(|| {
                let l = ledger.clone();
                let expected = expected.clone();
                async move { l.transactions().await == vec![expected] }
            })
            .await
        );
    }
    sleep(Duration::from_millis(100)).await;
    assert_eq!(a.ledger().transactions().await.len(), 1);
}

#[tokio::test]
async fn broadcast_block_extends_every_peer() {
    let mut chain = build_chain(3, "shared");
    let a = spawn_node(chain.clone(), vec![]).await;
    let b = spawn_node(chain.clone(), vec![]).await;
    extend_chain(&mut chain, 1, "shared");

    let peers = vec![a.peer(), b.peer()];
    assert_eq!(transport().broadcast_block(&peers, &chain[3]).await, 2);
    for node in [&a, &b] {
        assert!(wait_for_len(node.ledger(), 4).await);
    }
}

#[tokio::test]
async fn malformed_message_does_not_stop_the_server() {
    let chain = build_chain(3, "robust");
    let node = spawn_node(chain.clone(), vec![]).await;

    for payload in [&b"definitely not json"[..], br#"{"type":"launch"}"#, b""] {
        let mut stream = TcpStream::connect(node.addr).await.unwrap();
        stream.write_all(payload).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    assert_eq!(transport().fetch_chain(&node.peer()).await.unwrap(), chain);
}

#[tokio::test]
async fn oversized_chain_response_is_refused() {
    let node = spawn_node(build_chain(10, "big"), vec![]).await;
    let transport = PeerTransport::new(TransportConfig {
        max_chain_bytes: 256,
        ..transport_config()
    });

    assert!(matches!(
        transport.fetch_chain(&node.peer()).await,
        Err(TransportError::TooLarge { limit: 256 })
    ));
    assert!(transport.request_chain(&node.peer()).await.is_none());
}

#[tokio::test]
async fn stalled_peer_is_bounded_by_read_timeout() {
    let (stalled, _task) = stalled_peer().await;
    let started = Instant::now();
    assert!(matches!(
        transport().fetch_chain(&stalled).await,
        Err(TransportError::Timeout(_))
    ));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn unreachable_peer_yields_no_chain() {
    let dead = dead_peer().await;
    assert!(transport().request_chain(&dead).await.is_none());
    assert!(transport().send_block(&dead, &genesis_block()).await.is_err());
}
