//! End-to-end tests: the engine driving a real in-memory anchor.

use rollup_anchor::{AbiAnchorBackend, Anchor, AnchorBackend, AnchorConfig, Role, SharedAnchor};
use rollup_client::{Backend, Client, ClientError};
use rollup_codec::{AbiTypeCoder, RawMessageCoder, SborTypeCoder, TypeCoder};
use rollup_types::test_utils::test_attestor;
use rollup_types::{Action, AttestorKey, IntType};
use std::sync::Arc;

type TestClient<B> = Client<B, Vec<u8>, Vec<u8>>;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Anchor administered by attestor seed 1, with messages `m0..m3` queued and
/// the head already moved past `m0` (head=1, tail=4).
fn deploy(anchor: Anchor) -> (SharedAnchor, AttestorKey) {
    let admin = test_attestor(1);
    let shared = SharedAnchor::new(anchor);
    {
        let mut anchor = shared.lock();
        anchor
            .grant_role(admin.account_id(), Role::Attestor, admin.account_id())
            .unwrap();
        for i in 0..4 {
            anchor.push_message(format!("m{}", i).into_bytes()).unwrap();
        }
        anchor
            .rollup_cond_eq(admin.account_id(), vec![], vec![], vec![Action::SetQueueHead(1)])
            .unwrap();
    }
    (shared, admin)
}

fn native_anchor() -> (SharedAnchor, AttestorKey) {
    deploy(Anchor::native(test_attestor(1).account_id()))
}

/// Backend for a fresh attestor, granted by the admin.
fn attestor_backend(anchor: &SharedAnchor, admin: &AttestorKey, seed: u8) -> AnchorBackend {
    let attestor = test_attestor(seed);
    anchor
        .lock()
        .grant_role(admin.account_id(), Role::Attestor, attestor.account_id())
        .unwrap();
    AnchorBackend::new(anchor.clone()).with_attestor(attestor)
}

fn client<B: Backend>(backend: B, config: rollup_client::ClientConfig) -> TestClient<B> {
    Client::new(
        backend,
        Arc::new(RawMessageCoder),
        Arc::new(RawMessageCoder),
        config,
    )
}

fn stored_version(anchor: &SharedAnchor) -> Option<u64> {
    let anchor = anchor.lock();
    anchor
        .get_value(&anchor.config().keys.version)
        .map(|bytes| SborTypeCoder.decode_index(&bytes, IntType::U32).unwrap())
}

/// Draining head=1, tail=4 yields m1, m2, m3; after commit the head is 4.
#[tokio::test]
async fn test_queue_drain_moves_head() {
    init_logging();
    let (anchor, admin) = native_anchor();
    let backend = attestor_backend(&anchor, &admin, 2);
    let config = backend.client_config();
    let mut client = client(backend, config);

    assert!(client.has_message().await.unwrap());
    client.start_session().await.unwrap();
    let mut seen = Vec::new();
    while let Some(message) = client.poll_message().await.unwrap() {
        seen.push(String::from_utf8(message).unwrap());
    }
    assert_eq!(seen, vec!["m1", "m2", "m3"]);
    assert_eq!(client.poll_message().await.unwrap(), None);

    client.commit().await.unwrap().unwrap();
    assert_eq!(client.queue_head_index().await.unwrap(), 4);
    assert!(!client.has_message().await.unwrap());
    let anchor = anchor.lock();
    assert_eq!(anchor.get_value(&anchor.message_key(2).unwrap()), None);
}

/// Replies reach the anchor in the order they were added.
#[tokio::test]
async fn test_replies_delivered() {
    let (anchor, admin) = native_anchor();
    let backend = attestor_backend(&anchor, &admin, 2);
    let mut client = client(backend, Default::default());

    client.start_session().await.unwrap();
    while let Some(message) = client.poll_message().await.unwrap() {
        let mut reply = b"re:".to_vec();
        reply.extend(message);
        client.add_action(reply).unwrap();
    }
    client.commit().await.unwrap();
    assert_eq!(
        anchor.lock().replies(),
        &[b"re:m1".to_vec(), b"re:m2".to_vec(), b"re:m3".to_vec()]
    );
}

/// n uncontested commits take the version from absent to n.
#[tokio::test]
async fn test_version_monotonic() {
    let (anchor, admin) = native_anchor();
    let backend = attestor_backend(&anchor, &admin, 2);
    let mut client = client(backend, Default::default());

    assert_eq!(stored_version(&anchor), None);
    client.start_session().await.unwrap();
    assert_eq!(client.version(), Some(0));
    for i in 1..=5u32 {
        client.set_number(b"counter", i, rollup_types::NumberType::U32).unwrap();
        client.commit().await.unwrap();
        assert_eq!(stored_version(&anchor), Some(i as u64));
    }
}

/// Two clients at the same version: the second commit loses even though the
/// writes are disjoint, and succeeds after a rollback.
#[tokio::test]
async fn test_optimistic_lock_race() {
    init_logging();
    let (anchor, admin) = native_anchor();
    let mut a = client(attestor_backend(&anchor, &admin, 2), Default::default());
    let mut b = client(attestor_backend(&anchor, &admin, 3), Default::default());

    a.start_session().await.unwrap();
    b.start_session().await.unwrap();
    assert_eq!(a.version(), b.version());

    a.set_value(b"a", Some(b"1".to_vec())).unwrap();
    b.set_value(b"b", Some(b"2".to_vec())).unwrap();
    a.commit().await.unwrap();

    let err = b.commit().await.unwrap_err();
    assert_eq!(err, ClientError::ConditionNotMet);
    assert!(err.is_conflict());
    assert_eq!(anchor.lock().get_value(b"b"), None);

    b.rollback().await.unwrap();
    assert_eq!(b.version(), Some(1));
    b.set_value(b"b", Some(b"2".to_vec())).unwrap();
    b.commit().await.unwrap();
    assert_eq!(stored_version(&anchor), Some(2));
}

/// A loser that drained the queue cannot consume the same messages twice.
#[tokio::test]
async fn test_competing_drains_consume_once() {
    let (anchor, admin) = native_anchor();
    let mut a = client(attestor_backend(&anchor, &admin, 2), Default::default());
    let mut b = client(attestor_backend(&anchor, &admin, 3), Default::default());

    a.start_session().await.unwrap();
    b.start_session().await.unwrap();
    while a.poll_message().await.unwrap().is_some() {}
    while b.poll_message().await.unwrap().is_some() {}
    a.add_action(b"a".to_vec()).unwrap();
    b.add_action(b"b".to_vec()).unwrap();

    a.commit().await.unwrap();
    assert!(b.commit().await.unwrap_err().is_conflict());
    b.rollback().await.unwrap();
    assert_eq!(b.poll_message().await.unwrap(), None);
    assert_eq!(anchor.lock().replies(), &[b"a".to_vec()]);
}

/// Removing a key reads as absent now and in the next session.
#[tokio::test]
async fn test_absent_after_delete() {
    let (anchor, admin) = native_anchor();
    let mut client = client(attestor_backend(&anchor, &admin, 2), Default::default());

    client.start_session().await.unwrap();
    client.set_value(b"k", Some(b"v".to_vec())).unwrap();
    client.commit().await.unwrap();
    assert_eq!(client.get_value(b"k").await.unwrap(), Some(b"v".to_vec()));

    client.remove_value(b"k").unwrap();
    assert_eq!(client.get_value(b"k").await.unwrap(), None);
    client.commit().await.unwrap();
    assert_eq!(client.get_value(b"k").await.unwrap(), None);
    assert_eq!(
        client.get_string(b"k").await.unwrap(),
        None,
        "absent must not be a decode error"
    );
}

/// Meta-transaction nonces strictly increase across successful commits.
#[tokio::test]
async fn test_meta_transaction_nonces_increase() {
    init_logging();
    let (anchor, admin) = native_anchor();
    let attestor = test_attestor(2);
    let backend = attestor_backend(&anchor, &admin, 2).with_sender(test_attestor(7));
    assert!(backend.use_meta_transaction());
    let mut client = client(backend, Default::default());

    client.start_session().await.unwrap();
    let mut last = None;
    for i in 0..3u8 {
        let (request, _) = anchor
            .lock()
            .prepare(attestor.account_id(), vec![])
            .unwrap();
        if let Some(prev) = last {
            assert!(request.nonce > prev);
        }
        last = Some(request.nonce);

        client.set_value(b"k", Some(vec![i])).unwrap();
        client.commit().await.unwrap();
    }
    assert_eq!(anchor.lock().nonce(attestor.account_id()), 3);
    assert_eq!(anchor.lock().get_value(b"k"), Some(vec![2]));
}

/// A conflicting meta-transaction is rejected by the dry run and burns no nonce.
#[tokio::test]
async fn test_meta_transaction_conflict() {
    let (anchor, admin) = native_anchor();
    let attestor = test_attestor(2);
    let mut meta = client(
        attestor_backend(&anchor, &admin, 2).with_sender(test_attestor(7)),
        Default::default(),
    );
    let mut direct = client(attestor_backend(&anchor, &admin, 3), Default::default());

    meta.start_session().await.unwrap();
    direct.start_session().await.unwrap();
    meta.set_value(b"x", None).unwrap();
    direct.set_value(b"y", None).unwrap();
    direct.commit().await.unwrap();

    assert_eq!(meta.commit().await, Err(ClientError::ConditionNotMet));
    assert_eq!(anchor.lock().nonce(attestor.account_id()), 0);
}

/// The meta path without an attestor key fails before contacting the anchor.
#[tokio::test]
async fn test_meta_transaction_requires_signer() {
    let (anchor, _) = native_anchor();
    let backend = AnchorBackend::new(anchor.clone()).with_sender(test_attestor(7));
    let mut client = client(backend, Default::default());
    client.start_session().await.unwrap();
    client.set_value(b"k", None).unwrap();
    assert_eq!(client.commit().await, Err(ClientError::SignerNotConfigured));
    assert!(client.session().has_pending_work());
}

/// Accounts without the attestor role are refused.
#[tokio::test]
async fn test_unauthorized_attestor() {
    let (anchor, _) = native_anchor();
    let backend = AnchorBackend::new(anchor.clone()).with_attestor(test_attestor(5));
    let mut client = client(backend, Default::default());
    client.start_session().await.unwrap();
    client.set_value(b"k", None).unwrap();
    assert!(matches!(
        client.commit().await,
        Err(ClientError::Submission(_))
    ));
}

/// The ABI flavour stores 32-byte words and drives the same protocol.
#[tokio::test]
async fn test_abi_flavour_end_to_end() {
    let admin = test_attestor(1);
    let (anchor, admin) = deploy(Anchor::new(
        admin.account_id(),
        Arc::new(AbiTypeCoder),
        AnchorConfig::default(),
    ));
    let backend = AbiAnchorBackend::new(attestor_backend(&anchor, &admin, 2));
    let mut client = client(backend, Default::default());

    client.start_session().await.unwrap();
    let mut count = 0;
    while let Some(message) = client.poll_message().await.unwrap() {
        client.add_action(message).unwrap();
        count += 1;
    }
    assert_eq!(count, 3);
    client.set_boolean(b"flag", true).unwrap();
    client.commit().await.unwrap();

    let anchor = anchor.lock();
    let head = anchor.get_value(&anchor.config().keys.queue_head).unwrap();
    assert_eq!(head.len(), 32);
    assert_eq!(AbiTypeCoder.decode_index(&head, IntType::U32).unwrap(), 4);
    let version = anchor.get_value(&anchor.config().keys.version).unwrap();
    assert_eq!(AbiTypeCoder.decode_index(&version, IntType::U32).unwrap(), 1);
    assert_eq!(anchor.get_value(b"flag").unwrap()[31], 1);
    assert_eq!(anchor.replies().len(), 3);
}

/// ABI meta-transactions translate back to native batches before signing.
#[tokio::test]
async fn test_abi_flavour_meta_transaction() {
    let admin = test_attestor(1);
    let (anchor, admin) = deploy(Anchor::new(
        admin.account_id(),
        Arc::new(AbiTypeCoder),
        AnchorConfig::default(),
    ));
    let backend = AbiAnchorBackend::new(
        attestor_backend(&anchor, &admin, 2).with_sender(test_attestor(7)),
    );
    let mut client = client(backend, Default::default());
    client.start_session().await.unwrap();
    client.poll_message().await.unwrap();
    client.commit().await.unwrap();
    assert_eq!(anchor.lock().nonce(test_attestor(2).account_id()), 1);
    assert_eq!(anchor.lock().queue_head().unwrap(), 2);
}
