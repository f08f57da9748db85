//! Batch initialization: prepare, upload the canopy, install a root.

mod common;

use account_compression::{
    AccountCompressionError, ChangeLogEvent, Context, InitPreparedTreeData, NoopSink, TreeConfig,
    account_size, current_root, events::Event, process_append_canopy_nodes,
    process_init_prepared_tree_with_root, process_prepare_batch, sequence_number,
};
use common::{AUTHORITY, RecordingSink, ReferenceTree, TREE_ID, TestTree, make_leaf};
use concurrent_merkle_tree::{ConcurrentMerkleTreeError, Node};
use light_hasher::Sha256;
use test_case::test_case;

const DEPTH: u32 = 5;
const BUFFER: u32 = 8;
const CANOPY: u32 = 2;

/// Off-chain tree of `count` leaves and its lowest canopy level.
fn off_chain_tree(count: u32) -> (ReferenceTree, Vec<Node>) {
    let mut reference = ReferenceTree::new(DEPTH as usize);
    for i in 0..count {
        reference.set(i, make_leaf(i as u64));
    }
    let canopy_level = (DEPTH - CANOPY) as usize;
    let last_position = ((count - 1) >> canopy_level) as usize;
    let nodes = (0..=last_position)
        .map(|position| reference.node(canopy_level, position))
        .collect();
    (reference, nodes)
}

fn prepared_account() -> Vec<u8> {
    let mut data = vec![0u8; account_size(DEPTH, BUFFER, CANOPY)];
    process_prepare_batch(
        Context::new(&mut data, &TREE_ID, &AUTHORITY, &mut NoopSink),
        TreeConfig::new(DEPTH, BUFFER, CANOPY),
        0,
    )
    .unwrap();
    data
}

fn upload(data: &mut [u8], start_index: u32, nodes: &[Node]) -> Result<(), AccountCompressionError> {
    process_append_canopy_nodes::<Sha256>(
        Context::new(data, &TREE_ID, &AUTHORITY, &mut NoopSink),
        start_index,
        nodes,
    )
}

fn init_with_root(
    data: &mut [u8],
    sink: &mut RecordingSink,
    reference: &ReferenceTree,
    rightmost_index: u32,
) -> Result<(), AccountCompressionError> {
    let mut proof = reference.proof(rightmost_index);
    proof.truncate((DEPTH - CANOPY) as usize);
    process_init_prepared_tree_with_root::<Sha256>(
        Context::new(data, &TREE_ID, &AUTHORITY, sink),
        InitPreparedTreeData {
            root: reference.root(),
            rightmost_leaf: reference.leaf(rightmost_index),
            rightmost_index,
            proof: &proof,
        },
    )
}

#[test_case(1 ; "single leaf")]
#[test_case(20 ; "partial tree")]
#[test_case(32 ; "full tree")]
fn test_batch_init_then_mutate(count: u32) {
    let (reference, canopy_nodes) = off_chain_tree(count);
    let mut data = prepared_account();

    // Upload in two chunks
    let split = canopy_nodes.len() / 2;
    upload(&mut data, 0, &canopy_nodes[..split]).unwrap();
    upload(&mut data, split as u32, &canopy_nodes[split..]).unwrap();

    let mut sink = RecordingSink::default();
    init_with_root(&mut data, &mut sink, &reference, count - 1).unwrap();
    assert_eq!(current_root(&data).unwrap(), reference.root());
    assert_eq!(sequence_number(&data).unwrap(), 0);

    let event = ChangeLogEvent::from_event_bytes(&sink.events[0].1).unwrap();
    assert_eq!(event.root, reference.root());
    assert_eq!(event.index, count - 1);

    // The installed tree behaves like one built leaf by leaf
    let mut tree = TestTree {
        config: TreeConfig::new(DEPTH, BUFFER, CANOPY),
        data,
        reference,
        sink,
        next: count,
    };
    if count < 32 {
        tree.append(make_leaf(100)).unwrap();
    } else {
        assert_eq!(
            tree.append(make_leaf(100)),
            Err(ConcurrentMerkleTreeError::TreeFull.into())
        );
    }
    tree.replace_fresh(0, make_leaf(200)).unwrap();
    assert_eq!(current_root(&tree.data).unwrap(), tree.reference.root());
}

#[test]
fn test_canopy_root_mismatch() {
    let (reference, mut canopy_nodes) = off_chain_tree(20);
    canopy_nodes[0] = make_leaf(999);
    let mut data = prepared_account();
    upload(&mut data, 0, &canopy_nodes).unwrap();
    let before = data.clone();

    assert_eq!(
        init_with_root(&mut data, &mut RecordingSink::default(), &reference, 19),
        Err(AccountCompressionError::CanopyRootMismatch)
    );
    assert_eq!(data, before);
}

#[test]
fn test_canopy_nodes_right_of_rightmost_leaf() {
    let (reference, _) = off_chain_tree(20);
    let mut data = prepared_account();

    // Upload the whole lowest level, including the empty subtree after leaf 19
    let full_level: Vec<Node> = (0..4).map(|position| reference.node(3, position)).collect();
    upload(&mut data, 0, &full_level).unwrap();

    assert_eq!(
        init_with_root(&mut data, &mut RecordingSink::default(), &reference, 19),
        Err(AccountCompressionError::CanopyRightmostLeafMismatch)
    );
}

#[test]
fn test_upload_past_canopy_end() {
    let mut data = prepared_account();
    assert_eq!(
        upload(&mut data, 3, &[make_leaf(0), make_leaf(1)]),
        Err(AccountCompressionError::CanopyLengthMismatch)
    );
}

#[test]
fn test_batch_steps_require_authority() {
    let (_, canopy_nodes) = off_chain_tree(8);
    let mut data = prepared_account();
    assert_eq!(
        process_append_canopy_nodes::<Sha256>(
            Context::new(&mut data, &TREE_ID, &[3u8; 32], &mut NoopSink),
            0,
            &canopy_nodes,
        ),
        Err(AccountCompressionError::Unauthorized)
    );
}

#[test]
fn test_upload_after_init_rejected() {
    let (reference, canopy_nodes) = off_chain_tree(8);
    let mut data = prepared_account();
    upload(&mut data, 0, &canopy_nodes).unwrap();
    init_with_root(&mut data, &mut RecordingSink::default(), &reference, 7).unwrap();

    assert_eq!(
        upload(&mut data, 0, &canopy_nodes),
        Err(AccountCompressionError::TreeAlreadyInitialized)
    );
}
