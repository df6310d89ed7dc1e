use tempfile::TempDir;
use test_case::test_case;
use watchtower_common::{
    BlockHash, BlockPoint, CardanoBlock, Tx, TxHash, TxInput, TxInputOutput, TxOutput,
};
use watchtower_module_confirmed_store::{ConfirmedStore, StoreBackend, StoreConfig};

struct TestState {
    #[allow(unused)]
    dir: TempDir,
    store: ConfirmedStore,
}

fn init_state(backend: StoreBackend) -> TestState {
    let dir = tempfile::tempdir().unwrap();
    let config = match backend {
        StoreBackend::Fjall => StoreConfig::fjall(dir.path().join("db")),
        StoreBackend::Memory => StoreConfig::memory(),
    };
    let store = ConfirmedStore::open(&config).unwrap();
    TestState { dir, store }
}

fn block(slot: u64) -> CardanoBlock {
    CardanoBlock {
        slot,
        number: slot / 10,
        hash: BlockHash::new([slot as u8; 32]),
        era_id: 6,
        tx_hashes: vec![],
    }
}

fn tx(slot: u64, index_in_block: u32) -> Tx {
    Tx {
        block_slot: slot,
        block_hash: BlockHash::new([slot as u8; 32]),
        index_in_block,
        hash: TxHash::new([(slot as u8).wrapping_add(index_in_block as u8); 32]),
        fee: 170_000,
        is_valid: true,
        ..Default::default()
    }
}

fn utxo(hash_byte: u8, index: u32, slot: u64, address: &str) -> TxInputOutput {
    TxInputOutput::new(
        TxInput::new(TxHash::new([hash_byte; 32]), index),
        TxOutput {
            slot,
            ..TxOutput::new(address, 2_000_000)
        },
    )
}

#[test_case(StoreBackend::Memory ; "memory")]
#[test_case(StoreBackend::Fjall ; "fjall")]
fn empty_store_has_no_latest_point(backend: StoreBackend) {
    let state = init_state(backend);
    assert_eq!(state.store.latest_point().unwrap(), None);
    assert!(state.store.latest_confirmed_blocks(10).unwrap().is_empty());
    assert!(state.store.unprocessed_confirmed_txs(10).unwrap().is_empty());
}

#[test_case(StoreBackend::Memory ; "memory")]
#[test_case(StoreBackend::Fjall ; "fjall")]
fn latest_point_is_overwritten(backend: StoreBackend) {
    let state = init_state(backend);
    let first = BlockPoint::new(10, BlockHash::new([10; 32]), 1);
    let second = BlockPoint::new(11, BlockHash::new([11; 32]), 2);

    state.store.batch().set_latest_point(first).execute().unwrap();
    state.store.batch().set_latest_point(second).execute().unwrap();

    assert_eq!(state.store.latest_point().unwrap(), Some(second));
}

#[test_case(StoreBackend::Memory ; "memory")]
#[test_case(StoreBackend::Fjall ; "fjall")]
fn unknown_output_is_zero_valued(backend: StoreBackend) {
    let state = init_state(backend);
    let output = state.store.tx_output(&TxInput::new(TxHash::new([1; 32]), 0)).unwrap();
    assert!(output.is_unknown());
    assert_eq!(output, TxOutput::default());
}

#[test_case(StoreBackend::Memory ; "memory")]
#[test_case(StoreBackend::Fjall ; "fjall")]
fn block_scans_are_ordered(backend: StoreBackend) {
    let state = init_state(backend);
    let mut batch = state.store.batch();
    for slot in [40, 10, 30, 20, 300] {
        batch.add_confirmed_block(block(slot));
    }
    batch.execute().unwrap();

    let slots = |blocks: Vec<CardanoBlock>| blocks.iter().map(|b| b.slot).collect::<Vec<_>>();

    assert_eq!(slots(state.store.latest_confirmed_blocks(3).unwrap()), vec![300, 40, 30]);
    assert_eq!(slots(state.store.latest_confirmed_blocks(100).unwrap()), vec![300, 40, 30, 20, 10]);
    assert_eq!(slots(state.store.confirmed_blocks_from(20, 2).unwrap()), vec![20, 30]);
    assert_eq!(slots(state.store.confirmed_blocks_from(25, 10).unwrap()), vec![30, 40, 300]);
    assert!(state.store.confirmed_blocks_from(301, 10).unwrap().is_empty());
    assert!(state.store.latest_confirmed_blocks(0).unwrap().is_empty());
}

#[test_case(StoreBackend::Memory ; "memory")]
#[test_case(StoreBackend::Fjall ; "fjall")]
fn txs_move_from_unprocessed_to_processed(backend: StoreBackend) {
    let state = init_state(backend);
    state
        .store
        .batch()
        .add_confirmed_txs(vec![tx(20, 1), tx(10, 0), tx(20, 0)])
        .execute()
        .unwrap();

    let pending = state.store.unprocessed_confirmed_txs(usize::MAX).unwrap();
    let order: Vec<(u64, u32)> = pending.iter().map(|t| (t.block_slot, t.index_in_block)).collect();
    assert_eq!(order, vec![(10, 0), (20, 0), (20, 1)]);

    let first_two = state.store.unprocessed_confirmed_txs(2).unwrap();
    state.store.mark_confirmed_txs_processed(&first_two).unwrap();

    assert_eq!(state.store.unprocessed_confirmed_txs(10).unwrap(), vec![tx(20, 1)]);
    assert_eq!(state.store.processed_confirmed_txs(10).unwrap(), first_two);
}

#[test_case(StoreBackend::Memory ; "memory")]
#[test_case(StoreBackend::Fjall ; "fjall")]
fn outputs_by_address_are_filtered_and_sorted(backend: StoreBackend) {
    let state = init_state(backend);
    state
        .store
        .batch()
        .add_tx_outputs(vec![
            utxo(9, 0, 50, "addr_a"),
            utxo(2, 1, 40, "addr_a"),
            utxo(2, 0, 40, "addr_a"),
            utxo(1, 0, 50, "addr_a"),
            utxo(3, 0, 10, "addr_b"),
        ])
        .remove_tx_outputs(vec![TxInput::new(TxHash::new([9; 32]), 0)], true)
        .execute()
        .unwrap();

    let all = state.store.all_tx_outputs("addr_a", false).unwrap();
    let keys: Vec<(u64, u8, u32)> =
        all.iter().map(|io| (io.output.slot, io.input.hash[0], io.input.index)).collect();
    assert_eq!(keys, vec![(40, 2, 0), (40, 2, 1), (50, 1, 0), (50, 9, 0)]);
    assert!(all[3].output.is_used);

    let unused = state.store.all_tx_outputs("addr_a", true).unwrap();
    assert_eq!(unused.len(), 3);
    assert!(unused.iter().all(|io| !io.output.is_used));

    assert!(state.store.all_tx_outputs("addr_c", false).unwrap().is_empty());
}

#[test]
fn fjall_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::fjall(dir.path().join("db"));
    let point = BlockPoint::new(77, BlockHash::new([7; 32]), 7);
    {
        let store = ConfirmedStore::open(&config).unwrap();
        store.batch().set_latest_point(point).add_confirmed_block(block(77)).execute().unwrap();
        store.close().unwrap();
    }
    let store = ConfirmedStore::open(&config).unwrap();
    assert_eq!(store.latest_point().unwrap(), Some(point));
    assert_eq!(store.latest_confirmed_blocks(1).unwrap(), vec![block(77)]);
}
