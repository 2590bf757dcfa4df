
use test_helpers::{new_wallet, open_chain, reindexed_utxo_set, temp_dir};
use utxo_chain::chain::utxo_set::spend;
use utxo_chain::chain::{Block, Transaction};
use utxo_chain::wallet::get_pub_key_hash;

#[test]
fn genesis_balance_goes_entirely_to_the_genesis_address() {
    let dir = temp_dir();
    let wallet = new_wallet();
    let address = wallet.get_address().unwrap();

    let blockchain = open_chain(dir.path(), &address);
    let utxo_set = reindexed_utxo_set(dir.path(), &blockchain);

    let pub_key_hash = get_pub_key_hash(&address).unwrap();
    assert_eq!(utxo_set.get_balance(&pub_key_hash).unwrap(), 500);
    assert_eq!(blockchain.best_number(), 0);
}

#[test]
fn simple_transfer_moves_balance_after_mining() {
    let dir = temp_dir();
    let sender = new_wallet();
    let sender_address = sender.get_address().unwrap();
    let receiver_address = new_wallet().get_address().unwrap();

    let blockchain = open_chain(dir.path(), &sender_address);
    let utxo_set = reindexed_utxo_set(dir.path(), &blockchain);

    let tx = spend(&utxo_set, &sender, &sender_address, &receiver_address, 100, &blockchain)
        .expect("build spend transaction");
    assert!(blockchain.verify_transaction(&tx).expect("verify"));

    let coinbase =
        Transaction::new_coinbase(&sender_address, blockchain.reward(), b"block 1").unwrap();
    let block = blockchain
        .mine_block(vec![tx, coinbase], &sender_address)
        .expect("mine block");
    utxo_set.update(&block).expect("update utxo set");

    let sender_hash = get_pub_key_hash(&sender_address).unwrap();
    let receiver_hash = get_pub_key_hash(&receiver_address).unwrap();
    assert_eq!(utxo_set.get_balance(&receiver_hash).unwrap(), 100);
    assert_eq!(utxo_set.get_balance(&sender_hash).unwrap(), 900);
    assert_eq!(blockchain.best_number(), 1);
}

#[test]
fn spend_beyond_balance_is_rejected_before_mining() {
    let dir = temp_dir();
    let sender = new_wallet();
    let sender_address = sender.get_address().unwrap();
    let receiver_address = new_wallet().get_address().unwrap();

    let blockchain = open_chain(dir.path(), &sender_address);
    let utxo_set = reindexed_utxo_set(dir.path(), &blockchain);

    let result = spend(
        &utxo_set,
        &sender,
        &sender_address,
        &receiver_address,
        10_000,
        &blockchain,
    );
    assert!(result.is_err());
}

#[test]
fn mined_block_is_valid_and_byte_level_tampering_is_detected() {
    let dir = temp_dir();
    let address = new_wallet().get_address().unwrap();
    let blockchain = open_chain(dir.path(), &address);

    let coinbase = Transaction::new_coinbase(&address, blockchain.reward(), b"test").unwrap();
    let block = blockchain.mine_block(vec![coinbase], &address).unwrap();
    assert!(block.is_valid().unwrap());

    let mut bytes = block.serialize().unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xff;

    let tampered_is_valid = match Block::deserialize(&bytes) {
        Ok(tampered) => tampered.is_valid().unwrap_or(false),
        Err(_) => false,
    };
    assert!(!tampered_is_valid);
}

#[test]
fn utxo_index_survives_a_restart() {
    let dir = temp_dir();
    let address = new_wallet().get_address().unwrap();

    {
        let blockchain = open_chain(dir.path(), &address);
        let utxo_set = reindexed_utxo_set(dir.path(), &blockchain);
        let coinbase = Transaction::new_coinbase(&address, blockchain.reward(), b"test").unwrap();
        let block = blockchain.mine_block(vec![coinbase], &address).unwrap();
        utxo_set.update(&block).unwrap();
    }

    let blockchain = open_chain(dir.path(), &address);
    let utxo_set = reindexed_utxo_set(dir.path(), &blockchain);
    let pub_key_hash = get_pub_key_hash(&address).unwrap();
    assert_eq!(blockchain.best_number(), 1);
    assert_eq!(utxo_set.get_balance(&pub_key_hash).unwrap(), 1000);
}
