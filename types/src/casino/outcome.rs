use super::OUTCOME_RANGE;
use ethers_core::{
    types::{H256, U256},
    utils::keccak256,
};

/// Resolve the number a wager landed on.
///
/// The digest is `keccak256(seed || nonce)` with the nonce as two big-endian bytes (the packed
/// encoding of `(bytes32, uint16)`), read as a big-endian integer and reduced modulo 100. The
/// seed is the hash of the block the wager was included in.
pub fn resolve(seed: &H256, nonce: u16) -> u8 {
    let mut packed = [0u8; 34];
    packed[..32].copy_from_slice(seed.as_bytes());
    packed[32..].copy_from_slice(&nonce.to_be_bytes());
    let digest = U256::from_big_endian(&keccak256(packed));
    (digest % U256::from(OUTCOME_RANGE)).low_u32() as u8
}
