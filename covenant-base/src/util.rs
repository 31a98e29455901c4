// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Template hashing
use bitcoin::consensus::encode::serialize;
use bitcoin::hashes::sha256;
use bitcoin::hashes::{Hash, HashEngine};
use bitcoin::util::amount::Amount;

/// Any type which can generate a CTVHash.
pub trait CTVHash {
    /// Uses BIP-119 Logic to compute a CTV Hash
    fn get_ctv_hash(&self, input_index: u32) -> sha256::Hash;
    /// Gets the total amount a transaction creates in outputs. Saturates
    /// rather than wrapping.
    fn total_amount(&self) -> Amount;
}

impl CTVHash for bitcoin::Transaction {
    fn get_ctv_hash(&self, input_index: u32) -> sha256::Hash {
        let mut ctv_hash = sha256::Hash::engine();
        ctv_hash.input(&serialize(&self.version));
        ctv_hash.input(&serialize(&self.lock_time));
        // scriptSigs are always empty for templates, so their hash is omitted
        ctv_hash.input(&serialize(&(self.input.len() as u32)));
        {
            let mut enc = sha256::Hash::engine();
            for seq in self.input.iter().map(|i| i.sequence) {
                enc.input(&serialize(&seq));
            }
            ctv_hash.input(&sha256::Hash::from_engine(enc).into_inner());
        }
        ctv_hash.input(&serialize(&(self.output.len() as u32)));
        {
            let mut enc = sha256::Hash::engine();
            for out in self.output.iter() {
                enc.input(&serialize(out));
            }
            ctv_hash.input(&sha256::Hash::from_engine(enc).into_inner());
        }
        ctv_hash.input(&serialize(&input_index));
        sha256::Hash::from_engine(ctv_hash)
    }

    fn total_amount(&self) -> Amount {
        Amount::from_sat(
            self.output
                .iter()
                .fold(0u64, |a, b| a.saturating_add(b.value)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::{OutPoint, Script, Transaction, TxIn, TxOut, Witness};

    fn tx(sequence: u32, value: u64) -> Transaction {
        Transaction {
            version: 2,
            lock_time: 0,
            input: vec![TxIn {
                previous_output: OutPoint::default(),
                script_sig: Script::new(),
                sequence,
                witness: Witness::default(),
            }],
            output: vec![TxOut {
                value,
                script_pubkey: Script::new(),
            }],
        }
    }

    #[test]
    fn hash_commits_to_sequence_and_outputs() {
        let base = tx(0, 100).get_ctv_hash(0);
        assert_eq!(base, tx(0, 100).get_ctv_hash(0));
        assert_ne!(base, tx(1, 100).get_ctv_hash(0));
        assert_ne!(base, tx(0, 101).get_ctv_hash(0));
        assert_ne!(base, tx(0, 100).get_ctv_hash(1));
    }

    #[test]
    fn total() {
        assert_eq!(tx(0, 100).total_amount(), Amount::from_sat(100));
    }
}
