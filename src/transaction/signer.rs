//! Transaction Signer
//!
//! Signs every input of a spend with one private key (legacy P2PKH,
//! SIGHASH_ALL). Each input is signed against the locking script recorded
//! for it in the snapshot.

use bitcoin::{
    hashes::Hash,
    key::{PrivateKey, PublicKey},
    script::{Builder, PushBytesBuf},
    secp256k1::{self, Message, Secp256k1, SecretKey},
    sighash::{EcdsaSighashType, SighashCache},
    Address, Network, ScriptBuf, Transaction,
};

use crate::common::WalletError;
use crate::transaction::builder::UnsignedTx;

/// Single-key signer
pub struct SingleKeySigner {
    key: PrivateKey,
    public_key: PublicKey,
    secp: Secp256k1<secp256k1::All>,
}

impl SingleKeySigner {
    /// Create from a private key
    pub fn new(key: PrivateKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = key.public_key(&secp);
        Self {
            key,
            public_key,
            secp,
        }
    }

    /// Create from a WIF string
    pub fn from_wif(wif: &str) -> Result<Self, SignerError> {
        let key = PrivateKey::from_wif(wif).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::new(key))
    }

    /// Create from a 32-byte hex secret (compressed public key)
    pub fn from_hex(hex: &str, network: Network) -> Result<Self, SignerError> {
        let bytes = hex::decode(hex).map_err(|e| SignerError::InvalidKey(e.to_string()))?;

        if bytes.len() != 32 {
            return Err(SignerError::InvalidKey("key must be 32 bytes".to_string()));
        }

        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::new(PrivateKey::new(secret_key, network)))
    }

    /// Parse a key given either as WIF or as hex
    pub fn parse(encoded: &str, network: Network) -> Result<Self, SignerError> {
        let encoded = encoded.trim();
        Self::from_wif(encoded).or_else(|_| Self::from_hex(encoded, network))
    }

    /// Generate a new random signer
    pub fn generate(network: Network) -> Self {
        let secret_key = SecretKey::new(&mut secp256k1::rand::thread_rng());
        Self::new(PrivateKey::new(secret_key, network))
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// P2PKH locking script controlled by this key
    pub fn script_pubkey(&self) -> ScriptBuf {
        ScriptBuf::new_p2pkh(&self.public_key.pubkey_hash())
    }

    /// P2PKH address controlled by this key
    pub fn address(&self, network: Network) -> Address {
        Address::p2pkh(self.public_key.pubkey_hash(), network)
    }

    /// Sign every input; fails if any input is not locked to this key
    pub fn sign(&self, unsigned: &UnsignedTx) -> Result<Transaction, SignerError> {
        let mut tx = unsigned.tx.clone();

        if unsigned.scripts.len() != tx.input.len() {
            return Err(SignerError::SigningFailed(format!(
                "{} inputs but {} locking scripts",
                tx.input.len(),
                unsigned.scripts.len()
            )));
        }

        let own_script = self.script_pubkey();

        for (i, script) in unsigned.scripts.iter().enumerate() {
            if *script != own_script {
                return Err(SignerError::KeyMismatch { input: i });
            }

            let sighash = SighashCache::new(&tx)
                .legacy_signature_hash(i, script, EcdsaSighashType::All.to_u32())
                .map_err(|e| SignerError::SigningFailed(e.to_string()))?;

            let msg = Message::from_digest(sighash.to_byte_array());
            let signature = bitcoin::ecdsa::Signature {
                signature: self.secp.sign_ecdsa(&msg, &self.key.inner),
                sighash_type: EcdsaSighashType::All,
            };

            let push = PushBytesBuf::try_from(signature.to_vec())
                .map_err(|e| SignerError::SigningFailed(e.to_string()))?;

            tx.input[i].script_sig = Builder::new()
                .push_slice(push)
                .push_key(&self.public_key)
                .into_script();
        }

        Ok(tx)
    }
}

/// Signer errors
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("input {input} is not locked to the signing key")]
    KeyMismatch { input: usize },
}

impl From<SignerError> for WalletError {
    fn from(err: SignerError) -> Self {
        WalletError::signing(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::builder::TxBuilder;
    use crate::types::InputSelection;
    use bitcoin::{OutPoint, Txid};
    use std::str::FromStr;

    const DEST: &str = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";

    fn unsigned_for(signer: &SingleKeySigner, scripts: Vec<ScriptBuf>) -> UnsignedTx {
        let txid =
            Txid::from_str("aa631d3cb0c98ada8ddb3ec82f23de2a948819e841a00ad740794837b7fbd7e9")
                .unwrap();
        let selection = InputSelection {
            inputs: (0..scripts.len() as u32)
                .map(|vout| OutPoint { txid, vout })
                .collect(),
            total_selected: 100_000_000 * scripts.len() as i64,
            scripts,
        };
        let source = signer.address(Network::Bitcoin).to_string();

        TxBuilder::new_mainnet()
            .build_spend(&source, DEST, 120_000_000, &selection)
            .unwrap()
    }

    #[test]
    fn test_signer_from_hex() {
        let hex = "0000000000000000000000000000000000000000000000000000000000000001";
        let signer = SingleKeySigner::from_hex(hex, Network::Bitcoin).unwrap();

        // Well-known address of the secret key 1 (compressed)
        assert_eq!(
            signer.address(Network::Bitcoin).to_string(),
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        );
    }

    #[test]
    fn test_parse_accepts_wif_and_hex() {
        let signer = SingleKeySigner::generate(Network::Bitcoin);
        let wif = signer.private_key().to_wif();

        let from_wif = SingleKeySigner::parse(&wif, Network::Bitcoin).unwrap();
        assert_eq!(from_wif.public_key(), signer.public_key());

        assert!(SingleKeySigner::parse("not a key", Network::Bitcoin).is_err());
        assert!(SingleKeySigner::from_hex("abcd", Network::Bitcoin).is_err());
    }

    #[test]
    fn test_signatures_verify_per_input() {
        let signer = SingleKeySigner::generate(Network::Bitcoin);
        let script = signer.script_pubkey();
        let unsigned = unsigned_for(&signer, vec![script.clone(), script.clone()]);

        let signed = signer.sign(&unsigned).unwrap();
        let secp = Secp256k1::verification_only();

        for (i, input) in signed.input.iter().enumerate() {
            let pushes: Vec<Vec<u8>> = input
                .script_sig
                .instructions()
                .map(|ins| ins.unwrap().push_bytes().unwrap().as_bytes().to_vec())
                .collect();
            assert_eq!(pushes.len(), 2);
            assert_eq!(pushes[1], signer.public_key().to_bytes());

            let sig = bitcoin::ecdsa::Signature::from_slice(&pushes[0]).unwrap();
            assert_eq!(sig.sighash_type, EcdsaSighashType::All);

            let sighash = SighashCache::new(&unsigned.tx)
                .legacy_signature_hash(i, &script, EcdsaSighashType::All.to_u32())
                .unwrap();
            let msg = Message::from_digest(sighash.to_byte_array());
            secp.verify_ecdsa(&msg, &sig.signature, &signer.public_key().inner)
                .unwrap();
        }

        // Signing only fills script_sigs
        assert_eq!(signed.output, unsigned.tx.output);
        assert_eq!(signed.input[0].previous_output, unsigned.tx.input[0].previous_output);
    }

    #[test]
    fn test_foreign_input_rejected() {
        let signer = SingleKeySigner::generate(Network::Bitcoin);
        let other = SingleKeySigner::generate(Network::Bitcoin);
        let unsigned = unsigned_for(&signer, vec![signer.script_pubkey(), other.script_pubkey()]);

        assert!(matches!(
            signer.sign(&unsigned),
            Err(SignerError::KeyMismatch { input: 1 })
        ));
    }
}
