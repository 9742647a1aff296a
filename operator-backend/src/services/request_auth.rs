//! Wallet signatures over user requests
//!
//! Every state-changing user request is signed by the acting wallet over
//! `"VOLO_VAULT_REQUEST" || timestamp || action || fields`. The verified
//! wallet is the address the vault sees as caller.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use volo_vault::{Address, U256};

use crate::error::{BackendError, Result};

const REQUEST_PREFIX: &[u8] = b"VOLO_VAULT_REQUEST";

/// User action and the fields its signature commits to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Deposit {
        receipt_id: Option<Address>,
        amount: u64,
        expected_shares: U256,
    },
    CancelDeposit {
        request_id: u64,
    },
    Withdraw {
        receipt_id: Address,
        shares: U256,
        expected_amount: u64,
    },
    CancelWithdraw {
        request_id: u64,
    },
    TransferReceipt {
        receipt_id: Address,
        new_owner: Address,
    },
}

impl UserAction {
    fn tag(&self) -> &'static [u8] {
        match self {
            UserAction::Deposit { .. } => b"deposit",
            UserAction::CancelDeposit { .. } => b"cancel_deposit",
            UserAction::Withdraw { .. } => b"withdraw",
            UserAction::CancelWithdraw { .. } => b"cancel_withdraw",
            UserAction::TransferReceipt { .. } => b"transfer_receipt",
        }
    }

    fn encode_fields(&self, message: &mut Vec<u8>) {
        match self {
            UserAction::Deposit {
                receipt_id,
                amount,
                expected_shares,
            } => {
                // Zero address stands for "mint a new receipt"
                let receipt = receipt_id.map(Address::to_bytes).unwrap_or([0u8; 32]);
                message.extend_from_slice(&receipt);
                message.extend_from_slice(&amount.to_le_bytes());
                message.extend_from_slice(&u256_bytes(*expected_shares));
            }
            UserAction::CancelDeposit { request_id }
            | UserAction::CancelWithdraw { request_id } => {
                message.extend_from_slice(&request_id.to_le_bytes());
            }
            UserAction::Withdraw {
                receipt_id,
                shares,
                expected_amount,
            } => {
                message.extend_from_slice(receipt_id.as_ref());
                message.extend_from_slice(&u256_bytes(*shares));
                message.extend_from_slice(&expected_amount.to_le_bytes());
            }
            UserAction::TransferReceipt {
                receipt_id,
                new_owner,
            } => {
                message.extend_from_slice(receipt_id.as_ref());
                message.extend_from_slice(new_owner.as_ref());
            }
        }
    }
}

fn u256_bytes(value: U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

/// Request signature checks for the user surface
pub struct RequestVerifier;

impl RequestVerifier {
    /// Bytes the wallet signs for `action` at `timestamp` (unix seconds)
    pub fn request_message(action: &UserAction, timestamp: i64) -> Vec<u8> {
        let mut message = REQUEST_PREFIX.to_vec();
        message.extend_from_slice(&timestamp.to_le_bytes());
        message.extend_from_slice(action.tag());
        action.encode_fields(&mut message);
        message
    }

    /// Verify that `wallet` signed `action` at `timestamp`
    pub fn verify_request_signature(
        wallet: &Address,
        timestamp: i64,
        action: &UserAction,
        signature: &Signature,
    ) -> Result<()> {
        let pubkey = Pubkey::new_from_array(wallet.to_bytes());
        let message = Self::request_message(action, timestamp);

        if !signature.verify(pubkey.as_ref(), &message) {
            return Err(BackendError::InvalidSignature(
                "Request signature verification failed".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse a base64 signature
    pub fn parse_signature(s: &str) -> Result<Signature> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| BackendError::InvalidSignature(format!("Invalid base64: {e}")))?;

        let sig_bytes: [u8; 64] = bytes.as_slice().try_into().map_err(|_| {
            BackendError::InvalidSignature(format!(
                "Signature must be 64 bytes, got {}",
                bytes.len()
            ))
        })?;

        Ok(Signature::from(sig_bytes))
    }

    /// Reject requests signed outside the tolerance window
    pub fn validate_timestamp(timestamp: i64, tolerance_secs: i64) -> Result<()> {
        let now = Utc::now().timestamp();
        let diff = (now - timestamp).abs();

        if diff > tolerance_secs {
            return Err(BackendError::RequestExpired);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::{Keypair, Signer};

    fn wallet(keypair: &Keypair) -> Address {
        Address::new(keypair.pubkey().to_bytes())
    }

    fn transfer(new_owner: Address) -> UserAction {
        UserAction::TransferReceipt {
            receipt_id: Address::derive(&[b"receipt"]),
            new_owner,
        }
    }

    #[test]
    fn test_request_message_construction() {
        let timestamp = 1706500000i64;
        let action = transfer(Address::new([7; 32]));
        let message = RequestVerifier::request_message(&action, timestamp);

        assert!(message.starts_with(b"VOLO_VAULT_REQUEST"));
        assert_eq!(message.len(), 18 + 8 + 16 + 32 + 32); // prefix + timestamp + tag + ids
    }

    #[test]
    fn test_signature_round_trip() {
        let keypair = Keypair::new();
        let action = transfer(Address::new([7; 32]));
        let timestamp = Utc::now().timestamp();
        let signature =
            keypair.sign_message(&RequestVerifier::request_message(&action, timestamp));

        let encoded = STANDARD.encode(signature.as_ref());
        let parsed = RequestVerifier::parse_signature(&encoded).unwrap();
        assert!(RequestVerifier::verify_request_signature(
            &wallet(&keypair),
            timestamp,
            &action,
            &parsed
        )
        .is_ok());
    }

    #[test]
    fn test_signature_bound_to_wallet_and_fields() {
        let keypair = Keypair::new();
        let other = Keypair::new();
        let action = transfer(Address::new([7; 32]));
        let timestamp = 1706500000i64;
        let signature =
            keypair.sign_message(&RequestVerifier::request_message(&action, timestamp));

        // Someone else's wallet
        assert!(matches!(
            RequestVerifier::verify_request_signature(
                &wallet(&other),
                timestamp,
                &action,
                &signature
            ),
            Err(BackendError::InvalidSignature(_))
        ));
        // Redirected receipt
        assert!(matches!(
            RequestVerifier::verify_request_signature(
                &wallet(&keypair),
                timestamp,
                &transfer(wallet(&other)),
                &signature
            ),
            Err(BackendError::InvalidSignature(_))
        ));
        // Re-dated request
        assert!(matches!(
            RequestVerifier::verify_request_signature(
                &wallet(&keypair),
                timestamp + 1,
                &action,
                &signature
            ),
            Err(BackendError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_parse_signature_rejects_wrong_length() {
        assert!(matches!(
            RequestVerifier::parse_signature(&STANDARD.encode([1u8; 32])),
            Err(BackendError::InvalidSignature(_))
        ));
        assert!(matches!(
            RequestVerifier::parse_signature("not base64!"),
            Err(BackendError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_validate_timestamp_window() {
        let now = Utc::now().timestamp();
        assert!(RequestVerifier::validate_timestamp(now - 10, 300).is_ok());
        assert!(matches!(
            RequestVerifier::validate_timestamp(now - 3_600, 300),
            Err(BackendError::RequestExpired)
        ));
        assert!(matches!(
            RequestVerifier::validate_timestamp(now + 3_600, 300),
            Err(BackendError::RequestExpired)
        ));
    }
}
