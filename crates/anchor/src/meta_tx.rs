//! Meta-transactions: batches signed by an attestor, submitted by anyone.

use crate::{Anchor, AnchorError, AnchorEvent};
use rollup_codec::{sbor_decode, sbor_encode};
use rollup_types::{AccountId, Action, AttestorSignature, Hash, KvEntry, TxHash};
use sbor::prelude::*;
use tracing::debug;

pub type Nonce = u128;

/// Conditions, updates and actions of one rollup call.
pub type RollupBatch = (Vec<KvEntry>, Vec<KvEntry>, Vec<Action>);

/// A batch the attestor `from` asks the anchor `to` to run.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct ForwardRequest {
    pub from: AccountId,
    pub to: AccountId,
    pub nonce: Nonce,
    /// SBOR-encoded [`RollupBatch`].
    pub data: Vec<u8>,
}

impl ForwardRequest {
    /// Digest the attestor signs.
    pub fn digest(&self) -> Result<Hash, AnchorError> {
        Ok(Hash::from_bytes(&sbor_encode(self)?))
    }
}

impl Anchor {
    /// Next nonce expected from `account`.
    pub fn nonce(&self, account: AccountId) -> Nonce {
        self.nonces.get(&account).copied().unwrap_or(0)
    }

    /// Wrap `data` in a forward request carrying `from`'s current nonce.
    pub fn prepare(
        &self,
        from: AccountId,
        data: Vec<u8>,
    ) -> Result<(ForwardRequest, Hash), AnchorError> {
        let request = ForwardRequest {
            from,
            to: self.address,
            nonce: self.nonce(from),
            data,
        };
        let hash = request.digest()?;
        Ok((request, hash))
    }

    fn verify(
        &self,
        request: &ForwardRequest,
        signature: &AttestorSignature,
    ) -> Result<(), AnchorError> {
        if request.to != self.address {
            return Err(AnchorError::InvalidDestination);
        }
        let expected = self.nonce(request.from);
        if request.nonce != expected {
            return Err(AnchorError::NonceTooLow {
                expected,
                got: request.nonce,
            });
        }
        let digest = request.digest()?;
        signature
            .verify(digest.as_bytes())
            .map_err(|_| AnchorError::IncorrectSignature)?;
        if signature.signer() != request.from {
            return Err(AnchorError::PublicKeyNotMatch);
        }
        Ok(())
    }

    fn apply_meta_tx(
        &mut self,
        request: ForwardRequest,
        signature: &AttestorSignature,
    ) -> Result<TxHash, AnchorError> {
        self.verify(&request, signature)?;
        let next = request
            .nonce
            .checked_add(1)
            .ok_or(AnchorError::NonceOverflow)?;
        self.set_nonce(request.from, next);

        let (conditions, updates, actions): RollupBatch = sbor_decode(&request.data)
            .map_err(|e| AnchorError::FailedToDecode(e.to_string()))?;
        debug!(from = %request.from, nonce = request.nonce, "Meta transaction decoded");
        self.push_event(AnchorEvent::MetaTransactionDecoded);

        self.apply_rollup(request.from, conditions, updates, actions)
    }

    /// Verify, bump the nonce and run the batch as `request.from`.
    pub fn meta_tx_rollup_cond_eq(
        &mut self,
        request: ForwardRequest,
        signature: &AttestorSignature,
    ) -> Result<TxHash, AnchorError> {
        self.transact(|anchor| anchor.apply_meta_tx(request, signature))
    }

    /// Run a meta-transaction and discard its effects.
    pub fn dry_run_meta_tx(
        &mut self,
        request: ForwardRequest,
        signature: &AttestorSignature,
    ) -> Result<TxHash, AnchorError> {
        self.simulate(|anchor| anchor.apply_meta_tx(request, signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use rollup_types::test_utils::{key, test_attestor};

    fn setup() -> (Anchor, rollup_types::AttestorKey) {
        let admin = test_attestor(1);
        let attestor = test_attestor(2);
        let mut anchor = Anchor::native(admin.account_id());
        anchor
            .grant_role(admin.account_id(), Role::Attestor, attestor.account_id())
            .unwrap();
        (anchor, attestor)
    }

    fn batch() -> Vec<u8> {
        let batch: RollupBatch = (vec![], vec![(key("k"), Some(vec![1]))], vec![]);
        sbor_encode(&batch).unwrap()
    }

    #[test]
    fn test_signed_request_applies_and_bumps_nonce() {
        let (mut anchor, attestor) = setup();
        let (request, hash) = anchor.prepare(attestor.account_id(), batch()).unwrap();
        assert_eq!(request.nonce, 0);
        let sig = attestor.sign(hash.as_bytes());
        anchor.meta_tx_rollup_cond_eq(request, &sig).unwrap();
        assert_eq!(anchor.nonce(attestor.account_id()), 1);
        assert_eq!(anchor.get_value(b"k"), Some(vec![1]));
        assert!(anchor
            .events()
            .contains(&AnchorEvent::MetaTransactionDecoded));
    }

    #[test]
    fn test_replayed_request_rejected() {
        let (mut anchor, attestor) = setup();
        let (request, hash) = anchor.prepare(attestor.account_id(), batch()).unwrap();
        let sig = attestor.sign(hash.as_bytes());
        anchor.meta_tx_rollup_cond_eq(request.clone(), &sig).unwrap();
        assert_eq!(
            anchor.meta_tx_rollup_cond_eq(request, &sig),
            Err(AnchorError::NonceTooLow {
                expected: 1,
                got: 0
            })
        );
    }

    #[test]
    fn test_wrong_signer_rejected() {
        let (mut anchor, attestor) = setup();
        let intruder = test_attestor(9);
        let (request, hash) = anchor.prepare(attestor.account_id(), batch()).unwrap();
        let sig = intruder.sign(hash.as_bytes());
        assert_eq!(
            anchor.meta_tx_rollup_cond_eq(request.clone(), &sig),
            Err(AnchorError::PublicKeyNotMatch)
        );
        let mut forged = attestor.sign(hash.as_bytes());
        forged.signature[0] ^= 1;
        assert_eq!(
            anchor.meta_tx_rollup_cond_eq(request, &forged),
            Err(AnchorError::IncorrectSignature)
        );
        assert_eq!(anchor.nonce(attestor.account_id()), 0);
    }

    #[test]
    fn test_wrong_destination_rejected() {
        let (mut anchor, attestor) = setup();
        let (mut request, _) = anchor.prepare(attestor.account_id(), batch()).unwrap();
        request.to = AccountId([0; 32]);
        let sig = attestor.sign(request.digest().unwrap().as_bytes());
        assert_eq!(
            anchor.meta_tx_rollup_cond_eq(request, &sig),
            Err(AnchorError::InvalidDestination)
        );
    }

    #[test]
    fn test_undecodable_payload_keeps_nonce() {
        let (mut anchor, attestor) = setup();
        let (request, hash) = anchor.prepare(attestor.account_id(), vec![1, 2, 3]).unwrap();
        let sig = attestor.sign(hash.as_bytes());
        assert!(matches!(
            anchor.meta_tx_rollup_cond_eq(request, &sig),
            Err(AnchorError::FailedToDecode(_))
        ));
        assert_eq!(anchor.nonce(attestor.account_id()), 0);
    }

    #[test]
    fn test_dry_run_does_not_mutate() {
        let (mut anchor, attestor) = setup();
        let events = anchor.events().len();
        let (request, hash) = anchor.prepare(attestor.account_id(), batch()).unwrap();
        let sig = attestor.sign(hash.as_bytes());
        anchor.dry_run_meta_tx(request.clone(), &sig).unwrap();
        assert_eq!(anchor.nonce(attestor.account_id()), 0);
        assert_eq!(anchor.get_value(b"k"), None);
        assert_eq!(anchor.events().len(), events);
        assert_eq!(anchor.tx_count(), 0);

        anchor.meta_tx_rollup_cond_eq(request, &sig).unwrap();
        assert_eq!(anchor.nonce(attestor.account_id()), 1);
    }
}
