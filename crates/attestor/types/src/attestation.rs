use alloy_primitives::{B256, hex};
use serde::{Deserialize, Serialize};

/// Execution block number the attestation refers to.
pub type Slot = u64;

/// Committee the attester is assigned to for the slot.
pub type CommitteeIndex = u64;

/// Attestation over the receipts root of one execution block.
///
/// Field order matters: the serialized form is the signing pre-image and the
/// consensus side verifies signatures over `serde_json::to_vec` of its own
/// copy of this struct.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttestationData {
    pub slot: Slot,
    pub committee_index: CommitteeIndex,
    pub receipts_root: B256,
}

impl AttestationData {
    pub fn new(slot: Slot, committee_index: CommitteeIndex, receipts_root: B256) -> Self {
        Self {
            slot,
            committee_index,
            receipts_root,
        }
    }

    /// Returns the canonical signing bytes:
    /// `{"slot":<u64>,"committee_index":<u64>,"receipts_root":"0x<64 lowercase hex>"}`.
    ///
    /// Written out explicitly instead of going through serde so the pre-image
    /// cannot drift with serializer settings.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        format!(
            r#"{{"slot":{},"committee_index":{},"receipts_root":"{}"}}"#,
            self.slot,
            self.committee_index,
            hex::encode_prefixed(self.receipts_root),
        )
        .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::b256;

    use super::*;

    const EMPTY_ROOT: B256 =
        b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");

    #[test]
    fn canonical_bytes_exact_layout() {
        let att = AttestationData::new(2, 3, EMPTY_ROOT);
        assert_eq!(
            String::from_utf8(att.canonical_bytes()).unwrap(),
            r#"{"slot":2,"committee_index":3,"receipts_root":"0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"}"#
        );
    }

    #[test]
    fn canonical_bytes_match_serde_json() {
        let atts = [
            AttestationData::default(),
            AttestationData::new(u64::MAX, 0, B256::repeat_byte(0xAB)),
            AttestationData::new(1_234_567, 42, EMPTY_ROOT),
        ];
        for att in atts {
            assert_eq!(att.canonical_bytes(), serde_json::to_vec(&att).unwrap());
        }
    }

    #[test]
    fn canonical_bytes_are_lowercase_and_whitespace_free() {
        let att = AttestationData::new(7, 9, B256::repeat_byte(0xCD));
        let bytes = att.canonical_bytes();
        let text = std::str::from_utf8(&bytes).unwrap();

        assert!(!text.chars().any(char::is_whitespace));
        assert!(!text.chars().any(|c| c.is_ascii_uppercase()));
        assert_eq!(bytes, att.canonical_bytes());

        let slot = text.find("\"slot\"").unwrap();
        let committee = text.find("\"committee_index\"").unwrap();
        let root = text.find("\"receipts_root\"").unwrap();
        assert!(slot < committee && committee < root);
    }
}
