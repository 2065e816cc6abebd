/// Transaction types for RelayChain
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// A value transfer between two identities.
///
/// Transactions are created by a wallet and passed by value through the
/// coordinator and producers. The `signature` is carried opaquely; nothing in
/// this crate verifies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: String,
    pub to: String,
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Transaction {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: f64) -> Self {
        Transaction {
            from: from.into(),
            to: to.into(),
            amount,
            signature: None,
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Feed this transaction's canonical encoding into a block hasher.
    pub(crate) fn hash_into(&self, hasher: &mut Sha256) {
        update_str(hasher, &self.from);
        update_str(hasher, &self.to);
        hasher.update(self.amount.to_le_bytes());
        match &self.signature {
            Some(sig) => {
                hasher.update([1u8]);
                update_str(hasher, sig);
            }
            None => hasher.update([0u8]),
        }
    }
}

/// Length-prefixed UTF-8 so adjacent strings can never run together.
pub(crate) fn update_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

/// Wallet forms submit the amount either as a number or as a numeric string.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AmountRepr {
        Number(f64),
        Text(String),
    }

    let amount = match AmountRepr::deserialize(deserializer)? {
        AmountRepr::Number(n) => n,
        AmountRepr::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid amount {:?}: {}", s, e)))?,
    };
    // JSON cannot carry NaN or infinities; they would be relayed as null.
    if !amount.is_finite() {
        return Err(serde::de::Error::custom(format!("amount must be finite, got {}", amount)));
    }
    Ok(amount)
}
