//! 32-byte identifiers for accounts, farms and tokens.
//!
//! All identifiers render as lowercase hex and serialize as hex strings.
//! `from_label` derives a stable identifier from a human readable label with
//! BLAKE3, which is how tests, simulations and hosts without their own
//! addressing scheme name things.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of raw bytes in every identifier.
pub const ID_BYTES: usize = 32;

/// Errors that can occur when parsing an identifier string.
#[derive(Debug, thiserror::Error)]
pub enum IdParseError {
    #[error("identifier must be {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("identifier is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

fn decode_id(value: &str) -> Result<[u8; ID_BYTES], IdParseError> {
    if value.len() != ID_BYTES * 2 {
        return Err(IdParseError::InvalidLength {
            expected: ID_BYTES * 2,
            actual: value.len(),
        });
    }
    let mut bytes = [0u8; ID_BYTES];
    hex::decode_to_slice(value, &mut bytes)?;
    Ok(bytes)
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $domain:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub [u8; ID_BYTES]);

        impl $name {
            /// Derive an identifier from a label. Distinct identifier kinds
            /// never collide for the same label.
            pub fn from_label(label: &str) -> Self {
                let mut hasher = blake3::Hasher::new();
                hasher.update($domain.as_bytes());
                hasher.update(label.as_bytes());
                Self(*hasher.finalize().as_bytes())
            }

            pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
                &self.0
            }
        }

        impl From<[u8; ID_BYTES]> for $name {
            fn from(value: [u8; ID_BYTES]) -> Self {
                Self(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                hex::encode(value.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                decode_id(&value).map(Self)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                decode_id(value).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Short form keeps logs readable.
                write!(f, "{}({}…)", stringify!($name), &hex::encode(&self.0[..4]))
            }
        }
    };
}

define_id!(
    /// A holder of balances.
    AccountId,
    "drip.account:"
);
define_id!(
    /// A reward distribution unit.
    FarmId,
    "drip.farm:"
);
define_id!(
    /// A fungible token tracked by a token ledger.
    TokenId,
    "drip.token:"
);

impl FarmId {
    /// The account under which a farm holds its tokens.
    pub fn account(&self) -> AccountId {
        AccountId(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_deterministic_and_domain_separated() {
        assert_eq!(AccountId::from_label("alice"), AccountId::from_label("alice"));
        assert_ne!(AccountId::from_label("alice"), AccountId::from_label("bob"));
        assert_ne!(
            AccountId::from_label("x").0,
            FarmId::from_label("x").0,
            "farm and account ids must not collide"
        );
    }

    #[test]
    fn display_parses_back() {
        let token = TokenId::from_label("reward");
        let parsed: TokenId = token.to_string().parse().unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(matches!(
            "abcd".parse::<AccountId>(),
            Err(IdParseError::InvalidLength { expected: 64, actual: 4 })
        ));
        let bad = "zz".repeat(ID_BYTES);
        assert!(matches!(
            bad.parse::<AccountId>(),
            Err(IdParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn serializes_as_hex_string() {
        let farm = FarmId::from_label("farm-1");
        let json = serde_json::to_string(&farm).unwrap();
        assert_eq!(json, format!("\"{}\"", farm));
    }

    #[test]
    fn farm_account_shares_bytes() {
        let farm = FarmId::from_label("farm-1");
        assert_eq!(farm.account().0, farm.0);
    }
}
