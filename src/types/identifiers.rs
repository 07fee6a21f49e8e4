use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

const ADDRESS_BYTES: usize = 20;

/// Address of a deployed contract instance: 40 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractAddress(String);

impl ContractAddress {
    /// Derives the address from the kind and a deployment salt.
    #[must_use]
    pub fn derive(kind: &ContractKind, salt: &Uuid) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.value().as_bytes());
        hasher.update(b":");
        hasher.update(salt.as_bytes());
        let digest = hasher.finalize();

        Self(
            digest
                .iter()
                .take(ADDRESS_BYTES)
                .map(|byte| format!("{byte:02x}"))
                .collect(),
        )
    }

    /// # Errors
    /// Returns a description of the problem when `raw` is not 40 hex characters.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim().trim_start_matches("0x").to_ascii_lowercase();
        if trimmed.len() != ADDRESS_BYTES * 2 {
            return Err(format!(
                "expected {} hex characters, got {}",
                ADDRESS_BYTES * 2,
                trimmed.len()
            ));
        }
        if !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("'{raw}' contains non-hex characters"));
        }
        Ok(Self(trimmed))
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ContractAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContractAddress> for String {
    fn from(address: ContractAddress) -> Self {
        address.0
    }
}

/// Name under which a contract type is registered with the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractKind(String);

impl ContractKind {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
