//! # Claim Table
//!
//! The static mapping from a relying party's claim to the circuit family that
//! proves it. The prover, the verifier and the token protocol all read this
//! table; none of them keeps its own copy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ZkidError;

/// Circuit families with built artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitId {
    /// Birth timestamp at least `threshold` years before the current timestamp.
    AgeVerification,
    /// Membership of a `(hashed_id, district)` leaf in a registry Merkle tree.
    CitizenshipMembership,
}

impl CircuitId {
    pub const ALL: [CircuitId; 2] = [CircuitId::AgeVerification, CircuitId::CitizenshipMembership];

    /// Stable identifier, also the artifact directory name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgeVerification => "age_verification",
            Self::CitizenshipMembership => "citizenship_membership",
        }
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitId {
    type Err = ZkidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ZkidError::UnknownIdentifier(format!("circuit {s:?}")))
    }
}

/// Claims a relying party can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    AgeOver16,
    AgeOver18,
    AgeOver21,
    Citizenship,
}

/// Every supported claim, in table order.
pub const CLAIM_TYPES: [ClaimType; 4] = [
    ClaimType::AgeOver16,
    ClaimType::AgeOver18,
    ClaimType::AgeOver21,
    ClaimType::Citizenship,
];

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgeOver16 => "age_over_16",
            Self::AgeOver18 => "age_over_18",
            Self::AgeOver21 => "age_over_21",
            Self::Citizenship => "citizenship",
        }
    }

    /// The circuit family that proves this claim.
    pub fn circuit(&self) -> CircuitId {
        match self {
            Self::AgeOver16 | Self::AgeOver18 | Self::AgeOver21 => CircuitId::AgeVerification,
            Self::Citizenship => CircuitId::CitizenshipMembership,
        }
    }

    /// Age threshold in years the proof's public signals must carry, if any.
    pub fn age_threshold(&self) -> Option<u64> {
        match self {
            Self::AgeOver16 => Some(16),
            Self::AgeOver18 => Some(18),
            Self::AgeOver21 => Some(21),
            Self::Citizenship => None,
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimType {
    type Err = ZkidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CLAIM_TYPES
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ZkidError::UnknownIdentifier(format!("claim type {s:?}")))
    }
}
