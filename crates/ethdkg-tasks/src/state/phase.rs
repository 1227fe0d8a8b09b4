//! Ceremony phases

use serde::{Deserialize, Serialize};
use std::fmt;

/// ETHDKG phase, in the order the contract moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Phase {
    RegistrationOpen = 0,
    ShareDistribution = 1,
    DisputeShareDistribution = 2,
    KeyShareSubmission = 3,
    MPKSubmission = 4,
    GPKJSubmission = 5,
    DisputeGPKJSubmission = 6,
    Completion = 7,
}

impl Phase {
    /// The phase the contract moves to next, if any
    pub fn next(self) -> Option<Phase> {
        Phase::try_from(self as u8 + 1).ok()
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        phase as u8
    }
}

impl TryFrom<u8> for Phase {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Phase::RegistrationOpen),
            1 => Ok(Phase::ShareDistribution),
            2 => Ok(Phase::DisputeShareDistribution),
            3 => Ok(Phase::KeyShareSubmission),
            4 => Ok(Phase::MPKSubmission),
            5 => Ok(Phase::GPKJSubmission),
            6 => Ok(Phase::DisputeGPKJSubmission),
            7 => Ok(Phase::Completion),
            other => Err(other),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_roundtrip() {
        for value in 0u8..8 {
            let phase = Phase::try_from(value).unwrap();
            assert_eq!(u8::from(phase), value);
        }
        assert_eq!(Phase::try_from(8), Err(8));
    }

    #[test]
    fn test_ordering() {
        assert!(Phase::RegistrationOpen < Phase::ShareDistribution);
        assert_eq!(Phase::MPKSubmission.next(), Some(Phase::GPKJSubmission));
        assert_eq!(Phase::Completion.next(), None);
    }
}
