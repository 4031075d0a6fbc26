use std::fmt;

use crate::error::BlurError;

/// Number of adjacent pixels one thread consumes per inner step of the
/// sliding-window kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VectorizationFactor {
    X1,
    X2,
    X4,
    X8,
    X12,
    X16,
    X24,
    X32,
}

impl VectorizationFactor {
    pub const ALL: [VectorizationFactor; 8] = [
        VectorizationFactor::X1,
        VectorizationFactor::X2,
        VectorizationFactor::X4,
        VectorizationFactor::X8,
        VectorizationFactor::X12,
        VectorizationFactor::X16,
        VectorizationFactor::X24,
        VectorizationFactor::X32,
    ];

    pub fn items(self) -> u32 {
        match self {
            VectorizationFactor::X1 => 1,
            VectorizationFactor::X2 => 2,
            VectorizationFactor::X4 => 4,
            VectorizationFactor::X8 => 8,
            VectorizationFactor::X12 => 12,
            VectorizationFactor::X16 => 16,
            VectorizationFactor::X24 => 24,
            VectorizationFactor::X32 => 32,
        }
    }
}

impl TryFrom<u32> for VectorizationFactor {
    type Error = BlurError;

    fn try_from(items: u32) -> Result<Self, Self::Error> {
        VectorizationFactor::ALL
            .into_iter()
            .find(|factor| factor.items() == items)
            .ok_or(BlurError::UnsupportedVectorizationFactor(items))
    }
}

impl fmt::Display for VectorizationFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.items())
    }
}

#[cfg(test)]
mod tests {
    use super::VectorizationFactor;
    use crate::error::BlurError;

    #[test]
    fn closed_set_matches_item_counts() {
        let items: Vec<u32> = VectorizationFactor::ALL.iter().map(|f| f.items()).collect();
        assert_eq!(items, [1, 2, 4, 8, 12, 16, 24, 32]);
    }

    #[test]
    fn try_from_accepts_members_only() {
        assert_eq!(
            VectorizationFactor::try_from(12).ok(),
            Some(VectorizationFactor::X12)
        );
        assert!(matches!(
            VectorizationFactor::try_from(3),
            Err(BlurError::UnsupportedVectorizationFactor(3))
        ));
        assert!(VectorizationFactor::try_from(0).is_err());
        assert!(VectorizationFactor::try_from(64).is_err());
    }

    #[test]
    fn display_uses_x_prefix() {
        assert_eq!(VectorizationFactor::X24.to_string(), "x24");
    }
}
