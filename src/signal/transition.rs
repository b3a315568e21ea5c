//! Logic levels and run-length encoded level changes

/// Logic level of a single wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    pub fn toggled(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }

    pub fn from_bit(bit: bool) -> Level {
        if bit { Level::High } else { Level::Low }
    }
}

/// A single level change on one wire.
///
/// `level` is the level the wire holds from `sample` onward, until the next
/// transition in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Sample number at which the new level takes effect.
    pub sample: u64,
    /// Level of the wire starting at `sample`.
    pub level: Level,
}

impl Transition {
    pub fn new(sample: u64, level: Level) -> Self {
        Self { sample, level }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_toggle() {
        assert_eq!(Level::Low.toggled(), Level::High);
        assert_eq!(Level::High.toggled(), Level::Low);
        assert!(!Level::Low.is_high());
        assert!(Level::High.is_high());
    }

    #[test]
    fn test_level_from_bit() {
        assert_eq!(Level::from_bit(true), Level::High);
        assert_eq!(Level::from_bit(false), Level::Low);
    }
}
