use embassy_time::Duration;

/// Reserve time requested from the chip along with every lock request, in ms.
pub const RESERVE_TIME_MS: u8 = 20;

/// Time after which `select` gives up acquiring the bus.
pub const ARBITRATION_TIMEOUT: Duration = Duration::from_millis(250);

/// Delay applied between two arbitration polls.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RetryDelay {
    /// Retry immediately; used right after issuing a fresh request.
    #[default]
    Short,
    /// Back off while the other master holds or contends the bus.
    Long,
}

impl RetryDelay {
    pub const fn as_micros(self) -> u32 {
        match self {
            Self::Short => 0,
            Self::Long => 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Reserve time written to the chip with each lock request, in ms.
    pub reserve_time_ms: u8,
    /// Wall-clock budget for a single `select`.
    pub arbitration_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reserve_time_ms: RESERVE_TIME_MS,
            arbitration_timeout: ARBITRATION_TIMEOUT,
        }
    }
}
