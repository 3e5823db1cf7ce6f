use embedded_hal::i2c::ErrorKind;

#[derive(derive_more::From, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The transport to the arbiter failed. The attempt is aborted.
    #[from]
    Transport(E),
    /// The bus was not granted before the arbitration timeout elapsed.
    Timeout,
    /// The transport cannot issue the transactions the arbiter needs.
    Unsupported,
    /// The arbiter has a single downstream channel.
    InvalidChannel(u32),
}

impl<E: core::fmt::Display> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Transport(err) => {
                write!(f, "I2C communication error: {}", err)
            }
            Error::Timeout => write!(f, "Bus arbitration timed out"),
            Error::Unsupported => {
                write!(f, "Transport lacks required capabilities")
            }
            Error::InvalidChannel(chan) => {
                write!(f, "Invalid channel: {}", chan)
            }
        }
    }
}

impl<E: embedded_hal::i2c::Error> embedded_hal::i2c::Error for Error<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(err) => err.kind(),
            Error::Timeout => ErrorKind::ArbitrationLoss,
            Error::Unsupported | Error::InvalidChannel(_) => ErrorKind::Other,
        }
    }
}
