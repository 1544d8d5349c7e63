use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

// Offsets beyond ~31 years are rejected, so conversions to milliseconds never overflow
const MAX_ABS_SECS: f64 = 1e9;

/// A signed time offset relative to the epoch of a pass, with millisecond resolution
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset(i64);

impl Offset {
    pub const ZERO: Offset = Offset(0);

    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * 1_000)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// The offset as a duration, with negative offsets saturating to zero
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0.max(0) as u64)
    }

    /// The absolute instant this offset refers to, measured from `epoch`
    pub fn after(self, epoch: Instant) -> Instant {
        let magnitude = Duration::from_millis(self.0.unsigned_abs());
        if self.0 >= 0 {
            epoch + magnitude
        } else {
            // Instants before the platform's origin cannot be represented, but they are in the
            // past anyway
            epoch.checked_sub(magnitude).unwrap_or(epoch)
        }
    }
}

impl FromStr for Offset {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `f64` parsing also accepts `inf` and `NaN`, which make no sense as offsets
        let secs: f64 = s.parse().map_err(|_| ())?;
        if !secs.is_finite() || secs.abs() > MAX_ABS_SECS {
            return Err(());
        }

        Ok(Self((secs * 1_000.0).round() as i64))
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1_000 == 0 {
            write!(f, "{:+}s", self.0 / 1_000)
        } else {
            write!(f, "{:+.3}s", self.0 as f64 / 1_000.0)
        }
    }
}
