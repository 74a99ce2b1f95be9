//! Hour-aligned time-of-day handling. Every booking and availability time in
//! the system is an `HH:MM` string with minutes fixed at `00`, so a slot is
//! identified by its hour index alone.

/// Parses an `HH:MM` string into its hour index, rejecting anything that is
/// not aligned to a whole hour.
pub fn parse_hour(s: &str) -> anyhow::Result<u8> {
    let (hour_str, minute_str) = s
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("invalid time format: {s}"))?;
    if hour_str.len() != 2 || minute_str.len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u8 = hour_str
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u8 = minute_str
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    if hour > 23 {
        return Err(anyhow::anyhow!("time out of range: {s}"));
    }
    if minute != 0 {
        return Err(anyhow::anyhow!("time must be aligned to the hour: {s}"));
    }
    Ok(hour)
}

pub fn format_hour(hour: u8) -> String {
    format!("{hour:02}:00")
}

/// A half-open `[start, end)` range of hour slots on a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    pub start: u8,
    pub end: u8,
}

impl SlotRange {
    pub fn parse(start: &str, end: &str) -> anyhow::Result<Self> {
        let start = parse_hour(start)?;
        let end = parse_hour(end)?;
        if start >= end {
            return Err(anyhow::anyhow!("end time must be after start time"));
        }
        Ok(Self { start, end })
    }

    pub fn hours(&self) -> i64 {
        i64::from(self.end - self.start)
    }

    pub fn overlaps(&self, other: &SlotRange) -> bool {
        !(self.end <= other.start || self.start >= other.end)
    }

    /// Whether `other` lies entirely within this range.
    pub fn contains(&self, other: &SlotRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}
