//! Calendar quarters used for vintage selection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar quarter, e.g. CY2025 Q3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quarter {
    pub year: i32,
    /// 1 through 4
    pub quarter: u8,
}

impl Quarter {
    pub fn new(year: i32, quarter: u8) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(Self { year, quarter })
    }

    pub fn start(&self) -> NaiveDate {
        let month = (self.quarter as u32 - 1) * 3 + 1;
        // quarter is validated at construction, month is always 1/4/7/10
        NaiveDate::from_ymd_opt(self.year, month, 1).unwrap_or_default()
    }

    /// Last day of the quarter (inclusive end for selection bounds).
    pub fn end(&self) -> NaiveDate {
        let (month, day) = match self.quarter {
            1 => (3, 31),
            2 => (6, 30),
            3 => (9, 30),
            _ => (12, 31),
        };
        NaiveDate::from_ymd_opt(self.year, month, day).unwrap_or_default()
    }

    pub fn prev(&self) -> Quarter {
        if self.quarter == 1 {
            Quarter { year: self.year - 1, quarter: 4 }
        } else {
            Quarter { year: self.year, quarter: self.quarter - 1 }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start() <= date && date <= self.end()
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CY{} Q{}", self.year, self.quarter)
    }
}
