use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

/// Upload-age bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DateRange {
    #[default]
    All,
    Today,
    Week,
    Month,
}

impl DateRange {
    /// Maximum age admitted by this bucket, None for `All`
    pub fn max_age(&self) -> Option<Duration> {
        match self {
            DateRange::All => None,
            DateRange::Today => Some(Duration::days(1)),
            DateRange::Week => Some(Duration::days(7)),
            DateRange::Month => Some(Duration::days(30)),
        }
    }

    pub fn admits(&self, uploaded_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.max_age() {
            Some(max_age) => now - uploaded_at < max_age,
            None => true,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DateRange::All => "All time",
            DateRange::Today => "Today",
            DateRange::Week => "This week",
            DateRange::Month => "This month",
        }
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(DateRange::All),
            "today" | "day" => Ok(DateRange::Today),
            "week" => Ok(DateRange::Week),
            "month" => Ok(DateRange::Month),
            other => Err(format!("unknown date range: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortKey {
    #[default]
    Date,
    Name,
    Size,
    Type,
}

impl SortKey {
    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Date => "Date",
            SortKey::Name => "Name",
            SortKey::Size => "Size",
            SortKey::Type => "Type",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date" => Ok(SortKey::Date),
            "name" => Ok(SortKey::Name),
            "size" => Ok(SortKey::Size),
            "type" => Ok(SortKey::Type),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn flip(&self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Everything besides the collection itself that determines the filtered view.
/// Defaults to newest first with no filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterCriteria {
    pub search: String,
    pub date_range: DateRange,
    pub sort_key: SortKey,
    pub direction: SortDirection,
}

impl FilterCriteria {
    /// Same column flips direction; a new column starts descending.
    pub fn toggle_sort(&mut self, key: SortKey) {
        if self.sort_key == key {
            self.direction = self.direction.flip();
        } else {
            self.sort_key = key;
            self.direction = SortDirection::Descending;
        }
    }
}
