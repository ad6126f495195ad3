//! Trading calendar — the ordered set of dates the market was open.

use chrono::NaiveDate;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradingCalendar {
    dates: Vec<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(mut dates: Vec<NaiveDate>) -> Self {
        dates.sort();
        dates.dedup();
        Self { dates }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// The `lag`-th calendar entry strictly after `date`, capped at the last
    /// entry. A zero lag or an empty calendar returns `date` itself.
    pub fn offset(&self, date: NaiveDate, lag: usize) -> NaiveDate {
        if lag == 0 || self.dates.is_empty() {
            return date;
        }
        let after = self.dates.partition_point(|d| *d <= date);
        let idx = (after + lag - 1).min(self.dates.len() - 1);
        self.dates[idx].max(date)
    }
}
