use crate::dataset::DatasetRow;

/// Year predicates applied after an index lookup. The three fields are
/// independent: a lone `begin` has no upper bound and a lone `end` no lower.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearFilter {
    pub current_only: bool,
    pub begin: Option<i32>,
    pub end: Option<i32>,
}

impl YearFilter {
    pub fn current() -> Self {
        Self { current_only: true, ..Self::default() }
    }

    pub fn range(begin: Option<i32>, end: Option<i32>) -> Self {
        Self { current_only: false, begin, end }
    }

    pub fn accepts(&self, year: i32, current_year: i32) -> bool {
        if self.current_only && year != current_year {
            return false;
        }
        if self.begin.is_some_and(|begin| year < begin) {
            return false;
        }
        if self.end.is_some_and(|end| year > end) {
            return false;
        }
        true
    }
}

pub fn apply_range(rows: &[DatasetRow], filter: YearFilter, current_year: i32) -> Vec<DatasetRow> {
    rows.iter()
        .filter(|row| filter.accepts(row.year, current_year))
        .cloned()
        .collect()
}
