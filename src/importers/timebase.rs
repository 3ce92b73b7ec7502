/// Header classification and Date/Time timebase grouping
///
/// A header row is a sequence of timebase groups. Each group starts with an
/// adjacent `Date`, `Time` pair and owns every column up to the next pair.
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    ObsFlow,
    PredFlow,
    ObsDepth,
    PredDepth,
    ObsVelocity,
    PredVelocity,
    Rainfall,
    Unknown,
}

impl ColumnKind {
    /// Classifies a header cell by case-insensitive substring matching.
    /// Unqualified flow/depth/velocity columns count as observed.
    pub fn classify(header: &str) -> Self {
        let h = header.to_lowercase();

        if h.contains("rain") {
            return ColumnKind::Rainfall;
        }

        let predicted = h.contains("pred");
        if h.contains("flow") {
            if predicted {
                ColumnKind::PredFlow
            } else {
                ColumnKind::ObsFlow
            }
        } else if h.contains("depth") {
            if predicted {
                ColumnKind::PredDepth
            } else {
                ColumnKind::ObsDepth
            }
        } else if h.contains("velocity") {
            if predicted {
                ColumnKind::PredVelocity
            } else {
                ColumnKind::ObsVelocity
            }
        } else {
            ColumnKind::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataColumn {
    pub index: usize,
    pub header: String,
    pub kind: ColumnKind,
}

/// Columns governed by one Date/Time pair
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBaseGroup {
    pub date_col: usize,
    pub time_col: usize,
    pub columns: Vec<DataColumn>,
}

impl TimeBaseGroup {
    pub fn contains(&self, kind: ColumnKind) -> bool {
        self.columns.iter().any(|c| c.kind == kind)
    }

    pub fn owns_column(&self, index: usize) -> bool {
        self.columns.iter().any(|c| c.index == index)
    }
}

/// Splits a parsed header row into timebase groups.
///
/// Columns that appear before the first Date/Time pair belong to no group
/// and are ignored.
pub fn build_groups(headers: &[String]) -> Vec<TimeBaseGroup> {
    let mut groups: Vec<TimeBaseGroup> = Vec::new();
    let mut i = 0;

    while i < headers.len() {
        let is_pair = headers[i].eq_ignore_ascii_case("date")
            && headers
                .get(i + 1)
                .is_some_and(|next| next.eq_ignore_ascii_case("time"));

        if is_pair {
            groups.push(TimeBaseGroup {
                date_col: i,
                time_col: i + 1,
                columns: Vec::new(),
            });
            i += 2;
            continue;
        }

        if let Some(group) = groups.last_mut() {
            group.columns.push(DataColumn {
                index: i,
                header: headers[i].clone(),
                kind: ColumnKind::classify(&headers[i]),
            });
        }
        i += 1;
    }

    groups
}

/// The group whose clock drives the observed series: the one holding
/// observed velocity, else observed flow, else observed depth, else the first.
pub fn primary_observed_group(groups: &[TimeBaseGroup]) -> Option<&TimeBaseGroup> {
    [
        ColumnKind::ObsVelocity,
        ColumnKind::ObsFlow,
        ColumnKind::ObsDepth,
    ]
    .iter()
    .find_map(|kind| groups.iter().find(|g| g.contains(*kind)))
    .or_else(|| groups.first())
}

/// Every column index of `kind`, in header order, across all groups
pub fn columns_of_kind(groups: &[TimeBaseGroup], kind: ColumnKind) -> Vec<&DataColumn> {
    groups
        .iter()
        .flat_map(|g| g.columns.iter())
        .filter(|c| c.kind == kind)
        .collect()
}

pub fn group_owning(groups: &[TimeBaseGroup], column: usize) -> Option<&TimeBaseGroup> {
    groups.iter().find(|g| g.owns_column(column))
}
