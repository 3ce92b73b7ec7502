/// Flow Survey Interchange File Importer
///
/// Decodes the multi-page text export produced by the modelling package into
/// one [`MonitorTrace`] per page. Each page looks like:
///
/// ```text
/// Page title is, "Flow Survey Location (Obs.) F01, Model Location (Pred.) D/S N123, Rainfall Profile: 5"
/// Date,Time,Observed Flow,Observed Depth,Date,Time,Predicted Flow,Predicted Depth
/// 01/02/2024,00:00:00,0.12,0.30,01/02/2024,00:00:00,0.11,0.29
/// ...
/// ```
///
/// A page that cannot be understood is reported in [`ParseResult::errors`]
/// and the remaining pages are still parsed.
use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::import_error::ImportError;
use crate::importers::csv_line::split_line;
use crate::importers::timebase::{
    build_groups, columns_of_kind, group_owning, primary_observed_group, ColumnKind, DataColumn,
    TimeBaseGroup,
};
use crate::models::MonitorTrace;

/// Marker that opens every page
pub const PAGE_MARKER: &str = "Page title is";

/// Timestep assumed when fewer than two timestamps parse
pub const DEFAULT_TIMESTEP_MINUTES: i64 = 2;

/// Accepted date+time layouts, tried in order
const DATE_FORMATS: [&str; 4] = [
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const PREDICTED_KINDS: [ColumnKind; 3] = [
    ColumnKind::PredFlow,
    ColumnKind::PredDepth,
    ColumnKind::PredVelocity,
];

/// Everything recovered from one file
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseResult {
    pub monitors: Vec<MonitorTrace>,
    pub predicted_profiles: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Location facts carried by a page title
#[derive(Debug, Clone, PartialEq)]
pub struct PageTitle {
    pub obs_location_name: String,
    pub pred_location_name: String,
    pub upstream_end: bool,
    pub rainfall_profile: Option<String>,
}

/// A page's lines, marker line first
struct Page<'a> {
    index: usize,
    lines: Vec<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct TraceImporter {
    profile_index: usize,
}

impl TraceImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects which predicted profile to extract when a file carries several
    pub fn with_profile_index(mut self, profile_index: usize) -> Self {
        self.profile_index = profile_index;
        self
    }

    /// Parse a complete interchange file
    #[instrument(skip(self, bytes), fields(size = bytes.len(), profile = self.profile_index))]
    pub fn parse_file(&self, bytes: &[u8]) -> ParseResult {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_start_matches('\u{feff}');

        let pages = split_pages(text);
        debug!("Found {} pages", pages.len());

        let mut result = ParseResult::default();

        for page in pages {
            match self.parse_page(&page, &mut result.warnings) {
                Ok(Some((trace, profiles))) => {
                    for profile in profiles {
                        if !result.predicted_profiles.contains(&profile) {
                            result.predicted_profiles.push(profile);
                        }
                    }
                    result.monitors.push(trace);
                }
                Ok(None) => {
                    debug!("Page {} has no data rows, skipping", page.index);
                }
                Err(e) => {
                    warn!("Failed to parse page {}: {}", page.index, e);
                    result.errors.push(e.to_string());
                }
            }
        }

        info!(
            "Parsed {} monitor traces ({} errors, {} warnings)",
            result.monitors.len(),
            result.errors.len(),
            result.warnings.len()
        );

        result
    }

    fn parse_page(
        &self,
        page: &Page<'_>,
        warnings: &mut Vec<String>,
    ) -> Result<Option<(MonitorTrace, Vec<String>)>, ImportError> {
        let title_line = page.lines[0];
        let title = match parse_title_strict(title_line) {
            Some(title) => title,
            None => match parse_title_fallback(title_line) {
                Some(title) => {
                    warnings.push(format!(
                        "Page {}: title matched by fallback search only",
                        page.index
                    ));
                    title
                }
                None => {
                    return Err(ImportError::UnrecognisedTitle {
                        page: page.index,
                        title: title_line.trim().to_string(),
                    })
                }
            },
        };

        let Some(header_line) = page.lines.get(1) else {
            return Ok(None);
        };
        let data_lines: Vec<&str> = page.lines[2..]
            .iter()
            .copied()
            .filter(|l| !l.trim().is_empty())
            .collect();
        if data_lines.is_empty() {
            return Ok(None);
        }

        let headers = split_line(header_line);
        let groups = build_groups(&headers);
        let observed = primary_observed_group(&groups)
            .ok_or(ImportError::NoTimeBase { page: page.index })?;

        let has_series = groups
            .iter()
            .flat_map(|g| g.columns.iter())
            .any(|c| !matches!(c.kind, ColumnKind::Rainfall | ColumnKind::Unknown));
        if !has_series {
            return Err(ImportError::NoDataColumns { page: page.index });
        }

        // Rows are kept only when the observed clock parses
        let mut timestamps = Vec::with_capacity(data_lines.len());
        let mut rows = Vec::with_capacity(data_lines.len());
        for line in &data_lines {
            let fields = split_line(line);
            match parse_timestamp(&fields, observed.date_col, observed.time_col) {
                Some(ts) => {
                    timestamps.push(ts);
                    rows.push(fields);
                }
                None => debug!("Page {}: dropping row with unparsable date: {}", page.index, line),
            }
        }
        if rows.is_empty() {
            warnings.push(format!("Page {}: no rows with a parsable date", page.index));
            return Ok(None);
        }
        if rows.len() < data_lines.len() {
            debug!(
                "Page {}: dropped {} of {} rows",
                page.index,
                data_lines.len() - rows.len(),
                data_lines.len()
            );
        }

        let timestep_minutes = match infer_timestep(&timestamps) {
            Some(step) if step > 0 => step,
            Some(step) => {
                warnings.push(format!(
                    "Page {}: non-positive timestep {} min, using {} min",
                    page.index, step, DEFAULT_TIMESTEP_MINUTES
                ));
                DEFAULT_TIMESTEP_MINUTES
            }
            None => DEFAULT_TIMESTEP_MINUTES,
        };

        // Predicted columns, one chosen per kind by profile index
        let mut profile_warned = false;
        let mut select_predicted = |kind: ColumnKind| -> Option<DataColumn> {
            let candidates = columns_of_kind(&groups, kind);
            if candidates.is_empty() {
                return None;
            }
            if self.profile_index >= candidates.len() && !profile_warned {
                warnings.push(format!(
                    "Page {}: profile index {} out of range ({} available), using first",
                    page.index,
                    self.profile_index,
                    candidates.len()
                ));
                profile_warned = true;
            }
            candidates
                .get(self.profile_index)
                .or_else(|| candidates.first())
                .map(|c| (*c).clone())
        };
        let pred_flow_col = select_predicted(ColumnKind::PredFlow);
        let pred_depth_col = select_predicted(ColumnKind::PredDepth);
        let pred_velocity_col = select_predicted(ColumnKind::PredVelocity);

        let profiles: Vec<String> = PREDICTED_KINDS
            .iter()
            .map(|kind| columns_of_kind(&groups, *kind))
            .find(|cols| !cols.is_empty())
            .map(|cols| cols.iter().map(|c| c.header.clone()).collect())
            .unwrap_or_default();

        let predicted_primary = [&pred_flow_col, &pred_depth_col, &pred_velocity_col]
            .into_iter()
            .flatten()
            .next();
        let predicted_profile = predicted_primary.map(|c| c.header.clone());
        let predicted_timestep_minutes = predicted_primary
            .and_then(|c| group_owning(&groups, c.index))
            .filter(|g| g.date_col != observed.date_col)
            .and_then(|g| predicted_timestep(&rows, g));

        let observed_col = |kind: ColumnKind| columns_of_kind(&groups, kind).first().map(|c| c.index);
        let extract = |col: Option<usize>| -> Vec<f64> {
            col.map(|idx| extract_column(&rows, idx)).unwrap_or_default()
        };

        let rainfall_col = observed_col(ColumnKind::Rainfall);

        let trace = MonitorTrace {
            page_index: page.index,
            obs_location_name: title.obs_location_name,
            pred_location_name: title.pred_location_name,
            upstream_end: title.upstream_end,
            rainfall_profile: title.rainfall_profile,
            predicted_profile,
            timestep_minutes,
            predicted_timestep_minutes,
            obs_flow: extract(observed_col(ColumnKind::ObsFlow)),
            pred_flow: extract(pred_flow_col.as_ref().map(|c| c.index)),
            obs_depth: extract(observed_col(ColumnKind::ObsDepth)),
            pred_depth: extract(pred_depth_col.as_ref().map(|c| c.index)),
            obs_velocity: extract(observed_col(ColumnKind::ObsVelocity)),
            pred_velocity: extract(pred_velocity_col.as_ref().map(|c| c.index)),
            rainfall: rainfall_col.map(|idx| extract_column(&rows, idx)),
            timestamps,
        };

        debug!(
            "Page {}: {} -> {} with {} samples at {} min",
            page.index,
            trace.obs_location_name,
            trace.pred_location_name,
            trace.timestamps.len(),
            trace.timestep_minutes
        );

        Ok(Some((trace, profiles)))
    }
}

/// Parse a file with the first predicted profile
pub fn parse_file(bytes: &[u8]) -> ParseResult {
    TraceImporter::new().parse_file(bytes)
}

/// Cut the text into pages at each marker line. Lines before the first
/// marker are discarded.
fn split_pages(text: &str) -> Vec<Page<'_>> {
    let mut pages: Vec<Page<'_>> = Vec::new();

    for line in text.lines() {
        if line.trim_start().starts_with(PAGE_MARKER) {
            pages.push(Page {
                index: pages.len() + 1,
                lines: vec![line],
            });
        } else if let Some(page) = pages.last_mut() {
            page.lines.push(line);
        }
    }

    pages
}

/// Strict title pattern:
/// `... (Obs.) <obs>, ... (Pred.) U/S|D/S <pred>[, Rainfall Profile: <n>]`
pub fn parse_title_strict(title: &str) -> Option<PageTitle> {
    let re = Regex::new(
        r#"\(Obs\.\)\s*([^,"]+?)\s*,[^,"]*\(Pred\.\)\s*(U/S|D/S)\s+([^,"]+?)\s*(?:,|"|$)"#,
    )
    .ok()?;
    let caps = re.captures(title)?;

    Some(PageTitle {
        obs_location_name: caps.get(1)?.as_str().to_string(),
        upstream_end: caps.get(2)?.as_str() == "U/S",
        pred_location_name: caps.get(3)?.as_str().to_string(),
        rainfall_profile: extract_rainfall_profile(title),
    })
}

/// Substring search for the same three facts when the strict pattern fails
pub fn parse_title_fallback(title: &str) -> Option<PageTitle> {
    let obs_start = title.find("(Obs.)")? + "(Obs.)".len();
    let after_obs = &title[obs_start..];
    let obs_location_name = take_name(after_obs)?;

    let (flag_pos, upstream_end) = match (after_obs.find("U/S"), after_obs.find("D/S")) {
        (Some(u), Some(d)) => (u.min(d), u < d),
        (Some(u), None) => (u, true),
        (None, Some(d)) => (d, false),
        (None, None) => return None,
    };
    let pred_location_name = take_name(&after_obs[flag_pos + 3..])?;

    Some(PageTitle {
        obs_location_name,
        pred_location_name,
        upstream_end,
        rainfall_profile: extract_rainfall_profile(title),
    })
}

/// Text up to the next comma or quote, trimmed; `None` if empty
fn take_name(text: &str) -> Option<String> {
    let end = text.find([',', '"']).unwrap_or(text.len());
    let name = text[..end].trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn extract_rainfall_profile(title: &str) -> Option<String> {
    let re = Regex::new(r#"Rainfall Profile:\s*([^,"]+)"#).ok()?;
    re.captures(title)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a date/time cell pair with each accepted layout in turn.
/// A blank time cell lets the date cell carry both parts.
pub fn parse_timestamp(fields: &[String], date_col: usize, time_col: usize) -> Option<NaiveDateTime> {
    let date = fields.get(date_col)?.trim();
    if date.is_empty() {
        return None;
    }
    let time = fields.get(time_col).map(|t| t.trim()).unwrap_or("");
    let combined = if time.is_empty() {
        date.to_string()
    } else {
        format!("{date} {time}")
    };

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&combined, fmt).ok())
}

/// Whole minutes between the first two timestamps
fn infer_timestep(timestamps: &[NaiveDateTime]) -> Option<i64> {
    match timestamps {
        [first, second, ..] => Some((*second - *first).num_minutes()),
        _ => None,
    }
}

fn predicted_timestep(rows: &[Vec<String>], group: &TimeBaseGroup) -> Option<i64> {
    let stamps: Vec<NaiveDateTime> = rows
        .iter()
        .filter_map(|r| parse_timestamp(r, group.date_col, group.time_col))
        .take(2)
        .collect();
    infer_timestep(&stamps).filter(|step| *step > 0)
}

/// Numeric column; missing or malformed cells read as 0.0
fn extract_column(rows: &[Vec<String>], index: usize) -> Vec<f64> {
    rows.iter()
        .map(|r| r.get(index).map(|cell| parse_number(cell)).unwrap_or(0.0))
        .collect()
}

fn parse_number(cell: &str) -> f64 {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
