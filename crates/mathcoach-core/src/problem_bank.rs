//! Problem bank loading for Math Coach.
//!
//! Problems come from a CSV table with the columns `problem_text`, `answer`
//! and `explanation`, read either from a local file or over HTTP (for
//! example a spreadsheet published to the web as CSV). Loads are memoized
//! per locator.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CoachError, Result};

/// Maximum accepted size of a problem source in bytes (5MB).
pub const MAX_SOURCE_SIZE: usize = 5 * 1024 * 1024;

/// Columns every problem source must provide.
pub const REQUIRED_COLUMNS: [&str; 3] = ["problem_text", "answer", "explanation"];

// ============================================================================
// Problem and ProblemSet
// ============================================================================

/// A single math problem.
///
/// Immutable once loaded; identified by its position in the [`ProblemSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    /// The problem statement shown to the learner.
    #[serde(rename = "problem_text")]
    pub text: String,

    /// The expected answer, compared as text.
    pub answer: String,

    /// Worked explanation revealed after a correct answer.
    #[serde(default)]
    pub explanation: String,
}

impl Problem {
    /// Creates a problem from its three fields.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        answer: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            answer: answer.into(),
            explanation: explanation.into(),
        }
    }
}

/// Ordered, possibly empty collection of problems.
///
/// Cloning is cheap; the problems are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemSet {
    problems: Arc<[Problem]>,
}

impl ProblemSet {
    /// Creates an empty set.
    #[must_use]
    pub fn empty() -> Self {
        Vec::new().into()
    }

    /// Number of problems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.problems.len()
    }

    /// Returns `true` if there are no problems.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Problem at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Problem> {
        self.problems.get(index)
    }

    /// Iterates over problems in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Problem> {
        self.problems.iter()
    }
}

impl Default for ProblemSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<Problem>> for ProblemSet {
    fn from(problems: Vec<Problem>) -> Self {
        Self {
            problems: problems.into(),
        }
    }
}

impl FromIterator<Problem> for ProblemSet {
    fn from_iter<I: IntoIterator<Item = Problem>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

// ============================================================================
// ProblemSource
// ============================================================================

/// Where a problem bank is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProblemSource {
    /// An `http://` or `https://` URL.
    Url(String),
    /// A local file.
    Path(PathBuf),
}

impl ProblemSource {
    /// Interprets a locator: URLs by scheme, everything else as a path.
    ///
    /// # Examples
    ///
    /// ```
    /// use mathcoach_core::ProblemSource;
    ///
    /// assert!(matches!(ProblemSource::parse("https://x.test/a.csv"), ProblemSource::Url(_)));
    /// assert!(matches!(ProblemSource::parse("bank.csv"), ProblemSource::Path(_)));
    /// ```
    #[must_use]
    pub fn parse(locator: &str) -> Self {
        let locator = locator.trim();
        let lower = locator.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(locator.to_string())
        } else {
            Self::Path(PathBuf::from(locator))
        }
    }
}

// ============================================================================
// CSV decoding
// ============================================================================

/// Outcome of decoding one CSV table.
#[derive(Debug, Clone)]
pub struct ParsedProblems {
    /// Problems from every well-formed row, in order.
    pub problems: ProblemSet,
    /// CSV line numbers of the rows that were skipped, header being line 1.
    pub skipped_lines: Vec<u64>,
}

impl ParsedProblems {
    /// Number of rows that were skipped.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped_lines.len()
    }
}

/// Decodes a CSV table into problems.
///
/// The header row must name all of [`REQUIRED_COLUMNS`]; other columns are
/// ignored. Rows that cannot be decoded, or whose `problem_text` or `answer`
/// is blank, are skipped and counted.
///
/// # Errors
///
/// Returns `CoachError::DataSourceSchema` if the header cannot be read or a
/// required column is missing.
pub fn parse_csv<R: Read>(reader: R, source: &str) -> Result<ParsedProblems> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| CoachError::data_source_schema(source, format!("unreadable header: {e}")))?
        .clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(CoachError::data_source_schema(
            source,
            format!("missing column(s): {}", missing.join(", ")),
        ));
    }

    let mut problems = Vec::new();
    let mut skipped_lines = Vec::new();
    let mut record = csv::StringRecord::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                let line = record.position().map_or(0, csv::Position::line);
                match record.deserialize::<Problem>(Some(&headers)) {
                    Ok(problem) if !problem.text.is_empty() && !problem.answer.is_empty() => {
                        problems.push(problem);
                    }
                    Ok(_) => {
                        skipped_lines.push(line);
                        warn!(source, line, "Skipping row with blank problem_text or answer");
                    }
                    Err(e) => {
                        skipped_lines.push(line);
                        warn!(source, line, error = %e, "Skipping malformed row");
                    }
                }
            }
            Err(e) if e.is_io_error() => {
                warn!(source, error = %e, "Stopped reading problem bank");
                break;
            }
            Err(e) => {
                let line = e.position().map_or(0, csv::Position::line);
                skipped_lines.push(line);
                warn!(source, line, error = %e, "Skipping malformed row");
            }
        }
    }

    Ok(ParsedProblems {
        problems: problems.into(),
        skipped_lines,
    })
}

// ============================================================================
// ProblemBank
// ============================================================================

/// Loads problem sets and memoizes them per locator.
///
/// Failed loads are never cached. [`ProblemBank::invalidate`] drops a cached
/// entry so the next load fetches again.
#[derive(Debug, Clone)]
pub struct ProblemBank {
    client: reqwest::Client,
    cache: HashMap<String, ProblemSet>,
}

impl ProblemBank {
    /// Creates a bank whose HTTP fetches are bounded by `fetch_timeout`.
    pub fn new(fetch_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(fetch_timeout).build()?;
        Ok(Self::with_client(client))
    }

    /// Creates a bank using an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            cache: HashMap::new(),
        }
    }

    /// Loads the problem set at `source`, serving repeated loads from the cache.
    ///
    /// # Errors
    ///
    /// Returns `CoachError::DataSourceUnreachable` if the source cannot be
    /// fetched or read, and `CoachError::DataSourceSchema` if its header is
    /// unusable.
    pub async fn load(&mut self, source: &str) -> Result<ProblemSet> {
        let key = source.trim();
        if let Some(cached) = self.cache.get(key) {
            debug!(source = key, problems = cached.len(), "Problem bank served from cache");
            return Ok(cached.clone());
        }

        let bytes = self.fetch(key).await?;
        let parsed = parse_csv(bytes.as_slice(), key)?;
        info!(
            source = key,
            problems = parsed.problems.len(),
            skipped = parsed.skipped(),
            "Problem bank loaded"
        );

        self.cache.insert(key.to_string(), parsed.problems.clone());
        Ok(parsed.problems)
    }

    /// Drops the cached set for `source`. Returns `true` if one was cached.
    pub fn invalidate(&mut self, source: &str) -> bool {
        self.cache.remove(source.trim()).is_some()
    }

    /// Returns `true` if `source` has a cached set.
    #[must_use]
    pub fn is_cached(&self, source: &str) -> bool {
        self.cache.contains_key(source.trim())
    }

    async fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        let unreachable =
            |e: &dyn std::fmt::Display| CoachError::data_source_unreachable(locator, e.to_string());

        match ProblemSource::parse(locator) {
            ProblemSource::Url(url) => {
                let mut response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)
                    .map_err(|e| unreachable(&e))?;
                if let Some(len) = response.content_length() {
                    check_size(locator, usize::try_from(len).unwrap_or(usize::MAX))?;
                }

                let mut bytes = Vec::new();
                while let Some(chunk) = response.chunk().await.map_err(|e| unreachable(&e))? {
                    check_size(locator, bytes.len() + chunk.len())?;
                    bytes.extend_from_slice(&chunk);
                }
                Ok(bytes)
            }
            ProblemSource::Path(path) => {
                let metadata = tokio::fs::metadata(&path).await.map_err(|e| unreachable(&e))?;
                check_size(locator, usize::try_from(metadata.len()).unwrap_or(usize::MAX))?;
                tokio::fs::read(&path).await.map_err(|e| unreachable(&e))
            }
        }
    }
}

/// Rejects a source of `size` bytes if it exceeds [`MAX_SOURCE_SIZE`].
fn check_size(locator: &str, size: usize) -> Result<()> {
    if size > MAX_SOURCE_SIZE {
        return Err(CoachError::data_source_unreachable(
            locator,
            format!(
                "source is {}KB, above the {}KB limit",
                size / 1024,
                MAX_SOURCE_SIZE / 1024
            ),
        ));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
