//! W3C directive block parsing.
//!
//! Directive lines start with `#` and describe the data rows that follow
//! them: which software wrote the log, when the block started and, most
//! importantly, the ordered list of field names (`#Fields:`).

use serde::Serialize;

/// Metadata parsed from one contiguous block of directive lines.
///
/// `fields` distinguishes "no `#Fields:` directive seen" (`None`) from a
/// `#Fields:` directive that named nothing (`Some(vec![])`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectiveState {
    pub software: Option<String>,
    pub version: Option<String>,
    pub date: Option<String>,
    pub fields: Option<Vec<String>>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub remark: Option<String>,
    #[serde(skip)]
    unrecognized: usize,
}

/// The directives understood by [`DirectiveState::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Software,
    Version,
    Date,
    Fields,
    StartDate,
    EndDate,
    Remark,
}

impl Directive {
    const ALL: [(&'static str, Directive); 7] = [
        ("#Software:", Directive::Software),
        ("#Version:", Directive::Version),
        ("#Date:", Directive::Date),
        ("#Fields:", Directive::Fields),
        ("#Start-Date:", Directive::StartDate),
        ("#End-Date:", Directive::EndDate),
        ("#Remark:", Directive::Remark),
    ];

    /// Split a directive line into its kind and the raw remainder.
    fn split(line: &str) -> Option<(Self, &str)> {
        Self::ALL.iter().find_map(|(prefix, kind)| {
            let rest = line.strip_prefix(prefix)?;
            // `#Fields:x` is not `#Fields:`; the name must end at whitespace or EOL.
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                Some((*kind, rest))
            } else {
                None
            }
        })
    }
}

/// Check if a log line is a directive.
#[must_use]
pub fn is_directive(line: &str) -> bool {
    line.starts_with('#')
}

impl DirectiveState {
    /// Create an empty state, as at the start of a new directive block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one directive line into this state.
    ///
    /// Unknown `#` lines are logged and otherwise ignored. Lines that do not
    /// start with `#` are ignored entirely.
    pub fn apply(&mut self, line: &str) {
        let line = line.trim();
        let Some((kind, rest)) = Directive::split(line) else {
            if is_directive(line) {
                self.unrecognized += 1;
                tracing::debug!(line = %line, "Unknown log directive");
            }
            return;
        };

        match kind {
            Directive::Fields => {
                self.fields = Some(rest.split_whitespace().map(String::from).collect());
            }
            Directive::Software => self.software = scalar_value(rest),
            Directive::Version => self.version = scalar_value(rest),
            Directive::Date => self.date = scalar_value(rest),
            Directive::StartDate => self.start_date = scalar_value(rest),
            Directive::EndDate => self.end_date = scalar_value(rest),
            Directive::Remark => self.remark = scalar_value(rest),
        }
    }

    /// Number of `#` lines fed to this state that matched no known directive.
    #[must_use]
    pub fn unrecognized(&self) -> usize {
        self.unrecognized
    }
}

fn scalar_value(rest: &str) -> Option<String> {
    let value = rest.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
