//! Attribute Rewriter
//!
//! Replaces the value tokens of indexed attribute commands by generated
//! placeholders such as `{setTimeStart_0}`, and keeps the per-job values
//! each placeholder stands for. The simulation substitutes the placeholders
//! itself at start-up from the `-a [name,value]` list every job receives,
//! so the rewritten macros remain valid scripts.

use log::{debug, warn};
use serde::Serialize;

use super::indexer::{Attribute, AttributeIndex};
use super::model::{LineRef, MacroFileSet};
use crate::error::{Result, SplitError};

/// Values a placeholder takes, one per job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AliasValues {
    pub name: String,
    pub values: Vec<String>,
}

/// Generated placeholders in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AliasValueTable {
    entries: Vec<AliasValues>,
}

impl AliasValueTable {
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AliasValues> {
        self.entries.iter()
    }

    /// `(placeholder, value)` pairs for one job.
    pub fn for_job(&self, job: usize) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry
                    .values
                    .get(job)
                    .map(|value| (entry.name.as_str(), value.as_str()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: String, values: Vec<String>) {
        self.entries.push(AliasValues { name, values });
    }
}

/// Per-job values handed to [`AttributeRewriter::substitute`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobValues {
    /// One value per job for the command's first argument.
    Scalar(Vec<String>),
    /// One list per positional argument, each holding one value per job.
    Positional(Vec<Vec<String>>),
}

impl JobValues {
    /// Builds scalar values from anything printable.
    pub fn scalar<T: ToString>(values: &[T]) -> Self {
        Self::Scalar(values.iter().map(ToString::to_string).collect())
    }
}

/// Returns `name` when `token` has the form `{name}`.
pub fn placeholder_name(token: &str) -> Option<&str> {
    token.strip_prefix('{')?.strip_suffix('}')
}

/// Value tokens read back from a command, with the macro aliases they came from.
#[derive(Debug, Default, PartialEq)]
struct Resolution {
    values: Vec<String>,
    aliases: Vec<String>,
}

/// Rewrites attribute commands of a loaded macro tree.
///
/// Owns the file set, its index, and the placeholder counter, so two
/// rewriters never share placeholder numbering.
#[derive(Debug)]
pub struct AttributeRewriter {
    files: MacroFileSet,
    index: AttributeIndex,
    jobs: usize,
    table: AliasValueTable,
    counter: usize,
}

impl AttributeRewriter {
    /// Indexes `files` for a run of `jobs` jobs.
    pub fn new(files: MacroFileSet, jobs: usize) -> Self {
        let index = AttributeIndex::build(&files);
        Self {
            files,
            index,
            jobs,
            table: AliasValueTable::default(),
            counter: 0,
        }
    }

    pub fn files(&self) -> &MacroFileSet {
        &self.files
    }

    pub fn index(&self) -> &AttributeIndex {
        &self.index
    }

    pub fn alias_table(&self) -> &AliasValueTable {
        &self.table
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    fn locate(&self, attribute: Attribute) -> Result<LineRef> {
        self.index
            .attribute(attribute)
            .ok_or(SplitError::MissingCommand(attribute))
    }

    fn check_len(&self, attribute: Attribute, values: &[String]) -> Result<()> {
        if values.len() != self.jobs {
            return Err(SplitError::JobCountMismatch {
                attribute: attribute.name().to_string(),
                expected: self.jobs,
                actual: values.len(),
            });
        }
        Ok(())
    }

    fn next_placeholder(&mut self, attribute: Attribute) -> String {
        let name = format!("{}_{}", attribute.name(), self.counter);
        self.counter += 1;
        name
    }

    /// Replaces the value token(s) of `attribute` with fresh placeholders.
    ///
    /// Returns the generated placeholder names. The command token and any
    /// trailing tokens (units, for instance) are kept.
    pub fn substitute(&mut self, attribute: Attribute, values: JobValues) -> Result<Vec<String>> {
        let at = self.locate(attribute)?;
        let mut tokens = self
            .files
            .line(at)
            .tokens()
            .map(<[String]>::to_vec)
            .unwrap_or_default();

        let slots = match values {
            JobValues::Scalar(values) => vec![values],
            JobValues::Positional(slots) => slots,
        };

        for slot in &slots {
            self.check_len(attribute, slot)?;
        }
        if slots.len() > tokens.len().max(2) - 1 {
            return Err(SplitError::InvalidOptions(format!(
                "{} takes {} argument(s), got {} value lists",
                attribute.command(),
                tokens.len().saturating_sub(1),
                slots.len()
            )));
        }

        let mut names = Vec::with_capacity(slots.len());
        for (position, slot) in slots.into_iter().enumerate() {
            let name = self.next_placeholder(attribute);
            let token = format!("{{{}}}", name);
            match tokens.get_mut(position + 1) {
                Some(existing) => *existing = token,
                None => tokens.push(token),
            }
            debug!("{} argument {} -> {{{}}}", attribute, position + 1, name);
            self.table.push(name.clone(), slot);
            names.push(name);
        }

        self.files.line_mut(at).set_tokens(tokens);
        Ok(names)
    }

    /// Value tokens of an alias definition (everything after the alias name).
    pub fn alias_value(&self, alias: &str) -> Option<Vec<String>> {
        let at = self.index.alias(alias)?;
        let tokens = self.files.line(at).tokens()?;
        Some(tokens.iter().skip(2).cloned().collect())
    }

    /// Current value tokens of `attribute`.
    ///
    /// A `{name}` token referring to a macro alias is replaced by the alias
    /// value, with a warning since the alias may be redefined later in the
    /// macro. Any other placeholder cannot be resolved to a single value and
    /// fails with [`SplitError::UnresolvedAlias`].
    pub fn resolve(&self, attribute: Attribute) -> Result<Vec<String>> {
        Ok(self.resolve_with(attribute, |_| None)?.values)
    }

    /// Value tokens of `attribute` as job `job` will see them.
    ///
    /// Placeholders generated by [`substitute`](Self::substitute) resolve to
    /// the job's value; macro aliases resolve as in [`resolve`](Self::resolve).
    pub fn resolve_job(&self, attribute: Attribute, job: usize) -> Result<Vec<String>> {
        let resolution = self.resolve_with(attribute, |name| {
            self.table
                .get(name)
                .and_then(|values| values.get(job))
                .cloned()
        })?;
        Ok(resolution.values)
    }

    fn resolve_with<F>(&self, attribute: Attribute, generated: F) -> Result<Resolution>
    where
        F: Fn(&str) -> Option<String>,
    {
        let at = self.locate(attribute)?;
        let tokens = self.files.line(at).tokens().unwrap_or_default();

        let mut resolved = Resolution::default();
        for token in tokens.iter().skip(1) {
            let Some(name) = placeholder_name(token) else {
                resolved.values.push(token.clone());
                continue;
            };

            if let Some(value) = generated(name) {
                resolved.values.push(value);
            } else if let Some(value) = self.alias_value(name) {
                warn!(
                    "Attribute \"{}\" is an alias {}. Prefer a value instead of an alias",
                    attribute, token
                );
                resolved.values.extend(value);
                resolved.aliases.push(name.to_string());
            } else {
                return Err(SplitError::UnresolvedAlias {
                    attribute: attribute.name().to_string(),
                    alias: name.to_string(),
                });
            }
        }
        Ok(resolved)
    }

    /// Parses the first value of `attribute` as a number.
    pub fn resolve_f64(&self, attribute: Attribute) -> Result<f64> {
        let tokens = self.resolve(attribute)?;
        let first = tokens.first().cloned().unwrap_or_default();
        first.parse().map_err(|_| SplitError::InvalidValue {
            attribute: attribute.name().to_string(),
            value: first,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::model::MacroFile;

    fn rewriter(content: &str, jobs: usize) -> AttributeRewriter {
        let mut set = MacroFileSet::new();
        set.insert(MacroFile::parse("mac/main.mac", content));
        AttributeRewriter::new(set, jobs)
    }

    fn raw_line(rewriter: &AttributeRewriter, line: usize) -> String {
        let file = rewriter.files().id_of("mac/main.mac").unwrap();
        rewriter.files().file(file).lines[line].raw().to_string()
    }

    #[test]
    fn test_placeholder_name() {
        assert_eq!(placeholder_name("{start}"), Some("start"));
        assert_eq!(placeholder_name("start"), None);
        assert_eq!(placeholder_name("{start"), None);
    }

    #[test]
    fn test_substitute_scalar_primaries() {
        let mut rewriter = rewriter("/gate/application/setTotalNumberOfPrimaries 100\n", 3);

        let names = rewriter
            .substitute(Attribute::TotalPrimaries, JobValues::scalar(&[10, 10, 10]))
            .unwrap();

        assert_eq!(names, vec!["setTotalNumberOfPrimaries_0"]);
        assert_eq!(
            raw_line(&rewriter, 0),
            "/gate/application/setTotalNumberOfPrimaries {setTotalNumberOfPrimaries_0}\n"
        );
        assert_eq!(
            rewriter.alias_table().get("setTotalNumberOfPrimaries_0"),
            Some(&["10".to_string(), "10".to_string(), "10".to_string()][..])
        );
    }

    #[test]
    fn test_substitute_keeps_unit_and_other_lines() {
        let content = "# time\n/gate/application/setTimeStart 0 s\n\n/gate/application/start\n";
        let mut rewriter = rewriter(content, 2);
        rewriter
            .substitute(Attribute::TimeStart, JobValues::scalar(&[0.0, 5.0]))
            .unwrap();

        assert_eq!(raw_line(&rewriter, 0), "# time\n");
        assert_eq!(raw_line(&rewriter, 1), "/gate/application/setTimeStart {setTimeStart_0} s\n");
        assert_eq!(raw_line(&rewriter, 2), "\n");
        assert_eq!(raw_line(&rewriter, 3), "/gate/application/start\n");
    }

    #[test]
    fn test_substitute_counter_never_resets() {
        let mut rewriter = rewriter(
            "/gate/application/setTimeStart 0 s\n/gate/application/setTimeStop 9 s\n",
            1,
        );
        rewriter.substitute(Attribute::TimeStart, JobValues::scalar(&[1])).unwrap();
        rewriter.substitute(Attribute::TimeStop, JobValues::scalar(&[2])).unwrap();
        let names = rewriter
            .substitute(Attribute::TimeStart, JobValues::scalar(&[3]))
            .unwrap();

        assert_eq!(names, vec!["setTimeStart_2"]);
        assert_eq!(rewriter.alias_table().len(), 3);
        assert_eq!(
            raw_line(&rewriter, 0),
            "/gate/application/setTimeStart {setTimeStart_2} s\n"
        );
    }

    #[test]
    fn test_substitute_positional() {
        let mut rewriter = rewriter("/gate/application/setTimeSlice 1 s\n", 2);
        let names = rewriter
            .substitute(
                Attribute::TimeSlice,
                JobValues::Positional(vec![
                    vec!["1".to_string(), "2".to_string()],
                    vec!["s".to_string(), "ms".to_string()],
                ]),
            )
            .unwrap();

        assert_eq!(names, vec!["setTimeSlice_0", "setTimeSlice_1"]);
        assert_eq!(
            raw_line(&rewriter, 0),
            "/gate/application/setTimeSlice {setTimeSlice_0} {setTimeSlice_1}\n"
        );
        assert_eq!(
            rewriter.alias_table().for_job(1),
            vec![("setTimeSlice_0", "2"), ("setTimeSlice_1", "ms")]
        );
    }

    #[test]
    fn test_substitute_wrong_length_fails() {
        let mut rewriter = rewriter("/gate/application/setTotalNumberOfPrimaries 100\n", 3);
        let result = rewriter.substitute(Attribute::TotalPrimaries, JobValues::scalar(&[1, 2]));
        assert!(matches!(result, Err(SplitError::JobCountMismatch { expected: 3, actual: 2, .. })));
        assert!(rewriter.alias_table().is_empty());
    }

    #[test]
    fn test_substitute_missing_command_fails() {
        let mut rewriter = rewriter("/gate/application/start\n", 1);
        let result = rewriter.substitute(Attribute::TimeStop, JobValues::scalar(&[1]));
        assert!(matches!(result, Err(SplitError::MissingCommand(Attribute::TimeStop))));
    }

    #[test]
    fn test_resolve_literal() {
        let rewriter = rewriter("/gate/application/setTimeStop   9.5 s\n", 1);
        assert_eq!(rewriter.resolve(Attribute::TimeStop).unwrap(), vec!["9.5", "s"]);
        assert_eq!(rewriter.resolve_f64(Attribute::TimeStop).unwrap(), 9.5);
    }

    #[test]
    fn test_resolve_through_alias() {
        let rewriter = rewriter(
            "/control/alias stop 12 s\n/gate/application/setTimeStop {stop}\n",
            1,
        );
        assert_eq!(rewriter.resolve(Attribute::TimeStop).unwrap(), vec!["12", "s"]);
    }

    #[test]
    fn test_resolve_reports_alias_reads() {
        let aliased = rewriter(
            "/control/alias stop 12\n/gate/application/setTimeStop {stop} s\n",
            1,
        );
        let resolution = aliased.resolve_with(Attribute::TimeStop, |_| None).unwrap();
        assert_eq!(resolution.values, vec!["12", "s"]);
        assert_eq!(resolution.aliases, vec!["stop"]);

        let literal = rewriter("/gate/application/setTimeStop 12 s\n", 1);
        let resolution = literal.resolve_with(Attribute::TimeStop, |_| None).unwrap();
        assert_eq!(resolution.values, vec!["12", "s"]);
        assert!(resolution.aliases.is_empty());
    }

    #[test]
    fn test_resolve_job_generated_value_is_not_an_alias_read() {
        let mut rewriter = rewriter("/gate/application/setTimeStop 9 s\n", 2);
        rewriter
            .substitute(Attribute::TimeStop, JobValues::scalar(&[4, 9]))
            .unwrap();
        let resolution = rewriter
            .resolve_with(Attribute::TimeStop, |name| {
                rewriter.alias_table().get(name).map(|values| values[1].clone())
            })
            .unwrap();
        assert_eq!(resolution.values, vec!["9", "s"]);
        assert!(resolution.aliases.is_empty());
    }

    #[test]
    fn test_resolve_unknown_alias_fails() {
        let rewriter = rewriter("/gate/application/setTimeStart {unknown_alias} s\n", 1);
        let result = rewriter.resolve(Attribute::TimeStart);
        match result {
            Err(SplitError::UnresolvedAlias { attribute, alias }) => {
                assert_eq!(attribute, "setTimeStart");
                assert_eq!(alias, "unknown_alias");
            }
            other => panic!("expected unresolved alias, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_generated_placeholder_fails() {
        let mut rewriter = rewriter("/gate/application/setTimeStart 0 s\n", 2);
        rewriter
            .substitute(Attribute::TimeStart, JobValues::scalar(&[0, 1]))
            .unwrap();
        assert!(matches!(
            rewriter.resolve(Attribute::TimeStart),
            Err(SplitError::UnresolvedAlias { .. })
        ));
    }

    #[test]
    fn test_resolve_non_numeric_fails() {
        let rewriter = rewriter("/gate/application/setTimeStart abc s\n", 1);
        assert!(matches!(
            rewriter.resolve_f64(Attribute::TimeStart),
            Err(SplitError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_substitute_then_resolve_job_round_trip() {
        let values = ["17", "4", "250"];
        let mut rewriter = rewriter("/gate/application/setTotalNumberOfPrimaries 100\n", 3);
        rewriter
            .substitute(Attribute::TotalPrimaries, JobValues::scalar(&values))
            .unwrap();

        let resolved: Vec<String> = (0..3)
            .map(|job| rewriter.resolve_job(Attribute::TotalPrimaries, job).unwrap().remove(0))
            .collect();
        assert_eq!(resolved, values);
    }

    #[test]
    fn test_alias_value() {
        let rewriter = rewriter("/control/alias energy 140 MeV\n", 1);
        assert_eq!(
            rewriter.alias_value("energy"),
            Some(vec!["140".to_string(), "MeV".to_string()])
        );
        assert_eq!(rewriter.alias_value("missing"), None);
    }
}
