use indexmap::IndexSet;
use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

/// Directional contract between a lexical (left) and a surface (right) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relation {
    /// `=>`: left must generate right, right must not analyze to left.
    GenerateOnly,
    /// `<=`: right must analyze to left, left must not generate right.
    AnalyzeOnly,
    /// `<=>`: both directions must hold.
    Bidirectional,
}

impl Relation {
    pub fn token(&self) -> &'static str {
        match self {
            Relation::GenerateOnly => "=>",
            Relation::AnalyzeOnly => "<=",
            Relation::Bidirectional => "<=>",
        }
    }

    /// Whether analyzing `right` is required to yield `left`.
    pub fn requires_analysis(&self) -> bool {
        matches!(self, Relation::AnalyzeOnly | Relation::Bidirectional)
    }

    /// Whether generating from `left` is required to yield `right`.
    pub fn requires_generation(&self) -> bool {
        matches!(self, Relation::GenerateOnly | Relation::Bidirectional)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=>" => Ok(Relation::GenerateOnly),
            "<=" => Ok(Relation::AnalyzeOnly),
            "<=>" => Ok(Relation::Bidirectional),
            other => Err(other.to_string()),
        }
    }
}

/// Three-valued classification outcome. `NotApplicable` is never a pass or
/// a fail on its own; see [`Expectation::passed_analysis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriState {
    True,
    False,
    NotApplicable,
}

impl TriState {
    pub fn is_true(self) -> bool {
        self == TriState::True
    }

    pub fn is_false(self) -> bool {
        self == TriState::False
    }

    pub fn is_not_applicable(self) -> bool {
        self == TriState::NotApplicable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Analysis,
    Generation,
}

impl Direction {
    /// The directions selected by an optional filter, analysis first.
    pub fn selected(only: Option<Direction>) -> &'static [Direction] {
        match only {
            None => &[Direction::Analysis, Direction::Generation],
            Some(Direction::Analysis) => &[Direction::Analysis],
            Some(Direction::Generation) => &[Direction::Generation],
        }
    }
}

/// Classification state for one direction of an expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionOutcome {
    /// Raw lookup results, form component only, in first-seen order.
    pub results: IndexSet<String>,
    /// `True` when the required form was absent.
    pub missing: TriState,
    /// `False` when the forbidden form occurred.
    pub true_negative: TriState,
    pub false_positives: Vec<String>,
    pub ignore_false_positives: bool,
}

impl Default for DirectionOutcome {
    // Unclassified state tallies as a fail in both criteria.
    fn default() -> Self {
        Self {
            results: IndexSet::new(),
            missing: TriState::True,
            true_negative: TriState::False,
            false_positives: Vec::new(),
            ignore_false_positives: false,
        }
    }
}

impl DirectionOutcome {
    pub fn passed(&self) -> bool {
        matches!(self.missing, TriState::False | TriState::NotApplicable)
            && matches!(self.true_negative, TriState::True | TriState::NotApplicable)
            && (self.ignore_false_positives || self.false_positives.is_empty())
    }
}

/// One declared form pair, the atomic unit of testing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub left: String,
    pub right: String,
    pub relation: Relation,
    pub analysis: DirectionOutcome,
    pub generation: DirectionOutcome,
}

impl Expectation {
    pub fn new(left: impl Into<String>, right: impl Into<String>, relation: Relation) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            relation,
            analysis: DirectionOutcome::default(),
            generation: DirectionOutcome::default(),
        }
    }

    pub fn outcome(&self, direction: Direction) -> &DirectionOutcome {
        match direction {
            Direction::Analysis => &self.analysis,
            Direction::Generation => &self.generation,
        }
    }

    pub fn passed_analysis(&self) -> bool {
        self.analysis.passed()
    }

    pub fn passed_generation(&self) -> bool {
        self.generation.passed()
    }

    pub fn passed(&self) -> bool {
        self.passed_analysis() && self.passed_generation()
    }

    /// Overall verdict over the selected directions only.
    pub fn passed_in(&self, only: Option<Direction>) -> bool {
        Direction::selected(only)
            .iter()
            .all(|&direction| self.outcome(direction).passed())
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.relation, self.right)
    }
}

/// Pass/fail counters for a section or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub analysis_passes: usize,
    pub analysis_fails: usize,
    pub generation_passes: usize,
    pub generation_fails: usize,
}

impl Counts {
    pub fn passes(&self) -> usize {
        self.analysis_passes + self.generation_passes
    }

    pub fn fails(&self) -> usize {
        self.analysis_fails + self.generation_fails
    }

    pub fn total(&self) -> usize {
        self.passes() + self.fails()
    }

    pub fn has_fails(&self) -> bool {
        self.fails() > 0
    }

    /// Keeps the counters of the selected direction and zeroes the other.
    pub fn restricted(self, only: Option<Direction>) -> Counts {
        match only {
            None => self,
            Some(Direction::Analysis) => Counts {
                generation_passes: 0,
                generation_fails: 0,
                ..self
            },
            Some(Direction::Generation) => Counts {
                analysis_passes: 0,
                analysis_fails: 0,
                ..self
            },
        }
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Self) {
        self.analysis_passes += rhs.analysis_passes;
        self.analysis_fails += rhs.analysis_fails;
        self.generation_passes += rhs.generation_passes;
        self.generation_fails += rhs.generation_fails;
    }
}

/// A named, ordered group of expectations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    /// 1-based position in the corpus.
    pub index: usize,
    pub expectations: Vec<Expectation>,
    pub counts: Counts,
}

impl Section {
    pub fn new(title: impl Into<String>, index: usize, expectations: Vec<Expectation>) -> Self {
        Self {
            title: title.into(),
            index,
            expectations,
            counts: Counts::default(),
        }
    }

    /// Recomputes the counters from the expectations' verdicts.
    ///
    /// Must run after every expectation in the section has been classified;
    /// unclassified expectations count as fails in both directions.
    pub fn tally(&mut self) {
        let mut counts = Counts::default();
        for e in &self.expectations {
            if e.passed_analysis() {
                counts.analysis_passes += 1;
            } else {
                counts.analysis_fails += 1;
            }
            if e.passed_generation() {
                counts.generation_passes += 1;
            } else {
                counts.generation_fails += 1;
            }
        }
        self.counts = counts;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }
}

/// Read-only snapshot of a finished run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Executed sections in corpus order, classified and tallied.
    pub sections: Vec<Section>,
    /// Sum of the section counters over the selected directions.
    pub totals: Counts,
    pub exit_status: ExitStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_tokens_parse() {
        assert_eq!("=>".parse::<Relation>(), Ok(Relation::GenerateOnly));
        assert_eq!("<=".parse::<Relation>(), Ok(Relation::AnalyzeOnly));
        assert_eq!("<=>".parse::<Relation>(), Ok(Relation::Bidirectional));
        assert!("->".parse::<Relation>().is_err());
        assert!(" <=".parse::<Relation>().is_err());
    }

    #[test]
    fn unclassified_section_tallies_all_fail() {
        let mut section = Section::new(
            "Nouns",
            1,
            vec![
                Expectation::new("cat+N", "cat", Relation::Bidirectional),
                Expectation::new("dog+N", "dog", Relation::GenerateOnly),
            ],
        );
        section.tally();
        assert_eq!(
            section.counts,
            Counts {
                analysis_passes: 0,
                analysis_fails: 2,
                generation_passes: 0,
                generation_fails: 2,
            }
        );
    }

    #[test]
    fn restricted_counts_keep_one_direction() {
        let counts = Counts {
            analysis_passes: 3,
            analysis_fails: 1,
            generation_passes: 2,
            generation_fails: 4,
        };
        assert_eq!(counts.restricted(None), counts);
        let analysis = counts.restricted(Some(Direction::Analysis));
        assert_eq!((analysis.passes(), analysis.fails()), (3, 1));
        let generation = counts.restricted(Some(Direction::Generation));
        assert_eq!((generation.passes(), generation.fails()), (2, 4));
    }

    #[test]
    fn ignored_false_positives_do_not_fail() {
        let mut outcome = DirectionOutcome {
            missing: TriState::False,
            true_negative: TriState::NotApplicable,
            false_positives: vec!["dog".into()],
            ..Default::default()
        };
        assert!(!outcome.passed());
        outcome.ignore_false_positives = true;
        assert!(outcome.passed());
    }
}
