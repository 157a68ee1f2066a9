use crate::index::ExpectationIndex;
use crate::types::{DirectionOutcome, Expectation, Relation, TriState};

/// Classifies both directions of `expectation` from its stored lookup
/// results. Every outcome field is rewritten, so classifying again with the
/// same results gives the same state.
pub fn classify(
    expectation: &mut Expectation,
    index: &ExpectationIndex,
    ignore_analysis_fp: bool,
    ignore_generation_fp: bool,
) {
    let Expectation {
        left,
        right,
        relation,
        analysis,
        generation,
    } = expectation;
    let relation = *relation;

    // Analyzing `right` should (or must not) give back `left`.
    classify_direction(
        analysis,
        left,
        relation.requires_analysis(),
        relation,
        |result| index.is_expected_analysis(right, result),
        ignore_analysis_fp,
    );
    // Generating from `left` should (or must not) give back `right`.
    classify_direction(
        generation,
        right,
        relation.requires_generation(),
        relation,
        |result| index.is_expected_generation(left, result),
        ignore_generation_fp,
    );
}

fn classify_direction(
    outcome: &mut DirectionOutcome,
    target: &str,
    required: bool,
    relation: Relation,
    is_expected: impl Fn(&str) -> bool,
    ignore_false_positives: bool,
) {
    outcome.ignore_false_positives = ignore_false_positives;
    outcome.false_positives.clear();
    if required {
        outcome.missing = TriState::True;
        outcome.true_negative = if relation == Relation::Bidirectional {
            TriState::NotApplicable
        } else {
            TriState::True
        };
    } else {
        outcome.missing = TriState::NotApplicable;
        outcome.true_negative = TriState::True;
    }

    for result in &outcome.results {
        if result == target {
            if required {
                outcome.missing = TriState::False;
            } else {
                outcome.true_negative = TriState::False;
            }
        } else if !is_expected(result) {
            outcome.false_positives.push(result.clone());
        }
    }
}
