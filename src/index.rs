use crate::types::Section;
use indexmap::{IndexMap, IndexSet};

/// Which forms any expectation in the corpus names, per lookup direction.
///
/// Built over the whole corpus even when only one section runs, so a
/// result that some other test expects is never reported as unexpected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectationIndex {
    /// right form -> left forms that analyzing it may produce
    pub analysis_expected: IndexMap<String, IndexSet<String>>,
    /// left form -> right forms that generating from it may produce
    pub generation_expected: IndexMap<String, IndexSet<String>>,
}

impl ExpectationIndex {
    pub fn build(sections: &[Section]) -> Self {
        let mut index = Self::default();
        for e in sections.iter().flat_map(|s| &s.expectations) {
            index
                .analysis_expected
                .entry(e.right.clone())
                .or_default()
                .insert(e.left.clone());
            index
                .generation_expected
                .entry(e.left.clone())
                .or_default()
                .insert(e.right.clone());
        }
        index
    }

    pub fn is_expected_analysis(&self, right: &str, result: &str) -> bool {
        self.analysis_expected
            .get(right)
            .is_some_and(|lefts| lefts.contains(result))
    }

    pub fn is_expected_generation(&self, left: &str, result: &str) -> bool {
        self.generation_expected
            .get(left)
            .is_some_and(|rights| rights.contains(result))
    }
}
