#![allow(dead_code)]

use morph_test_bidir::backend::{Backend, Lookup};
use morph_test_bidir::error::MorphTestError;
use morph_test_bidir::types::{Expectation, Relation, Section};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answers lookups from fixed tables; unknown forms give no results.
#[derive(Default)]
pub struct TableBackend {
    pub analyses: HashMap<String, Vec<String>>,
    pub generations: HashMap<String, Vec<String>>,
    pub calls: AtomicUsize,
}

impl TableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(mut self, input: &str, results: &[&str]) -> Self {
        self.analyses
            .insert(input.to_string(), results.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn generate(mut self, input: &str, results: &[&str]) -> Self {
        self.generations
            .insert(input.to_string(), results.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, table: &HashMap<String, Vec<String>>, inputs: &[String]) -> Vec<Vec<Lookup>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        inputs
            .iter()
            .map(|input| {
                table
                    .get(input)
                    .map(|forms| forms.iter().map(|f| Lookup::new(f.as_str())).collect())
                    .unwrap_or_default()
            })
            .collect()
    }
}

impl Backend for TableBackend {
    fn analyze_batch(&self, inputs: &[String]) -> Result<Vec<Vec<Lookup>>, MorphTestError> {
        Ok(self.answer(&self.analyses, inputs))
    }

    fn generate_batch(&self, inputs: &[String]) -> Result<Vec<Vec<Lookup>>, MorphTestError> {
        Ok(self.answer(&self.generations, inputs))
    }

    fn validate(&self) -> Result<(), MorphTestError> {
        Ok(())
    }
}

pub fn section(title: &str, index: usize, tests: &[(&str, &str, Relation)]) -> Section {
    Section::new(
        title,
        index,
        tests
            .iter()
            .map(|(left, right, relation)| Expectation::new(*left, *right, *relation))
            .collect(),
    )
}
