use crate::error::MorphTestError;
use crate::types::{Expectation, Relation, Section};
use crate::{t, t_args};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    #[default]
    Auto,
    Hfst,
    Foma,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct HfstCfg {
    pub r#gen: Option<String>,
    pub morph: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct FomaCfg {
    pub r#gen: Option<String>,
    pub morph: Option<String>,
    pub app: Option<String>, // default: flookup
}

#[derive(Debug, Deserialize, Clone)]
pub struct RawConfig {
    #[serde(alias = "Hfst")]
    pub hfst: Option<HfstCfg>,
    #[serde(alias = "Foma", alias = "xerox", alias = "Xerox")]
    pub foma: Option<FomaCfg>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// left form -> relation token -> right form(s)
type RawSection = IndexMap<String, IndexMap<String, OneOrMany>>;

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct RawCorpus {
    pub config: Option<RawConfig>,
    pub tests: IndexMap<String, RawSection>,
}

/// Transducers and lookup tool named by a corpus file. Paths are already
/// resolved against the file's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransducerConfig {
    pub backend: BackendChoice,
    pub lookup_cmd: String,
    pub gen_fst: Option<String>,
    pub morph_fst: Option<String>,
}

/// One loaded corpus file.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub name: String,
    pub path: PathBuf,
    pub sections: Vec<Section>,
    pub transducers: TransducerConfig,
}

impl Corpus {
    pub fn expectation_count(&self) -> usize {
        self.sections.iter().map(|s| s.expectations.len()).sum()
    }
}

/// Expands directories into their `*.yaml`/`*.yml` files.
pub fn discover_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, MorphTestError> {
    let mut files = Vec::new();
    for p in paths {
        if !p.is_dir() {
            files.push(p.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(p) {
            let entry = entry.map_err(|e| MorphTestError::corpus(p.display().to_string(), e.to_string()))?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml")
            {
                found.push(path.to_path_buf());
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

pub fn load_corpora(paths: &[PathBuf], prefer: BackendChoice) -> Result<Vec<Corpus>, MorphTestError> {
    discover_files(paths)?
        .iter()
        .map(|f| load_corpus(f, prefer))
        .collect()
}

pub fn load_corpus(file: &Path, prefer: BackendChoice) -> Result<Corpus, MorphTestError> {
    let content = fs::read_to_string(file).map_err(|e| {
        MorphTestError::corpus(
            file.display().to_string(),
            t_args!("corpus-failed-to-read", "error" => &e),
        )
    })?;
    parse_corpus(&content, file, prefer)
}

/// Parses corpus text. `file` names the source in errors and anchors
/// relative transducer paths.
pub fn parse_corpus(content: &str, file: &Path, prefer: BackendChoice) -> Result<Corpus, MorphTestError> {
    let file_label = file.display().to_string();
    let raw: RawCorpus = serde_yaml::from_str(content).map_err(|e| {
        MorphTestError::corpus(&file_label, t_args!("corpus-yaml-error", "error" => &e))
    })?;

    let transducers = resolve_backend(raw.config.as_ref(), prefer, file)
        .map_err(|message| MorphTestError::corpus(&file_label, message))?;

    let mut sections = Vec::with_capacity(raw.tests.len());
    for (position, (title, raw_section)) in raw.tests.iter().enumerate() {
        let title = title.trim();
        let expectations = build_expectations(raw_section)
            .map_err(|message| {
                MorphTestError::corpus(
                    &file_label,
                    t_args!("corpus-in-section", "section" => title, "error" => &message),
                )
            })?;
        debug!(section = title, count = expectations.len(), "loaded section");
        sections.push(Section::new(title, position + 1, expectations));
    }

    Ok(Corpus {
        name: file
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "corpus".to_string()),
        path: file.to_path_buf(),
        sections,
        transducers,
    })
}

fn build_expectations(raw: &RawSection) -> Result<Vec<Expectation>, String> {
    let mut expectations = Vec::new();
    for (left, relations) in raw {
        let left = left.trim();
        if left.is_empty() {
            return Err(t!("corpus-empty-form"));
        }
        for (token, rights) in relations {
            let relation: Relation = token.trim().parse().map_err(|bad: String| {
                t_args!("corpus-bad-relation", "token" => &bad, "left" => left)
            })?;
            let rights: Vec<&str> = match rights {
                OneOrMany::One(s) => vec![s.trim()],
                OneOrMany::Many(v) => v.iter().map(|s| s.trim()).collect(),
            };
            for right in rights {
                if right.is_empty() {
                    return Err(t!("corpus-empty-form"));
                }
                expectations.push(Expectation::new(left, right, relation));
            }
        }
    }
    Ok(expectations)
}

fn resolve_path_relative_to_yaml(path: &str, yaml_file_path: &Path) -> String {
    let path_buf = Path::new(path);
    if path_buf.is_absolute() {
        return path.to_string();
    }
    match yaml_file_path.parent() {
        Some(yaml_dir) => yaml_dir.join(path).to_string_lossy().into_owned(),
        None => path.to_string(),
    }
}

/// Picks the HFST lookup tool from the transducer format.
pub fn determine_hfst_lookup_tool(gen_path: Option<&str>, morph_path: Option<&str>) -> String {
    for path in [gen_path, morph_path].into_iter().flatten() {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some("hfst") => return "hfst-lookup".to_string(),
            Some("hfstol") => return "hfst-optimised-lookup".to_string(),
            _ => {}
        }
    }
    "hfst-optimised-lookup".to_string()
}

fn resolve_backend(
    cfg: Option<&RawConfig>,
    prefer: BackendChoice,
    yaml_file_path: &Path,
) -> Result<TransducerConfig, String> {
    let resolve = |p: &Option<String>| {
        p.as_deref()
            .map(|p| resolve_path_relative_to_yaml(p.trim(), yaml_file_path))
    };
    let hfst = cfg.and_then(|c| c.hfst.as_ref());
    let foma = cfg.and_then(|c| c.foma.as_ref());

    let chosen = match prefer {
        BackendChoice::Auto => {
            if hfst.is_some_and(|h| h.r#gen.is_some()) || foma.is_none() {
                BackendChoice::Hfst
            } else {
                BackendChoice::Foma
            }
        }
        other => other,
    };

    match chosen {
        BackendChoice::Foma => {
            let x = foma.ok_or_else(|| t!("corpus-missing-foma"))?;
            let gen_fst = resolve(&x.r#gen);
            let morph_fst = resolve(&x.morph);
            let lookup_cmd = x
                .app
                .as_deref()
                .unwrap_or("flookup")
                .trim()
                .to_string();
            Ok(TransducerConfig {
                backend: BackendChoice::Foma,
                lookup_cmd,
                gen_fst,
                morph_fst,
            })
        }
        _ => {
            // An explicit `--backend hfst` needs the block; otherwise the
            // paths may come from the command line.
            if prefer == BackendChoice::Hfst && cfg.is_some() && hfst.is_none() {
                return Err(t!("corpus-missing-hfst"));
            }
            let gen_fst = hfst.and_then(|h| resolve(&h.r#gen));
            let morph_fst = hfst.and_then(|h| resolve(&h.morph));
            let lookup_cmd = determine_hfst_lookup_tool(gen_fst.as_deref(), morph_fst.as_deref());
            Ok(TransducerConfig {
                backend: BackendChoice::Hfst,
                lookup_cmd,
                gen_fst,
                morph_fst,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<Corpus, MorphTestError> {
        parse_corpus(yaml, Path::new("/data/tests/nouns.yaml"), BackendChoice::Auto)
    }

    #[test]
    fn expands_lists_in_declaration_order() {
        let corpus = parse(
            r#"
Config:
  hfst:
    Gen: ../gen.hfstol
    Morph: /abs/morph.hfstol
Tests:
  Second:
    "b+N": { "<=>": b }
  First:
    "a+N+Pl":
      "=>": [ "as", "aes" ]
      "<=": ax
"#,
        )
        .unwrap();
        let titles: Vec<(&str, usize)> = corpus
            .sections
            .iter()
            .map(|s| (s.title.as_str(), s.index))
            .collect();
        assert_eq!(titles, vec![("Second", 1), ("First", 2)]);
        let first: Vec<String> = corpus.sections[1]
            .expectations
            .iter()
            .map(|e| e.to_string())
            .collect();
        assert_eq!(first, vec!["a+N+Pl => as", "a+N+Pl => aes", "a+N+Pl <= ax"]);
        assert_eq!(corpus.transducers.gen_fst.as_deref(), Some("/data/tests/../gen.hfstol"));
        assert_eq!(corpus.transducers.morph_fst.as_deref(), Some("/abs/morph.hfstol"));
        assert_eq!(corpus.transducers.lookup_cmd, "hfst-optimised-lookup");
        assert_eq!(corpus.expectation_count(), 4);
    }

    #[test]
    fn rejects_unknown_relation_token() {
        let err = parse(
            r#"
Tests:
  Nouns:
    "cat+N": { "->": cat }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, MorphTestError::CorpusFormat { .. }));
    }

    #[test]
    fn rejects_section_that_is_not_a_mapping() {
        let err = parse("Tests:\n  Nouns: [cat, dog]\n").unwrap_err();
        assert!(matches!(err, MorphTestError::CorpusFormat { .. }));
    }

    #[test]
    fn rejects_missing_tests_block() {
        let err = parse("Config:\n  hfst:\n    Gen: g.hfst\n").unwrap_err();
        assert!(matches!(err, MorphTestError::CorpusFormat { .. }));
    }

    #[test]
    fn foma_config_uses_app_or_flookup() {
        let corpus = parse(
            r#"
Config:
  xerox:
    Gen: gen.foma
    Morph: morph.foma
Tests:
  S:
    "x": { "<=>": y }
"#,
        )
        .unwrap();
        assert_eq!(corpus.transducers.backend, BackendChoice::Foma);
        assert_eq!(corpus.transducers.lookup_cmd, "flookup");
    }

    #[test]
    fn hfst_tool_follows_extension() {
        assert_eq!(determine_hfst_lookup_tool(Some("g.hfst"), None), "hfst-lookup");
        assert_eq!(
            determine_hfst_lookup_tool(None, Some("m.hfstol")),
            "hfst-optimised-lookup"
        );
        assert_eq!(determine_hfst_lookup_tool(None, None), "hfst-optimised-lookup");
    }
}
