use crate::error::MorphTestError;
use indexmap::IndexMap;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// 30 seconds per batch
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One lookup result. Only `form` takes part in classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub form: String,
    pub weight: Option<f32>,
}

impl Lookup {
    pub fn new(form: impl Into<String>) -> Self {
        Self {
            form: form.into(),
            weight: None,
        }
    }
}

/// Lookup engine: analysis and generation transducers behind one interface.
///
/// Batch methods return one result list per input, in input order.
pub trait Backend: Send + Sync {
    fn analyze_batch(&self, inputs: &[String]) -> Result<Vec<Vec<Lookup>>, MorphTestError>;
    fn generate_batch(&self, inputs: &[String]) -> Result<Vec<Vec<Lookup>>, MorphTestError>;
    fn validate(&self) -> Result<(), MorphTestError>;
}

/// Parses one line of `hfst-lookup`/`flookup` output into `(input, lookup)`.
///
/// Returns `None` for blank lines, comments and the tools' no-result rows
/// (`+inf`, `@`, or flookup's `input\tinput\t+?`). Only the line ending is
/// stripped; the output column is kept exactly as the tool printed it.
pub fn parse_lookup_line(line: &str) -> Option<(String, Lookup)> {
    let line = line.trim_end_matches(['\n', '\r']);
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if (trimmed.starts_with('!') || trimmed.starts_with('#')) && !trimmed.contains('\t') {
        return None;
    }
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() < 2 {
        return None;
    }
    let input = cols[0].trim();
    let output = cols[1];
    let marker = output.trim();
    if marker.is_empty() || marker == "+inf" || marker == "@" || marker.ends_with("+?") {
        return None;
    }
    let third = cols.get(2).map(|c| c.trim());
    if input == marker && third.is_some_and(|c| c.contains("+?")) {
        return None;
    }
    let weight = third.and_then(|c| c.parse::<f32>().ok());
    Some((
        input.to_string(),
        Lookup {
            form: output.to_string(),
            weight,
        },
    ))
}

/// Groups parsed output lines by input, one list per entry of `inputs`.
pub fn collect_lookups<'a>(
    inputs: &[String],
    lines: impl Iterator<Item = &'a str>,
) -> Vec<Vec<Lookup>> {
    let mut by_input: IndexMap<String, Vec<Lookup>> = IndexMap::new();
    for input in inputs {
        by_input.entry(input.trim().to_string()).or_default();
    }
    for (input, lookup) in lines.filter_map(parse_lookup_line) {
        if let Some(results) = by_input.get_mut(&input) {
            if !results.contains(&lookup) {
                results.push(lookup);
            }
        }
    }
    inputs
        .iter()
        .map(|input| by_input.get(input.trim()).cloned().unwrap_or_default())
        .collect()
}

/// Runs an external lookup program (hfst-optimised-lookup, hfst-lookup,
/// flookup) once per batch.
#[derive(Debug, Clone)]
pub struct ExternalBackend {
    pub lookup_cmd: String,
    pub generator_fst: String,
    pub analyzer_fst: String,
    pub timeout: Option<Duration>,
    /// Silences the lookup tool's stderr.
    pub quiet: bool,
}

impl ExternalBackend {
    fn run_lookup_batch(
        &self,
        fst: &str,
        inputs: &[String],
    ) -> Result<Vec<Vec<Lookup>>, MorphTestError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        debug!(cmd = %self.lookup_cmd, fst, count = inputs.len(), "lookup batch");

        let mut child = Command::new(&self.lookup_cmd)
            .arg(fst)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if self.quiet {
                Stdio::null()
            } else {
                Stdio::inherit()
            })
            .spawn()
            .map_err(|e| {
                MorphTestError::lookup(format!("could not start '{}': {e}", self.lookup_cmd))
            })?;

        // Drain stdout while writing so a full pipe cannot block the tool.
        let stdout = child.stdout.take();
        let reader = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout {
                std::io::Read::read_to_end(&mut out, &mut buf)?;
            }
            Ok(buf)
        });

        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| MorphTestError::lookup("lookup process has no stdin"))?;
            let mut payload = String::new();
            for input in inputs {
                payload.push_str(input.trim());
                payload.push('\n');
            }
            stdin
                .write_all(payload.as_bytes())
                .map_err(|e| MorphTestError::lookup(format!("writing to lookup process: {e}")))?;
        }
        // Close stdin so the tool sees EOF.
        drop(child.stdin.take());

        match child
            .wait_timeout(timeout)
            .map_err(|e| MorphTestError::lookup(e.to_string()))?
        {
            Some(status) if status.success() => {}
            Some(status) => {
                return Err(MorphTestError::lookup(format!(
                    "'{}' exited with {status}",
                    self.lookup_cmd
                )));
            }
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MorphTestError::lookup(format!(
                    "'{}' timed out after {} s",
                    self.lookup_cmd,
                    timeout.as_secs()
                )));
            }
        }

        let raw = reader
            .join()
            .map_err(|_| MorphTestError::lookup("lookup output reader panicked"))?
            .map_err(|e| MorphTestError::lookup(format!("reading lookup output: {e}")))?;
        let stdout = String::from_utf8_lossy(&raw);
        Ok(collect_lookups(inputs, stdout.lines()))
    }
}

impl Backend for ExternalBackend {
    fn analyze_batch(&self, inputs: &[String]) -> Result<Vec<Vec<Lookup>>, MorphTestError> {
        self.run_lookup_batch(&self.analyzer_fst, inputs)
    }

    fn generate_batch(&self, inputs: &[String]) -> Result<Vec<Vec<Lookup>>, MorphTestError> {
        self.run_lookup_batch(&self.generator_fst, inputs)
    }

    fn validate(&self) -> Result<(), MorphTestError> {
        for fst in [&self.generator_fst, &self.analyzer_fst] {
            if !std::path::Path::new(fst).is_file() {
                return Err(MorphTestError::lookup(format!("transducer '{fst}' not found")));
            }
        }
        // Only checks that the command can be started; `--help` exit codes vary.
        match Command::new(&self.lookup_cmd)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MorphTestError::lookup(
                format!(
                    "lookup command '{}' not found; check that it is installed and in PATH",
                    self.lookup_cmd
                ),
            )),
            Err(e) => Err(MorphTestError::lookup(format!(
                "cannot run lookup command '{}': {e}",
                self.lookup_cmd
            ))),
        }
    }
}
