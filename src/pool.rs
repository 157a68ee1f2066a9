use crate::backend::{DEFAULT_TIMEOUT, Lookup, collect_lookups};
use crate::error::MorphTestError;
use crate::{t, t_args};
use deadpool::managed::{Manager, Metrics, Pool, RecycleError, RecycleResult};
use futures::future::try_join_all;
use std::borrow::Cow;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

/// A persistent lookup process that answers many batches.
pub struct FstProcess {
    pub child: Child,
    pub stdin: BufWriter<ChildStdin>,
    pub stdout: BufReader<ChildStdout>,
}

impl FstProcess {
    /// Sends a batch and reads one blank-line terminated block per input.
    pub async fn process_batch(
        &mut self,
        inputs: &[String],
    ) -> Result<Vec<Vec<Lookup>>, MorphTestError> {
        debug!("{}", t_args!("debug-pool-batch", "count" => inputs.len()));
        let io_err = |e: std::io::Error| MorphTestError::lookup(t_args!("pool-io-error", "error" => &e));

        for input in inputs {
            self.stdin.write_all(input.trim().as_bytes()).await.map_err(io_err)?;
            self.stdin.write_all(b"\n").await.map_err(io_err)?;
        }
        self.stdin.flush().await.map_err(io_err)?;

        let mut lines = Vec::new();
        let mut line = String::new();
        let mut blocks = 0;
        let mut in_block = false;
        while blocks < inputs.len() {
            line.clear();
            let read = tokio::time::timeout(DEFAULT_TIMEOUT, self.stdout.read_line(&mut line))
                .await
                .map_err(|_| {
                    MorphTestError::lookup(t_args!("pool-timeout", "seconds" => DEFAULT_TIMEOUT.as_secs()))
                })?
                .map_err(io_err)?;
            if read == 0 {
                return Err(MorphTestError::lookup(t!("pool-process-exited")));
            }
            if line.trim().is_empty() {
                if in_block {
                    blocks += 1;
                    in_block = false;
                }
                continue;
            }
            in_block = true;
            lines.push(line.clone());
        }

        let results = collect_lookups(inputs, lines.iter().map(String::as_str));
        debug!(
            "{}",
            t_args!("debug-pool-completed",
                "inputs" => inputs.len(),
                "results" => results.iter().map(Vec::len).sum::<usize>()
            )
        );
        Ok(results)
    }
}

impl Drop for FstProcess {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Creates and recycles lookup processes for one transducer.
pub struct FstProcessManager {
    pub lookup_cmd: String,
    pub fst_path: String,
    pub quiet: bool,
}

impl Manager for FstProcessManager {
    type Type = FstProcess;
    type Error = MorphTestError;

    async fn create(&self) -> Result<FstProcess, MorphTestError> {
        let mut child = Command::new(&self.lookup_cmd)
            .arg(&self.fst_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if self.quiet {
                Stdio::null()
            } else {
                Stdio::inherit()
            })
            .spawn()
            .map_err(|e| {
                MorphTestError::lookup(t_args!("backend-failed-to-start",
                    "cmd" => &self.lookup_cmd,
                    "error" => &e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MorphTestError::lookup(t!("pool-missing-stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MorphTestError::lookup(t!("pool-missing-stdout")))?;

        Ok(FstProcess {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
        })
    }

    async fn recycle(
        &self,
        obj: &mut FstProcess,
        _metrics: &Metrics,
    ) -> RecycleResult<MorphTestError> {
        match obj.child.try_wait() {
            Ok(Some(_)) => Err(RecycleError::Message(Cow::Owned(t!("pool-process-exited")))),
            Ok(None) => Ok(()),
            Err(_) => Err(RecycleError::Message(Cow::Owned(t!(
                "pool-process-status-error"
            )))),
        }
    }
}

/// Lookup engine backed by one process pool per transducer.
pub struct PooledBackend {
    analyze_pool: Pool<FstProcessManager>,
    generate_pool: Pool<FstProcessManager>,
}

impl PooledBackend {
    pub fn new(
        lookup_cmd: String,
        analyzer_fst: String,
        generator_fst: String,
        quiet: bool,
    ) -> Result<Self, MorphTestError> {
        let pool_size = num_cpus::get().max(1);
        let build = |fst_path: String, key: &str| {
            let manager = FstProcessManager {
                lookup_cmd: lookup_cmd.clone(),
                fst_path,
                quiet,
            };
            Pool::builder(manager)
                .max_size(pool_size)
                .build()
                .map_err(|e| MorphTestError::lookup(t_args!(key, "error" => &e)))
        };
        Ok(Self {
            analyze_pool: build(analyzer_fst, "pool-create-analyze-failed")?,
            generate_pool: build(generator_fst, "pool-create-generate-failed")?,
        })
    }

    pub async fn analyze_batch(
        &self,
        inputs: &[String],
    ) -> Result<Vec<Vec<Lookup>>, MorphTestError> {
        Self::run_chunked(&self.analyze_pool, inputs).await
    }

    pub async fn generate_batch(
        &self,
        inputs: &[String],
    ) -> Result<Vec<Vec<Lookup>>, MorphTestError> {
        Self::run_chunked(&self.generate_pool, inputs).await
    }

    /// Spreads a batch over the pool and flattens the answers back into
    /// input order.
    async fn run_chunked(
        pool: &Pool<FstProcessManager>,
        inputs: &[String],
    ) -> Result<Vec<Vec<Lookup>>, MorphTestError> {
        if inputs.is_empty() {
            return Ok(vec![]);
        }
        let chunk_size = inputs.len().div_ceil(pool.status().max_size).max(1);
        let futures = inputs.chunks(chunk_size).map(|chunk| {
            let pool = pool.clone();
            async move {
                let mut process = pool.get().await.map_err(|e| {
                    MorphTestError::lookup(t_args!("pool-get-failed", "error" => &e))
                })?;
                process.process_batch(chunk).await
            }
        });
        let chunk_results = try_join_all(futures).await?;
        Ok(chunk_results.into_iter().flatten().collect())
    }

    /// Starts one process from each pool so a bad command or transducer
    /// fails before any lookups.
    pub async fn validate(&self) -> Result<(), MorphTestError> {
        for pool in [&self.analyze_pool, &self.generate_pool] {
            let fst = &pool.manager().fst_path;
            if !std::path::Path::new(fst).is_file() {
                return Err(MorphTestError::lookup(t_args!("backend-fst-not-found", "path" => fst)));
            }
            pool.get().await.map_err(|e| {
                MorphTestError::lookup(t_args!("pool-validate-failed", "error" => &e))
            })?;
        }
        Ok(())
    }
}
