use anyhow::{Result, anyhow};
use clap::{CommandFactory, Parser, ValueEnum, error::ErrorKind};
use colored::Colorize;
use colored::control::set_override as set_color_override;
use morph_test_bidir::backend::{Backend, DEFAULT_TIMEOUT, ExternalBackend};
use morph_test_bidir::corpus::{BackendChoice, Corpus, load_corpora};
use morph_test_bidir::engine::{RunConfig, run};
use morph_test_bidir::engine_async::run_async;
use morph_test_bidir::error::MorphTestError;
use morph_test_bidir::i18n;
use morph_test_bidir::pool::PooledBackend;
use morph_test_bidir::report::{OutputKind, ReportOptions, print_human};
use morph_test_bidir::types::{Direction, RunResult};
use morph_test_bidir::{t, t_args};
use regex::Regex;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{error, info};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum BackendOpt {
    Auto,
    Hfst,
    Foma,
}

impl From<BackendOpt> for BackendChoice {
    fn from(v: BackendOpt) -> Self {
        match v {
            BackendOpt::Auto => BackendChoice::Auto,
            BackendOpt::Hfst => BackendChoice::Hfst,
            BackendOpt::Foma => BackendChoice::Foma,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Compact,
    Terse,
    Final,
    Normal,
}

impl From<OutputFormat> for OutputKind {
    fn from(v: OutputFormat) -> Self {
        match v {
            OutputFormat::Normal => OutputKind::Normal,
            OutputFormat::Compact => OutputKind::Compact,
            OutputFormat::Terse => OutputKind::Terse,
            OutputFormat::Final => OutputKind::Final,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(version, author, about = t!("cli-about"))]
struct Cli {
    // TEST_PATHS: YAML corpus files or directories holding them
    #[arg(value_name = "TEST_PATHS", required = true)]
    tests: Vec<PathBuf>,

    // -S/--section is the old name of this flag
    #[arg(
        long,
        value_enum,
        default_value = "auto",
        visible_short_alias = 'S',
        visible_alias = "section",
        help = t!("cli-backend")
    )]
    backend: BackendOpt,

    #[arg(long, value_name = "FILE", visible_alias = "gen", help = t!("cli-generator"))]
    generator: Option<String>,

    #[arg(
        long,
        value_name = "FILE",
        visible_aliases = ["morph", "analyzer"],
        help = t!("cli-analyser")
    )]
    analyser: Option<String>,

    #[arg(long = "lookup-tool", value_name = "CMD", visible_alias = "app", help = t!("cli-lookup-tool"))]
    lookup_tool: Option<String>,

    #[arg(
        short = 'i',
        long = "ignore-analysis-fp",
        visible_alias = "ignore-unexpected",
        help = t!("cli-ignore-analysis-fp")
    )]
    ignore_analysis_fp: bool,

    #[arg(long = "ignore-generation-fp", help = t!("cli-ignore-generation-fp"))]
    ignore_generation_fp: bool,

    // -t/--test: number (1..N) or section title. 0 / null / list prints the sections.
    #[arg(short = 't', long = "test", value_name = "TEST", help = t!("cli-test"))]
    test: Option<String>,

    // Direction filter
    #[arg(short = 's', long = "surface", conflicts_with = "lexical", help = t!("cli-surface"))]
    surface: bool,

    #[arg(short = 'l', long = "lexical", conflicts_with = "surface", help = t!("cli-lexical"))]
    lexical: bool,

    #[arg(short = 'o', long = "output", value_enum, default_value = "normal", help = t!("cli-output"))]
    output: OutputFormat,

    #[arg(short = 'f', long = "hide-fails", conflicts_with = "hide_passes", help = t!("cli-hide-fails"))]
    hide_fails: bool,

    #[arg(short = 'p', long = "hide-passes", conflicts_with = "hide_fails", help = t!("cli-hide-passes"))]
    hide_passes: bool,

    #[arg(short = 'q', long = "silent", help = t!("cli-silent"))]
    silent: bool,

    #[arg(short = 'v', long = "verbose", help = t!("cli-verbose"))]
    verbose: bool,

    #[arg(short = 'c', long = "color", alias = "colour", conflicts_with = "no_color", help = t!("cli-color"))]
    color: bool,

    #[arg(long = "no-color", help = t!("cli-no-color"))]
    no_color: bool,

    // One-shot lookup processes instead of the process pool
    #[arg(long = "serial", help = t!("cli-serial"))]
    use_serial: bool,
}

/// What `-t/--test` asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    List,
    Number(usize),
    Title(String),
}

impl Selector {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed == "0"
            || trimmed.eq_ignore_ascii_case("null")
            || trimmed.eq_ignore_ascii_case("list")
        {
            Selector::List
        } else if let Ok(n) = trimmed.parse::<usize>() {
            Selector::Number(n)
        } else {
            Selector::Title(trimmed.to_string())
        }
    }
}

fn display_path(path: &str) -> String {
    match std::fs::canonicalize(Path::new(path)) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => path.to_string(),
    }
}

fn resolve_lookup_path(cmd: &str) -> String {
    if cmd.contains(std::path::MAIN_SEPARATOR) || cmd.starts_with("./") {
        return display_path(cmd);
    }
    match which::which(cmd) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => cmd.to_string(),
    }
}

/// Makes CLI flags at the start of help lines bold.
fn format_flags_bold(text: &str) -> String {
    static FLAG: OnceLock<Regex> = OnceLock::new();
    let flag_regex = FLAG.get_or_init(|| {
        Regex::new(r"(?m)^(\s*)(--?\w+(?:-\w+[^<\n]*)*)").expect("flag pattern is valid")
    });
    flag_regex
        .replace_all(text, |caps: &regex::Captures| {
            format!("{}{}", &caps[1], caps[2].bold())
        })
        .to_string()
}

fn localize_clap_text(text: &str) -> String {
    let replacements = [
        ("Usage:", t!("cli-error-usage").bold().underline().to_string()),
        ("Arguments:", t!("cli-help-arguments").bold().underline().to_string()),
        ("Options:", t!("cli-help-options").bold().underline().to_string()),
        ("[default:", format!("[{}:", t!("cli-help-default"))),
        ("[aliases:", format!("[{}:", t!("cli-help-aliases"))),
        ("[possible values:", format!("[{}:", t!("cli-help-possible-values"))),
        ("Print help", t!("cli-help-print-help")),
        ("Print version", t!("cli-help-print-version")),
        ("For more information, try '--help'.", t!("cli-error-help-info")),
        ("error:", t!("cli-error-label").red().bold().to_string()),
        ("tip:", t!("cli-tip-label")),
    ];
    let mut text = text.to_string();
    for (from, to) in &replacements {
        text = text.replace(from, to);
    }
    let name = env!("CARGO_PKG_NAME");
    format_flags_bold(&text.replace(name, &name.bold().to_string()))
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp => {
                let help = Cli::command().render_long_help().to_string();
                println!("{}", localize_clap_text(&help));
                std::process::exit(0);
            }
            ErrorKind::DisplayVersion => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            _ => {
                eprintln!("{}", localize_clap_text(&err.to_string()));
                std::process::exit(1);
            }
        },
    }
}

fn print_section_list(corpora: &[Corpus]) {
    println!("{}", t!("available-tests"));
    for corpus in corpora {
        println!("{}", corpus.name.bold());
        for section in &corpus.sections {
            println!(
                "{}",
                t_args!("test-list-item",
                    "index" => section.index,
                    "title" => &section.title,
                    "count" => section.expectations.len()
                )
            );
        }
    }
}

/// Resolves `-t` for one corpus. `None` runs everything, `Some(None)` means
/// the corpus does not contain the requested title.
fn scope_for(corpus: &Corpus, selector: Option<&Selector>) -> Option<Option<usize>> {
    match selector {
        None | Some(Selector::List) => Some(None),
        Some(Selector::Number(n)) => Some(Some(*n)),
        Some(Selector::Title(title)) => corpus
            .sections
            .iter()
            .find(|s| &s.title == title)
            .map(|s| Some(s.index)),
    }
}

fn direction_filter(cli: &Cli) -> Option<Direction> {
    if cli.surface {
        Some(Direction::Analysis)
    } else if cli.lexical {
        Some(Direction::Generation)
    } else {
        None
    }
}

/// Lookup settings after applying the command line overrides.
struct Effective {
    lookup_cmd: String,
    generator: String,
    analyser: String,
}

fn effective_backend(cli: &Cli, corpus: &Corpus) -> Result<Effective, MorphTestError> {
    let missing = |what: &str| {
        MorphTestError::corpus(
            corpus.path.display().to_string(),
            t_args!("error-missing-fst", "what" => what),
        )
    };
    let generator = cli
        .generator
        .clone()
        .or_else(|| corpus.transducers.gen_fst.clone())
        .ok_or_else(|| missing("Gen"))?;
    let analyser = cli
        .analyser
        .clone()
        .or_else(|| corpus.transducers.morph_fst.clone())
        .ok_or_else(|| missing("Morph"))?;
    let lookup_cmd = cli
        .lookup_tool
        .as_deref()
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| corpus.transducers.lookup_cmd.clone());
    Ok(Effective {
        lookup_cmd,
        generator,
        analyser,
    })
}

async fn run_corpus(cli: &Cli, corpus: Corpus, config: &RunConfig) -> Result<RunResult, MorphTestError> {
    let effective = effective_backend(cli, &corpus)?;
    if cli.verbose && !cli.silent {
        info!("{}", t_args!("info-corpus", "name" => &corpus.name));
        info!("{}", t_args!("info-lookup-tool", "path" => resolve_lookup_path(&effective.lookup_cmd)));
        info!("{}", t_args!("info-generator", "path" => display_path(&effective.generator)));
        info!("{}", t_args!("info-analyser", "path" => display_path(&effective.analyser)));
        info!(
            "{}",
            t_args!("info-starting-tests",
                "count" => corpus.expectation_count(),
                "sections" => corpus.sections.len()
            )
        );
    }

    if cli.use_serial {
        let backend = ExternalBackend {
            lookup_cmd: effective.lookup_cmd,
            generator_fst: effective.generator,
            analyzer_fst: effective.analyser,
            timeout: Some(DEFAULT_TIMEOUT),
            quiet: cli.silent,
        };
        backend.validate()?;
        run(&backend, corpus.sections, config)
    } else {
        let backend = PooledBackend::new(
            effective.lookup_cmd,
            effective.analyser,
            effective.generator,
            cli.silent,
        )?;
        backend.validate().await?;
        run_async(&backend, corpus.sections, config).await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    i18n::init();
    let cli = parse_cli();

    // -v shows INFO, -q silences everything; RUST_LOG always wins
    let default_filter = if cli.silent {
        "off"
    } else if cli.verbose {
        "morph_test_bidir=info"
    } else {
        "morph_test_bidir=warn"
    };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        set_color_override(false);
    } else if cli.color || std::io::stdout().is_terminal() {
        set_color_override(true);
    }

    let corpora = match load_corpora(&cli.tests, cli.backend.into()) {
        Ok(corpora) => corpora,
        Err(e) => {
            error!("{}", t_args!("error-fatal", "error" => &e));
            std::process::exit(e.exit_code());
        }
    };
    if corpora.is_empty() {
        if cli.silent {
            std::process::exit(3);
        }
        return Err(anyhow!(t!("error-no-corpus")));
    }

    let selector = cli.test.as_deref().map(Selector::parse);
    if selector == Some(Selector::List) {
        if !cli.silent {
            print_section_list(&corpora);
        }
        return Ok(());
    }

    if cli.verbose && !cli.silent {
        info!(
            "{}",
            t_args!("info-version",
                "name" => env!("CARGO_PKG_NAME"),
                "version" => env!("CARGO_PKG_VERSION")
            )
        );
    }

    let opts = ReportOptions {
        kind: cli.output.into(),
        hide_passes: cli.hide_passes,
        hide_fails: cli.hide_fails,
        only: direction_filter(&cli),
    };
    let mut exit_code = 0;
    let mut matched_title = false;
    for corpus in corpora {
        let Some(scope) = scope_for(&corpus, selector.as_ref()) else {
            continue;
        };
        matched_title = true;
        let config = RunConfig {
            scope,
            ignore_analysis_fp: cli.ignore_analysis_fp,
            ignore_generation_fp: cli.ignore_generation_fp,
            only: direction_filter(&cli),
        };
        match run_corpus(&cli, corpus, &config).await {
            Ok(result) => {
                if !cli.silent {
                    print_human(&result, &opts);
                }
                if cli.verbose && !cli.silent {
                    info!(
                        "{}",
                        t_args!("info-finished",
                            "passed" => result.totals.passes(),
                            "failed" => result.totals.fails()
                        )
                    );
                }
                exit_code = exit_code.max(result.exit_status.code());
            }
            Err(e) => {
                match &e {
                    MorphTestError::SectionNotFound {
                        requested,
                        available,
                    } => error!(
                        "{}",
                        t_args!("error-section-not-found",
                            "requested" => requested,
                            "available" => available
                        )
                    ),
                    _ => error!("{}", t_args!("error-fatal", "error" => &e)),
                }
                exit_code = exit_code.max(e.exit_code());
            }
        }
    }

    if let Some(Selector::Title(title)) = &selector {
        if !matched_title {
            error!("{}", t_args!("error-test-not-found", "test" => title));
            exit_code = exit_code.max(2);
        }
    }

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
