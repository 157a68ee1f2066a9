use crate::types::{Counts, Direction, Expectation, RunResult, Section};
use colored::Colorize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputKind {
    #[default]
    Normal,
    Compact,
    Terse,
    Final,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    pub kind: OutputKind,
    pub hide_passes: bool,
    pub hide_fails: bool,
    /// Renders only this direction.
    pub only: Option<Direction>,
}

const RULE_WIDTH: usize = 72;

fn mark(passed: bool) -> String {
    if passed {
        "[✓]".green().bold().to_string()
    } else {
        "[✗]".red().bold().to_string()
    }
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Analysis => "Analysis",
        Direction::Generation => "Generation",
    }
}

/// Human-readable reasons a direction did or did not pass.
pub fn direction_notes(e: &Expectation, direction: Direction) -> Vec<String> {
    let outcome = e.outcome(direction);
    let (target, input) = match direction {
        Direction::Analysis => (&e.left, &e.right),
        Direction::Generation => (&e.right, &e.left),
    };
    let mut notes = Vec::new();
    if outcome.missing.is_true() {
        notes.push(format!("{} {target}", "missing".yellow()));
    }
    if outcome.true_negative.is_false() {
        notes.push(format!("{} {input} -> {target}", "forbidden".red()));
    }
    if !outcome.false_positives.is_empty() {
        let label = if outcome.ignore_false_positives {
            "unexpected (ignored)".dimmed()
        } else {
            "unexpected".red()
        };
        notes.push(format!("{label} {}", outcome.false_positives.join(", ")));
    }
    notes
}

fn render_counts(counts: &Counts, only: Option<Direction>) -> String {
    let fails = |n: usize| {
        if n > 0 {
            n.to_string().red().bold().to_string()
        } else {
            n.to_string().green().to_string()
        }
    };
    Direction::selected(only)
        .iter()
        .map(|&direction| {
            let (passes, failed) = match direction {
                Direction::Analysis => (counts.analysis_passes, counts.analysis_fails),
                Direction::Generation => (counts.generation_passes, counts.generation_fails),
            };
            format!(
                "{} passes: {} / fails: {}",
                direction_label(direction),
                passes.to_string().green(),
                fails(failed)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_section_normal(section: &Section, opts: &ReportOptions, out: &mut String) {
    let rule = "-".repeat(RULE_WIDTH);
    out.push_str(&format!("{}\n", rule.yellow()));
    out.push_str(&format!("{} ({})\n", section.title.bold(), section.index));
    out.push_str(&format!("{}\n", rule.yellow()));
    for e in &section.expectations {
        let passed = e.passed_in(opts.only);
        if (passed && opts.hide_passes) || (!passed && opts.hide_fails) {
            continue;
        }
        out.push_str(&format!("{} {e}\n", mark(passed)));
        for &direction in Direction::selected(opts.only) {
            let outcome = e.outcome(direction);
            let mut line = format!(
                "    {} {:<11}",
                mark(outcome.passed()),
                direction_label(direction)
            );
            let notes = direction_notes(e, direction);
            if !notes.is_empty() {
                line.push(' ');
                line.push_str(&notes.join("; "));
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out.push_str(&render_counts(&section.counts, opts.only));
    out.push_str("\n\n");
}

fn render_section_compact(section: &Section, only: Option<Direction>, out: &mut String) {
    let status = if section.counts.restricted(only).has_fails() {
        "[FAIL]".red().bold()
    } else {
        "[PASS]".green().bold()
    };
    out.push_str(&format!(
        "{status} {} ({}): {}\n",
        section.title,
        section.index,
        render_counts(&section.counts, only)
    ));
}

fn render_section_terse(section: &Section, only: Option<Direction>, out: &mut String) {
    let mut marks = String::new();
    for e in &section.expectations {
        for &direction in Direction::selected(only) {
            if e.outcome(direction).passed() {
                marks.push_str(&".".green().to_string());
            } else {
                marks.push_str(&"F".red().bold().to_string());
            }
        }
    }
    out.push_str(&format!("{}: {marks}\n", section.title));
}

fn render_final(totals: &Counts, out: &mut String) {
    out.push_str(&format!(
        "Total passes: {}, Total fails: {}, Total: {}\n",
        totals.passes().to_string().green(),
        if totals.has_fails() {
            totals.fails().to_string().red().bold().to_string()
        } else {
            totals.fails().to_string().green().to_string()
        },
        totals.total().to_string().cyan()
    ));
}

pub fn render_human(result: &RunResult, opts: &ReportOptions) -> String {
    let mut out = String::new();
    for section in &result.sections {
        match opts.kind {
            OutputKind::Normal => render_section_normal(section, opts, &mut out),
            OutputKind::Compact => render_section_compact(section, opts.only, &mut out),
            OutputKind::Terse => render_section_terse(section, opts.only, &mut out),
            OutputKind::Final => {}
        }
    }
    render_final(&result.totals, &mut out);
    out
}

pub fn print_human(result: &RunResult, opts: &ReportOptions) {
    print!("{}", render_human(result, opts));
}
