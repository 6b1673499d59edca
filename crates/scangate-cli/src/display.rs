use colored::*;
use scangate_core::policy::{Decision, Policy};
use scangate_core::report::{Confidence, Finding, Report, Severity, ToolKind, ToolOutcome};
use std::fmt::{self, Write};

/// Findings listed per tool before the rest are summarized.
const MAX_LISTED_FINDINGS: usize = 20;

/// Render the human-readable report.
pub fn render_report(
    report: &Report,
    decision: &Decision,
    policy: &Policy,
) -> Result<String, fmt::Error> {
    let mut out = String::new();

    writeln!(out)?;
    writeln!(
        out,
        "{}",
        format!(
            " scangate v{} - Scanning {}",
            env!("CARGO_PKG_VERSION"),
            report.target().display()
        )
        .bold()
    )?;
    writeln!(out, " {} Policy: {}", "|-".dimmed(), policy.name.cyan())?;
    writeln!(out)?;

    writeln!(out, " {}", "Security Scan Summary".bold().underline())?;
    for kind in ToolKind::ALL {
        writeln!(out, " {} {}", "|-".dimmed(), summary_line(report, kind, policy))?;
    }
    writeln!(out)?;

    for tool in report.tools() {
        if let ToolOutcome::Findings { findings } = &tool.outcome {
            if findings.is_empty() {
                continue;
            }
            writeln!(out, " {}", format!("{} ({})", tool.kind.label(), tool.program).bold())?;
            for finding in findings.iter().take(MAX_LISTED_FINDINGS) {
                render_finding(&mut out, finding)?;
            }
            if findings.len() > MAX_LISTED_FINDINGS {
                writeln!(
                    out,
                    "   {} ... and {} more (use --format json for the full list)",
                    "|".dimmed(),
                    findings.len() - MAX_LISTED_FINDINGS
                )?;
            }
            writeln!(out)?;
        }
    }

    writeln!(out, " {}", "=".repeat(60).dimmed())?;
    let verdict = if decision.verdict.is_pass() {
        "PASS".green().bold().to_string()
    } else {
        "FAIL".red().bold().to_string()
    };
    writeln!(out, " Final Decision: {}", verdict)?;
    for reason in decision.verdict.reasons() {
        writeln!(out, "   {} {}", "|".dimmed(), reason)?;
    }
    for advisory in &decision.advisories {
        writeln!(out, "   {} {} {}", "|".dimmed(), "advisory:".yellow(), advisory)?;
    }
    writeln!(out)?;

    Ok(out)
}

/// One line per tool. A failed tool never shows a bare count.
fn summary_line(report: &Report, kind: ToolKind, policy: &Policy) -> String {
    let advisory = if policy.rule(kind).advisory {
        format!(" {}", "(advisory)".dimmed())
    } else {
        String::new()
    };

    let Some(tool) = report.tool(kind) else {
        return format!(
            "{}: {}{}",
            kind.label(),
            "NOT RUN".red().bold(),
            advisory
        );
    };

    match &tool.outcome {
        ToolOutcome::Findings { findings } => {
            let count = if findings.is_empty() {
                "0".green().to_string()
            } else {
                findings.len().to_string().red().bold().to_string()
            };
            let low = findings
                .iter()
                .filter(|f| f.confidence == Confidence::Low)
                .count();
            let low_note = if low > 0 {
                format!(" ({} low-confidence)", low).yellow().to_string()
            } else {
                String::new()
            };
            format!(
                "{} ({}): {}{}{}",
                kind.label(),
                tool.program,
                count,
                low_note,
                advisory
            )
        }
        other => format!(
            "{} ({}): {} {}{}",
            kind.label(),
            tool.program,
            "ERROR".on_red().white().bold(),
            other.failure_text().unwrap_or_default(),
            advisory
        ),
    }
}

fn render_finding(out: &mut String, finding: &Finding) -> fmt::Result {
    let tag = match finding.severity {
        Severity::Critical => format!(" {} ", finding.severity.symbol()).on_red().white().bold(),
        Severity::High => format!(" {} ", finding.severity.symbol()).on_yellow().black().bold(),
        Severity::Medium => format!(" {} ", finding.severity.symbol()).on_blue().white().bold(),
        Severity::Low | Severity::Unknown => format!(" {} ", finding.severity.symbol()).dimmed(),
    };

    let mut line = format!("   {} {}", tag, finding.message);
    if let Some(rule) = &finding.rule {
        line.push_str(&format!(" [{}]", rule).dimmed().to_string());
    }
    if finding.confidence == Confidence::Low {
        line.push_str(&format!(" {}", "(low confidence)".yellow()));
    }
    writeln!(out, "{}", line)?;

    if let Some(location) = &finding.location {
        writeln!(out, "     {} {}", "|".dimmed(), location.dimmed())?;
    }
    Ok(())
}
