use crate::cli::args::Cli;
use crate::error::IntelError;
use crate::models::Priority;
use crate::pipeline::{PipelineResult, PipelineStatus};
use crate::triage::sort;

pub struct ReportFormatter {
    use_colors: bool,
    verbose: bool,
}

impl ReportFormatter {
    pub fn new(cli: &Cli) -> Self {
        Self {
            use_colors: std::env::var("NO_COLOR").is_err(),
            verbose: cli.is_verbose(),
        }
    }

    pub fn plain() -> Self {
        Self {
            use_colors: false,
            verbose: false,
        }
    }

    pub fn format_pipeline_report(&self, result: &PipelineResult) -> String {
        let mut output = String::new();

        output.push_str(&self.format_header(result));
        output.push_str("\n\n");

        output.push_str(&self.format_section(
            "Summary",
            &format!(
                "Units: {} attempted, {} succeeded, {} failed\nIntelligence items: {}\nStage: {}",
                result.attempted,
                result.succeeded,
                result.failed,
                result.intelligence.len(),
                result.stage
            ),
        ));
        output.push_str("\n\n");

        if let Some(ref error) = result.error {
            output.push_str(&self.format_section("Run Error", error));
            output.push_str("\n\n");
        }

        if !result.categorized.is_empty() {
            let mut categorized = result.categorized.clone();
            sort(&mut categorized);

            let lines = categorized
                .iter()
                .map(|c| {
                    format!(
                        "{} {:<15} {:<12} {:>3}% {:>4} item(s)  [{}]",
                        self.format_priority(c.priority),
                        c.category,
                        c.subcategory,
                        (c.confidence * 100.0).round(),
                        c.item_count,
                        c.unit_id
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            output.push_str(&self.format_section("Triage", &lines));
            output.push_str("\n\n");
        }

        let failures: Vec<String> = result
            .results
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| (r, e)))
            .map(|(r, e)| {
                let mut line = format!(
                    "{}: {} ({}){}",
                    r.unit_id(),
                    e.message,
                    e.code,
                    if e.recoverable { " - retryable" } else { "" }
                );
                if self.verbose {
                    if let Some(ref details) = e.details {
                        line.push_str(&format!("\n    details: {}", details));
                    }
                    for suggestion in &e.suggestions {
                        line.push_str(&format!("\n    - {}", suggestion));
                    }
                }
                line
            })
            .collect();

        if !failures.is_empty() {
            output.push_str(&self.format_section("Failed Units", &failures.join("\n")));
            output.push_str("\n\n");
        }

        output.push_str(&format!("Completed in {}ms", result.duration_ms));
        output
    }

    fn format_header(&self, result: &PipelineResult) -> String {
        if self.use_colors {
            format!(
                "\x1b[1m\x1b[36m═══ INTELFLOW TRIAGE REPORT ═══\x1b[0m\nTarget: {} (run {})",
                result.target_url, result.run_id
            )
        } else {
            format!(
                "=== INTELFLOW TRIAGE REPORT ===\nTarget: {} (run {})",
                result.target_url, result.run_id
            )
        }
    }

    fn format_priority(&self, priority: Priority) -> String {
        let label = format!("{:<6}", priority.as_str().to_uppercase());
        if !self.use_colors {
            return label;
        }

        let color = match priority {
            Priority::High => "\x1b[1m\x1b[31m",
            Priority::Medium => "\x1b[1m\x1b[33m",
            Priority::Low => "\x1b[1m\x1b[34m",
        };
        format!("{}{}\x1b[0m", color, label)
    }

    fn format_section(&self, title: &str, content: &str) -> String {
        if self.use_colors {
            format!("\x1b[1m\x1b[37m{}\x1b[0m\n{}", title, content)
        } else {
            format!("{}\n{}\n{}", title, "─".repeat(title.len()), content)
        }
    }

    pub fn format_error(&self, error: &IntelError) -> String {
        let (color_code, reset) = if self.use_colors {
            ("\x1b[1m\x1b[31m", "\x1b[0m")
        } else {
            ("", "")
        };

        format!("{}PIPELINE ERROR{}\n\n{}", color_code, reset, error)
    }

    pub fn format_progress(&self, status: &PipelineStatus) -> String {
        let unit = status
            .current_unit
            .as_deref()
            .map(|u| format!(" [{}]", u))
            .unwrap_or_default();
        let line = format!("{:>3}% {}{}: {}", status.progress, status.stage, unit, status.message);

        if self.use_colors {
            format!("\x1b[36m{}\x1b[0m", line)
        } else {
            line
        }
    }
}
