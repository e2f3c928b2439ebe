//! Console output formatter for plans, run summaries, scores and
//! consistency reports

use assay_application::{
    CollectionSummary, PoolingSummary, RunStatus, ScoreReport, SubjectStatus,
    use_cases::inspect_status::category_shortfalls,
};
use assay_domain::{ConsistencyReport, Interpretation, Polarity, QuotaPlan};
use colored::Colorize;
use serde::Serialize;

/// Formats pipeline results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format any report as pretty JSON
    pub fn format_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn format_plan(plan: &QuotaPlan, test_mode: bool) -> String {
        let mut output = String::new();
        let title = if test_mode {
            format!("Quota Plan (test mode, {} items)", plan.target)
        } else {
            format!("Quota Plan ({} items)", plan.target)
        };
        output.push_str(&Self::header(&title));
        output.push('\n');

        for category in &plan.categories {
            output.push_str(&format!(
                "\n{} {}\n",
                category.category.label().yellow().bold(),
                format!("({} items)", category.total).dimmed()
            ));
            output.push_str(&format!(
                "  {:<12} {:>9} {:>9} {:>9} {:>7}\n",
                "rater", "negative", "positive", "free", "total"
            ));
            for (rater, total) in &category.per_rater {
                let cell = |polarity: Polarity| {
                    category
                        .cells
                        .iter()
                        .find(|c| &c.rater == rater && c.polarity == polarity)
                        .map(|c| c.quota)
                        .unwrap_or(0)
                };
                output.push_str(&format!(
                    "  {:<12} {:>9} {:>9} {:>9} {:>7}\n",
                    rater.as_str(),
                    cell(Polarity::Negative),
                    cell(Polarity::Positive),
                    cell(Polarity::Free),
                    total
                ));
            }
        }

        output.push_str(&Self::footer());
        output
    }

    pub fn format_collection(summary: &CollectionSummary) -> String {
        let mut output = String::new();
        output.push_str(&Self::header(&format!("Collection: {}", summary.subject)));
        output.push('\n');

        let collected: usize = summary.cells.iter().map(|c| c.collected.min(c.quota)).sum();
        let quota: usize = summary.cells.iter().map(|c| c.quota).sum();
        output.push_str(&format!(
            "\n{} {}/{}   {} {}   {} {}   {} {}\n",
            "Collected:".cyan().bold(),
            collected,
            quota,
            "New:".cyan().bold(),
            summary.accepted(),
            "Rejected:".cyan().bold(),
            summary.rejected(),
            "Provider calls:".cyan().bold(),
            summary.provider_calls
        ));
        if summary.recollection_passes > 0 {
            output.push_str(&format!(
                "{} {}\n",
                "Re-collection passes:".cyan().bold(),
                summary.recollection_passes
            ));
        }

        let failed: Vec<_> = summary.failed_cells().collect();
        if !failed.is_empty() {
            output.push_str(&Self::section_header("Failed cells"));
            for result in failed {
                output.push_str(&format!(
                    "  {} {}: {}\n",
                    "x".red(),
                    result.task_label(),
                    result.provider_error.as_deref().unwrap_or("unknown error")
                ));
            }
        }

        let shortfalls = category_shortfalls(&summary.cells);
        if !shortfalls.is_empty() {
            output.push_str(&Self::section_header("Below quota"));
            for (category, missing) in shortfalls {
                output.push_str(&format!("  {:<20} {} short\n", category.as_str(), missing));
            }
        }

        output.push_str(&Self::status_line(&summary.status, summary.cancelled));
        output
    }

    pub fn format_pooling(summary: &PoolingSummary) -> String {
        let mut output = String::new();
        output.push_str(&Self::header(&format!("Pooled Evaluation: {}", summary.subject)));
        output.push('\n');

        output.push_str(&format!(
            "\n  {:<20} {:>7} {:>9} {:>5} {:>7} {:>8}\n",
            "category", "pairs", "existing", "new", "failed", "missing"
        ));
        for result in &summary.results {
            let missing = result.missing();
            let missing_cell = format!("{:>8}", missing);
            output.push_str(&format!(
                "  {:<20} {:>7} {:>9} {:>5} {:>7} {}\n",
                result.category.as_str(),
                result.total_pairs,
                result.existing,
                result.new_records,
                result.failed_pairs.len(),
                if missing > 0 {
                    missing_cell.red().to_string()
                } else {
                    missing_cell
                }
            ));
        }

        output.push_str(&format!(
            "\n{} {}   {} {}\n",
            "New records:".cyan().bold(),
            summary.new_records(),
            "Provider calls:".cyan().bold(),
            summary.provider_calls()
        ));

        let failed: Vec<_> = summary.failed_pairs().collect();
        if !failed.is_empty() {
            output.push_str(&Self::section_header("Unavailable pairs"));
            for pair in failed.iter().take(20) {
                output.push_str(&format!(
                    "  {} {} <- {}: {}\n",
                    "x".red(),
                    pair.item,
                    pair.evaluator,
                    pair.reason
                ));
            }
            if failed.len() > 20 {
                output.push_str(&format!("  ... and {} more\n", failed.len() - 20));
            }
        }

        output.push_str(&Self::status_line(&summary.status, summary.cancelled));
        output
    }

    pub fn format_status(status: &SubjectStatus) -> String {
        let mut output = String::new();
        output.push_str(&Self::header(&format!("Status: {}", status.subject)));
        output.push('\n');

        output.push_str(&format!(
            "\n{} {}/{}\n",
            "Collected:".cyan().bold(),
            status.collected(),
            status.target
        ));

        output.push_str(&Self::section_header("Collection"));
        output.push_str(&format!(
            "  {:<20} {:<12} {:<9} {:>9}\n",
            "category", "rater", "polarity", "items"
        ));
        for cell in &status.cells {
            let count = format!("{}/{}", cell.collected, cell.quota);
            let count = if cell.shortfall() > 0 {
                count.yellow().to_string()
            } else {
                count.green().to_string()
            };
            output.push_str(&format!(
                "  {:<20} {:<12} {:<9} {:>9}\n",
                cell.category.as_str(),
                cell.rater.as_str(),
                cell.polarity.as_str(),
                count
            ));
        }

        if !status.coverage.is_empty() {
            output.push_str(&Self::section_header("Pooling"));
            output.push_str(&format!(
                "  {:<20} {:>7} {:>9} {:>15}\n",
                "category", "items", "records", "under-sampled"
            ));
            for coverage in &status.coverage {
                output.push_str(&format!(
                    "  {:<20} {:>7} {:>9} {:>15}\n",
                    coverage.category.as_str(),
                    coverage.items,
                    format!("{}/{}", coverage.records, coverage.expected_pairs),
                    coverage.under_sampled_items
                ));
            }
        }

        if status.unavailable_pairs > 0 {
            output.push_str(&format!(
                "\n{} {} pairs marked unavailable (retried on next evaluate)\n",
                "!".yellow().bold(),
                status.unavailable_pairs
            ));
        }

        output.push_str(&Self::footer());
        output
    }

    pub fn format_score(report: &ScoreReport) -> String {
        let score = &report.score;
        let mut output = String::new();
        output.push_str(&Self::header(&format!("Score: {}", report.subject.describe())));
        output.push('\n');

        output.push_str(&format!(
            "\n{} {:.1}   {} {}\n",
            "Total:".cyan().bold(),
            score.total,
            "Grade:".cyan().bold(),
            score.grade.bold()
        ));
        output.push_str(&format!(
            "{} {} items, {} evaluation records\n",
            "Based on:".dimmed(),
            score.item_count,
            score.record_count
        ));

        output.push_str(&Self::section_header("Categories"));
        let evaluators: Vec<_> = score.evaluators.iter().map(|e| &e.evaluator).collect();
        output.push_str(&format!("  {:<20} {:>7}", "category", "pooled"));
        for evaluator in &evaluators {
            output.push_str(&format!(" {:>9}", evaluator.as_str()));
        }
        output.push('\n');
        for category in &score.categories {
            output.push_str(&format!(
                "  {:<20} {:>7.1}",
                category.category.as_str(),
                category.score
            ));
            for evaluator in &score.evaluators {
                match evaluator.category(&category.category) {
                    Some(c) if !c.is_empty() => output.push_str(&format!(" {:>9.1}", c.score)),
                    _ => output.push_str(&format!(" {:>9}", "-")),
                }
            }
            output.push('\n');
        }
        output.push_str(&format!("  {:<20} {:>7.1}", "total", score.total));
        for evaluator in &score.evaluators {
            output.push_str(&format!(" {:>9.1}", evaluator.total));
        }
        output.push('\n');

        if !score.under_sampled.is_empty() {
            output.push_str(&format!(
                "\n{} {} items have fewer evaluations than required\n",
                "!".yellow().bold(),
                score.under_sampled.len()
            ));
        }
        if !report.unavailable.is_empty() {
            output.push_str(&format!(
                "{} {} pairs could not be evaluated\n",
                "!".yellow().bold(),
                report.unavailable.len()
            ));
        }

        output.push_str(&Self::footer());
        output
    }

    pub fn format_consistency(report: &ConsistencyReport) -> String {
        let mut output = String::new();
        output.push_str(&Self::header("Evaluator Consistency"));
        output.push('\n');

        output.push_str(&format!(
            "\n{} {}   {} {}   {} {}\n",
            "Subjects:".cyan().bold(),
            report.subjects.len(),
            "Evaluators:".cyan().bold(),
            report
                .evaluators
                .iter()
                .map(|e| e.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            "Min sample:".cyan().bold(),
            report.min_sample_size
        ));

        output.push_str(&Self::section_header("Pairs"));
        output.push_str(&format!(
            "  {:<22} {:>8} {:>9} {:>7}  {}\n",
            "pair", "pearson", "spearman", "obs", "interpretation"
        ));
        for pair in &report.pairs {
            let interpretation = match pair.interpretation {
                Interpretation::Agreement => pair.interpretation.as_str().green().to_string(),
                Interpretation::CalibrationOffset | Interpretation::Disagreement => {
                    pair.interpretation.as_str().red().bold().to_string()
                }
                _ => pair.interpretation.as_str().to_string(),
            };
            output.push_str(&format!(
                "  {:<22} {:>8} {:>9} {:>7}  {}\n",
                format!("{} / {}", pair.first, pair.second),
                Self::coefficient(pair.pearson),
                Self::coefficient(pair.spearman),
                pair.observations,
                interpretation
            ));
        }

        let flagged: Vec<_> = report.flagged().collect();
        if !flagged.is_empty() {
            output.push_str(&Self::section_header("Flagged for review"));
            for pair in flagged {
                let detail = match pair.interpretation {
                    Interpretation::CalibrationOffset => {
                        "same ordering, different absolute scores"
                    }
                    _ => "rankings disagree",
                };
                output.push_str(&format!(
                    "  {} {} / {}: {}\n",
                    "!".yellow().bold(),
                    pair.first,
                    pair.second,
                    detail
                ));
            }
        }

        let under_sampled = report.under_sampled().count();
        if under_sampled > 0 {
            output.push_str(&format!(
                "\n{} {} subject/category/evaluator scores below the minimum sample were excluded\n",
                "Note:".dimmed(),
                under_sampled
            ));
        }

        output.push_str(&Self::footer());
        output
    }

    fn coefficient(value: Option<f64>) -> String {
        value
            .map(|v| format!("{:.3}", v))
            .unwrap_or_else(|| "-".to_string())
    }

    fn status_line(status: &RunStatus, cancelled: bool) -> String {
        let text = status.to_string();
        let rendered = match status {
            RunStatus::Complete => text.green().bold(),
            RunStatus::CompleteWithFlags(_) => text.yellow().bold(),
            RunStatus::Incomplete { .. } => text.red().bold(),
        };
        let mut line = format!("\n{} {}\n", "Status:".cyan().bold(), rendered);
        if cancelled {
            line.push_str(&format!("{}\n", "Run was cancelled; re-run to resume.".yellow()));
        }
        line
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assay_application::PipelineConfig;
    use assay_domain::{Category, ConsistencyThresholds, PairCorrelation, Rater, SubjectId};

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_plan_lists_every_rater_row() {
        plain();
        let plan = PipelineConfig::default().plan(true).unwrap();
        let text = ConsoleFormatter::format_plan(&plan, true);
        assert!(text.contains("test mode, 40 items"));
        assert!(text.contains("Public Interest"));
        assert_eq!(text.matches("\n  claude ").count(), plan.categories.len());
    }

    #[test]
    fn test_status_line_mentions_cancellation() {
        plain();
        let line = ConsoleFormatter::status_line(
            &RunStatus::Incomplete {
                missing: 3,
                categories: vec![Category::new("vision")],
            },
            true,
        );
        assert!(line.contains("incomplete: 3 below target (vision)"));
        assert!(line.contains("re-run to resume"));
    }

    #[test]
    fn test_consistency_flags_calibration_offset() {
        plain();
        let report = ConsistencyReport {
            subjects: vec![SubjectId::new("a"), SubjectId::new("b")],
            evaluators: vec![Rater::Claude, Rater::Gpt],
            min_sample_size: 3,
            thresholds: ConsistencyThresholds::default(),
            pairs: vec![PairCorrelation {
                first: Rater::Claude,
                second: Rater::Gpt,
                subjects: 2,
                observations: 20,
                skipped: 0,
                pearson: Some(0.35),
                spearman: Some(0.92),
                difference: Some(0.57),
                interpretation: Interpretation::CalibrationOffset,
                per_category: vec![],
            }],
            samples: vec![],
            generated_at: 0,
        };
        let text = ConsoleFormatter::format_consistency(&report);
        assert!(text.contains("claude / gpt"));
        assert!(text.contains("0.920"));
        assert!(text.contains("same ordering, different absolute scores"));

        let json: serde_json::Value =
            serde_json::from_str(&ConsoleFormatter::format_json(&report)).unwrap();
        assert_eq!(json["pairs"][0]["interpretation"], "calibration_offset");
    }
}
