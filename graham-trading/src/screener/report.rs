//! Report generation for screening runs.
//!
//! Generates reports in two formats:
//! - Markdown (for reading)
//! - JSON (for programmatic use)

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::engine::ScreeningRun;

// ============================================================================
// Report Format
// ============================================================================

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    /// Markdown format (human-readable)
    Markdown,
    /// JSON format (machine-readable)
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

// ============================================================================
// Screening Report
// ============================================================================

fn fmt_opt(value: Option<f64>, scale: f64, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v / scale))
}

/// Report generator for a screening run.
pub struct ScreeningReport<'a> {
    run: &'a ScreeningRun,
}

impl<'a> ScreeningReport<'a> {
    pub fn new(run: &'a ScreeningRun) -> Self {
        Self { run }
    }

    /// Generate report in the specified format.
    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Markdown => self.to_markdown(),
            ReportFormat::Json => self.to_json(),
        }
    }

    /// Save report to file, adding the format's extension when missing.
    pub fn save_to_file(&self, path: &Path, format: ReportFormat) -> Result<PathBuf> {
        let content = self.generate(format);

        let file_path = if path.extension().is_none() {
            path.with_extension(format.extension())
        } else {
            path.to_path_buf()
        };

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create report directory")?;
        }

        std::fs::write(&file_path, content).context("Failed to write report file")?;

        Ok(file_path)
    }

    /// Generate markdown report.
    pub fn to_markdown(&self) -> String {
        let run = self.run;
        let mut md = String::new();

        md.push_str(&format!(
            "# 格雷厄姆防御型选股报告\n\n**筛选ID**: {}\n**数据日期**: {}\n**耗时**: {:.1}秒\n\n",
            run.id,
            run.as_of,
            run.duration_secs
        ));

        md.push_str("## 筛选摘要\n\n");
        md.push_str(&format!("- **股票总数**: {} 只\n", run.total_listed));
        md.push_str(&format!("- **最终入选**: {} 只\n", run.results.len()));
        md.push_str(&format!("- **筛选条件**: {}\n\n", run.parameters_summary));

        md.push_str("### 筛选漏斗\n\n");
        md.push_str("| 阶段 | 通过 | 淘汰 | 淘汰率 |\n");
        md.push_str("|------|------|------|--------|\n");
        for fr in &run.funnel {
            md.push_str(&format!(
                "| {} | {} | {} | {:.1}% |\n",
                fr.stage, fr.passed, fr.eliminated, fr.elimination_rate
            ));
        }
        md.push('\n');

        md.push_str("## 入选股票\n\n");
        if run.results.is_empty() {
            md.push_str("无符合条件的股票。\n\n");
        } else {
            md.push_str("| 代码 | 名称 | 市值(亿) | 流动比率 | 近3年EPS | PE | PB |\n");
            md.push_str("|------|------|----------|----------|----------|----|----|\n");
            for r in &run.results {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {:.3} | {:.2} | {:.2} |\n",
                    r.symbol,
                    r.name,
                    fmt_opt(r.market_cap, 1e8, 1),
                    fmt_opt(r.current_ratio, 1.0, 2),
                    r.eps_avg_recent,
                    r.pe,
                    r.pb,
                ));
            }
            md.push('\n');
        }

        if !run.skipped.is_empty() {
            md.push_str("## 估值阶段剔除\n\n");
            md.push_str("| 代码 | 原因 |\n");
            md.push_str("|------|------|\n");
            for s in &run.skipped {
                md.push_str(&format!("| {} | {} |\n", s.symbol, s.reason));
            }
            md.push('\n');
        }

        md.push_str("---\n\n");
        md.push_str(&format!(
            "*报告生成于 {} UTC*\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        ));

        md
    }

    /// Generate JSON report.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self.run).unwrap_or_else(|_| "{}".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
