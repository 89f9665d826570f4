use crate::api::{DataService, Query};
use crate::args::{ExportArgs, ExportKind, FilterArgs};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::export::{self, ExportFormat};
use crate::model::{BucketRule, IncomeTransaction, INCOME};
use crate::report::{self as aggregation, Report, ReportFilter};
use crate::{Config, Result};
use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

const REPORT_STEM: &str = "laporan-pemasukan";
const TRANSACTIONS_STEM: &str = "data-pemasukan";

/// Where an export was written and what it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub kind: ExportKind,
    pub format: ExportFormat,
    /// Data rows in the document, not counting the header and totals rows.
    pub rows: usize,
}

/// Fetches the income transactions and prints the report per sub-region.
pub async fn report(
    config: &Config,
    service: &dyn DataService,
    args: &FilterArgs,
) -> Result<Out<Report>> {
    let transactions = load_income(service).await?;
    let filter = filter_of(args);
    let report = aggregation::build(&transactions, &filter, rule_of(config, args));

    let table = export::report_table(&report, &filter);
    let mut message = format!("{}\n{}\n\n", table.title, table.subtitle);
    if report.included == 0 {
        message.push_str("No income transactions match.");
    } else {
        message.push_str(&export::to_markdown(&table));
    }
    Ok(Out::new(message, report))
}

/// Fetches the income transactions and writes either the report or the transaction list to a
/// document.
pub async fn export(
    config: &Config,
    service: &dyn DataService,
    args: &ExportArgs,
) -> Result<Out<ExportSummary>> {
    let transactions = load_income(service).await?;
    let filter = filter_of(args.filter());

    let (table, stem) = match args.kind() {
        ExportKind::Report => {
            let report =
                aggregation::build(&transactions, &filter, rule_of(config, args.filter()));
            (export::report_table(&report, &filter), REPORT_STEM)
        }
        ExportKind::Transactions => {
            let selected: Vec<IncomeTransaction> =
                filter.apply(&transactions).into_iter().cloned().collect();
            (
                export::transactions_table(&selected, &filter.describe()),
                TRANSACTIONS_STEM,
            )
        }
    };

    let format = args.format();
    let path = match args.output() {
        Some(path) => path.to_path_buf(),
        None => config
            .exports()
            .join(export::default_file_name(stem, format)),
    };
    let path = export::write_export(&table, format, &path)
        .await
        .pub_result(ErrorType::Export)?;

    let summary = ExportSummary {
        path,
        kind: args.kind(),
        format,
        rows: table.rows.len(),
    };
    Ok(Out::new(
        format!(
            "Wrote {} rows to {}",
            summary.rows,
            summary.path.display()
        ),
        summary,
    ))
}

/// Reads the whole income table, newest first.
pub(super) async fn load_income(service: &dyn DataService) -> Result<Vec<IncomeTransaction>> {
    let rows = service
        .select(INCOME, &Query::new().order("created_at", true))
        .await
        .context("Unable to fetch the income transactions")
        .pub_result(ErrorType::Fetch)?;
    let transactions = IncomeTransaction::from_rows(&rows);
    debug!("Loaded {} income transactions", transactions.len());
    Ok(transactions)
}

fn filter_of(args: &FilterArgs) -> ReportFilter {
    ReportFilter::new(args.month(), args.sub_region().map(str::to_string))
}

fn rule_of(config: &Config, args: &FilterArgs) -> BucketRule {
    args.bucket_rule().unwrap_or_else(|| config.bucket_rule())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, YearMonth};
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_report_seed_data() {
        let env = TestEnv::new().await;
        let out = report(&env.config(), &*env.service(), &FilterArgs::default())
            .await
            .unwrap();
        let report = out.structure().unwrap();
        assert_eq!(report.included, 10);
        assert_eq!(report.summaries.len(), 5);
        assert_eq!(report.totals.contributors, 8);
        assert_eq!(report.totals.total, Amount::from_rupiah(3_005_000));
        assert!(out.message().contains("Laporan Pemasukan per Dusun"));
        assert!(out.message().contains("Krajan"));
    }

    #[tokio::test]
    async fn test_report_filtered_to_nothing() {
        let env = TestEnv::new().await;
        let args = FilterArgs::new(Some(YearMonth::new(2020, 1).unwrap()), None, None);
        let out = report(&env.config(), &*env.service(), &args).await.unwrap();
        assert_eq!(out.structure().unwrap().included, 0);
        assert!(out.message().ends_with("No income transactions match."));
    }

    #[tokio::test]
    async fn test_export_report_to_default_path() {
        let env = TestEnv::new().await;
        let args = ExportArgs::new(
            ExportKind::Report,
            ExportFormat::Csv,
            FilterArgs::default(),
            None,
        );
        let out = export(&env.config(), &*env.service(), &args).await.unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.rows, 5);
        assert!(summary.path.starts_with(env.config().exports()));
        let name = summary.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("laporan-pemasukan-"));
        assert!(name.ends_with(".csv"));
        let text = std::fs::read_to_string(&summary.path).unwrap();
        assert!(text.starts_with("No,Dusun,Jumlah Muzaki"));
    }

    #[tokio::test]
    async fn test_export_transactions_for_one_sub_region() {
        let env = TestEnv::new().await;
        let output = env.config().root().join("krajan.xlsx");
        let args = ExportArgs::new(
            ExportKind::Transactions,
            ExportFormat::Xlsx,
            FilterArgs::new(None, Some("krajan".to_string()), None),
            Some(output.clone()),
        );
        let out = export(&env.config(), &*env.service(), &args).await.unwrap();
        assert_eq!(out.structure().unwrap().rows, 3);
        assert_eq!(out.structure().unwrap().path, output);
        assert!(output.is_file());
    }

    #[tokio::test]
    async fn test_export_into_missing_directory() {
        let env = TestEnv::new().await;
        let output = env.config().root().join("missing").join("out.pdf");
        let args = ExportArgs::new(
            ExportKind::Report,
            ExportFormat::Pdf,
            FilterArgs::default(),
            Some(output.clone()),
        );
        let e = export(&env.config(), &*env.service(), &args)
            .await
            .unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::Export));
        assert!(!output.exists());
    }
}
