//! The income report: income transactions rolled up per sub-region (dusun).
//!
//! The rollup is a pure function of its input. It never fails; rows with odd data are counted
//! under a zero amount or under the `undefined` sub-region so that one bad row never hides the
//! rest of the report. Sums that outgrow the amount range stop at its limit.

use crate::collate;
use crate::model::{Amount, Bucket, BucketRule, IncomeTransaction, YearMonth};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// The name shown for transactions that have no sub-region. A sub-region stored under this name
/// falls into the same group.
pub const UNDEFINED_SUB_REGION: &str = "undefined";

/// Narrows the transactions that go into a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    /// Only transactions created in this month. Transactions without a timestamp never match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<YearMonth>,
    /// Only transactions in this sub-region, compared without regard to case or surrounding
    /// whitespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_region: Option<String>,
}

impl ReportFilter {
    pub fn new(month: Option<YearMonth>, sub_region: Option<String>) -> Self {
        Self { month, sub_region }
    }

    pub fn matches(&self, transaction: &IncomeTransaction) -> bool {
        if let Some(month) = &self.month {
            match &transaction.created_at {
                Some(created) if month.contains(created) => {}
                _ => return false,
            }
        }
        if let Some(wanted) = &self.sub_region {
            let wanted = wanted.trim().to_lowercase();
            match &transaction.sub_region {
                Some(actual) if actual.trim().to_lowercase() == wanted => {}
                _ => return false,
            }
        }
        true
    }

    pub fn apply<'a>(&self, transactions: &'a [IncomeTransaction]) -> Vec<&'a IncomeTransaction> {
        transactions.iter().filter(|t| self.matches(t)).collect()
    }

    /// A human-readable description of the filter for report headings.
    pub fn describe(&self) -> String {
        let period = self
            .month
            .map(|m| format!("Bulan {}", m.label()))
            .unwrap_or_else(|| "Semua periode".to_string());
        match &self.sub_region {
            Some(s) => format!("{period}, Dusun {}", s.trim()),
            None => format!("{period}, semua dusun"),
        }
    }
}

/// One row of the report: the rollup of a single sub-region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRegionSummary {
    /// `None` for the group of transactions that have no sub-region.
    pub sub_region: Option<String>,
    /// The number of distinct contributors in this sub-region.
    pub contributors: usize,
    /// Voluntary giving on a regular schedule (infaq tetap).
    pub regular: Amount,
    /// Voluntary giving that is ad hoc (infaq tidak tetap).
    pub irregular: Amount,
    /// Everything given in this sub-region, including mandatory dues.
    pub total: Amount,
}

impl SubRegionSummary {
    pub fn name(&self) -> &str {
        self.sub_region.as_deref().unwrap_or(UNDEFINED_SUB_REGION)
    }
}

/// The sums of all sub-region rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTotals {
    /// The sum of each sub-region's distinct contributor count. A contributor who gave in two
    /// sub-regions is counted twice.
    pub contributors: usize,
    pub regular: Amount,
    pub irregular: Amount,
    pub total: Amount,
}

/// The finished report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Sub-region rows in alphabetical order.
    pub summaries: Vec<SubRegionSummary>,
    pub totals: ReportTotals,
    /// How many transactions went into the report.
    pub included: usize,
    /// Grand totals per category label, for summary cards and export footers.
    pub by_category: BTreeMap<String, Amount>,
}

#[derive(Default)]
struct Accumulator<'a> {
    contributors: HashSet<Option<&'a str>>,
    regular: Amount,
    irregular: Amount,
    total: Amount,
}

/// Rolls `transactions` up per sub-region.
///
/// Each transaction adds its contributor to its sub-region's contributor set and its amount to the
/// sub-region's grand total. Voluntary giving also goes into the regular or irregular bucket as
/// decided by `rule`; mandatory dues only reach the grand total, so the buckets add up to less
/// than the total whenever mandatory dues are present.
pub fn aggregate<'a, I>(transactions: I, rule: BucketRule) -> Report
where
    I: IntoIterator<Item = &'a IncomeTransaction>,
{
    let mut groups: HashMap<&'a str, Accumulator<'a>> = HashMap::new();
    let mut by_category: BTreeMap<String, Amount> = BTreeMap::new();
    let mut included = 0;

    for transaction in transactions {
        included += 1;
        let acc = groups
            .entry(
                transaction
                    .sub_region
                    .as_deref()
                    .unwrap_or(UNDEFINED_SUB_REGION),
            )
            .or_default();
        acc.contributors.insert(transaction.contributor.as_deref());

        let amount = transaction.amount;
        match rule.bucket(&transaction.category, transaction.infaq_type) {
            Some(Bucket::Regular) => acc.regular += amount,
            Some(Bucket::Irregular) => acc.irregular += amount,
            None => {}
        }
        acc.total += amount;

        *by_category
            .entry(transaction.category.label().to_string())
            .or_default() += amount;
    }

    let mut totals = ReportTotals::default();
    let mut summaries: Vec<SubRegionSummary> = groups
        .into_iter()
        .map(|(name, acc)| {
            let summary = SubRegionSummary {
                sub_region: (name != UNDEFINED_SUB_REGION).then(|| name.to_string()),
                contributors: acc.contributors.len(),
                regular: acc.regular,
                irregular: acc.irregular,
                total: acc.total,
            };
            totals.contributors += summary.contributors;
            totals.regular += summary.regular;
            totals.irregular += summary.irregular;
            totals.total += summary.total;
            summary
        })
        .collect();

    summaries.sort_by(|a, b| collate::compare(a.name(), b.name()));

    Report {
        summaries,
        totals,
        included,
        by_category,
    }
}

/// Filters `transactions` and rolls the remainder up.
pub fn build(transactions: &[IncomeTransaction], filter: &ReportFilter, rule: BucketRule) -> Report {
    aggregate(filter.apply(transactions), rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Row;
    use crate::model::{Category, InfaqType};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn txn(sub_region: &str, contributor: &str, category: Category, amount: Amount) -> IncomeTransaction {
        IncomeTransaction {
            sub_region: Some(sub_region.to_string()),
            contributor: Some(contributor.to_string()),
            category,
            amount,
            ..Default::default()
        }
    }

    /// The worked example: two sub-regions, one repeat contributor and one mandatory due.
    fn example() -> Vec<IncomeTransaction> {
        vec![
            txn("A", "x", Category::InfaqTidakTetap, "100000".parse().unwrap()),
            txn("A", "x", Category::InfaqTidakTetap, "50000".parse().unwrap()),
            txn("A", "y", Category::InfaqTetap, Amount::from_rupiah(200_000)),
            txn("B", "z", Category::ZakatMaal, Amount::from_rupiah(75_000)),
        ]
    }

    #[test]
    fn test_worked_example() {
        let report = aggregate(&example(), BucketRule::SubType);
        assert_eq!(report.included, 4);
        assert_eq!(report.summaries.len(), 2);

        let a = &report.summaries[0];
        assert_eq!(a.name(), "A");
        assert_eq!(a.contributors, 2);
        assert_eq!(a.irregular, Amount::from_rupiah(150_000));
        assert_eq!(a.regular, Amount::from_rupiah(200_000));
        assert_eq!(a.total, Amount::from_rupiah(350_000));

        let b = &report.summaries[1];
        assert_eq!(b.name(), "B");
        assert_eq!(b.contributors, 1);
        assert!(b.irregular.is_zero());
        assert!(b.regular.is_zero());
        assert_eq!(b.total, Amount::from_rupiah(75_000));

        assert_eq!(report.totals.contributors, 3);
        assert_eq!(report.totals.irregular, Amount::from_rupiah(150_000));
        assert_eq!(report.totals.regular, Amount::from_rupiah(200_000));
        assert_eq!(report.totals.total, Amount::from_rupiah(425_000));
    }

    #[test]
    fn test_empty_input() {
        let report = aggregate(&[], BucketRule::SubType);
        assert!(report.summaries.is_empty());
        assert_eq!(report.totals, ReportTotals::default());
        assert_eq!(report.included, 0);
        assert!(report.by_category.is_empty());
    }

    #[test]
    fn test_headcount_is_per_sub_region() {
        let a = Amount::from_rupiah(1_000);
        let transactions = vec![
            txn("Krajan", "Budi", Category::Infaq, a),
            txn("Krajan", "Budi", Category::Infaq, a),
            txn("Krajan", "Budi", Category::Infaq, a),
            txn("Sumberejo", "Budi", Category::Infaq, a),
        ];
        let report = aggregate(&transactions, BucketRule::SubType);
        assert_eq!(report.summaries[0].contributors, 1);
        assert_eq!(report.summaries[1].contributors, 1);
        assert_eq!(report.totals.contributors, 2);
    }

    #[test]
    fn test_grand_total_covers_buckets() {
        let with_mandatory = aggregate(&example(), BucketRule::SubType);
        let t = &with_mandatory.totals;
        assert!(t.total > t.regular + t.irregular);

        let voluntary_only: Vec<_> = example()
            .into_iter()
            .filter(|t| t.category.is_voluntary())
            .collect();
        let report = aggregate(&voluntary_only, BucketRule::SubType);
        let t = &report.totals;
        assert_eq!(t.total, t.regular + t.irregular);
    }

    #[test]
    fn test_order_independence() {
        let forward = aggregate(&example(), BucketRule::SubType);
        let mut reversed = example();
        reversed.reverse();
        let backward = aggregate(&reversed, BucketRule::SubType);
        let mut rotated = example();
        rotated.rotate_left(2);
        let rotated = aggregate(&rotated, BucketRule::SubType);
        assert_eq!(forward, backward);
        assert_eq!(forward, rotated);
    }

    #[test]
    fn test_missing_sub_region_is_its_own_group() {
        let mut transactions = example();
        transactions.push(IncomeTransaction {
            contributor: Some("w".to_string()),
            category: Category::ZakatFitrah,
            amount: Amount::from_rupiah(40_000),
            ..Default::default()
        });
        let report = aggregate(&transactions, BucketRule::SubType);
        assert_eq!(report.summaries.len(), 3);
        let undefined = report
            .summaries
            .iter()
            .find(|s| s.sub_region.is_none())
            .unwrap();
        assert_eq!(undefined.name(), UNDEFINED_SUB_REGION);
        assert_eq!(undefined.total, Amount::from_rupiah(40_000));
        assert_eq!(report.totals.total, Amount::from_rupiah(465_000));
    }

    #[test]
    fn test_sub_region_named_undefined_joins_missing_group() {
        let transactions = vec![
            txn(UNDEFINED_SUB_REGION, "x", Category::Infaq, Amount::from_rupiah(1_000)),
            IncomeTransaction {
                contributor: Some("y".to_string()),
                amount: Amount::from_rupiah(2_000),
                ..Default::default()
            },
            txn("A", "z", Category::Infaq, Amount::from_rupiah(4_000)),
        ];
        let report = aggregate(&transactions, BucketRule::SubType);
        let names: Vec<_> = report.summaries.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["A", UNDEFINED_SUB_REGION]);
        let undefined = &report.summaries[1];
        assert_eq!(undefined.contributors, 2);
        assert_eq!(undefined.total, Amount::from_rupiah(3_000));
    }

    #[test]
    fn test_amounts_beyond_range_do_not_overflow() {
        let rows: Vec<Row> = (1..=2)
            .map(|id| {
                json!({
                    "id": id,
                    "dusun": "Krajan",
                    "nama_muzaki": "Budi",
                    "kategori": "Infaq Tidak Tetap",
                    "jumlah": "Rp79.228.162.514.264.337.593.543.950.335",
                })
                .as_object()
                .unwrap()
                .clone()
            })
            .collect();
        let transactions = IncomeTransaction::from_rows(&rows);
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].amount.value(), Decimal::MAX);

        let report = aggregate(&transactions, BucketRule::SubType);
        let max = Amount::new(Decimal::MAX);
        assert_eq!(report.summaries[0].total, max);
        assert_eq!(report.summaries[0].irregular, max);
        assert_eq!(report.totals.total, max);
        assert_eq!(report.by_category.get("Infaq Tidak Tetap"), Some(&max));
    }

    #[test]
    fn test_missing_contributor_counts_once() {
        let transactions = vec![
            IncomeTransaction {
                sub_region: Some("A".to_string()),
                ..Default::default()
            },
            IncomeTransaction {
                sub_region: Some("A".to_string()),
                ..Default::default()
            },
        ];
        let report = aggregate(&transactions, BucketRule::SubType);
        assert_eq!(report.summaries[0].contributors, 1);
    }

    #[test]
    fn test_sub_type_field_vs_label() {
        let transactions = vec![IncomeTransaction {
            sub_region: Some("A".to_string()),
            contributor: Some("x".to_string()),
            category: Category::Infaq,
            infaq_type: Some(InfaqType::Tetap),
            amount: Amount::from_rupiah(10_000),
            ..Default::default()
        }];
        let by_field = aggregate(&transactions, BucketRule::SubType);
        assert_eq!(by_field.totals.regular, Amount::from_rupiah(10_000));
        let by_label = aggregate(&transactions, BucketRule::CategoryLabel);
        assert!(by_label.totals.regular.is_zero());
        assert_eq!(by_label.totals.total, Amount::from_rupiah(10_000));
    }

    #[test]
    fn test_sorted_alphabetically() {
        let a = Amount::from_rupiah(1);
        let transactions = vec![
            txn("sumberejo", "a", Category::Infaq, a),
            txn("Cepit", "a", Category::Infaq, a),
            txn("krajan", "a", Category::Infaq, a),
            txn("Bulak", "a", Category::Infaq, a),
        ];
        let report = aggregate(&transactions, BucketRule::SubType);
        let names: Vec<_> = report.summaries.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Bulak", "Cepit", "krajan", "sumberejo"]);
    }

    #[test]
    fn test_by_category() {
        let report = aggregate(&example(), BucketRule::SubType);
        assert_eq!(
            report.by_category.get("Infaq Tidak Tetap"),
            Some(&Amount::from_rupiah(150_000))
        );
        assert_eq!(
            report.by_category.get("Zakat Maal"),
            Some(&Amount::from_rupiah(75_000))
        );
    }

    #[test]
    fn test_filter() {
        let mut transactions = example();
        transactions[0].created_at = Some(Utc.with_ymd_and_hms(2025, 4, 10, 12, 0, 0).unwrap());
        transactions[3].created_at = Some(Utc.with_ymd_and_hms(2025, 4, 20, 12, 0, 0).unwrap());

        let month = ReportFilter::new(Some("2025-04".parse().unwrap()), None);
        let report = build(&transactions, &month, BucketRule::SubType);
        assert_eq!(report.included, 2);
        assert_eq!(report.totals.total, Amount::from_rupiah(175_000));

        let region = ReportFilter::new(None, Some(" a ".to_string()));
        let report = build(&transactions, &region, BucketRule::SubType);
        assert_eq!(report.included, 3);
        assert_eq!(report.summaries.len(), 1);

        let both = ReportFilter::new(Some("2025-04".parse().unwrap()), Some("B".to_string()));
        let report = build(&transactions, &both, BucketRule::SubType);
        assert_eq!(report.included, 1);
        assert_eq!(report.totals.total, Amount::from_rupiah(75_000));
    }

    #[test]
    fn test_describe() {
        let filter = ReportFilter::new(Some("2025-04".parse().unwrap()), Some("Krajan".into()));
        assert_eq!(filter.describe(), "Bulan April 2025, Dusun Krajan");
        assert_eq!(ReportFilter::default().describe(), "Semua periode, semua dusun");
    }
}
