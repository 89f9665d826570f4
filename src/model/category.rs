use crate::model::lenient_string;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// The category of an income transaction, as stored in the `kategori` column.
///
/// Labels the program does not recognize are kept in `Other` rather than rejected, so that one
/// unexpected row never prevents a whole table from loading.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Category {
    /// Mandatory religious due, paid in kind.
    ZakatFitrah,
    /// Mandatory religious due, paid in money.
    ZakatMaal,
    /// Voluntary giving whose sub-type is carried in `jenis_infaq`.
    Infaq,
    /// Voluntary giving on a regular schedule.
    InfaqTetap,
    /// Voluntary giving that is ad hoc.
    InfaqTidakTetap,
    /// Any label that is not one of the above.
    Other(String),
    /// The label is missing.
    #[default]
    Unknown,
}

impl Category {
    /// Parses a label leniently: case, repeated whitespace, `_` and `-` are not significant.
    pub fn parse(label: &str) -> Self {
        let key = squash(label);
        match key.as_str() {
            "" => Category::Unknown,
            "zakat fitrah" | "fitrah" => Category::ZakatFitrah,
            "zakat maal" | "zakat mal" | "maal" => Category::ZakatMaal,
            "infaq" | "infak" => Category::Infaq,
            "infaq tetap" | "infak tetap" => Category::InfaqTetap,
            "infaq tidak tetap" | "infak tidak tetap" => Category::InfaqTidakTetap,
            _ => Category::Other(label.trim().to_string()),
        }
    }

    /// The label written back to the backend and shown in tables.
    pub fn label(&self) -> &str {
        match self {
            Category::ZakatFitrah => "Zakat Fitrah",
            Category::ZakatMaal => "Zakat Maal",
            Category::Infaq => "Infaq",
            Category::InfaqTetap => "Infaq Tetap",
            Category::InfaqTidakTetap => "Infaq Tidak Tetap",
            Category::Other(label) => label,
            Category::Unknown => "",
        }
    }

    /// True for the mandatory religious dues.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Category::ZakatFitrah | Category::ZakatMaal)
    }

    /// True for any kind of infaq.
    pub fn is_voluntary(&self) -> bool {
        matches!(
            self,
            Category::Infaq | Category::InfaqTetap | Category::InfaqTidakTetap
        )
    }

    /// The sub-type that the label itself names, if it names one.
    pub fn implied_infaq_type(&self) -> Option<InfaqType> {
        match self {
            Category::InfaqTetap => Some(InfaqType::Tetap),
            Category::InfaqTidakTetap => Some(InfaqType::TidakTetap),
            _ => None,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Category::Unknown => serializer.serialize_none(),
            _ => serializer.serialize_str(self.label()),
        }
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let label = lenient_string(deserializer)?;
        Ok(label.as_deref().map(Category::parse).unwrap_or_default())
    }
}

/// The sub-type of voluntary giving, as stored in the `jenis_infaq` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InfaqType {
    /// Regular, scheduled giving.
    Tetap,
    /// Irregular, ad hoc giving.
    TidakTetap,
}

impl InfaqType {
    /// Parses a sub-type leniently. Returns `None` for anything unrecognized.
    pub fn parse(s: &str) -> Option<Self> {
        match squash(s).as_str() {
            "tetap" | "infaq tetap" => Some(InfaqType::Tetap),
            "tidak tetap" | "tidaktetap" | "infaq tidak tetap" => Some(InfaqType::TidakTetap),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InfaqType::Tetap => "tetap",
            InfaqType::TidakTetap => "tidak tetap",
        }
    }

    pub fn bucket(&self) -> Bucket {
        match self {
            InfaqType::Tetap => Bucket::Regular,
            InfaqType::TidakTetap => Bucket::Irregular,
        }
    }
}

impl Serialize for InfaqType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

/// Deserializes an optional `InfaqType`, treating unrecognized values as absent.
pub(crate) fn lenient_infaq_type<'de, D>(deserializer: D) -> Result<Option<InfaqType>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_string(deserializer)?;
    Ok(value.as_deref().and_then(InfaqType::parse))
}

/// The two report buckets for voluntary giving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Regular,
    Irregular,
}

/// Decides which field puts a voluntary transaction into the regular or irregular bucket.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum BucketRule {
    /// Use `jenis_infaq`, falling back to the sub-type named by the category label.
    #[default]
    SubType,
    /// Use the category label only.
    CategoryLabel,
}

serde_plain::derive_display_from_serialize!(BucketRule);
serde_plain::derive_fromstr_from_deserialize!(BucketRule);

impl BucketRule {
    /// Returns the bucket for a transaction with `category` and `infaq_type`, or `None` when the
    /// transaction only counts toward the grand total.
    pub fn bucket(&self, category: &Category, infaq_type: Option<InfaqType>) -> Option<Bucket> {
        let infaq_type = match self {
            BucketRule::SubType => {
                if !category.is_voluntary() {
                    return None;
                }
                infaq_type.or_else(|| category.implied_infaq_type())
            }
            BucketRule::CategoryLabel => category.implied_infaq_type(),
        };
        infaq_type.map(|t| t.bucket())
    }
}

/// Lowercases, maps `_` and `-` to spaces, and collapses whitespace.
fn squash(s: &str) -> String {
    s.to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        assert_eq!(Category::parse("Zakat Fitrah"), Category::ZakatFitrah);
        assert_eq!(Category::parse("zakat_maal"), Category::ZakatMaal);
        assert_eq!(Category::parse("  INFAQ   Tidak-Tetap "), Category::InfaqTidakTetap);
        assert_eq!(Category::parse("Infaq"), Category::Infaq);
        assert_eq!(Category::parse(""), Category::Unknown);
        assert_eq!(
            Category::parse("Sedekah"),
            Category::Other("Sedekah".to_string())
        );
    }

    #[test]
    fn test_deserialize_null_category() {
        let c: Category = serde_json::from_str("null").unwrap();
        assert_eq!(c, Category::Unknown);
    }

    #[test]
    fn test_serialize_label() {
        let json = serde_json::to_string(&Category::InfaqTetap).unwrap();
        assert_eq!(json, "\"Infaq Tetap\"");
    }

    #[test]
    fn test_infaq_type_parse() {
        assert_eq!(InfaqType::parse("tetap"), Some(InfaqType::Tetap));
        assert_eq!(InfaqType::parse("Tidak Tetap"), Some(InfaqType::TidakTetap));
        assert_eq!(InfaqType::parse("bulanan"), None);
    }

    #[test]
    fn test_sub_type_rule() {
        let rule = BucketRule::SubType;
        assert_eq!(
            rule.bucket(&Category::Infaq, Some(InfaqType::Tetap)),
            Some(Bucket::Regular)
        );
        // The sub-type field wins over the label.
        assert_eq!(
            rule.bucket(&Category::InfaqTetap, Some(InfaqType::TidakTetap)),
            Some(Bucket::Irregular)
        );
        // Without a sub-type the label decides.
        assert_eq!(
            rule.bucket(&Category::InfaqTidakTetap, None),
            Some(Bucket::Irregular)
        );
        assert_eq!(rule.bucket(&Category::Infaq, None), None);
        // Mandatory dues never reach a bucket.
        assert_eq!(
            rule.bucket(&Category::ZakatMaal, Some(InfaqType::Tetap)),
            None
        );
    }

    #[test]
    fn test_category_label_rule() {
        let rule = BucketRule::CategoryLabel;
        assert_eq!(
            rule.bucket(&Category::InfaqTetap, Some(InfaqType::TidakTetap)),
            Some(Bucket::Regular)
        );
        assert_eq!(rule.bucket(&Category::Infaq, Some(InfaqType::Tetap)), None);
    }

    #[test]
    fn test_bucket_rule_from_str() {
        use std::str::FromStr;
        assert_eq!(
            BucketRule::from_str("category_label").unwrap(),
            BucketRule::CategoryLabel
        );
        assert_eq!(BucketRule::SubType.to_string(), "sub_type");
    }
}
