//! These structs provide the CLI interface for the amil CLI.

use crate::api::{Crop, Predicate};
use crate::export::ExportFormat;
use crate::model::{BucketRule, YearMonth};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// amil: A command-line tool for the administration of zakat and infaq.
///
/// The records of the organization (income, contributors, recipients and users) are kept in a
/// hosted backend. This program reads and writes them, rolls income up into a report per
/// sub-region (dusun), exports reports and transaction lists as xlsx, pdf or csv documents,
/// uploads images to the image host and watches tables for changes.
///
/// Run `amil init` first. Commands that change data require `amil login`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and the configuration file.
    ///
    /// This is the first command you should run. You need the URL and public API key of the
    /// hosted backend, and for uploads, the cloud name and an unsigned upload preset of the image
    /// host.
    Init(InitArgs),
    /// Log in with a username and password from the users table.
    Login(LoginArgs),
    /// Forget the stored login session.
    Logout,
    /// Show who is logged in.
    Whoami,
    /// Print the income report per sub-region.
    Report(ReportArgs),
    /// Write the income report or the list of income transactions to a document.
    Export(ExportArgs),
    /// Print rows of a table.
    List(ListArgs),
    /// Insert a row into a table. Requires login.
    Insert(InsertArgs),
    /// Change fields of a row. Requires login.
    Update(UpdateArgs),
    /// Delete a row. Requires login.
    Delete(DeleteArgs),
    /// Upload an image to the image host. Requires login.
    Upload(UploadArgs),
    /// Build a resized or reformatted delivery URL for an uploaded image.
    ImageUrl(ImageUrlArgs),
    /// Print changes to a table as they happen.
    Watch(WatchArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where amil configuration, the login session and exports are kept.
    /// Defaults to ~/amil
    #[arg(long, env = "AMIL_HOME", default_value_t = default_amil_home())]
    amil_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, amil_home: PathBuf) -> Self {
        Self {
            log_level,
            amil_home: amil_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn amil_home(&self) -> &DisplayPath {
        &self.amil_home
    }
}

/// (Not shown): Args for the `amil init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The base URL of the hosted backend, e.g. https://xyz.supabase.co
    #[arg(long)]
    data_url: String,

    /// The public (anon) API key of the hosted backend.
    #[arg(long, env = "AMIL_DATA_KEY", default_value = "")]
    data_key: String,

    /// The cloud name of the image host account.
    #[arg(long, default_value = "")]
    cloud_name: String,

    /// The unsigned upload preset of the image host account.
    #[arg(long, default_value = "")]
    upload_preset: String,
}

impl InitArgs {
    pub fn new(
        data_url: impl Into<String>,
        data_key: impl Into<String>,
        cloud_name: impl Into<String>,
        upload_preset: impl Into<String>,
    ) -> Self {
        Self {
            data_url: data_url.into(),
            data_key: data_key.into(),
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
        }
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn data_key(&self) -> &str {
        &self.data_key
    }

    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }

    pub fn upload_preset(&self) -> &str {
        &self.upload_preset
    }
}

/// (Not shown): Args for the `amil login` command.
#[derive(Debug, Parser, Clone)]
pub struct LoginArgs {
    #[arg(long)]
    username: String,

    /// The password. Prefer AMIL_PASSWORD over the flag so it stays out of shell history.
    #[arg(long, env = "AMIL_PASSWORD", hide_env_values = true)]
    password: String,
}

impl LoginArgs {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// Narrows the income transactions that reports and exports use.
#[derive(Debug, Parser, Clone, Default)]
pub struct FilterArgs {
    /// Only transactions created in this month, e.g. 2025-03.
    #[arg(long)]
    month: Option<YearMonth>,

    /// Only transactions of this sub-region (dusun). Case does not matter.
    #[arg(long)]
    sub_region: Option<String>,

    /// How voluntary giving is split into regular and irregular. Defaults to the configured rule.
    #[arg(long, value_enum)]
    bucket_rule: Option<BucketRule>,
}

impl FilterArgs {
    pub fn new(
        month: Option<YearMonth>,
        sub_region: Option<String>,
        bucket_rule: Option<BucketRule>,
    ) -> Self {
        Self {
            month,
            sub_region,
            bucket_rule,
        }
    }

    pub fn month(&self) -> Option<YearMonth> {
        self.month
    }

    pub fn sub_region(&self) -> Option<&str> {
        self.sub_region.as_deref()
    }

    pub fn bucket_rule(&self) -> Option<BucketRule> {
        self.bucket_rule
    }
}

/// (Not shown): Args for the `amil report` command.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    #[clap(flatten)]
    filter: FilterArgs,

    /// Print the report as JSON to stdout instead of a table.
    #[arg(long)]
    json: bool,
}

impl ReportArgs {
    pub fn new(filter: FilterArgs, json: bool) -> Self {
        Self { filter, json }
    }

    pub fn filter(&self) -> &FilterArgs {
        &self.filter
    }

    pub fn json(&self) -> bool {
        self.json
    }
}

/// What an export contains.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    /// The income report per sub-region.
    #[default]
    Report,
    /// The list of income transactions.
    Transactions,
}

serde_plain::derive_display_from_serialize!(ExportKind);
serde_plain::derive_fromstr_from_deserialize!(ExportKind);

/// (Not shown): Args for the `amil export` command.
#[derive(Debug, Parser, Clone)]
pub struct ExportArgs {
    /// What to export: "report" or "transactions".
    #[arg(value_enum)]
    kind: ExportKind,

    /// The document format.
    #[arg(long, value_enum, default_value_t = ExportFormat::Xlsx)]
    format: ExportFormat,

    #[clap(flatten)]
    filter: FilterArgs,

    /// Where to write the document. Defaults to $AMIL_HOME/exports/<name>-<date>.<ext>
    #[arg(long)]
    output: Option<PathBuf>,
}

impl ExportArgs {
    pub fn new(
        kind: ExportKind,
        format: ExportFormat,
        filter: FilterArgs,
        output: Option<PathBuf>,
    ) -> Self {
        Self {
            kind,
            format,
            filter,
            output,
        }
    }

    pub fn kind(&self) -> ExportKind {
        self.kind
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn filter(&self) -> &FilterArgs {
        &self.filter
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}

/// (Not shown): Args for the `amil list` command.
#[derive(Debug, Parser, Clone)]
pub struct ListArgs {
    /// The table, e.g. pemasukan, muzaki or mustahiq.
    table: String,

    /// A filter such as `dusun=Krajan` or `jumlah=gte.100000`. Can be repeated.
    #[arg(long = "eq", value_name = "FILTER")]
    filters: Vec<Predicate>,

    /// Order by this column.
    #[arg(long)]
    order: Option<String>,

    /// Order descending.
    #[arg(long)]
    desc: bool,

    /// Return at most this many rows.
    #[arg(long)]
    limit: Option<usize>,

    /// Print the rows as JSON to stdout instead of a table.
    #[arg(long)]
    json: bool,
}

impl ListArgs {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: None,
            desc: false,
            limit: None,
            json: false,
        }
    }

    pub fn with_filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filters(&self) -> &[Predicate] {
        &self.filters
    }

    pub fn order(&self) -> Option<(&str, bool)> {
        self.order.as_deref().map(|o| (o, self.desc))
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn json(&self) -> bool {
        self.json
    }
}

/// (Not shown): Args for the `amil insert` command.
#[derive(Debug, Parser, Clone)]
pub struct InsertArgs {
    table: String,

    /// The row as a JSON object, e.g. '{"dusun": "Krajan", "jumlah": 50000}'
    #[arg(long)]
    json: String,
}

impl InsertArgs {
    pub fn new(table: impl Into<String>, json: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            json: json.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn json(&self) -> &str {
        &self.json
    }
}

/// (Not shown): Args for the `amil update` command.
#[derive(Debug, Parser, Clone)]
pub struct UpdateArgs {
    table: String,

    /// The id of the row to change.
    #[arg(long)]
    id: String,

    /// The fields to change as a JSON object.
    #[arg(long)]
    json: String,
}

impl UpdateArgs {
    pub fn new(table: impl Into<String>, id: impl Into<String>, json: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id: id.into(),
            json: json.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn json(&self) -> &str {
        &self.json
    }
}

/// (Not shown): Args for the `amil delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    table: String,

    /// The id of the row to delete.
    #[arg(long)]
    id: String,
}

impl DeleteArgs {
    pub fn new(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id: id.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// (Not shown): Args for the `amil upload` command.
#[derive(Debug, Parser, Clone)]
pub struct UploadArgs {
    /// The image file to upload.
    file: PathBuf,
}

impl UploadArgs {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// Ready-made image variants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ImagePreset {
    /// A 150x150 preview.
    Thumbnail,
    /// A tiny blurred stand-in.
    Placeholder,
    /// A cropped banner, 1200x400 unless --width and --height are given.
    Cover,
}

serde_plain::derive_display_from_serialize!(ImagePreset);

/// (Not shown): Args for the `amil image-url` command.
#[derive(Debug, Parser, Clone)]
pub struct ImageUrlArgs {
    /// The delivery URL of an uploaded image.
    url: String,

    /// Start from a ready-made variant. The other flags override its settings.
    #[arg(long, value_enum)]
    preset: Option<ImagePreset>,

    /// The output format, e.g. auto, webp or jpg.
    #[arg(long)]
    format: Option<String>,

    /// The quality, e.g. auto or 80.
    #[arg(long)]
    quality: Option<String>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long, value_enum)]
    crop: Option<Crop>,

    /// Blur strength, 1 to 2000.
    #[arg(long)]
    blur: Option<u32>,

    /// Device pixel ratio, e.g. 2.0
    #[arg(long)]
    dpr: Option<f32>,
}

impl ImageUrlArgs {
    pub fn new(url: impl Into<String>, preset: Option<ImagePreset>) -> Self {
        Self {
            url: url.into(),
            preset,
            format: None,
            quality: None,
            width: None,
            height: None,
            crop: None,
            blur: None,
            dpr: None,
        }
    }

    pub fn with_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn preset(&self) -> Option<ImagePreset> {
        self.preset
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn quality(&self) -> Option<&str> {
        self.quality.as_deref()
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn crop(&self) -> Option<Crop> {
        self.crop
    }

    pub fn blur(&self) -> Option<u32> {
        self.blur
    }

    pub fn dpr(&self) -> Option<f32> {
        self.dpr
    }
}

/// (Not shown): Args for the `amil watch` command.
#[derive(Debug, Parser, Clone)]
pub struct WatchArgs {
    /// The table to watch.
    #[arg(default_value = "pemasukan")]
    table: String,

    /// Stop after this many changes. Without it, watch until interrupted.
    #[arg(long)]
    count: Option<usize>,
}

impl WatchArgs {
    pub fn new(table: impl Into<String>, count: Option<usize>) -> Self {
        Self {
            table: table.into(),
            count,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn count(&self) -> Option<usize> {
        self.count
    }
}

fn default_amil_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("amil"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --amil-home or AMIL_HOME instead of relying on the default \
                amil home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("amil")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
