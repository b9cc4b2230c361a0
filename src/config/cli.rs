use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "voucher-desk")]
#[command(about = "Travel voucher management: agencies, templates, vouchers and PDF export")]
pub struct CliConfig {
    #[arg(long, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Overrides storage.data_dir")]
    pub data_dir: Option<String>,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Counts of stored agencies, templates, vouchers and agents
    Status,
    #[command(subcommand)]
    Agency(AgencyCommand),
    #[command(subcommand)]
    Agent(AgentCommand),
    #[command(subcommand)]
    Voucher(VoucherCommand),
    /// Previously typed values matching a query
    Suggest {
        /// destination, boarding-location, passenger, observations,
        /// contractor-name, contractor-phone1, contractor-phone2, contractor-email
        field: String,
        query: String,
    },
    /// Applies an input mask
    Mask {
        #[arg(value_enum)]
        kind: MaskKind,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MaskKind {
    Cpf,
    Cnpj,
    Phone,
}

#[derive(Debug, Clone, Subcommand)]
pub enum AgencyCommand {
    /// Uploads a template, creating the agency when the name is new
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, conflicts_with = "blank")]
        template: Option<PathBuf>,
        #[arg(long, help = "Generate a blank fillable template instead of uploading one")]
        blank: bool,
    },
    List,
    Remove { id: String },
    /// Writes a blank fillable voucher template to a file
    Scaffold {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = "Voucher")]
        title: String,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum AgentCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long)]
        admin: bool,
    },
    Rename { id: String, name: String },
    Remove { id: String },
    List,
}

#[derive(Debug, Clone, Args)]
pub struct FormInput {
    #[arg(long, help = "JSON file with the voucher form fields")]
    pub form: PathBuf,
}

#[derive(Debug, Clone, Subcommand)]
pub enum VoucherCommand {
    /// Creates a voucher, or replaces one with --edit
    Save {
        #[command(flatten)]
        input: FormInput,
        #[arg(long)]
        edit: Option<String>,
    },
    List,
    Show { id: String },
    Delete { id: String },
    /// Writes the filled, flattened PDF of a stored voucher
    Export {
        id: String,
        #[arg(long, help = "Overrides export.output_dir")]
        out: Option<PathBuf>,
    },
    /// Renders a PDF from a form without saving the voucher
    Preview {
        #[command(flatten)]
        input: FormInput,
        #[arg(long, help = "Overrides export.output_dir")]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Parser)]
#[command(name = "asset-cache")]
#[command(about = "Offline asset cache for the voucher web application")]
pub struct CacheCliConfig {
    #[arg(long, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Overrides offline.cache_dir")]
    pub cache_dir: Option<String>,

    #[arg(long, help = "Emit JSON log lines")]
    pub json_logs: bool,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CacheCommand {
    /// Pre-caches every manifest asset
    Install,
    /// Drops stale caches and expires old entries
    Activate,
    /// Serves one request cache-first
    Fetch {
        url: String,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long, help = "Treat the request as a page navigation")]
        document: bool,
        #[arg(long, help = "Write the body to this file")]
        out: Option<PathBuf>,
    },
    /// Expires entries older than the maximum age
    Cleanup,
    /// Lists cache names and the entries of the current cache
    List,
}
