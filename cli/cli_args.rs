use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        long,
        help = "Specify the target project directory (default: current dir).",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long,
        help = "Specify path of the TOML config file (default: .ctxsnap/ctxsnap.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help_heading = "Project Setup"
    )]
    pub config: Option<String>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "config",
        help_heading = "Project Setup"
    )]
    pub no_config: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FormatOutputOpts {
    #[arg(short = 'f', long, help = "Set the output format.", value_name = "FORMAT", value_parser = ["text", "json", "yaml"], help_heading = "Output Formatting")]
    pub format: Option<String>,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Snapshot a codebase and keep AI editor rules in sync with its structure.",
    long_about = "ctxsnap walks a project, honours built-in, saved and local ignore patterns, and \nwrites either a single-file codebase snapshot or a rules file whose project \nstructure region is regenerated in place.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  ctxsnap snapshot -o snapshot.txt\n  ctxsnap rules --watch\n  ctxsnap ignore add '*.bak' tmp/\n  ctxsnap ignore apply",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "snap",
        about = "Write the project tree and file contents into one document."
    )]
    Snapshot(SnapshotArgs),

    #[command(
        visible_alias = "r",
        about = "Create or update the rules file with the project structure."
    )]
    Rules(RulesArgs),

    #[command(
        visible_alias = "i",
        about = "Manage saved ignore patterns and the local ignore file."
    )]
    Ignore(IgnoreArgs),

    #[command(
        visible_alias = "d",
        about = "Show effective configuration, pattern layers and planned inclusions."
    )]
    Debug(DebugArgs),

    #[command(about = "Generate or save shell completion scripts.")]
    Completion(CompletionArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SnapshotArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Snapshot file to write [default: codebase_snapshot.txt].",
        help_heading = "Output Control"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        help = "Emit Markdown files as content instead of skipping them.",
        help_heading = "Output Control"
    )]
    pub include_markdown: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RulesArgs {
    #[arg(
        long,
        help = "Project directory (default: nearest ancestor with a project marker).",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long,
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help = "Specify path of the TOML config file.",
        help_heading = "Project Setup"
    )]
    pub config: Option<String>,

    #[arg(
        long,
        conflicts_with = "config",
        help = "Disable loading any TOML config file.",
        help_heading = "Project Setup"
    )]
    pub no_config: bool,

    #[arg(
        long,
        value_name = "FILE",
        help = "Rules file to update [default: .cursorrules]."
    )]
    pub rules_file: Option<PathBuf>,

    #[arg(
        short = 'w',
        long,
        help = "Keep running and update the rules file when files are added, removed or renamed."
    )]
    pub watch: bool,

    #[arg(
        long,
        value_name = "DELAY_STRING",
        requires = "watch",
        help = "Set debounce delay for watch mode [default: 300ms]"
    )]
    pub watch_delay: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct IgnoreArgs {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Saved pattern store (default: <config dir>/ctxsnap/saved_patterns.txt)."
    )]
    pub store: Option<PathBuf>,

    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,

    #[command(subcommand)]
    pub action: IgnoreAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum IgnoreAction {
    #[command(about = "List saved patterns.")]
    List {},
    #[command(about = "Save patterns for reuse across projects.")]
    Add {
        #[arg(required = true, value_name = "PATTERN")]
        patterns: Vec<String>,
    },
    #[command(about = "Remove saved patterns.")]
    Remove {
        #[arg(required = true, value_name = "PATTERN")]
        patterns: Vec<String>,
    },
    #[command(about = "Append built-in and saved patterns to the local ignore file.")]
    Apply {
        #[arg(long, help = "Only append saved patterns, skip the built-ins.")]
        saved_only: bool,
    },
    #[command(about = "Print the location of the saved pattern store.")]
    Path {},
}

#[derive(Args, Debug, Clone)]
pub struct DebugArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    #[arg(
        long,
        value_name = "SHELL",
        help = "Shell to generate completions for (fish, bash, zsh) [default: fish]"
    )]
    pub shell: Option<String>,
    #[arg(
        long,
        help = "Save completion script to default location (prompts overwrite)."
    )]
    pub save: bool,
}
