use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "memnex")]
#[command(about = "Local-first memory engine for AI coding sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Data directory (default: ~/.memory-nexus)")]
    pub data_dir: Option<String>,

    #[arg(long, global = true, help = "Session log root (default: ~/.claude/projects)")]
    pub source: Option<String>,

    #[arg(long, global = true, help = "Emit machine-readable JSON")]
    pub json: bool,

    #[arg(
        short = 'v',
        long,
        global = true,
        conflicts_with = "quiet",
        help = "Verbose output (includes error chains)"
    )]
    pub verbose: bool,

    #[arg(short = 'q', long, global = true, help = "Suppress non-essential output")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Ingest session logs into the memory store")]
    Sync {
        #[arg(long, help = "Re-extract files even when unchanged")]
        force: bool,

        #[arg(long, help = "Only sync sessions of matching projects")]
        project: Option<String>,

        #[arg(long, help = "Only sync the session with this id (or prefix)")]
        session: Option<String>,

        #[arg(long, help = "Parse and count without writing the store")]
        dry_run: bool,
    },

    #[command(about = "Full-text search across indexed messages")]
    Search {
        #[arg(required = true, help = "Search query (non-empty)")]
        query: String,

        #[arg(long, default_value = "10", help = "Maximum results")]
        limit: usize,

        #[arg(long, help = "Filter by project name substring")]
        project: Option<String>,

        #[arg(long, help = "Filter by session id")]
        session: Option<String>,

        #[arg(
            long,
            value_delimiter = ',',
            help = "Filter by role(s): user, assistant, system"
        )]
        role: Vec<RoleArg>,

        #[arg(long, conflicts_with = "days", help = "Only messages at or after this date (YYYY-MM-DD, RFC 3339, today, yesterday, N days ago)")]
        since: Option<String>,

        #[arg(long, conflicts_with = "days", help = "Only messages before this date (same grammar as --since)")]
        before: Option<String>,

        #[arg(long, help = "Only messages from the last N days (today inclusive)")]
        days: Option<u32>,

        #[arg(
            short = 'c',
            long,
            conflicts_with = "ignore_case",
            help = "Match the exact case of the query"
        )]
        case_sensitive: bool,

        #[arg(short = 'i', long, help = "Case-insensitive matching (default)")]
        ignore_case: bool,
    },

    #[command(about = "List indexed sessions")]
    List {
        #[arg(long, default_value = "20", help = "Maximum sessions")]
        limit: usize,

        #[arg(long, help = "Filter by project name substring")]
        project: Option<String>,

        #[arg(long, conflicts_with = "days", help = "Only sessions starting at or after this date (YYYY-MM-DD, RFC 3339, today, yesterday, N days ago)")]
        since: Option<String>,

        #[arg(long, conflicts_with = "days", help = "Only sessions starting before this date (same grammar as --since)")]
        before: Option<String>,

        #[arg(long, help = "Only sessions from the last N days (today inclusive)")]
        days: Option<u32>,

        #[arg(long, default_value = "recent", help = "Sort order")]
        sort: SortArg,
    },

    #[command(about = "Corpus statistics")]
    Stats {
        #[arg(long, default_value = "10", help = "Number of top projects to show")]
        projects: usize,
    },

    #[command(about = "Show one session's transcript")]
    Show {
        #[arg(help = "Session id (full or unique prefix)")]
        session_id: String,

        #[arg(long, help = "Include tool invocations")]
        tools: bool,
    },

    #[command(about = "Aggregate view of one project")]
    Context {
        #[arg(help = "Project name substring")]
        project: String,

        #[arg(long, help = "Bound aggregates to the last N days (today inclusive)")]
        days: Option<u32>,

        #[arg(long, default_value = "brief", help = "Output detail level")]
        format: DetailArg,
    },

    #[command(about = "Items related through the link graph")]
    Related {
        #[arg(help = "Source id (session ids accept a unique prefix)")]
        id: String,

        #[arg(long, default_value = "10", help = "Maximum results")]
        limit: usize,

        #[arg(long, default_value = "2", help = "Traversal depth (1-3)")]
        hops: u32,

        #[arg(long = "type", default_value = "session", help = "Source node type")]
        node_type: NodeTypeArg,

        #[arg(long, default_value = "brief", help = "Output detail level")]
        format: DetailArg,
    },

    #[command(about = "Delete sessions older than a duration")]
    Purge {
        #[arg(long, required = true, help = "Age cutoff: <N>d, <N>m or <N>y")]
        older_than: String,

        #[arg(long, help = "Report what would be deleted without deleting")]
        dry_run: bool,

        #[arg(long, help = "Skip the confirmation prompt")]
        force: bool,
    },

    #[command(about = "Export the store to a JSON backup")]
    Export {
        #[arg(help = "Destination file path")]
        path: String,
    },

    #[command(about = "Import a JSON backup into the store")]
    Import {
        #[arg(help = "Backup file path")]
        path: String,

        #[arg(long, help = "Empty the store before importing")]
        clear: bool,

        #[arg(long, help = "Skip the confirmation prompt")]
        force: bool,
    },

    #[command(about = "Diagnose the store and environment")]
    Doctor {
        #[arg(long, help = "Create missing directories")]
        fix: bool,
    },

    #[command(about = "Generate a shell completion script")]
    Completion {
        #[arg(help = "Shell: bash, zsh or fish")]
        shell: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    User,
    Assistant,
    System,
}

impl From<RoleArg> for memnex_types::Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::User => memnex_types::Role::User,
            RoleArg::Assistant => memnex_types::Role::Assistant,
            RoleArg::System => memnex_types::Role::System,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Recent,
    Oldest,
    Largest,
}

impl From<SortArg> for memnex_store::queries::session::SessionSort {
    fn from(sort: SortArg) -> Self {
        use memnex_store::queries::session::SessionSort;
        match sort {
            SortArg::Recent => SessionSort::Recent,
            SortArg::Oldest => SessionSort::Oldest,
            SortArg::Largest => SessionSort::Largest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NodeTypeArg {
    Session,
    Message,
    Topic,
}

impl From<NodeTypeArg> for memnex_types::NodeType {
    fn from(node_type: NodeTypeArg) -> Self {
        match node_type {
            NodeTypeArg::Session => memnex_types::NodeType::Session,
            NodeTypeArg::Message => memnex_types::NodeType::Message,
            NodeTypeArg::Topic => memnex_types::NodeType::Topic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DetailArg {
    Brief,
    Detailed,
}
