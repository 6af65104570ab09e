use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "attendbot")]
#[command(author, version, about = "Telegram bot for student registration and attendance marking", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// Create a group in the configured store
    AddGroup {
        /// Group name exactly as students will type it
        name: String,

        /// Mark the group as relevant
        #[arg(long)]
        relevant: bool,
    },

    /// List groups with student and attendance counts
    Groups,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
