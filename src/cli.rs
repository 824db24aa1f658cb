use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Data directory holding config.yaml and downloaded models
    #[clap(long, env = "LOSTFOUND_BASE_PATH", global = true)]
    pub base_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RankArgs {
    /// Maximum number of matches. Config default if omitted.
    #[clap(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Minimum similarity score. Config default if omitted.
    #[clap(short, long, allow_hyphen_values = true)]
    pub threshold: Option<f32>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the embedding of a text as JSON
    EmbedText {
        /// Text to embed
        text: String,
    },
    /// Print the embedding of an image file as JSON
    EmbedImage {
        /// Image file (any common format)
        file: PathBuf,
    },
    /// Print zero-shot tags for an image file
    Tag {
        /// Image file (any common format)
        file: PathBuf,
    },
    /// Rank posts from a JSON file against a query
    Rank {
        /// Search query
        query: String,

        /// JSON array of {id, title, body} objects
        #[clap(short, long)]
        candidates: PathBuf,

        #[clap(flatten)]
        rank_args: RankArgs,
    },
    /// Run the upload analysis pipeline on an image file
    Analyze {
        /// Image file (any common format)
        file: PathBuf,
    },
    /// Print the effective configuration
    Config {},
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_rank() {
        let args = Args::parse_from([
            "lostfound",
            "rank",
            "lost keys",
            "--candidates",
            "posts.json",
            "-k",
            "3",
            "--threshold",
            "-0.5",
        ]);
        match args.command {
            Command::Rank {
                query,
                candidates,
                rank_args,
            } => {
                assert_eq!(query, "lost keys");
                assert_eq!(candidates, PathBuf::from("posts.json"));
                assert_eq!(rank_args.top_k, Some(3));
                assert_eq!(rank_args.threshold, Some(-0.5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_base_path() {
        let args = Args::parse_from(["lostfound", "config", "--base-path", "/tmp/lf"]);
        assert_eq!(args.base_path, Some(PathBuf::from("/tmp/lf")));
    }
}
