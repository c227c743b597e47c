use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and validate XML documents through the TiXI library
#[derive(Parser, Debug, Clone)]
#[command(name = "tixi")]
#[command(about = "Query, export and validate XML documents with the native TiXI library")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Path of the TiXI shared library to load
    #[arg(long = "library", global = true)]
    pub library: Option<PathBuf>,

    /// Increase log output (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the version of the loaded TiXI library
    Version,

    /// Print a document as XML
    Export {
        file: PathBuf,

        /// Merge external data files into the document
        #[arg(short = 'r', long = "recursive")]
        recursive: bool,
    },

    /// Print the text of one element
    GetText { file: PathBuf, path: String },

    /// Print the numeric value of one element
    GetDouble { file: PathBuf, path: String },

    /// Print the number of children with a given name
    Count {
        file: PathBuf,
        path: String,
        child: String,
    },

    /// Print the text of the nodes matching an XPath expression
    Xpath {
        file: PathBuf,
        expression: String,

        /// Only print the match with this 1-based index
        #[arg(short = 'i', long = "index")]
        index: Option<i32>,
    },

    /// Validate a document against an XML schema file
    Validate {
        file: PathBuf,

        #[arg(short = 's', long = "schema")]
        schema: PathBuf,

        /// Fill in default values declared by the schema
        #[arg(long = "with-defaults")]
        with_defaults: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Document the subcommand operates on, if any
    pub fn document(&self) -> Option<&PathBuf> {
        match &self.command {
            Command::Version => None,
            Command::Export { file, .. }
            | Command::GetText { file, .. }
            | Command::GetDouble { file, .. }
            | Command::Count { file, .. }
            | Command::Xpath { file, .. }
            | Command::Validate { file, .. } => Some(file),
        }
    }

    /// Text arguments of the subcommand that must not be empty, by name
    fn required_arguments(&self) -> Vec<(&'static str, &str)> {
        match &self.command {
            Command::Version | Command::Export { .. } | Command::Validate { .. } => vec![],
            Command::GetText { path, .. } | Command::GetDouble { path, .. } => {
                vec![("path", path.as_str())]
            }
            Command::Count { path, child, .. } => {
                vec![("path", path.as_str()), ("child", child.as_str())]
            }
            Command::Xpath { expression, .. } => vec![("expression", expression.as_str())],
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(file) = self.document()
            && !file.exists()
        {
            return Err(format!("Document does not exist: {}", file.display()));
        }
        if let Some((name, _)) = self
            .required_arguments()
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
        {
            return Err(format!("Argument <{}> must not be empty", name));
        }
        if let Command::Xpath {
            index: Some(index), ..
        } = self.command
            && index < 1
        {
            return Err("XPath match index starts at 1".to_string());
        }
        Ok(())
    }
}
