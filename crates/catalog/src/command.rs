//! Command line construction for the catalog tool.
//!
//! Commands are built as structured argument lists and handed to the
//! subprocess as raw argv, so nothing here is ever interpreted by a shell.
//! The [`Display`] rendering is the quoted, single-line form of exactly that
//! argv: values containing whitespace are wrapped in double quotes with
//! embedded quotes doubled, and list values are quoted item by item.
//!
//! ```text
//! calibredb set_metadata --with-library "/home/me/Calibre Library" 12 --field tags:"Science Fiction",Horror
//! ```

use crate::models::FieldUpdate;
use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Quotes a free-text value if it contains whitespace or quote characters.
///
/// Embedded quotes are escaped by doubling them. Empty values are rendered
/// as `""` so they remain visible.
pub fn quote(value: &str) -> Cow<'_, str> {
    if !value.is_empty() && !value.chars().any(|c| c.is_whitespace() || c == '"') {
        return Cow::Borrowed(value);
    }
    Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
}

/// Where the catalog lives: a library directory, or a content server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Path(PathBuf),
    /// Content server address, e.g. `http://localhost:8080/#library_id`.
    Server(String),
}
impl Location {
    /// The library directory, if the catalog is accessed on local disk.
    pub fn local_root(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Server(_) => None,
        }
    }

    fn as_argument(&self) -> String {
        match self {
            Self::Path(path) => path.to_string_lossy().into_owned(),
            Self::Server(address) => address.clone(),
        }
    }
}
impl FromStr for Location {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();
        Ok(if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Server(s.to_string())
        } else {
            Self::Path(PathBuf::from(s))
        })
    }
}
impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_argument())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Text(String),
    /// Comma-joined list, optionally preceded by a `name:` prefix.
    List { prefix: Option<String>, items: Vec<String> },
}
impl Value {
    fn raw(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List { prefix, items } => format!("{}{}", prefix.as_deref().unwrap_or_default(), items.join(",")),
        }
    }
}
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Text(text) => write!(f, "{}", quote(text)),
            Self::List { prefix, items } => {
                let items: Vec<_> = items.iter().map(|item| quote(item)).collect();
                write!(f, "{}{}", prefix.as_deref().unwrap_or_default(), items.join(","))
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Flag(String),
    Option { name: String, value: Value },
    Positional(Value),
}

/// A single invocation of the catalog tool.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandLine {
    program: PathBuf,
    subcommand: String,
    args: Vec<Arg>,
}
impl CommandLine {
    pub fn new(program: impl Into<PathBuf>, subcommand: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            subcommand: subcommand.into(),
            args: Vec::new(),
        }
    }

    /// Appends `--with-library <location>`.
    pub fn library(self, location: &Location) -> Self {
        self.option("with-library", location.as_argument())
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg::Positional(Value::Text(value.into())));
        self
    }

    /// Appends `--name value`.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(Arg::Option {
            name: name.into(),
            value: Value::Text(value.into()),
        });
        self
    }

    /// Appends `--name value` only when a value is given.
    pub fn option_if(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.option(name, value),
            None => self,
        }
    }

    /// Appends `--name` only when `enabled`.
    pub fn flag(mut self, name: impl Into<String>, enabled: bool) -> Self {
        if enabled {
            self.args.push(Arg::Flag(name.into()));
        }
        self
    }

    /// Appends `--name a,b,c`. Skipped entirely for an empty list.
    pub fn values<I: IntoIterator<Item = S>, S: Into<String>>(mut self, name: impl Into<String>, values: I) -> Self {
        let items: Vec<String> = values.into_iter().map(Into::into).collect();
        if !items.is_empty() {
            self.args.push(Arg::Option {
                name: name.into(),
                value: Value::List { prefix: None, items },
            });
        }
        self
    }

    /// Appends `--field name:value1,value2`.
    pub fn field(mut self, update: &FieldUpdate) -> Self {
        self.args.push(Arg::Option {
            name: "field".to_string(),
            value: Value::List {
                prefix: Some(format!("{}:", update.field)),
                items: update.values.clone(),
            },
        });
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn subcommand(&self) -> &str {
        &self.subcommand
    }

    /// The exact argv handed to the subprocess (excluding the program).
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.subcommand.clone()];
        for arg in &self.args {
            match arg {
                Arg::Flag(name) => argv.push(format!("--{name}")),
                Arg::Option { name, value } => {
                    argv.push(format!("--{name}"));
                    argv.push(value.raw());
                },
                Arg::Positional(value) => argv.push(value.raw()),
            }
        }
        argv
    }

    /// Raw values of every `--name` option, in order.
    pub fn options(&self, name: &str) -> Vec<String> {
        self.args
            .iter()
            .filter_map(|arg| match arg {
                Arg::Option { name: n, value } if n == name => Some(value.raw()),
                _ => None,
            })
            .collect()
    }

    /// Raw value of the first `--name` option.
    pub fn option_value(&self, name: &str) -> Option<String> {
        self.options(name).into_iter().next()
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.args.iter().any(|arg| matches!(arg, Arg::Flag(n) if n == name))
    }

    /// Raw values of positional arguments, in order.
    pub fn positionals(&self) -> Vec<String> {
        self.args
            .iter()
            .filter_map(|arg| match arg {
                Arg::Positional(value) => Some(value.raw()),
                _ => None,
            })
            .collect()
    }
}
impl Display for CommandLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} {}", quote(&self.program.to_string_lossy()), self.subcommand)?;
        for arg in &self.args {
            match arg {
                Arg::Flag(name) => write!(f, " --{name}")?,
                Arg::Option { name, value } => write!(f, " --{name} {value}")?,
                Arg::Positional(value) => write!(f, " {value}")?,
            }
        }
        Ok(())
    }
}
