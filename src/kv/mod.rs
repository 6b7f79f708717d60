//! Hierarchical key/value config language
//!
//! A document is an ordered list of [`ConfigNode`]s. Each node has a key, a
//! value that is either a scalar string or a nested list of nodes, and an
//! optional condition tag. Keys are not unique; order is significant.

pub mod lexer;
pub mod parser;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ReplayError, ReplayResult};
use crate::utils::path::{parent_dir, resolve_against};

pub use parser::parse_document;

/// Either a scalar string or an ordered list of child nodes
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Scalar(String),
    Sequence(Vec<ConfigNode>),
}

/// One key with its value, condition tag and source position
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigNode {
    pub key: String,
    pub value: NodeValue,
    pub condition: Option<String>,
    pub line: usize,
    pub origin: Arc<Path>,
}

impl ConfigNode {
    /// `file:line` for diagnostics
    pub fn location(&self) -> String {
        format!("{}:{}", self.origin.display(), self.line)
    }

    /// Keys starting with `$` mutate parser or build state
    pub fn is_directive(&self) -> bool {
        self.key.starts_with('$')
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn as_scalar(&self) -> ReplayResult<&str> {
        match &self.value {
            NodeValue::Scalar(value) => Ok(value),
            NodeValue::Sequence(_) => Err(ReplayError::syntax(
                self.location(),
                format!("'{}' expects a value, found a block", self.key),
            )),
        }
    }

    pub fn as_sequence(&self) -> ReplayResult<&[ConfigNode]> {
        match &self.value {
            NodeValue::Sequence(children) => Ok(children),
            NodeValue::Scalar(_) => Err(ReplayError::syntax(
                self.location(),
                format!("'{}' expects a block, found a value", self.key),
            )),
        }
    }
}

impl fmt::Display for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.key)
    }
}

/// Parsed config file
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    nodes: Vec<ConfigNode>,
}

impl Document {
    /// Read and parse a config file
    pub fn load(path: &Path) -> ReplayResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ReplayError::NotFound {
                name: path.display().to_string(),
            },
            _ => ReplayError::Io(e),
        })?;
        Self::parse_str(&source, path)
    }

    pub fn parse_str(source: &str, path: &Path) -> ReplayResult<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            nodes: parse_document(source, path)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Folder that relative paths in this document resolve against
    pub fn directory(&self) -> PathBuf {
        parent_dir(&self.path)
    }

    pub fn nodes(&self) -> &[ConfigNode] {
        &self.nodes
    }

    /// Target of an include directive declared in this document
    pub fn include_path(&self, value: &str) -> PathBuf {
        resolve_against(&self.directory(), value)
    }
}
