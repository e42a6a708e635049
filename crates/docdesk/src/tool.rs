use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the independent processing pipelines sharing the upload/status/download contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    BankStatements,
    TaxForm,
    Consolidator,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::BankStatements, Tool::TaxForm, Tool::Consolidator];

    /// URL path segment, e.g. `/api/bank-statements/...`.
    pub fn slug(self) -> &'static str {
        match self {
            Tool::BankStatements => "bank-statements",
            Tool::TaxForm => "tax-form",
            Tool::Consolidator => "consolidator",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Tool::BankStatements => "Bank statement extraction",
            Tool::TaxForm => "F.572 tax form extraction",
            Tool::Consolidator => "Excel consolidation",
        }
    }

    pub fn archive_name(self) -> String {
        format!("{}_result.zip", self.slug())
    }

    pub fn log_name(self) -> String {
        format!("{}_log.txt", self.slug())
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTool(pub String);

impl fmt::Display for UnknownTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tool '{}'", self.0)
    }
}

impl std::error::Error for UnknownTool {}

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.slug() == s)
            .ok_or_else(|| UnknownTool(s.to_string()))
    }
}
