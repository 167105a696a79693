use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::OrderError;

/// Filial física da loja. Também é a chave de partição do catálogo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Berau,
    Samarinda,
}

impl Branch {
    pub const ALL: [Branch; 2] = [Branch::Berau, Branch::Samarinda];

    /// Identificador usado nas queries e no storage.
    pub fn slug(&self) -> &'static str {
        match self {
            Branch::Berau => "berau",
            Branch::Samarinda => "samarinda",
        }
    }

    /// Nome exibido para o cliente.
    pub fn display_name(&self) -> &'static str {
        match self {
            Branch::Berau => "Berau",
            Branch::Samarinda => "Samarinda",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Branch {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "berau" => Ok(Branch::Berau),
            "samarinda" => Ok(Branch::Samarinda),
            _ => Err(OrderError::UnknownBranch(s.to_string())),
        }
    }
}
