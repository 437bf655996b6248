use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Which side of a transfer wrote a manifest.
///
/// Labels match the file names and headers existing tooling expects:
/// producers are `train`/`Trainer`, consumers are `infer`/`Infer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Producer, Role::Consumer];

    /// Short label used in file names.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Producer => "train",
            Self::Consumer => "infer",
        }
    }

    /// Capitalized label used in the header comment.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Producer => "Trainer",
            Self::Consumer => "Infer",
        }
    }

    /// File name prefix, e.g. `train_md5`.
    pub fn file_prefix(&self) -> String { format!("{}_md5", self.label()) }

    pub fn opposite(&self) -> Role {
        match self {
            Self::Producer => Self::Consumer,
            Self::Consumer => Self::Producer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "producer" | "train" | "trainer" => Ok(Self::Producer),
            "consumer" | "infer" => Ok(Self::Consumer),
            _ => Err(Error::UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(Role::Producer.file_prefix(), "train_md5");
        assert_eq!(Role::Consumer.file_prefix(), "infer_md5");
        assert_eq!(Role::Producer.title(), "Trainer");
        assert_eq!(Role::Consumer.title(), "Infer");
        assert_eq!(Role::Producer.opposite(), Role::Consumer);
    }

    #[test]
    fn parse_aliases() {
        assert_eq!("Trainer".parse::<Role>().unwrap(), Role::Producer);
        assert_eq!("infer".parse::<Role>().unwrap(), Role::Consumer);
        assert!("bystander".parse::<Role>().is_err());
    }
}
