use std::fmt::Display;
use std::str::FromStr;

use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::KernelError;

const OPEN: &str = "open";
const RETURNED: &str = "returned";

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Open,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Open => OPEN,
            LoanStatus::Returned => RETURNED,
        }
    }
}

impl Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = Report<KernelError>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            OPEN => Ok(LoanStatus::Open),
            RETURNED => Ok(LoanStatus::Returned),
            other => Err(Report::new(KernelError::Internal)
                .attach_printable(format!("Unknown loan status `{other}`"))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_stored_names() {
        assert_eq!("open".parse::<LoanStatus>().unwrap(), LoanStatus::Open);
        assert_eq!("returned".parse::<LoanStatus>().unwrap(), LoanStatus::Returned);
        assert!("borrowed".parse::<LoanStatus>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&LoanStatus::Returned).unwrap();
        assert_eq!(json, "\"returned\"");
    }
}
