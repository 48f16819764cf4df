//! Report renderers: per-endpoint HTML/CSV/JSON files and the aggregated
//! index page. Renderers produce strings; callers persist them through the
//! filesystem seam.

pub mod csv;
pub mod html;
pub mod json;

use std::str::FromStr;

use crate::error::Error;

/// Output formats for per-endpoint report files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    Csv,
    Json,
}

impl OutputFormat {
    /// File extension appended to the filtered log path.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(Error::Validation(format!("unknown output format: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(" HTML ".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("pdf".parse::<OutputFormat>().is_err());
    }
}
