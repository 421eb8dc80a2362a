use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StrataError;

/// Dialect-neutral column types.
///
/// Parsed from and written back to a compact string form such as
/// `varchar(255)`, `decimal(5,2)` or `enum(direct,independent)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SqlType {
    /// UUID type
    Uuid,
    /// Fixed-length string
    Char(u32),
    /// Variable-length string with optional max length
    Varchar(Option<u32>),
    /// Unlimited text
    Text,
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    BigInt,
    /// Boolean
    Boolean,
    /// Timestamp without timezone
    Timestamp,
    /// Timestamp with timezone
    Timestamptz,
    /// Date without time
    Date,
    /// Decimal with precision and scale
    Decimal(u8, u8),
    /// Structured JSON document
    Json,
    /// Byte array
    Binary,
    /// String restricted to a fixed set of values
    Enum(Vec<String>),
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Uuid => write!(f, "uuid"),
            SqlType::Char(len) => write!(f, "char({})", len),
            SqlType::Varchar(None) => write!(f, "varchar"),
            SqlType::Varchar(Some(len)) => write!(f, "varchar({})", len),
            SqlType::Text => write!(f, "text"),
            SqlType::Integer => write!(f, "integer"),
            SqlType::BigInt => write!(f, "bigint"),
            SqlType::Boolean => write!(f, "boolean"),
            SqlType::Timestamp => write!(f, "timestamp"),
            SqlType::Timestamptz => write!(f, "timestamptz"),
            SqlType::Date => write!(f, "date"),
            SqlType::Decimal(p, s) => write!(f, "decimal({},{})", p, s),
            SqlType::Json => write!(f, "json"),
            SqlType::Binary => write!(f, "binary"),
            SqlType::Enum(values) => write!(f, "enum({})", values.join(",")),
        }
    }
}

impl FromStr for SqlType {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, args) = match s.find('(') {
            Some(open) => {
                if !s.ends_with(')') {
                    return Err(invalid(s, "unbalanced parentheses"));
                }
                let args: Vec<&str> = s[open + 1..s.len() - 1].split(',').map(str::trim).collect();
                (s[..open].trim().to_ascii_lowercase(), Some(args))
            }
            None => (s.to_ascii_lowercase(), None),
        };

        let ty = match (name.as_str(), args) {
            ("uuid", None) => SqlType::Uuid,
            ("char", Some(args)) => SqlType::Char(single_number(s, &args)?),
            ("varchar" | "string", None) => SqlType::Varchar(None),
            ("varchar" | "string", Some(args)) => SqlType::Varchar(Some(single_number(s, &args)?)),
            ("text", None) => SqlType::Text,
            ("integer" | "int", None) => SqlType::Integer,
            ("bigint", None) => SqlType::BigInt,
            ("boolean" | "bool", None) => SqlType::Boolean,
            ("timestamp", None) => SqlType::Timestamp,
            ("timestamptz", None) => SqlType::Timestamptz,
            ("date", None) => SqlType::Date,
            ("decimal", Some(args)) => {
                if args.len() != 2 {
                    return Err(invalid(s, "expected decimal(precision,scale)"));
                }
                let precision = args[0].parse().map_err(|_| invalid(s, "bad precision"))?;
                let scale = args[1].parse().map_err(|_| invalid(s, "bad scale"))?;
                if scale > precision {
                    return Err(invalid(s, "scale exceeds precision"));
                }
                SqlType::Decimal(precision, scale)
            }
            ("json" | "jsonb", None) => SqlType::Json,
            ("binary" | "bytea" | "blob", None) => SqlType::Binary,
            ("enum", Some(args)) => {
                if args.iter().any(|v| v.is_empty()) {
                    return Err(invalid(s, "empty enum value"));
                }
                SqlType::Enum(args.into_iter().map(str::to_string).collect())
            }
            _ => return Err(invalid(s, "unknown type")),
        };

        Ok(ty)
    }
}

impl TryFrom<String> for SqlType {
    type Error = StrataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SqlType> for String {
    fn from(ty: SqlType) -> Self {
        ty.to_string()
    }
}

fn single_number(s: &str, args: &[&str]) -> Result<u32, StrataError> {
    match args {
        [n] => n.parse().map_err(|_| invalid(s, "expected a length")),
        _ => Err(invalid(s, "expected a single length")),
    }
}

fn invalid(s: &str, why: &str) -> StrataError {
    StrataError::InvalidMigration(format!("Invalid column type '{}': {}", s, why))
}
