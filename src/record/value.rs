use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{RecordError, RecordResult};

/// Attribute data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    String,  // n bytes, zero padded
    Integer, // 4 bytes
    Float,   // 4 bytes
}

impl AttrType {
    /// Width in bytes for the numeric types; strings take their declared length
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            AttrType::String => None,
            AttrType::Integer => Some(size_of::<i32>()),
            AttrType::Float => Some(size_of::<f32>()),
        }
    }

    /// Convert a text literal into the `length` bytes stored for this type
    pub fn encode_literal(&self, text: &str, length: usize) -> RecordResult<Vec<u8>> {
        Value::parse(text, *self)?.encode(length)
    }
}

impl FromStr for AttrType {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s" | "string" | "char" => Ok(AttrType::String),
            "i" | "int" | "integer" => Ok(AttrType::Integer),
            "f" | "float" | "real" => Ok(AttrType::Float),
            other => Err(RecordError::InvalidValue(format!(
                "unknown attribute type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttrType::String => "string",
            AttrType::Integer => "integer",
            AttrType::Float => "float",
        };
        f.write_str(name)
    }
}

/// A single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    String(String),
}

impl Value {
    /// Parse a text literal as a value of `attr_type`
    pub fn parse(text: &str, attr_type: AttrType) -> RecordResult<Self> {
        match attr_type {
            AttrType::Integer => text.trim().parse().map(Value::Int).map_err(|_| {
                RecordError::InvalidValue(format!("'{}' is not an integer", text))
            }),
            AttrType::Float => text.trim().parse().map(Value::Float).map_err(|_| {
                RecordError::InvalidValue(format!("'{}' is not a float", text))
            }),
            AttrType::String => Ok(Value::String(text.to_string())),
        }
    }

    pub fn attr_type(&self) -> AttrType {
        match self {
            Value::Int(_) => AttrType::Integer,
            Value::Float(_) => AttrType::Float,
            Value::String(_) => AttrType::String,
        }
    }

    /// Serialize to exactly `length` bytes. Strings are zero padded.
    pub fn encode(&self, length: usize) -> RecordResult<Vec<u8>> {
        if let Some(size) = self.attr_type().fixed_size() {
            if size != length {
                return Err(RecordError::TypeMismatch {
                    expected: format!("{} bytes", length),
                    actual: format!("{} of {} bytes", self.attr_type(), size),
                });
            }
        }

        match self {
            Value::Int(i) => Ok(i.to_le_bytes().to_vec()),
            Value::Float(f) => Ok(f.to_le_bytes().to_vec()),
            Value::String(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > length {
                    return Err(RecordError::InvalidValue(format!(
                        "string length {} exceeds attribute length {}",
                        bytes.len(),
                        length
                    )));
                }
                let mut result = vec![0u8; length];
                result[..bytes.len()].copy_from_slice(bytes);
                Ok(result)
            }
        }
    }

    /// Deserialize from the stored bytes of an attribute
    pub fn decode(bytes: &[u8], attr_type: AttrType) -> RecordResult<Self> {
        match attr_type {
            AttrType::Integer => {
                let buf: [u8; 4] = bytes.try_into().map_err(|_| {
                    RecordError::InvalidValue(format!(
                        "expected 4 bytes for integer, got {}",
                        bytes.len()
                    ))
                })?;
                Ok(Value::Int(i32::from_le_bytes(buf)))
            }
            AttrType::Float => {
                let buf: [u8; 4] = bytes.try_into().map_err(|_| {
                    RecordError::InvalidValue(format!(
                        "expected 4 bytes for float, got {}",
                        bytes.len()
                    ))
                })?;
                Ok(Value::Float(f32::from_le_bytes(buf)))
            }
            AttrType::String => {
                // Stored strings end at the first zero byte
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                Ok(Value::String(
                    String::from_utf8_lossy(&bytes[..end]).into_owned(),
                ))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_type_size() {
        assert_eq!(AttrType::Integer.fixed_size(), Some(4));
        assert_eq!(AttrType::Float.fixed_size(), Some(4));
        assert_eq!(AttrType::String.fixed_size(), None);
    }

    #[test]
    fn test_attr_type_from_str() {
        assert_eq!("int".parse::<AttrType>().unwrap(), AttrType::Integer);
        assert_eq!("F".parse::<AttrType>().unwrap(), AttrType::Float);
        assert_eq!("string".parse::<AttrType>().unwrap(), AttrType::String);
        assert!("blob".parse::<AttrType>().is_err());
    }

    #[test]
    fn test_string_literal_padded() {
        let bytes = AttrType::String.encode_literal("hello", 10).unwrap();
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[..5], b"hello");
        assert_eq!(&bytes[5..], &[0u8; 5]);
        assert_eq!(
            Value::decode(&bytes, AttrType::String).unwrap(),
            Value::String("hello".to_string())
        );
    }

    #[test]
    fn test_string_too_long() {
        assert!(AttrType::String.encode_literal("hello world", 5).is_err());
        // Exactly full, no terminator
        let bytes = AttrType::String.encode_literal("hello", 5).unwrap();
        assert_eq!(
            Value::decode(&bytes, AttrType::String).unwrap(),
            Value::String("hello".to_string())
        );
    }

    #[test]
    fn test_numeric_literals() {
        let bytes = AttrType::Integer.encode_literal(" -42 ", 4).unwrap();
        assert_eq!(bytes, (-42i32).to_le_bytes());
        let bytes = AttrType::Float.encode_literal("2.5", 4).unwrap();
        assert_eq!(
            Value::decode(&bytes, AttrType::Float).unwrap(),
            Value::Float(2.5)
        );
    }

    #[test]
    fn test_invalid_literals() {
        assert!(matches!(
            AttrType::Integer.encode_literal("12abc", 4),
            Err(RecordError::InvalidValue(_))
        ));
        assert!(AttrType::Float.encode_literal("", 4).is_err());
        assert!(matches!(
            AttrType::Integer.encode_literal("12", 8),
            Err(RecordError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::String("abc".into()).to_string(), "abc");
    }
}
