//! MAC address normalization. Converts between the colon/hyphen notation used by
//! ISE and the dot-quartet notation printed by Cisco IOS.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Delimiters stripped from input before validation
const DELIMITERS: &[char] = &[':', '-', '.'];

const HEX_DIGITS: usize = 12;

/// Input could not be read as a 48-bit MAC address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed MAC address: {input:?}")]
pub struct MalformedMac {
    pub input: String,
}

/// Target notation for a normalized MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacFormat {
    /// `AA:BB:CC:DD:EE:FF`
    #[default]
    Colon,
    /// `AA-BB-CC-DD-EE-FF`
    Hyphen,
    /// `aabb.ccdd.eeff`
    Dot,
}

impl MacFormat {
    pub fn separator(self) -> char {
        match self {
            MacFormat::Colon => ':',
            MacFormat::Hyphen => '-',
            MacFormat::Dot => '.',
        }
    }

    fn group_width(self) -> usize {
        match self {
            MacFormat::Colon | MacFormat::Hyphen => 2,
            MacFormat::Dot => 4,
        }
    }

    fn uppercase(self) -> bool {
        !matches!(self, MacFormat::Dot)
    }
}

impl fmt::Display for MacFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacFormat::Colon => write!(f, "colon"),
            MacFormat::Hyphen => write!(f, "hyphen"),
            MacFormat::Dot => write!(f, "dot"),
        }
    }
}

impl FromStr for MacFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            ":" | "colon" => Ok(MacFormat::Colon),
            "-" | "hyphen" | "dash" => Ok(MacFormat::Hyphen),
            "." | "dot" | "cisco" => Ok(MacFormat::Dot),
            other => Err(format!("unknown MAC format: {}", other)),
        }
    }
}

/// A validated MAC address rendered in one target notation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedMac {
    /// Twelve lowercase hex digits, no delimiters
    digits: String,
    format: MacFormat,
}

impl NormalizedMac {

    /// Re-render in another notation
    pub fn to_format(&self, format: MacFormat) -> NormalizedMac {
        NormalizedMac {
            digits: self.digits.clone(),
            format,
        }
    }

    /// Organizationally unique prefix as `AA:BB:CC`
    pub fn oui(&self) -> String {
        let upper = self.digits[..6].to_uppercase();
        format!("{}:{}:{}", &upper[0..2], &upper[2..4], &upper[4..6])
    }
}

impl fmt::Display for NormalizedMac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.format.group_width();
        let digits = if self.format.uppercase() {
            self.digits.to_uppercase()
        } else {
            self.digits.clone()
        };
        let groups: Vec<&str> = (0..HEX_DIGITS)
            .step_by(width)
            .map(|i| &digits[i..i + width])
            .collect();
        let separator = self.format.separator().to_string();
        write!(f, "{}", groups.join(separator.as_str()))
    }
}

/// Parses any accepted notation and renders it as colon notation
impl FromStr for NormalizedMac {
    type Err = MalformedMac;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s, MacFormat::Colon)
    }
}

impl Serialize for NormalizedMac {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Normalize a MAC address written in colon, hyphen, dot-quartet or bare form.
/// Fails with [`MalformedMac`] unless exactly twelve hex digits remain once the
/// delimiters are removed.
pub fn normalize(input: &str, format: MacFormat) -> Result<NormalizedMac, MalformedMac> {
    let stripped: String = input
        .trim()
        .chars()
        .filter(|c| !DELIMITERS.contains(c))
        .collect();

    if stripped.len() != HEX_DIGITS || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(MalformedMac {
            input: input.to_string(),
        });
    }

    Ok(NormalizedMac {
        digits: stripped.to_lowercase(),
        format,
    })
}

/// True if the token is a Cisco dot-quartet MAC (`xxxx.xxxx.xxxx`)
pub fn is_dot_quartet(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| p.len() == 4 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMATS: [MacFormat; 3] = [MacFormat::Colon, MacFormat::Hyphen, MacFormat::Dot];

    #[test]
    fn test_normalize_each_input_notation() {
        for input in [
            "AA:BB:CC:DD:EE:FF",
            "aa-bb-cc-dd-ee-ff",
            "AABB.CCDD.EEFF",
            "aabbccddeeff",
            "  aabb.ccdd.eeff ",
        ] {
            let mac = normalize(input, MacFormat::Colon).unwrap();
            assert_eq!(mac.to_string(), "AA:BB:CC:DD:EE:FF", "input {}", input);
        }
    }

    #[test]
    fn test_render_each_format() {
        let mac = normalize("00:50:56:99:12:34", MacFormat::Dot).unwrap();
        assert_eq!(mac.to_string(), "0050.5699.1234");
        assert_eq!(mac.to_format(MacFormat::Hyphen).to_string(), "00-50-56-99-12-34");
        assert_eq!(mac.to_format(MacFormat::Colon).to_string(), "00:50:56:99:12:34");
    }

    #[test]
    fn test_round_trip_across_formats() {
        let samples = ["AA:BB:CC:DD:EE:FF", "00-1b-54-c2-0a-7e", "f4cf.e2a1.0b9c"];
        for sample in samples {
            let original = normalize(sample, MacFormat::Colon).unwrap();
            for from in FORMATS {
                for to in FORMATS {
                    let first = normalize(sample, from).unwrap().to_string();
                    let second = normalize(&first, to).unwrap();
                    assert_eq!(second.to_format(MacFormat::Colon), original);
                    let back = normalize(&second.to_string(), MacFormat::Colon).unwrap();
                    assert!(back.to_string().eq_ignore_ascii_case(&original.to_string()));
                }
            }
        }
    }

    #[test]
    fn test_spec_example_chain() {
        let dot = normalize("AA:BB:CC:DD:EE:FF", MacFormat::Dot).unwrap();
        assert_eq!(dot.to_string(), "aabb.ccdd.eeff");
        let colon = normalize(&dot.to_string(), MacFormat::Colon).unwrap();
        assert_eq!(colon.to_string(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_equality_ignores_input_notation() {
        let colon = normalize("00:50:56:99:12:34", MacFormat::Dot).unwrap();
        let dot = normalize("0050.5699.1234", MacFormat::Dot).unwrap();
        assert_eq!(colon, dot);
        assert_ne!(colon, dot.to_format(MacFormat::Colon));

        let seen: std::collections::HashSet<NormalizedMac> =
            ["00-50-56-99-12-34", "0050.5699.1234"]
                .iter()
                .map(|m| normalize(m, MacFormat::Colon).unwrap())
                .collect();
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_malformed_input() {
        for input in ["AA:BB:CC", "ZZ:11:22:33:44:55", "", "aabb.ccdd.eeff.0011", "not a mac"] {
            let err = normalize(input, MacFormat::Colon).unwrap_err();
            assert_eq!(err.input, input);
        }
    }

    #[test]
    fn test_oui_prefix() {
        let mac = normalize("0050.5699.1234", MacFormat::Dot).unwrap();
        assert_eq!(mac.oui(), "00:50:56");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(":".parse::<MacFormat>().unwrap(), MacFormat::Colon);
        assert_eq!("Dot".parse::<MacFormat>().unwrap(), MacFormat::Dot);
        assert_eq!("-".parse::<MacFormat>().unwrap(), MacFormat::Hyphen);
        assert!("slash".parse::<MacFormat>().is_err());
    }

    #[test]
    fn test_is_dot_quartet() {
        assert!(is_dot_quartet("0050.5699.1234"));
        assert!(is_dot_quartet("AABB.ccdd.EEFF"));
        assert!(!is_dot_quartet("0050.5699.12"));
        assert!(!is_dot_quartet("00:50:56:99:12:34"));
        assert!(!is_dot_quartet("0050.5699.12zz"));
    }

    #[test]
    fn test_serialize_as_rendered_string() {
        let mac = normalize("0050.5699.1234", MacFormat::Dot).unwrap();
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"0050.5699.1234\"");
    }
}
