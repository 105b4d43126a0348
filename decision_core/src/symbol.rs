//! Canonical symbol set and the normalisation rule the broker adapter's raw
//! ticker strings are mapped through before anything downstream sees them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of symbols this engine ever reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalSymbol {
    Eurusd,
    Gbpusd,
    Usdjpy,
    Xau,
    Usoil,
    Us30,
    Us100,
    Us500,
}

impl CanonicalSymbol {
    pub const ALL: [CanonicalSymbol; 8] = [
        CanonicalSymbol::Eurusd,
        CanonicalSymbol::Gbpusd,
        CanonicalSymbol::Usdjpy,
        CanonicalSymbol::Xau,
        CanonicalSymbol::Usoil,
        CanonicalSymbol::Us30,
        CanonicalSymbol::Us100,
        CanonicalSymbol::Us500,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalSymbol::Eurusd => "eurusd",
            CanonicalSymbol::Gbpusd => "gbpusd",
            CanonicalSymbol::Usdjpy => "usdjpy",
            CanonicalSymbol::Xau => "xau",
            CanonicalSymbol::Usoil => "usoil",
            CanonicalSymbol::Us30 => "us30",
            CanonicalSymbol::Us100 => "us100",
            CanonicalSymbol::Us500 => "us500",
        }
    }

    /// Position within [`CanonicalSymbol::ALL`], used to index the
    /// calibrated correlation matrix.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).expect("all variants listed in ALL")
    }

    pub fn class(&self) -> SymbolClass {
        match self {
            CanonicalSymbol::Eurusd | CanonicalSymbol::Gbpusd | CanonicalSymbol::Usdjpy => {
                SymbolClass::Forex
            }
            CanonicalSymbol::Us30 | CanonicalSymbol::Us100 | CanonicalSymbol::Us500 => {
                SymbolClass::Indices
            }
            CanonicalSymbol::Xau | CanonicalSymbol::Usoil => SymbolClass::Commodities,
        }
    }
}

impl fmt::Display for CanonicalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symbol-class bands used by the Market Scorer's trend component (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolClass {
    Forex,
    Indices,
    Commodities,
}

/// Strip an optional broker suffix and a trailing futures month/year code,
/// lowercase the remainder, and resolve it to one of the eight canonical
/// symbols. Returns `None` when the result is not in that closed set.
///
/// Examples: `"EURUSD.sim"` -> `eurusd`, `"US30.pro"` -> `us30`,
/// `"CLZ24"` -> `usoil` is NOT automatically inferred — futures root codes
/// must already match a known alias below; this only strips the trailing
/// `Z24`-style code, it does not invent a mapping.
pub fn normalize_symbol(raw: &str) -> Option<CanonicalSymbol> {
    let trimmed = strip_futures_code(strip_broker_suffix(raw));
    let lowered = trimmed.to_lowercase();

    match lowered.as_str() {
        "eurusd" | "eur/usd" => Some(CanonicalSymbol::Eurusd),
        "gbpusd" | "gbp/usd" => Some(CanonicalSymbol::Gbpusd),
        "usdjpy" | "usd/jpy" => Some(CanonicalSymbol::Usdjpy),
        "xau" | "xauusd" | "gold" => Some(CanonicalSymbol::Xau),
        "usoil" | "wti" | "cl" | "uso" => Some(CanonicalSymbol::Usoil),
        "us30" | "dji" | "dow" => Some(CanonicalSymbol::Us30),
        "us100" | "nas100" | "ndx" => Some(CanonicalSymbol::Us100),
        "us500" | "spx500" | "spx" => Some(CanonicalSymbol::Us500),
        _ => None,
    }
}

fn strip_broker_suffix(raw: &str) -> &str {
    match raw.find('.') {
        Some(idx) => &raw[..idx],
        None => raw,
    }
}

/// Strip a trailing two-character futures month/year code matching
/// `/[ZFGHJKMNQUVX]\d{2}$/` (e.g. `Z24`, `H25`).
fn strip_futures_code(raw: &str) -> &str {
    const MONTH_CODES: &[u8] = b"ZFGHJKMNQUVX";
    let bytes = raw.as_bytes();
    if bytes.len() >= 3 {
        let tail = &bytes[bytes.len() - 3..];
        let month = tail[0].to_ascii_uppercase();
        let d1 = tail[1];
        let d2 = tail[2];
        if MONTH_CODES.contains(&month) && d1.is_ascii_digit() && d2.is_ascii_digit() {
            return &raw[..raw.len() - 3];
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_broker_suffix() {
        assert_eq!(normalize_symbol("EURUSD.sim"), Some(CanonicalSymbol::Eurusd));
        assert_eq!(normalize_symbol("us30.pro"), Some(CanonicalSymbol::Us30));
    }

    #[test]
    fn strips_futures_code() {
        assert_eq!(normalize_symbol("USOILZ24"), Some(CanonicalSymbol::Usoil));
    }

    #[test]
    fn unknown_symbol_is_none() {
        assert_eq!(normalize_symbol("BTCUSD"), None);
    }

    #[test]
    fn symbol_class_mapping() {
        assert_eq!(CanonicalSymbol::Xau.class(), SymbolClass::Commodities);
        assert_eq!(CanonicalSymbol::Us100.class(), SymbolClass::Indices);
        assert_eq!(CanonicalSymbol::Eurusd.class(), SymbolClass::Forex);
    }
}
