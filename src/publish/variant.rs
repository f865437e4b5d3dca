use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which fields of a story carry a translation, and so which template renders it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// Nothing translated.
    #[serde(rename = "EN_ONLY")]
    EnOnly,
    /// Headline and body translated.
    #[serde(rename = "CN_ONLY")]
    CnOnly,
    /// Body translated, headline already English.
    #[serde(rename = "ENH_CNB")]
    EnhCnb,
    /// Headline translated, body left as is.
    #[serde(rename = "CNH_ENB")]
    CnhEnb,
}

pub const ALL_VARIANTS: [Variant; 4] = [Variant::EnOnly, Variant::CnOnly, Variant::EnhCnb, Variant::CnhEnb];

impl Variant {
    pub fn select(headline_translated: bool, body_translated: bool) -> Self {
        match (headline_translated, body_translated) {
            (true, true) => Variant::CnOnly,
            (true, false) => Variant::CnhEnb,
            (false, true) => Variant::EnhCnb,
            (false, false) => Variant::EnOnly,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Variant::EnOnly => "EN_ONLY",
            Variant::CnOnly => "CN_ONLY",
            Variant::EnhCnb => "ENH_CNB",
            Variant::CnhEnb => "CNH_ENB",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.code()) }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl FromStr for Variant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_VARIANTS
            .into_iter()
            .find(|v| v.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_table_is_total() {
        assert_eq!(Variant::select(true, true), Variant::CnOnly);
        assert_eq!(Variant::select(true, false), Variant::CnhEnb);
        assert_eq!(Variant::select(false, true), Variant::EnhCnb);
        assert_eq!(Variant::select(false, false), Variant::EnOnly);
    }

    #[test]
    fn every_variant_is_reachable_once() {
        let mut seen: Vec<Variant> = [(true, true), (true, false), (false, true), (false, false)]
            .into_iter()
            .map(|(h, b)| Variant::select(h, b))
            .collect();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn codes_round_trip_through_from_str() {
        for v in ALL_VARIANTS {
            assert_eq!(v.code().parse::<Variant>(), Ok(v));
        }
        assert_eq!("cn_only".parse::<Variant>(), Ok(Variant::CnOnly));
        assert!("BOTH".parse::<Variant>().is_err());
        assert_eq!(serde_json::to_string(&Variant::EnhCnb).unwrap(), "\"ENH_CNB\"");
    }
}
