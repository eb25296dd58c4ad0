//! Scheme families and keyboard scheme lookup tables.
//!
//! The framework configuration stores keyboard layouts as plain integers.
//! Each family has a fixed, ordered table translating those integers into the
//! converter's scheme enumeration. Lookups are first-match-wins and an
//! unknown layout yields `None`, which callers treat as "leave the scheme as
//! it is".

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::options::ConverterOptions;

/// The two independent phonetic input conventions the backend serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeFamily {
    /// Full and double pinyin (primary family)
    Pinyin,
    /// Zhuyin/Bopomofo (secondary family)
    Bopomofo,
}

impl SchemeFamily {
    pub const ALL: [SchemeFamily; 2] = [SchemeFamily::Pinyin, SchemeFamily::Bopomofo];

    /// Name of the per-user directory under `<cache>/ibus/`.
    pub fn user_dir_name(self) -> &'static str {
        match self {
            SchemeFamily::Pinyin => "libpinyin",
            SchemeFamily::Bopomofo => "libbopomofo",
        }
    }

    /// Flags always merged into the configured options for this family.
    pub fn mandatory_options(self) -> ConverterOptions {
        match self {
            SchemeFamily::Pinyin => ConverterOptions::USE_RESPLIT_TABLE,
            SchemeFamily::Bopomofo => ConverterOptions::empty(),
        }
    }

    /// Map a configured keyboard layout to a converter scheme.
    pub fn lookup_scheme(self, layout: i32) -> Option<Scheme> {
        match self {
            SchemeFamily::Pinyin => lookup(DOUBLE_PINYIN_SCHEMES, layout).map(Scheme::DoublePinyin),
            SchemeFamily::Bopomofo => lookup(CHEWING_SCHEMES, layout).map(Scheme::Chewing),
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            SchemeFamily::Pinyin => 0,
            SchemeFamily::Bopomofo => 1,
        }
    }
}

impl fmt::Display for SchemeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchemeFamily::Pinyin => "pinyin",
            SchemeFamily::Bopomofo => "bopomofo",
        })
    }
}

impl std::str::FromStr for SchemeFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pinyin" => Ok(SchemeFamily::Pinyin),
            "bopomofo" | "zhuyin" | "chewing" => Ok(SchemeFamily::Bopomofo),
            other => Err(format!("unknown scheme family: {}", other)),
        }
    }
}

/// Double pinyin (Shuangpin 双拼) keyboard schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoublePinyinScheme {
    /// Microsoft Shuangpin (微软双拼)
    Microsoft,
    /// ZiRanMa (自然码)
    ZiRanMa,
    /// ABC input method scheme
    ABC,
    /// ZiGuang (紫光)
    ZiGuang,
    /// PinYin++ (拼音加加)
    PinYinPlusPlus,
    /// XiaoHe (小鹤)
    XiaoHe,
}

/// Zhuyin/Bopomofo keyboard layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChewingScheme {
    /// Standard (大千) layout
    Standard,
    /// GinYieh (精業) layout
    GinYieh,
    /// ETEN (倚天) layout
    Eten,
    /// IBM layout
    Ibm,
}

/// A scheme value as handed to `ConverterContext::set_scheme`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    DoublePinyin(DoublePinyinScheme),
    Chewing(ChewingScheme),
}

/// Configured double pinyin layout index -> scheme.
pub const DOUBLE_PINYIN_SCHEMES: &[(i32, DoublePinyinScheme)] = &[
    (0, DoublePinyinScheme::Microsoft),
    (1, DoublePinyinScheme::ZiRanMa),
    (2, DoublePinyinScheme::ABC),
    (3, DoublePinyinScheme::ZiGuang),
    (4, DoublePinyinScheme::PinYinPlusPlus),
    (5, DoublePinyinScheme::XiaoHe),
];

/// Configured bopomofo keyboard mapping index -> scheme.
pub const CHEWING_SCHEMES: &[(i32, ChewingScheme)] = &[
    (0, ChewingScheme::Standard),
    (1, ChewingScheme::GinYieh),
    (2, ChewingScheme::Eten),
    (3, ChewingScheme::Ibm),
];

/// First entry whose key equals `layout`.
pub fn lookup<T: Copy>(table: &[(i32, T)], layout: i32) -> Option<T> {
    table
        .iter()
        .find(|(key, _)| *key == layout)
        .map(|(_, scheme)| *scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinyin_index_two_is_third_entry() {
        assert_eq!(
            SchemeFamily::Pinyin.lookup_scheme(2),
            Some(Scheme::DoublePinyin(DOUBLE_PINYIN_SCHEMES[2].1))
        );
        assert_eq!(
            SchemeFamily::Pinyin.lookup_scheme(2),
            Some(Scheme::DoublePinyin(DoublePinyinScheme::ABC))
        );
    }

    #[test]
    fn unknown_layouts_are_unmapped() {
        assert_eq!(SchemeFamily::Pinyin.lookup_scheme(6), None);
        assert_eq!(SchemeFamily::Pinyin.lookup_scheme(-1), None);
        assert_eq!(SchemeFamily::Bopomofo.lookup_scheme(4), None);
    }

    #[test]
    fn first_match_wins() {
        let table = [(1, 'a'), (1, 'b'), (2, 'c')];
        assert_eq!(lookup(&table, 1), Some('a'));
        assert_eq!(lookup(&table, 3), None);
    }

    #[test]
    fn only_pinyin_forces_resplit() {
        assert!(SchemeFamily::Pinyin
            .mandatory_options()
            .contains(ConverterOptions::USE_RESPLIT_TABLE));
        assert!(SchemeFamily::Bopomofo.mandatory_options().is_empty());
    }

    #[test]
    fn family_parses_aliases() {
        assert_eq!("Pinyin".parse::<SchemeFamily>(), Ok(SchemeFamily::Pinyin));
        assert_eq!("zhuyin".parse::<SchemeFamily>(), Ok(SchemeFamily::Bopomofo));
        assert!("wubi".parse::<SchemeFamily>().is_err());
    }
}
