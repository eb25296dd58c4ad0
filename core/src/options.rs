//! Converter option flags.
//!
//! The bit layout follows the conversion library's option word: table kind,
//! incomplete-syllable switches, ambiguity (fuzzy) pairs and spelling
//! corrections all live in one `u32`.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Option word passed to `ConverterContext::set_options`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ConverterOptions: u32 {
        const IS_CHEWING         = 1 << 1;
        const IS_PINYIN          = 1 << 2;
        const PINYIN_INCOMPLETE  = 1 << 3;
        const CHEWING_INCOMPLETE = 1 << 4;
        const USE_TONE           = 1 << 5;
        const USE_DIVIDED_TABLE  = 1 << 6;
        const USE_RESPLIT_TABLE  = 1 << 7;
        const DYNAMIC_ADJUST     = 1 << 8;

        // Ambiguities (fuzzy pairs)
        const AMB_C_CH   = 1 << 9;
        const AMB_Z_ZH   = 1 << 10;
        const AMB_S_SH   = 1 << 11;
        const AMB_L_N    = 1 << 12;
        const AMB_F_H    = 1 << 13;
        const AMB_L_R    = 1 << 14;
        const AMB_G_K    = 1 << 15;
        const AMB_AN_ANG = 1 << 16;
        const AMB_EN_ENG = 1 << 17;
        const AMB_IN_ING = 1 << 18;

        // Corrections
        const CORRECT_GN_NG  = 1 << 21;
        const CORRECT_MG_NG  = 1 << 22;
        const CORRECT_IOU_IU = 1 << 23;
        const CORRECT_UEI_UI = 1 << 24;
        const CORRECT_UEN_UN = 1 << 25;
        const CORRECT_UE_VE  = 1 << 26;
        const CORRECT_V_U    = 1 << 27;
        const CORRECT_ON_ONG = 1 << 28;
    }
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self::empty()
    }
}

impl ConverterOptions {
    /// Ambiguity flag for a fuzzy rule written as `"a=b"` (either order).
    ///
    /// A trailing `:weight` as used in fuzzy rule lists is ignored.
    pub fn from_fuzzy_rule(rule: &str) -> Option<Self> {
        let rule = rule.split(':').next()?.trim();
        let (a, b) = rule.split_once('=')?;
        let (a, b) = (a.trim(), b.trim());
        AMBIGUITY_PAIRS
            .iter()
            .find(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
            .map(|(_, _, flag)| *flag)
    }
}

const AMBIGUITY_PAIRS: &[(&str, &str, ConverterOptions)] = &[
    ("c", "ch", ConverterOptions::AMB_C_CH),
    ("z", "zh", ConverterOptions::AMB_Z_ZH),
    ("s", "sh", ConverterOptions::AMB_S_SH),
    ("l", "n", ConverterOptions::AMB_L_N),
    ("f", "h", ConverterOptions::AMB_F_H),
    ("l", "r", ConverterOptions::AMB_L_R),
    ("g", "k", ConverterOptions::AMB_G_K),
    ("an", "ang", ConverterOptions::AMB_AN_ANG),
    ("en", "eng", ConverterOptions::AMB_EN_ENG),
    ("in", "ing", ConverterOptions::AMB_IN_ING),
];

#[cfg(test)]
mod tests {
    use super::ConverterOptions as O;

    #[test]
    fn set_and_contains() {
        let mut o = O::IS_PINYIN | O::USE_TONE;
        assert!(o.contains(O::IS_PINYIN));
        assert!(!o.contains(O::USE_RESPLIT_TABLE));
        o.set(O::USE_TONE, false);
        assert_eq!(o, O::IS_PINYIN);
        o.insert(O::USE_RESPLIT_TABLE);
        assert_eq!(o.bits(), (1 << 2) | (1 << 7));
    }

    #[test]
    fn fuzzy_rules_map_in_either_order() {
        assert_eq!(O::from_fuzzy_rule("zh=z"), Some(O::AMB_Z_ZH));
        assert_eq!(O::from_fuzzy_rule("z=zh:1.0"), Some(O::AMB_Z_ZH));
        assert_eq!(O::from_fuzzy_rule("ang = an"), Some(O::AMB_AN_ANG));
        assert_eq!(O::from_fuzzy_rule("zi=zhi:1.0"), None);
        assert_eq!(O::from_fuzzy_rule("nonsense"), None);
    }

    #[test]
    fn raw_option_word_keeps_unknown_bits() {
        let o = O::from_bits_retain((1 << 2) | (1 << 30));
        assert!(o.contains(O::IS_PINYIN));
        assert_eq!(o.bits(), (1 << 2) | (1 << 30));
        assert_eq!(O::from_bits(1 << 30), None);
        assert!(O::default().is_empty());
    }
}
