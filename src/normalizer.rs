/// Derive the income-type code from a raw transaction label: the first
/// ASCII letter in the label, upper-cased. Labels with no letter are
/// unclassified and return `None` for the caller to route and report.
pub fn derive_income_type(raw_label: &str) -> Option<String> {
    raw_label
        .chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase().to_string())
}

/// Clean a raw label into a grouping name: strip all whitespace, then keep
/// everything before the first `_` (mirrors the manual Excel text-to-columns
/// step the ledger clerks used to do).
pub fn clean_name(raw_label: &str) -> String {
    let compact: String = raw_label.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.split_once('_') {
        Some((head, _)) => head.to_string(),
        None => compact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_income_type() {
        assert_eq!(derive_income_type("H空房费_调整01"), Some("H".to_string()));
        assert_eq!(derive_income_type("l会议室"), Some("L".to_string()));
        assert_eq!(derive_income_type("房费 T 01"), Some("T".to_string()));
        assert_eq!(derive_income_type("空房费"), None);
        assert_eq!(derive_income_type(""), None);
    }

    #[test]
    fn test_clean_name_splits_on_underscore() {
        assert_eq!(clean_name("H空房费_调整01"), "H空房费");
        assert_eq!(clean_name("餐费_早餐_补"), "餐费");
        assert_eq!(clean_name("无下划线"), "无下划线");
    }

    #[test]
    fn test_clean_name_strips_whitespace_first() {
        // Whitespace is removed before splitting, so a spaced underscore
        // still delimits.
        assert_eq!(clean_name("H 空房费 _ 调整"), "H空房费");
        assert_eq!(clean_name("  "), "");
    }

    #[test]
    fn test_clean_name_delimiter_only_label() {
        // A label that is nothing but delimiters collapses to the empty
        // (anonymous) name, which is a valid grouping key.
        assert_eq!(clean_name("_调整"), "");
        assert_eq!(clean_name("__"), "");
    }
}
