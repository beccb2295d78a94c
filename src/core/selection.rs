//! 选择编号解析，例如 `1, 3-5, 8`

use std::collections::BTreeSet;
use tracing::{info, warn};

/// 解析用户输入的编号选择
///
/// 每个以逗号分隔的片段单独校验；无效片段记录警告后丢弃，不影响其余片段。
pub fn parse_selection(input: &str, max_index: usize) -> BTreeSet<usize> {
    let mut selected = BTreeSet::new();
    if input.trim().is_empty() {
        return selected;
    }

    for part in input.split(',').map(str::trim) {
        if let Some((start, end)) = part.split_once('-') {
            match (start.trim().parse::<usize>(), end.trim().parse::<usize>()) {
                (Ok(start), Ok(end)) if start >= 1 && start <= end && end <= max_index => {
                    selected.extend(start..=end);
                }
                (Ok(_), Ok(_)) => warn!("选择中的范围无效: {}", part),
                _ => warn!("选择中的数字格式无效: {}", part),
            }
        } else {
            match part.parse::<usize>() {
                Ok(index) if index >= 1 && index <= max_index => {
                    selected.insert(index);
                }
                Ok(_) => warn!("选择中的编号无效: {}", part),
                Err(_) => warn!("选择中的数字格式无效: {}", part),
            }
        }
    }

    info!("解析选择 \"{}\": {} 个编号", input.trim(), selected.len());
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_singles_and_ranges() {
        assert_eq!(parse_selection("1,3-5,8", 10), set(&[1, 3, 4, 5, 8]));
        assert_eq!(parse_selection(" 1 , 3 - 5 ,8 ", 10), set(&[1, 3, 4, 5, 8]));
    }

    #[test]
    fn test_out_of_bounds_and_inverted() {
        assert!(parse_selection("0,11", 10).is_empty());
        assert!(parse_selection("5-3", 10).is_empty());
        assert!(parse_selection("9-11", 10).is_empty());
        assert!(parse_selection("0-2", 10).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_selection("", 10).is_empty());
        assert!(parse_selection("   ", 10).is_empty());
    }

    #[test]
    fn test_bad_tokens_do_not_invalidate_rest() {
        assert_eq!(parse_selection("abc, 2, x-4, 7-", 10), set(&[2]));
        assert_eq!(parse_selection("-1, 3", 10), set(&[3]));
    }

    #[test]
    fn test_duplicates_collapse() {
        assert_eq!(parse_selection("2, 1-3, 3", 10), set(&[1, 2, 3]));
    }

    #[test]
    fn test_nothing_selectable() {
        assert!(parse_selection("1", 0).is_empty());
    }
}
