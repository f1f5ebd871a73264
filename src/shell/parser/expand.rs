use super::ast::{Quoting, Word};

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// 对一段文本做 $NAME 替换，未定义的变量替换为空串，
/// 孤立的 $ 原样保留
fn expand_text(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut result = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        let mut var_name = String::new();
        while let Some(&next_char) = chars.peek() {
            if is_name_char(next_char) {
                var_name.push(next_char);
                chars.next();
            } else {
                break;
            }
        }
        if var_name.is_empty() {
            result.push('$');
        } else {
            result.push_str(&lookup(&var_name).unwrap_or_default());
        }
    }
    result
}

/// 单引号段逐字保留，其余段做变量展开
pub fn expand_word(word: &Word, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut result = String::new();
    for (text, quoting) in &word.segments {
        match quoting {
            Quoting::Single => result.push_str(text),
            Quoting::Bare | Quoting::Double => result.push_str(&expand_text(text, lookup)),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "FOO" => Some("bar".to_string()),
            "NUM_1" => Some("one".to_string()),
            _ => None,
        }
    }

    fn bare(text: &str) -> Word {
        Word {
            segments: vec![(text.to_string(), Quoting::Bare)],
        }
    }

    #[test]
    fn test_expand_simple() {
        assert_eq!(expand_word(&bare("$FOO"), &lookup), "bar");
        assert_eq!(expand_word(&bare("x$FOO-y"), &lookup), "xbar-y");
    }

    #[test]
    fn test_undefined_becomes_empty() {
        assert_eq!(expand_word(&bare("$MISSING"), &lookup), "");
        assert_eq!(expand_word(&bare("a${"), &lookup), "a${");
    }

    #[test]
    fn test_lone_dollar_is_literal() {
        assert_eq!(expand_word(&bare("$"), &lookup), "$");
        assert_eq!(expand_word(&bare("5$ fee"), &lookup), "5$ fee");
    }

    #[test]
    fn test_longest_name_run() {
        assert_eq!(expand_word(&bare("$NUM_1"), &lookup), "one");
        // 名字在非名字字符处截断
        assert_eq!(expand_word(&bare("$FOO.txt"), &lookup), "bar.txt");
    }

    #[test]
    fn test_single_quotes_block_expansion() {
        let word = Word {
            segments: vec![("$FOO".to_string(), Quoting::Single)],
        };
        assert_eq!(expand_word(&word, &lookup), "$FOO");
    }

    #[test]
    fn test_double_quotes_allow_expansion() {
        let word = Word {
            segments: vec![("$FOO baz".to_string(), Quoting::Double)],
        };
        assert_eq!(expand_word(&word, &lookup), "bar baz");
    }

    #[test]
    fn test_mixed_segments() {
        let word = Word {
            segments: vec![
                ("$FOO".to_string(), Quoting::Single),
                ("$FOO".to_string(), Quoting::Bare),
            ],
        };
        assert_eq!(expand_word(&word, &lookup), "$FOObar");
    }
}
