/// Redis-style glob matching with `*`, `?` and `\` escapes.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    // position of the last `*` in the pattern and the text index it resumed at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
                continue;
            }
            Some('?') => {
                p += 1;
                t += 1;
                continue;
            }
            Some('\\') if p + 1 < pattern.len() && pattern[p + 1] == text[t] => {
                p += 2;
                t += 1;
                continue;
            }
            Some(c) if *c != '\\' && *c == text[t] => {
                p += 1;
                t += 1;
                continue;
            }
            _ => {}
        }

        match backtrack {
            Some((star, resumed)) => {
                p = star + 1;
                t = resumed + 1;
                backtrack = Some((star, resumed + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("SIDEKIQ_REGISTERED_INSTANCE::*", "SIDEKIQ_REGISTERED_INSTANCE::web-1"));
        assert!(!glob_match(
            "SIDEKIQ_REGISTERED_INSTANCE::*",
            "SIDEKIQ_REGISTERED_INSTANCE_PGRP::web-1::12"
        ));
        assert!(glob_match("*Worker*", "{\"class\":\"SidekiqAlive::Worker\"}"));
        assert!(glob_match("web-?", "web-1"));
        assert!(!glob_match("web-?", "web-10"));
        assert!(glob_match("a\\*b", "a*b"));
        assert!(!glob_match("a\\*b", "axb"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("abc", "ab"));
    }
}
