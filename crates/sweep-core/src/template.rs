use std::collections::BTreeMap;

/// Replaces `$NAME` tokens with the matching value from `vars`.
///
/// Each `$` is resolved against the longest key that prefixes the text after
/// it, so overlapping names (`$ARG` vs `$ARG0`) do not depend on map order.
/// Substituted text is never scanned again, and tokens that match no key are
/// copied through unchanged.
pub fn substitute(text: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match longest_key(after, vars) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &after[key.len()..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Names of keys in `vars` that still appear as `$NAME` tokens in `text`.
pub fn unresolved_tokens(text: &str, vars: &BTreeMap<String, String>) -> Vec<String> {
    let mut found = Vec::new();
    for (idx, _) in text.match_indices('$') {
        if let Some((key, _)) = longest_key(&text[idx + 1..], vars) {
            if !found.iter().any(|k: &String| k == key) {
                found.push(key.to_string());
            }
        }
    }
    found
}

/// `$NAME` tokens (identifier syntax) that no key in `vars` would resolve.
pub fn missing_tokens(text: &str, vars: &BTreeMap<String, String>) -> Vec<String> {
    let mut missing = Vec::new();
    for (idx, _) in text.match_indices('$') {
        let after = &text[idx + 1..];
        if longest_key(after, vars).is_some() {
            continue;
        }
        let ident = identifier_prefix(after);
        if !ident.is_empty() && !missing.iter().any(|m: &String| m == ident) {
            missing.push(ident.to_string());
        }
    }
    missing
}

fn longest_key<'a>(
    text: &str,
    vars: &'a BTreeMap<String, String>,
) -> Option<(&'a str, &'a str)> {
    vars.iter()
        .filter(|(key, _)| !key.is_empty() && text.starts_with(key.as_str()))
        .max_by_key(|(key, _)| key.len())
        .map(|(key, value)| (key.as_str(), value.as_str()))
}

fn identifier_prefix(text: &str) -> &str {
    let mut end = 0;
    for (idx, ch) in text.char_indices() {
        let ok = if idx == 0 {
            ch.is_ascii_alphabetic() || ch == '_'
        } else {
            ch.is_ascii_alphanumeric() || ch == '_'
        };
        if !ok {
            break;
        }
        end = idx + ch.len_utf8();
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_every_occurrence_of_a_key() {
        let v = vars(&[("THREADS", "8")]);
        assert_eq!(
            substitute("-p$THREADS -n $THREADS", &v),
            "-p8 -n 8"
        );
    }

    #[test]
    fn unknown_tokens_pass_through() {
        let v = vars(&[("THREADS", "8")]);
        assert_eq!(substitute("$APP_DIR/in $THREADS", &v), "$APP_DIR/in 8");
        assert_eq!(substitute("cost: 5$", &v), "cost: 5$");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let v = vars(&[("A", "$B"), ("B", "x")]);
        assert_eq!(substitute("$A $B", &v), "$B x");
    }

    #[test]
    fn longest_key_wins_regardless_of_order() {
        let v = vars(&[("ARG", "short"), ("ARG0", "long")]);
        assert_eq!(substitute("$ARG0 $ARG", &v), "long short");
    }

    #[test]
    fn reports_unresolved_and_missing_tokens() {
        let v = vars(&[("THREADS", "4")]);
        assert_eq!(unresolved_tokens("-t $THREADS", &v), vec!["THREADS"]);
        assert!(unresolved_tokens(&substitute("-t $THREADS", &v), &v).is_empty());
        assert_eq!(
            missing_tokens("$INPUTS_DIR/a $THREADS $INPUTS_DIR/b", &v),
            vec!["INPUTS_DIR"]
        );
    }
}
