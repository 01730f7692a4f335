/// splits the parameter section of a message into its parameters. the string must not contain a
/// CRLF.
pub(super) fn parse_params(s: &str) -> Vec<String> {
    let mut params = vec![];

    let mut s = s.trim_start_matches(' ');
    while !s.is_empty() {
        // NOTE: if a parameter starts with a `:`, the rest of the message is a parameter, spaces
        // included. the last parameter may omit the `:` if it's not necessary to disambiguate.
        if let Some(trailing) = s.strip_prefix(':') {
            params.push(trailing.to_string());
            // ate the rest of the params, return early
            return params;
        }

        let end_idx = s.find(' ').unwrap_or(s.len());
        params.push(s[..end_idx].to_string());
        s = s[end_idx..].trim_start_matches(' ');
    }

    params
}

#[cfg(test)]
mod tests {
    use super::parse_params;

    #[test]
    fn middle_and_trailing() {
        assert_eq!(
            parse_params("#chan +ov alice :bob and carol"),
            vec!["#chan", "+ov", "alice", "bob and carol"]
        );
    }

    #[test]
    fn trailing_may_be_empty_or_colon() {
        assert_eq!(parse_params("#chan :"), vec!["#chan", ""]);
        assert_eq!(parse_params("#chan ::)"), vec!["#chan", ":)"]);
    }

    #[test]
    fn extra_spaces_are_skipped() {
        assert_eq!(parse_params("  a   b  "), vec!["a", "b"]);
        assert!(parse_params("").is_empty());
    }

    #[test]
    fn colon_inside_a_middle_param_is_literal() {
        assert_eq!(parse_params("a:b c"), vec!["a:b", "c"]);
    }
}
