/// Dot-atom rules: atext runs joined by single dots, no leading or
/// trailing dot, no empty run.
pub(crate) fn is_dot_atom(s: &str) -> bool {
    if s.starts_with('.') || s.ends_with('.') || s.contains("..") {
        return false;
    }
    s.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || matches!(
                c,
                '!' | '#'
                    | '$'
                    | '%'
                    | '&'
                    | '\''
                    | '*'
                    | '+'
                    | '-'
                    | '/'
                    | '='
                    | '?'
                    | '^'
                    | '_'
                    | '`'
                    | '{'
                    | '|'
                    | '}'
                    | '~'
                    | '.'
            )
    })
}

/// Quoted-string rules: the whole local part is `"..."` where the content
/// is qtext or a `\X` quoted pair over printable ASCII and space.
pub(crate) fn is_quoted_string(s: &str) -> bool {
    let Some(content) = s.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) else {
        return false;
    };
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) if (' '..='~').contains(&escaped) => {}
                _ => return false,
            },
            // qtext: printable ASCII and space, minus '"' and '\'
            ' '..='~' if c != '"' && c != '\\' => {}
            _ => return false,
        }
    }
    true
}

pub(crate) fn is_local_valid(local: &str) -> bool {
    if local.starts_with('"') {
        is_quoted_string(local)
    } else {
        is_dot_atom(local)
    }
}
