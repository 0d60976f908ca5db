// src/config/script.rs
use std::fmt;
use std::path::PathBuf;

/// An executable plus its arguments, validated at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSpec {
    pub path: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for ScriptSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("script contains forbidden characters for safety: {0}")]
    Sanitization(String),

    #[error("script provided is not a valid or accessible file on disk: {0}")]
    InvalidExecutable(String),
}

/// Parse a batch of raw command strings. The first invalid entry aborts the batch.
pub fn parse_scripts<S: AsRef<str>>(raw: &[S]) -> Result<Vec<ScriptSpec>, ScriptError> {
    raw.iter().map(|s| parse_script(s.as_ref())).collect()
}

/// Parse one raw command string into a [`ScriptSpec`].
///
/// The string is checked against a character allow-list, tokenized with
/// quote support (a quoted path may contain spaces) and its first token must
/// name an existing regular file. Bare command names that would only resolve
/// through `PATH` are rejected.
pub fn parse_script(raw: &str) -> Result<ScriptSpec, ScriptError> {
    if raw.is_empty() || !raw.chars().all(is_allowed) {
        return Err(ScriptError::Sanitization(raw.to_string()));
    }

    let mut tokens = tokenize(raw).unwrap_or_else(|| split_plain(raw));
    if tokens.is_empty() {
        return Err(ScriptError::InvalidExecutable(raw.to_string()));
    }

    let path = PathBuf::from(tokens.remove(0));
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(ScriptError::InvalidExecutable(path.display().to_string())),
    }

    Ok(ScriptSpec { path, args: tokens })
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | ' ' | '.' | '"' | ':')
}

/// Space separated fields with double-quote support. A doubled quote inside
/// a quoted field is a literal quote. Returns `None` on malformed quoting.
fn tokenize(raw: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut chars = raw.chars().peekable();

    loop {
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };

        let mut field = String::new();
        if first == '"' {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    Some('"') => break,
                    Some(c) => field.push(c),
                    // unterminated quote
                    None => return None,
                }
            }
            if !matches!(chars.peek(), None | Some(' ')) {
                return None;
            }
        } else {
            while let Some(&c) = chars.peek() {
                match c {
                    ' ' => break,
                    '"' => return None,
                    _ => {
                        field.push(c);
                        chars.next();
                    }
                }
            }
        }
        fields.push(field);
    }

    Some(fields)
}

fn split_plain(raw: &str) -> Vec<String> {
    raw.split(' ')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use std::path::Path;

    fn touch(path: &Path) -> String {
        fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_rejects_shell_metacharacters() {
        let err = parse_script("foo.sh & rm -rf /").unwrap_err();
        assert_eq!(err, ScriptError::Sanitization("foo.sh & rm -rf /".to_string()));
    }

    #[test]
    fn test_rejects_empty_string() {
        assert!(matches!(parse_script(""), Err(ScriptError::Sanitization(_))));
    }

    #[test]
    fn test_rejects_missing_file() {
        let err = parse_script("/definitely/not/here.sh --flag").unwrap_err();
        assert_eq!(
            err,
            ScriptError::InvalidExecutable("/definitely/not/here.sh".to_string())
        );
    }

    #[test]
    fn test_rejects_bare_command_name() {
        assert!(matches!(
            parse_script("ls -la"),
            Err(ScriptError::InvalidExecutable(_))
        ));
    }

    #[test]
    fn test_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().to_str().unwrap().to_string();
        assert!(matches!(
            parse_script(&raw),
            Err(ScriptError::InvalidExecutable(_))
        ));
    }

    #[test]
    fn test_quoted_path_with_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let spaced = dir.path().join("dir with space");
        fs::create_dir(&spaced).unwrap();
        let script = touch(&spaced.join("run.sh"));

        let spec = parse_script(&format!("\"{}\" arg1 arg2", script)).unwrap();
        assert_eq!(spec.path, PathBuf::from(&script));
        assert_eq!(spec.args, vec!["arg1".to_string(), "arg2".to_string()]);
    }

    #[test]
    fn test_no_args_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let script = touch(&dir.path().join("check.sh"));

        let spec = parse_script(&script).unwrap();
        assert!(spec.args.is_empty());
    }

    #[test]
    fn test_repeated_spaces_and_quoted_args() {
        let dir = tempfile::tempdir().unwrap();
        let script = touch(&dir.path().join("check.sh"));

        let spec = parse_script(&format!("{}   --port  \"a b\" x:y", script)).unwrap();
        assert_eq!(spec.args, vec!["--port", "a b", "x:y"]);
    }

    #[test]
    fn test_malformed_quotes_fall_back_to_plain_split() {
        let dir = tempfile::tempdir().unwrap();
        let script = touch(&dir.path().join("check.sh"));

        let spec = parse_script(&format!("{} a\"b", script)).unwrap();
        assert_eq!(spec.args, vec!["a\"b"]);
    }

    #[test]
    fn test_batch_aborts_on_first_invalid_entry() {
        let dir = tempfile::tempdir().unwrap();
        let script = touch(&dir.path().join("check.sh"));

        let result = parse_scripts(&[script.clone(), "/nope/missing.sh".to_string(), script]);
        assert!(matches!(result, Err(ScriptError::InvalidExecutable(_))));
    }

    #[test]
    fn test_display_joins_path_and_args() {
        let spec = ScriptSpec {
            path: PathBuf::from("/opt/check.sh"),
            args: vec!["--fast".to_string()],
        };
        assert_eq!(spec.to_string(), "/opt/check.sh --fast");
    }

    proptest! {
        #[test]
        fn prop_forbidden_characters_are_rejected(
            raw in "[a-z/ ]{0,8}[;&|$`<>(){}!*?~'\\\\]{1}[a-z ]{0,8}"
        ) {
            prop_assert!(matches!(parse_script(&raw), Err(ScriptError::Sanitization(_))));
        }
    }
}
