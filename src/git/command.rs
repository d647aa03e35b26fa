use crate::error::{GitError, GitResult};

/// Subcommands that change the working tree, the index, refs or remotes
///
/// Completing any of these invalidates a module's cached queries.
pub const MUTATING_GIT_SUBCOMMANDS: &[&str] = &[
    "add",
    "am",
    "apply",
    "checkout",
    "cherry-pick",
    "clean",
    "commit",
    "fetch",
    "merge",
    "mv",
    "pull",
    "push",
    "rebase",
    "reset",
    "restore",
    "revert",
    "rm",
    "stash",
    "switch",
];

/// Branch flags that only list or inspect
const BRANCH_READ_FLAGS: &[&str] = &[
    "-a",
    "--all",
    "-r",
    "--remotes",
    "-l",
    "--list",
    "-v",
    "-vv",
    "--verbose",
    "--show-current",
    "--contains",
    "--merged",
    "--no-merged",
    "--format",
];

/// Global options whose value is the next word
const GLOBAL_OPTIONS_WITH_VALUE: &[&str] = &[
    "-c",
    "-C",
    "--git-dir",
    "--work-tree",
    "--namespace",
    "--exec-path",
    "--super-prefix",
    "--config-env",
];

/// A tokenized git argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    args: Vec<String>,
}

impl GitCommand {
    /// Tokenize a command line such as `commit -m "some message"`
    ///
    /// A leading `git` word is accepted and dropped.
    pub fn parse(command_line: &str) -> GitResult<Self> {
        let mut args = split_command_line(command_line)?;
        if args.first().is_some_and(|a| a == "git") {
            args.remove(0);
        }
        if args.is_empty() {
            return Err(GitError::Tokenize("Empty command".to_string()));
        }
        Ok(Self { args })
    }

    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The git subcommand, skipping global options such as `-c key=value`
    pub fn subcommand(&self) -> Option<&str> {
        self.subcommand_index().map(|idx| self.args[idx].as_str())
    }

    fn subcommand_index(&self) -> Option<usize> {
        let mut iter = self.args.iter().enumerate();
        while let Some((idx, word)) = iter.next() {
            if GLOBAL_OPTIONS_WITH_VALUE.contains(&word.as_str()) {
                iter.next();
                continue;
            }
            if !word.starts_with('-') {
                return Some(idx);
            }
        }
        None
    }

    fn rest(&self) -> &[String] {
        match self.subcommand_index() {
            Some(idx) => &self.args[idx + 1..],
            None => &[],
        }
    }

    /// Whether running this command changes repository state
    pub fn is_mutating(&self) -> bool {
        let Some(subcommand) = self.subcommand() else {
            return false;
        };

        if MUTATING_GIT_SUBCOMMANDS.contains(&subcommand) {
            // `stash list` and `stash show` only read
            if subcommand == "stash" {
                return !matches!(
                    self.rest().first().map(String::as_str),
                    Some("list" | "show")
                );
            }
            return true;
        }

        let rest = self.rest();
        match subcommand {
            "branch" => {
                let read_only = rest.is_empty()
                    || rest.iter().any(|a| {
                        BRANCH_READ_FLAGS.contains(&a.as_str()) || a.starts_with("--format=")
                    });
                !read_only
            }
            "tag" => {
                !rest.is_empty()
                    && !rest.iter().any(|a| {
                        matches!(
                            a.as_str(),
                            "-l" | "--list" | "-n" | "--contains" | "--points-at" | "--merged"
                        )
                    })
            }
            "remote" => matches!(
                rest.first().map(String::as_str),
                Some("add" | "remove" | "rm" | "rename" | "set-url" | "prune" | "set-head")
            ),
            _ => false,
        }
    }

    /// The argument list rendered back to a single command line
    pub fn to_command_line(&self) -> String {
        self.args
            .iter()
            .map(|a| quote_arg(a))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for GitCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_command_line())
    }
}

/// Split a command line into arguments using shell quoting rules
///
/// Supports single quotes, double quotes with backslash escapes and
/// backslash escapes outside of quotes. No variable expansion happens.
pub fn split_command_line(line: &str) -> GitResult<Vec<String>> {
    #[derive(PartialEq)]
    enum State {
        Normal,
        Single,
        Double,
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut state = State::Normal;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '\'' => {
                    state = State::Single;
                    in_word = true;
                }
                '"' => {
                    state = State::Double;
                    in_word = true;
                }
                '\\' => {
                    let escaped = chars
                        .next()
                        .ok_or_else(|| GitError::Tokenize("Trailing backslash".to_string()))?;
                    current.push(escaped);
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        args.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
            State::Single => match c {
                '\'' => state = State::Normal,
                c => current.push(c),
            },
            State::Double => match c {
                '"' => state = State::Normal,
                '\\' => match chars.next() {
                    Some(e @ ('"' | '\\' | '$' | '`')) => current.push(e),
                    Some(other) => {
                        current.push('\\');
                        current.push(other);
                    }
                    None => {
                        return Err(GitError::Tokenize("Unterminated double quote".to_string()));
                    }
                },
                c => current.push(c),
            },
        }
    }

    match state {
        State::Single => Err(GitError::Tokenize("Unterminated single quote".to_string())),
        State::Double => Err(GitError::Tokenize("Unterminated double quote".to_string())),
        State::Normal => {
            if in_word {
                args.push(current);
            }
            Ok(args)
        }
    }
}

/// Quote one argument so that [`split_command_line`] yields it back intact
pub fn quote_arg(arg: &str) -> String {
    let needs_quotes =
        arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\'));
    if !needs_quotes {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Join file names into a space separated, quoted argument list
pub fn join_file_names<I, S>(files: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    files
        .into_iter()
        .map(|f| quote_arg(f.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_mutating(line: &str) -> bool {
        GitCommand::parse(line).unwrap().is_mutating()
    }

    #[test]
    fn test_split_plain() {
        assert_eq!(
            split_command_line("status --porcelain").unwrap(),
            vec!["status", "--porcelain"]
        );
    }

    #[test]
    fn test_split_quoted_message() {
        assert_eq!(
            split_command_line(r#"commit -m "fix the build""#).unwrap(),
            vec!["commit", "-m", "fix the build"]
        );
    }

    #[test]
    fn test_split_paths_with_spaces() {
        assert_eq!(
            split_command_line(r#"add -f -- "My Assets/a b.txt" 'other file.txt' plain\ name"#)
                .unwrap(),
            vec!["add", "-f", "--", "My Assets/a b.txt", "other file.txt", "plain name"]
        );
    }

    #[test]
    fn test_split_escaped_quote_inside_double() {
        assert_eq!(
            split_command_line(r#"commit -m "say \"hi\"""#).unwrap(),
            vec!["commit", "-m", r#"say "hi""#]
        );
    }

    #[test]
    fn test_split_empty_quoted_argument() {
        assert_eq!(
            split_command_line(r#"commit -m """#).unwrap(),
            vec!["commit", "-m", ""]
        );
    }

    #[test]
    fn test_split_unterminated() {
        assert!(matches!(
            split_command_line(r#"commit -m "oops"#),
            Err(GitError::Tokenize(_))
        ));
        assert!(split_command_line("commit -m 'oops").is_err());
    }

    #[test]
    fn test_parse_strips_git_prefix() {
        let cmd = GitCommand::parse("git status").unwrap();
        assert_eq!(cmd.args(), ["status"]);
        assert!(GitCommand::parse("   ").is_err());
    }

    #[test]
    fn test_quote_roundtrip() {
        let tricky = ["plain", "with space", "quote\"d", "back\\slash", ""];
        let line = join_file_names(tricky);
        assert_eq!(split_command_line(&line).unwrap(), tricky);
    }

    #[test]
    fn test_mutating_commands() {
        for line in [
            "commit -m msg",
            "add -f -- a.txt",
            "reset -q -- a.txt",
            "checkout main",
            "checkout -b feature",
            "branch feature",
            "branch -d feature",
            "merge origin/main",
            "rebase main",
            "stash push -m wip",
            "stash apply stash@{0}",
            "push -d origin feature",
            "remote add origin https://example.com/repo.git",
            "remote remove origin",
            "remote set-url origin https://example.com/repo.git",
            "tag -d v1.0",
            "switch feature",
            "--git-dir .git commit -m msg",
            "--work-tree ../tree add file.txt",
            "--namespace build -C sub branch release",
            "--git-dir=.git stash",
        ] {
            assert!(is_mutating(line), "expected mutating: {}", line);
        }
    }

    #[test]
    fn test_read_only_commands() {
        for line in [
            "status --porcelain",
            "log --oneline",
            "diff -- a.txt",
            "branch",
            "branch -a",
            "branch --show-current",
            "remote -v",
            "remote",
            "stash list",
            "tag",
            "rev-parse --show-toplevel",
        ] {
            assert!(!is_mutating(line), "expected read-only: {}", line);
        }
    }

    #[test]
    fn test_subcommand_skips_global_options() {
        let cmd = GitCommand::parse("-c core.quotepath=off status").unwrap();
        assert_eq!(cmd.subcommand(), Some("status"));
        assert!(!cmd.is_mutating());

        // A global option value equal to a subcommand name is not the subcommand
        let cmd = GitCommand::parse("-C commit stash list").unwrap();
        assert_eq!(cmd.subcommand(), Some("stash"));
        assert!(!cmd.is_mutating());
    }
}
