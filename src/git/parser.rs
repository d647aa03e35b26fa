//! Pure parsers for git porcelain output.
//!
//! Every parser is total: lines it does not understand are skipped, so a
//! surprising git version degrades to fewer entries instead of an error.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// One entry of `git status --porcelain=v1`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileStatus {
    /// Path relative to the repository root; the destination for renames
    pub full_path: String,
    pub index_state: char,
    pub worktree_state: char,
}

impl FileStatus {
    pub fn is_staged(&self) -> bool {
        !matches!(self.index_state, ' ' | '?')
    }

    pub fn is_unstaged(&self) -> bool {
        self.worktree_state != ' '
    }

    /// False for untracked and ignored files
    pub fn is_in_index(&self) -> bool {
        !matches!(self.index_state, '?' | '!')
    }

    pub fn is_untracked(&self) -> bool {
        self.index_state == '?' && self.worktree_state == '?'
    }

    /// Resolve against the repository root
    pub fn absolute_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.full_path)
    }
}

/// Parsed `git status` of one module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitStatus {
    pub files: Vec<FileStatus>,
}

impl GitStatus {
    pub fn staged(&self) -> impl Iterator<Item = &FileStatus> {
        self.files.iter().filter(|f| f.is_staged())
    }

    pub fn unstaged(&self) -> impl Iterator<Item = &FileStatus> {
        self.files.iter().filter(|f| f.is_unstaged())
    }

    pub fn is_clean(&self) -> bool {
        self.files.is_empty()
    }
}

/// Any git-addressable pointer a module exposes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reference {
    LocalBranch {
        qualified_name: String,
        name: String,
    },
    RemoteBranch {
        qualified_name: String,
        name: String,
        remote_alias: String,
    },
    Tag {
        qualified_name: String,
        name: String,
    },
    Stash {
        qualified_name: String,
        name: String,
        id: u32,
    },
}

impl Reference {
    pub fn qualified_name(&self) -> &str {
        match self {
            Reference::LocalBranch { qualified_name, .. }
            | Reference::RemoteBranch { qualified_name, .. }
            | Reference::Tag { qualified_name, .. }
            | Reference::Stash { qualified_name, .. } => qualified_name,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Reference::LocalBranch { name, .. }
            | Reference::RemoteBranch { name, .. }
            | Reference::Tag { name, .. }
            | Reference::Stash { name, .. } => name,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            Reference::LocalBranch { .. } | Reference::RemoteBranch { .. }
        )
    }

    /// Equality used to match branches across modules
    ///
    /// Local branches match by name, remote branches by qualified name.
    /// Different variants, tags and stashes never match.
    pub fn same_branch(&self, other: &Reference) -> bool {
        match (self, other) {
            (Reference::LocalBranch { name: a, .. }, Reference::LocalBranch { name: b, .. }) => {
                a == b
            }
            (
                Reference::RemoteBranch {
                    qualified_name: a, ..
                },
                Reference::RemoteBranch {
                    qualified_name: b, ..
                },
            ) => a == b,
            _ => false,
        }
    }
}

/// A configured remote
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Remote {
    pub alias: String,
    pub url: String,
}

/// Parse `git status --porcelain=v1` output
pub fn parse_status_porcelain(output: &str) -> GitStatus {
    let files = output.lines().filter_map(parse_status_line).collect();
    GitStatus { files }
}

fn parse_status_line(line: &str) -> Option<FileStatus> {
    let mut chars = line.chars();
    let index_state = chars.next()?;
    let worktree_state = chars.next()?;
    if chars.next()? != ' ' {
        return None;
    }
    if !is_status_code(index_state) || !is_status_code(worktree_state) {
        return None;
    }

    let mut path = chars.as_str();
    // Renames and copies: "old -> new", either side possibly quoted
    if matches!(index_state, 'R' | 'C') || matches!(worktree_state, 'R' | 'C') {
        let source_len = quoted_token_len(path).unwrap_or_else(|| path.find(" -> ").unwrap_or(0));
        if let Some(destination) = path[source_len..].strip_prefix(" -> ") {
            path = destination;
        }
    }

    let full_path = unquote_path(path);
    if full_path.is_empty() {
        return None;
    }

    Some(FileStatus {
        full_path,
        index_state,
        worktree_state,
    })
}

fn is_status_code(c: char) -> bool {
    matches!(c, ' ' | 'M' | 'T' | 'A' | 'D' | 'R' | 'C' | 'U' | '?' | '!')
}

/// Byte length of a leading `"..."` token, closing quote included
///
/// Unquoted paths in porcelain output never contain spaces, so only a
/// quoted source can hide an arrow.
fn quoted_token_len(path: &str) -> Option<usize> {
    let inner = path.strip_prefix('"')?;
    let mut escaped = false;
    for (i, b) in inner.bytes().enumerate() {
        match b {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b'"' => return Some(i + 2),
            _ => {}
        }
    }
    None
}

/// Undo git's C-style quoting of unusual paths
fn unquote_path(path: &str) -> String {
    let Some(inner) = path
        .strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
    else {
        return path.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut iter = inner.bytes().peekable();
    while let Some(b) = iter.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        match iter.next() {
            Some(b'n') => bytes.push(b'\n'),
            Some(b't') => bytes.push(b'\t'),
            Some(b'r') => bytes.push(b'\r'),
            Some(d @ b'0'..=b'7') => {
                // Octal escape, up to three digits
                let mut digits = vec![d];
                while digits.len() < 3 {
                    match iter.peek() {
                        Some(&n @ b'0'..=b'7') => {
                            digits.push(n);
                            iter.next();
                        }
                        _ => break,
                    }
                }
                let value = digits.iter().fold(0u32, |acc, n| acc * 8 + u32::from(n - b'0'));
                match u8::try_from(value) {
                    Ok(byte) => bytes.push(byte),
                    // Out of byte range, keep the escape as written
                    Err(_) => {
                        bytes.push(b'\\');
                        bytes.extend_from_slice(&digits);
                    }
                }
            }
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Parse `git branch -a` output into local and remote branches
pub fn parse_branches(output: &str) -> Vec<Reference> {
    let mut branches = Vec::new();

    for line in output.lines() {
        // Format: "* main", "  feature", "+ worktree-branch", "  remotes/origin/main"
        let Some(marker) = line.get(..2) else {
            continue;
        };
        if !matches!(marker, "* " | "  " | "+ ") {
            continue;
        }
        let name = line[2..].trim();

        // "(HEAD detached at abc123)" and "remotes/origin/HEAD -> origin/main"
        if name.is_empty() || name.starts_with('(') || name.contains(" -> ") {
            continue;
        }

        if let Some(remote) = name.strip_prefix("remotes/") {
            let Some((alias, branch)) = remote.split_once('/') else {
                continue;
            };
            if alias.is_empty() || branch.is_empty() {
                continue;
            }
            branches.push(Reference::RemoteBranch {
                qualified_name: remote.to_string(),
                name: branch.to_string(),
                remote_alias: alias.to_string(),
            });
        } else {
            branches.push(Reference::LocalBranch {
                qualified_name: name.to_string(),
                name: name.to_string(),
            });
        }
    }

    branches
}

/// Parse `git tag` output
pub fn parse_tags(output: &str) -> Vec<Reference> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains(char::is_whitespace))
        .map(|name| Reference::Tag {
            qualified_name: format!("tags/{}", name),
            name: name.to_string(),
        })
        .collect()
}

/// Parse `git stash list` output such as `stash@{0}: WIP on main: abc fix`
pub fn parse_stash_list(output: &str) -> Vec<Reference> {
    let mut stashes = Vec::new();

    for line in output.lines() {
        let Some(rest) = line.strip_prefix("stash@{") else {
            continue;
        };
        let Some((id, rest)) = rest.split_once('}') else {
            continue;
        };
        let Ok(id) = id.parse::<u32>() else {
            continue;
        };
        let message = rest.strip_prefix(':').unwrap_or(rest).trim();

        stashes.push(Reference::Stash {
            qualified_name: format!("stash@{{{}}}", id),
            name: message.to_string(),
            id,
        });
    }

    stashes
}

/// Parse `git remote -v` output, one entry per alias
///
/// The fetch URL wins when fetch and push differ.
pub fn parse_remotes(output: &str) -> Vec<Remote> {
    let mut remotes: Vec<Remote> = Vec::new();

    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(alias), Some(url)) = (parts.next(), parts.next()) else {
            continue;
        };
        let is_fetch = parts.next().is_none_or(|kind| kind == "(fetch)");

        match remotes.iter_mut().find(|r| r.alias == alias) {
            Some(existing) if is_fetch => existing.url = url.to_string(),
            Some(_) => {}
            None => remotes.push(Remote {
                alias: alias.to_string(),
                url: url.to_string(),
            }),
        }
    }

    remotes
}

/// Parse `git branch --show-current`; empty output means detached HEAD
pub fn parse_current_branch(output: &str) -> Option<String> {
    let branch = output.trim();
    if branch.is_empty() {
        None
    } else {
        Some(branch.to_string())
    }
}

/// Parse `git rev-parse --show-toplevel`
pub fn parse_repo_root(output: &str) -> Option<PathBuf> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(PathBuf::from)
}
