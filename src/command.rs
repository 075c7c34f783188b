//! Line commands understood by the `pgw` driver.

use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::tree::TreePath;

pub const HELP: &str = "\
Commands:
  tree                          show the project tree
  status                        open files and unsaved state
  open <path>                   open a file in a tab
  close <path>                  close a tab, discarding edits
  close-all                     close every tab
  edit <path> <text>            replace the buffer text (\\n for newline)
  append <path> <text>          append to the buffer text
  save [path]                   save a file (default: active tab)
  save-all                      save every unsaved file
  add-file <folder> <name>      create an empty file (`/` is the root)
  add-folder <folder> <name>    create an empty folder
  rm <path>                     delete a file
  rmdir <path>                  delete a folder and everything in it
  rename <path> <new-name>      rename a file or folder
  key <chord>                   press a shortcut, e.g. ctrl+shift+s
  url                           preview URL of the sandbox
  help                          this text
  quit                          leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Tree,
    Status,
    Open(TreePath),
    Close(TreePath),
    CloseAll,
    Edit { path: TreePath, text: String },
    Append { path: TreePath, text: String },
    Save(Option<TreePath>),
    SaveAll,
    AddFile { parent: TreePath, name: String },
    AddFolder { parent: TreePath, name: String },
    Remove(TreePath),
    RemoveDir(TreePath),
    Rename { path: TreePath, new_name: String },
    Key(String),
    Url,
    Help,
    Quit,
}

/// Split off the first whitespace-delimited word.
fn next_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.find(char::is_whitespace) {
        Some(end) => Some((&input[..end], &input[end..])),
        None => Some((input, "")),
    }
}

fn word<'a>(rest: &mut &'a str, what: &str) -> Result<&'a str> {
    let (w, tail) = next_word(rest).ok_or_else(|| AppError::Command(format!("missing {}", what)))?;
    *rest = tail;
    Ok(w)
}

fn path(rest: &mut &str) -> Result<TreePath> {
    word(rest, "path")?.parse()
}

/// Free text keeps inner spacing; `\n` and `\t` are unescaped.
fn text(rest: &str) -> String {
    let raw = rest.strip_prefix(' ').unwrap_or(rest);
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn finish(rest: &str, cmd: Command) -> Result<Command> {
    match next_word(rest) {
        None => Ok(cmd),
        Some((extra, _)) => Err(AppError::Command(format!("unexpected argument {:?}", extra))),
    }
}

impl FromStr for Command {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self> {
        let (name, mut rest) =
            next_word(line).ok_or_else(|| AppError::Command("empty command".into()))?;
        let rest = &mut rest;

        let cmd = match name {
            "tree" | "ls" => Command::Tree,
            "status" => Command::Status,
            "open" => Command::Open(path(rest)?),
            "close" => Command::Close(path(rest)?),
            "close-all" => Command::CloseAll,
            "edit" => {
                let path = path(rest)?;
                return Ok(Command::Edit { path, text: text(rest) });
            }
            "append" => {
                let path = path(rest)?;
                return Ok(Command::Append { path, text: text(rest) });
            }
            "save" if rest.trim().is_empty() => Command::Save(None),
            "save" => Command::Save(Some(path(rest)?)),
            "save-all" => Command::SaveAll,
            "add-file" => Command::AddFile {
                parent: path(rest)?,
                name: word(rest, "name")?.to_string(),
            },
            "add-folder" | "mkdir" => Command::AddFolder {
                parent: path(rest)?,
                name: word(rest, "name")?.to_string(),
            },
            "rm" => Command::Remove(path(rest)?),
            "rmdir" => Command::RemoveDir(path(rest)?),
            "rename" | "mv" => Command::Rename {
                path: path(rest)?,
                new_name: word(rest, "new name")?.to_string(),
            },
            "key" => Command::Key(word(rest, "chord")?.to_string()),
            "url" => Command::Url,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(AppError::Command(format!("unknown command {:?}", other))),
        };
        finish(rest, cmd)
    }
}
