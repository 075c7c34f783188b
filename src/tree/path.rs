use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Location of a node, relative to the project root.
///
/// Segments are the folder names from the root down to the node; for a file
/// the last segment is its display name. The root folder's own name is never
/// part of a path, so the root itself is the empty path.
///
/// Paths are always recomputed from the tree and never stored on nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// The empty path, naming the root folder.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from explicit segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path of the containing folder, or `None` for the root.
    pub fn parent(&self) -> Option<TreePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append one segment.
    pub fn join(&self, name: impl Into<String>) -> TreePath {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self { segments }
    }

    /// The `/`-joined relative form used for sandbox writes (`src/App.tsx`).
    pub fn to_relative(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            f.write_str("/")
        } else {
            f.write_str(&self.segments.join("/"))
        }
    }
}

impl FromStr for TreePath {
    type Err = AppError;

    /// Parse `src/components`, `/src/components/` or `` (root).
    ///
    /// Empty segments produced by leading, trailing or doubled slashes are
    /// dropped; `.` and `..` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        for seg in s.split('/') {
            match seg {
                "" => continue,
                "." | ".." => return Err(AppError::InvalidPath(s.to_string())),
                other => segments.push(other.to_string()),
            }
        }
        Ok(Self { segments })
    }
}
