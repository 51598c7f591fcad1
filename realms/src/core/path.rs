//! Path model: fragments, structural comparison and the canonical string form.
//!
//! The rendered form (`[/a/b\/c]`) doubles as the interning key, so rendering
//! must stay stable: changing it changes which persistent path a lookup hits.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Opaque fragment compared by identity, not by label.
#[derive(Clone)]
pub struct Tag(Rc<str>);

impl Tag {
    pub fn new(label: &str) -> Self {
        Self(Rc::from(label))
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as *const u8).hash(state);
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag(@{})", self.0)
    }
}

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fragment {
    Str(String),
    Int(i64),
    BigInt(i128),
    Bool(bool),
    Tag(Tag),
}

impl Fragment {
    /// List index carried by this fragment, if it is a non-negative integer.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Fragment::Int(n) => usize::try_from(*n).ok(),
            Fragment::BigInt(n) => usize::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Fragment::Str(s) => Some(s),
            _ => None,
        }
    }

    fn write_escaped(&self, out: &mut String) {
        match self {
            Fragment::Str(s) => {
                for ch in s.chars() {
                    match ch {
                        '\\' => out.push_str("\\\\"),
                        '/' => out.push_str("\\/"),
                        _ => out.push(ch),
                    }
                }
            }
            other => out.push_str(&other.to_string()),
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Str(s) => f.write_str(s),
            Fragment::Int(n) => write!(f, "{n}"),
            Fragment::BigInt(n) => write!(f, "{n}"),
            Fragment::Bool(b) => write!(f, "{b}"),
            Fragment::Tag(tag) => write!(f, "@{}", tag.label()),
        }
    }
}

impl From<&str> for Fragment {
    fn from(value: &str) -> Self {
        Fragment::Str(value.to_string())
    }
}

impl From<String> for Fragment {
    fn from(value: String) -> Self {
        Fragment::Str(value)
    }
}

impl From<i64> for Fragment {
    fn from(value: i64) -> Self {
        Fragment::Int(value)
    }
}

impl From<usize> for Fragment {
    fn from(value: usize) -> Self {
        match i64::try_from(value) {
            Ok(n) => Fragment::Int(n),
            Err(_) => Fragment::BigInt(value as i128),
        }
    }
}

impl From<i128> for Fragment {
    fn from(value: i128) -> Self {
        Fragment::BigInt(value)
    }
}

impl From<bool> for Fragment {
    fn from(value: bool) -> Self {
        Fragment::Bool(value)
    }
}

impl From<Tag> for Fragment {
    fn from(value: Tag) -> Self {
        Fragment::Tag(value)
    }
}

/// Ordered sequence of fragments. Structurally comparable, never deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<Fragment>);

impl Path {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Fragment> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Fragment> {
        self.0.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fragment> {
        self.0.iter()
    }

    pub fn push(&mut self, fragment: impl Into<Fragment>) {
        self.0.push(fragment.into());
    }

    /// New path extended by one fragment.
    pub fn child(&self, fragment: impl Into<Fragment>) -> Path {
        let mut next = self.clone();
        next.push(fragment);
        next
    }

    /// New path extended by every fragment of `tail`.
    pub fn join(&self, tail: &Path) -> Path {
        let mut next = self.clone();
        next.0.extend(tail.0.iter().cloned());
        next
    }

    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            return None;
        }
        Some(Path(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn render(&self, absolute: bool) -> String {
        render(self, absolute)
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Fragment;
    type IntoIter = std::slice::Iter<'a, Fragment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Fragment> for Path {
    fn from_iter<I: IntoIterator<Item = Fragment>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl From<Vec<Fragment>> for Path {
    fn from(value: Vec<Fragment>) -> Self {
        Path(value)
    }
}

impl<F: Into<Fragment>, const N: usize> From<[F; N]> for Path {
    fn from(value: [F; N]) -> Self {
        value.into_iter().map(Into::into).collect()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self, true))
    }
}

/// Structural relation of a path to another, from the left operand's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathRelation {
    Equal,
    /// Left is a strict prefix of right.
    Ascendant,
    /// Right is a strict prefix of left.
    Descendant,
    Disjoint,
}

impl fmt::Display for PathRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PathRelation::Equal => "equal",
            PathRelation::Ascendant => "ascendant",
            PathRelation::Descendant => "descendant",
            PathRelation::Disjoint => "disjoint",
        };
        f.write_str(label)
    }
}

/// Compare two paths over their common-length prefix.
pub fn compare(a: &Path, b: &Path) -> PathRelation {
    let common = a.len().min(b.len());
    if a.0[..common] != b.0[..common] {
        return PathRelation::Disjoint;
    }
    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Equal => PathRelation::Equal,
        std::cmp::Ordering::Less => PathRelation::Ascendant,
        std::cmp::Ordering::Greater => PathRelation::Descendant,
    }
}

/// Render `path` as `[/a/b]` (or `[a/b]` when not absolute), escaping `\`
/// and `/` inside fragments.
pub fn render(path: &Path, absolute: bool) -> String {
    let mut out = String::from("[");
    if absolute {
        out.push('/');
    }
    for (index, fragment) in path.iter().enumerate() {
        if index > 0 {
            out.push('/');
        }
        fragment.write_escaped(&mut out);
    }
    out.push(']');
    out
}
