//! FILENAME: core/model/src/path.rs
//! PURPOSE: Typed row identity paths.
//! CONTEXT: A path is the ordered list of segments from a root row down to a
//! row. Materialized rows contribute their index in the parent; group rows
//! contribute the grouped column and key. Paths are hashed directly as keys of
//! the expanded set.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::ModelError;
use crate::value::{GroupKey, OrderedFloat};

/// One step of a row path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// Position of a materialized row among its siblings.
    Index(usize),
    /// A group row synthesized for `column_id == key`.
    Group { column_id: String, key: GroupKey },
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{}", i),
            PathSegment::Group { column_id, key } => {
                let mut out = String::new();
                escape_into(&mut out, column_id);
                out.push(':');
                encode_key(&mut out, key)?;
                f.write_str(&out)
            }
        }
    }
}

// ============================================================================
// TEXT FORM
// ============================================================================
//
// Group keys carry their kind so the text form parses back to an equal path:
//   text `north`, number `#30`, bool `?true`, null `~null`, undefined `~`,
//   datetime `@2024-01-31T08:00:00`, list `$` + JSON.
// `.`, `:` and `\` are backslash-escaped; a text key starting with a kind
// marker gets a leading backslash.

const KIND_MARKERS: [char; 5] = ['#', '?', '~', '@', '$'];

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, '.' | ':' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
}

fn encode_key(out: &mut String, key: &GroupKey) -> fmt::Result {
    match key {
        GroupKey::Text(s) => {
            if s.starts_with(KIND_MARKERS) {
                out.push('\\');
            }
            escape_into(out, s);
        }
        GroupKey::Number(n) => {
            out.push('#');
            escape_into(out, &n.as_f64().to_string());
        }
        GroupKey::Bool(b) => {
            out.push('?');
            out.push_str(if *b { "true" } else { "false" });
        }
        GroupKey::Null => out.push_str("~null"),
        GroupKey::Undefined => out.push('~'),
        GroupKey::DateTime(dt) => {
            out.push('@');
            escape_into(out, &dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
        }
        GroupKey::List(_) => {
            out.push('$');
            let json = serde_json::to_string(key).map_err(|_| fmt::Error)?;
            escape_into(out, &json);
        }
    }
    Ok(())
}

/// Splits on `sep` where it is not escaped.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

fn find_unescaped(s: &str, sep: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some(i);
        }
    }
    None
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;
    for c in s.chars() {
        if !escaped && c == '\\' {
            escaped = true;
        } else {
            out.push(c);
            escaped = false;
        }
    }
    out
}

fn decode_key(raw: &str, part: &str) -> Result<GroupKey, ModelError> {
    let invalid = || ModelError::InvalidPathSegment(part.to_string());
    let Some(marker) = raw.chars().next().filter(|c| KIND_MARKERS.contains(c)) else {
        return Ok(GroupKey::Text(unescape(raw)));
    };
    let body = unescape(&raw[marker.len_utf8()..]);
    match marker {
        '#' => body
            .parse::<f64>()
            .map(|n| GroupKey::Number(OrderedFloat(n)))
            .map_err(|_| invalid()),
        '?' => match body.as_str() {
            "true" => Ok(GroupKey::Bool(true)),
            "false" => Ok(GroupKey::Bool(false)),
            _ => Err(invalid()),
        },
        '~' => match body.as_str() {
            "" => Ok(GroupKey::Undefined),
            "null" => Ok(GroupKey::Null),
            _ => Err(invalid()),
        },
        '@' => body
            .parse::<NaiveDateTime>()
            .map(GroupKey::DateTime)
            .map_err(|_| invalid()),
        _ => serde_json::from_str::<GroupKey>(&body).map_err(|_| invalid()),
    }
}

/// The stable identity of a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowPath(SmallVec<[PathSegment; 4]>);

impl RowPath {
    pub fn root() -> Self {
        RowPath(SmallVec::new())
    }

    /// Builds a path of index segments, e.g. `[0, 2]` for the third child of the first root.
    pub fn from_indices(indices: &[usize]) -> Self {
        RowPath(indices.iter().copied().map(PathSegment::Index).collect())
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        RowPath(segments)
    }

    pub fn child_index(&self, index: usize) -> Self {
        self.child(PathSegment::Index(index))
    }

    pub fn child_group(&self, column_id: &str, key: GroupKey) -> Self {
        self.child(PathSegment::Group {
            column_id: column_id.to_string(),
            key,
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// The path of the parent row, or `None` for root rows.
    pub fn parent(&self) -> Option<RowPath> {
        if self.0.is_empty() {
            return None;
        }
        let mut segments = self.0.clone();
        segments.pop();
        Some(RowPath(segments))
    }
}

impl fmt::Display for RowPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Parses the dotted display form. Plain integers become index segments and
/// `column:key` becomes a group segment with the encoded key kind.
impl FromStr for RowPath {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(RowPath::root());
        }
        let mut segments = SmallVec::new();
        for part in split_unescaped(s, '.') {
            if let Ok(index) = part.parse::<usize>() {
                segments.push(PathSegment::Index(index));
                continue;
            }
            let Some(colon) = find_unescaped(part, ':') else {
                return Err(ModelError::InvalidPathSegment(part.to_string()));
            };
            let column_id = unescape(&part[..colon]);
            if column_id.is_empty() {
                return Err(ModelError::InvalidPathSegment(part.to_string()));
            }
            segments.push(PathSegment::Group {
                column_id,
                key: decode_key(&part[colon + 1..], part)?,
            });
        }
        Ok(RowPath(segments))
    }
}

impl From<Vec<PathSegment>> for RowPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        RowPath(SmallVec::from_vec(segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_child_paths() {
        let path = RowPath::root().child_index(0).child_index(2);
        assert_eq!(path, RowPath::from_indices(&[0, 2]));
        assert_eq!(path.len(), 2);
        assert_eq!(path.parent(), Some(RowPath::from_indices(&[0])));
        assert_eq!(RowPath::root().parent(), None);
    }

    #[test]
    fn displays_and_parses_dotted_form() {
        let path = RowPath::root()
            .child_group("region", GroupKey::Text("north".to_string()))
            .child_index(3);
        assert_eq!(path.to_string(), "region:north.3");
        assert_eq!("region:north.3".parse::<RowPath>().ok(), Some(path));
        assert!("a..b".parse::<RowPath>().is_err());
    }

    fn round_trip(path: &RowPath) -> RowPath {
        path.to_string().parse::<RowPath>().unwrap()
    }

    #[test]
    fn non_text_keys_round_trip() {
        let path = RowPath::root()
            .child_group("age", GroupKey::Number(OrderedFloat(30.0)))
            .child_group("active", GroupKey::Bool(true))
            .child_group("city", GroupKey::Null)
            .child_group("team", GroupKey::Undefined);
        assert_eq!(path.to_string(), "age:#30.active:?true.city:~null.team:~");
        assert_eq!(round_trip(&path), path);

        let fractional = RowPath::root().child_group("score", GroupKey::Number(OrderedFloat(1.5)));
        assert_eq!(fractional.to_string(), "score:#1\\.5");
        assert_eq!(round_trip(&fractional), fractional);
    }

    #[test]
    fn text_keys_keep_their_kind() {
        let path = RowPath::root()
            .child_group("code", GroupKey::Text("30".to_string()))
            .child_group("tag", GroupKey::Text("#1".to_string()))
            .child_group("address.city", GroupKey::Text("St. Paul: MN".to_string()));
        let parsed = round_trip(&path);
        assert_eq!(parsed, path);
        assert_ne!(
            parsed.segments()[0],
            PathSegment::Group {
                column_id: "code".to_string(),
                key: GroupKey::Number(OrderedFloat(30.0)),
            }
        );
    }

    #[test]
    fn datetime_and_list_keys_round_trip() {
        let dt = NaiveDateTime::parse_from_str("2024-01-31 08:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let path = RowPath::root()
            .child_group("at", GroupKey::DateTime(dt))
            .child_group(
                "tags",
                GroupKey::List(vec![GroupKey::Text("a.b".to_string()), GroupKey::Number(OrderedFloat(2.0))]),
            );
        assert_eq!(round_trip(&path), path);
        assert!("age:#abc".parse::<RowPath>().is_err());
        assert!("flag:?maybe".parse::<RowPath>().is_err());
    }
}
