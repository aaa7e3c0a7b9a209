//! Uniform name parsing.
//!
//! Driver-reported names are parsed left to right as a sequence of
//! `identifier` `]`? (`[` | `.`)?:
//!
//! | Name                       | Result                                           |
//! |----------------------------|--------------------------------------------------|
//! | `foo`                      | singular leaf `foo`                              |
//! | `bar[0]`                   | pure-array leaf `bar`                            |
//! | `spotLights[0].direction`  | struct `spotLights` → struct `0` → leaf `direction` |

use std::fmt;

use crate::errors::{RenderError, Result};

/// Key of a node inside its parent container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UniformId {
    Name(String),
    Index(u32),
}

impl fmt::Display for UniformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => f.write_str(n),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for UniformId {
    fn from(s: &str) -> Self {
        Self::Name(s.to_owned())
    }
}

impl From<u32> for UniformId {
    fn from(i: u32) -> Self {
        Self::Index(i)
    }
}

/// How a leaf uploads its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadStrategy {
    /// One value.
    Singular,
    /// A whole contiguous array block in one call.
    PureArray,
}

/// A parsed uniform name: containers to descend through, then the leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformPath {
    pub containers: Vec<UniformId>,
    pub leaf: UniformId,
    pub strategy: UploadStrategy,
}

#[inline]
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// `true` when `rest` is `N]` and nothing else.
fn is_array_suffix(rest: &str) -> bool {
    rest.strip_suffix(']')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

pub fn parse(name: &str) -> Result<UniformPath> {
    let malformed = || RenderError::MalformedUniformName(name.to_owned());
    let bytes = name.as_bytes();
    let mut containers = Vec::new();
    let mut pos = 0;

    loop {
        let start = pos;
        while pos < bytes.len() && is_ident_byte(bytes[pos]) {
            pos += 1;
        }
        if pos == start {
            return Err(malformed());
        }
        let ident = &name[start..pos];

        let is_index = bytes.get(pos) == Some(&b']');
        let id = if is_index {
            pos += 1;
            UniformId::Index(ident.parse().map_err(|_| malformed())?)
        } else {
            UniformId::Name(ident.to_owned())
        };

        match bytes.get(pos) {
            None => {
                return Ok(UniformPath {
                    containers,
                    leaf: id,
                    strategy: UploadStrategy::Singular,
                });
            }
            Some(b'[') if is_array_suffix(&name[pos + 1..]) => {
                return Ok(UniformPath {
                    containers,
                    leaf: id,
                    strategy: UploadStrategy::PureArray,
                });
            }
            Some(b'[' | b'.') => {
                containers.push(id);
                pos += 1;
            }
            Some(_) => return Err(malformed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name_is_singular_leaf() {
        let p = parse("foo").unwrap();
        assert!(p.containers.is_empty());
        assert_eq!(p.leaf, UniformId::from("foo"));
        assert_eq!(p.strategy, UploadStrategy::Singular);
    }

    #[test]
    fn test_trailing_index_is_pure_array() {
        let p = parse("bar[3]").unwrap();
        assert!(p.containers.is_empty());
        assert_eq!(p.leaf, UniformId::from("bar"));
        assert_eq!(p.strategy, UploadStrategy::PureArray);
    }

    #[test]
    fn test_struct_array_member() {
        let p = parse("spotLights[0].direction").unwrap();
        assert_eq!(p.containers, vec![UniformId::from("spotLights"), UniformId::Index(0)]);
        assert_eq!(p.leaf, UniformId::from("direction"));
        assert_eq!(p.strategy, UploadStrategy::Singular);
    }

    #[test]
    fn test_array_member_of_struct() {
        let p = parse("shadow[1].matrix[0]").unwrap();
        assert_eq!(p.containers, vec![UniformId::from("shadow"), UniformId::Index(1)]);
        assert_eq!(p.leaf, UniformId::from("matrix"));
        assert_eq!(p.strategy, UploadStrategy::PureArray);
    }

    #[test]
    fn test_malformed_names() {
        assert!(parse("").is_err());
        assert!(parse("a..b").is_err());
        assert!(parse("a[x]b").is_err());
    }
}
