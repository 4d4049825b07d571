use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::{BlockPos, ModelError};

/// A block type plus its property set, e.g. `minecraft:oak_log[axis=y]`.
/// Properties are kept sorted so equality is order-independent and the
/// canonical serialization is stable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockState {
    name: String,
    props: BTreeMap<String, String>,
}

impl BlockState {
    pub fn new(
        name: impl Into<String>,
        props: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModelError::EmptyTypeName);
        }
        let props: BTreeMap<String, String> = props.into_iter().collect();
        for (k, v) in &props {
            if k.is_empty() {
                return Err(ModelError::EmptyPropertyKey);
            }
            if v.is_empty() {
                return Err(ModelError::EmptyPropertyValue(k.clone()));
            }
        }
        Ok(Self { name, props })
    }

    pub fn simple(name: impl Into<String>) -> Result<Self, ModelError> {
        Self::new(name, [])
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    #[inline]
    pub fn props(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Namespace-insensitive air check; air blocks are omitted from
    /// structure mappings at decode time.
    pub fn is_air(&self) -> bool {
        let base = self.name.rsplit(':').next().unwrap_or(&self.name);
        base == "air" || base == "cave_air" || base == "void_air"
    }

    /// Parses the canonical `name[k1=v1,k2=v2]` form; inverse of
    /// `to_string`.
    pub fn parse(s: &str) -> Result<Self, ModelError> {
        let malformed = || ModelError::MalformedState(s.to_string());
        match s.split_once('[') {
            None => {
                if s.contains(']') || s.contains('=') || s.contains(',') {
                    return Err(malformed());
                }
                Self::new(s, [])
            }
            Some((name, rest)) => {
                let body = rest.strip_suffix(']').ok_or_else(malformed)?;
                if body.contains('[') || body.contains(']') {
                    return Err(malformed());
                }
                let mut props = Vec::new();
                if !body.is_empty() {
                    for pair in body.split(',') {
                        let (k, v) = pair.split_once('=').ok_or_else(malformed)?;
                        props.push((k.to_string(), v.to_string()));
                    }
                }
                Self::new(name, props)
            }
        }
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.props.is_empty() {
            return write!(f, "{}", self.name);
        }
        write!(f, "{}[", self.name)?;
        for (i, (k, v)) in self.props.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, "]")
    }
}

/// One placed block. Identity within a structure is its position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub pos: BlockPos,
    pub state: Arc<BlockState>,
}

impl Block {
    pub fn new(pos: BlockPos, state: Arc<BlockState>) -> Self {
        Self { pos, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_round_trips() {
        let s = BlockState::new(
            "minecraft:oak_stairs",
            [
                ("half".to_string(), "top".to_string()),
                ("facing".to_string(), "north".to_string()),
            ],
        )
        .unwrap();
        let text = s.to_string();
        assert_eq!(text, "minecraft:oak_stairs[facing=north,half=top]");
        assert_eq!(BlockState::parse(&text).unwrap(), s);
    }

    #[test]
    fn property_order_does_not_affect_equality() {
        let a = BlockState::new(
            "x",
            [
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ],
        )
        .unwrap();
        let b = BlockState::new(
            "x",
            [
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_property_key_is_rejected() {
        let err = BlockState::new("stone", [(String::new(), "v".to_string())]).unwrap_err();
        assert_eq!(err, ModelError::EmptyPropertyKey);
    }

    #[test]
    fn empty_property_value_is_rejected() {
        let err = BlockState::new("stone", [("a".to_string(), String::new())]).unwrap_err();
        assert_eq!(err, ModelError::EmptyPropertyValue("a".to_string()));
    }

    #[test]
    fn malformed_strings_are_rejected() {
        for bad in ["", "stone[", "stone]", "stone[a]", "stone[a=1", "stone[a=]", "st[one[a=1]]"] {
            assert!(BlockState::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn air_detection_handles_namespaces() {
        assert!(BlockState::simple("air").unwrap().is_air());
        assert!(BlockState::simple("minecraft:air").unwrap().is_air());
        assert!(BlockState::simple("minecraft:cave_air").unwrap().is_air());
        assert!(!BlockState::simple("minecraft:stone").unwrap().is_air());
    }
}
