//! JSON pointers (RFC 6901).

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{ResourceError, ResourceResult};

/// A parsed JSON pointer. The empty pointer addresses the whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPointer {
    tokens: Vec<String>,
}

impl JsonPointer {
    /// Parse `"/a/b~1c"`. A missing leading slash is tolerated (`"a/b"`).
    pub fn parse(pointer: &str) -> Self {
        let trimmed = pointer.strip_prefix('/').unwrap_or(pointer);
        if trimmed.is_empty() {
            return Self::default();
        }
        let tokens = trimmed
            .split('/')
            .map(|t| t.replace("~1", "/").replace("~0", "~"))
            .collect();
        Self { tokens }
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn leaf(&self) -> Option<&str> {
        self.tokens.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<Self> {
        self.tokens.split_last().map(|(_, rest)| Self {
            tokens: rest.to_vec(),
        })
    }

    pub fn child(&self, token: impl Into<String>) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(token.into());
        Self { tokens }
    }

    /// Value addressed by this pointer, if present.
    pub fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.tokens.iter().try_fold(value, |current, token| match current {
            Value::Object(map) => map.get(token),
            Value::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    pub fn get_mut<'a>(&self, value: &'a mut Value) -> Option<&'a mut Value> {
        self.tokens.iter().try_fold(value, |current, token| match current {
            Value::Object(map) => map.get_mut(token),
            Value::Array(items) => token
                .parse::<usize>()
                .ok()
                .and_then(move |i| items.get_mut(i)),
            _ => None,
        })
    }

    /// Set the addressed value, creating missing intermediate objects.
    /// The token `-` appends to an array.
    pub fn put(&self, target: &mut Value, new_value: Value) -> ResourceResult<()> {
        let Some((last, parents)) = self.tokens.split_last() else {
            *target = new_value;
            return Ok(());
        };

        let mut current = target;
        for token in parents {
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
            current = match current {
                Value::Object(map) => map
                    .entry(token.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(items) => {
                    let index = self.array_index(token, items.len())?;
                    if index == items.len() {
                        items.push(Value::Object(Map::new()));
                    }
                    &mut items[index]
                }
                _ => return Err(self.not_a_container()),
            };
        }

        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        match current {
            Value::Object(map) => {
                map.insert(last.clone(), new_value);
                Ok(())
            }
            Value::Array(items) => {
                let index = self.array_index(last, items.len())?;
                if index == items.len() {
                    items.push(new_value);
                } else {
                    items[index] = new_value;
                }
                Ok(())
            }
            _ => Err(self.not_a_container()),
        }
    }

    /// Remove and return the addressed value.
    pub fn remove(&self, target: &mut Value) -> Option<Value> {
        let (last, _) = self.tokens.split_last()?;
        let parent = self.parent()?;
        match parent.get_mut(target)? {
            Value::Object(map) => map.remove(last),
            Value::Array(items) => {
                let index = last.parse::<usize>().ok()?;
                (index < items.len()).then(|| items.remove(index))
            }
            _ => None,
        }
    }

    fn array_index(&self, token: &str, len: usize) -> ResourceResult<usize> {
        if token == "-" {
            return Ok(len);
        }
        match token.parse::<usize>() {
            Ok(i) if i <= len => Ok(i),
            _ => Err(ResourceError::BadRequest(format!(
                "The field '{self}' refers to an invalid array index"
            ))),
        }
    }

    fn not_a_container(&self) -> ResourceError {
        ResourceError::BadRequest(format!(
            "The field '{self}' cannot be set because its parent is not an object or array"
        ))
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tokens.is_empty() {
            return f.write_str("/");
        }
        for token in &self.tokens {
            write!(f, "/{}", token.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl From<&str> for JsonPointer {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl Serialize for JsonPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JsonPointer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PointerVisitor;

        impl Visitor<'_> for PointerVisitor {
            type Value = JsonPointer;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON pointer string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<JsonPointer, E> {
                Ok(JsonPointer::parse(v))
            }
        }

        deserializer.deserialize_str(PointerVisitor)
    }
}
