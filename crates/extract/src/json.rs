//! Recovery of JSON from model replies that were asked to be bare JSON but
//! sometimes arrive wrapped in prose or code fences.

use serde_json::Value;

/// Literal type a caller expects, tried first when the strict parse fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shape {
    #[default]
    Array,
    Object,
}

/// Outcome of [`extract_json`], one variant per step of the fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The whole reply parsed as JSON.
    Direct(Value),
    /// First balanced `[...]` literal inside the reply.
    ArrayLiteral(Value),
    /// First balanced `{...}` literal inside the reply.
    ObjectLiteral(Value),
    /// Nothing parsed.
    Empty,
}

impl Extraction {
    /// The recovered value; `Empty` becomes an empty array.
    pub fn into_value(self) -> Value {
        match self {
            Extraction::Direct(v) | Extraction::ArrayLiteral(v) | Extraction::ObjectLiteral(v) => v,
            Extraction::Empty => Value::Array(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Extraction::Empty)
    }

    pub fn step(&self) -> &'static str {
        match self {
            Extraction::Direct(_) => "direct",
            Extraction::ArrayLiteral(_) => "array_literal",
            Extraction::ObjectLiteral(_) => "object_literal",
            Extraction::Empty => "empty",
        }
    }
}

/// Array-first extraction, for replies expected to be a list of findings.
pub fn extract_json(raw: &str) -> Extraction {
    extract_json_as(raw, Shape::Array)
}

/// Strict parse, then the literal type matching `expected`, then the other one.
pub fn extract_json_as(raw: &str, expected: Shape) -> Extraction {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        return Extraction::Direct(value);
    }

    let order = match expected {
        Shape::Array => [Shape::Array, Shape::Object],
        Shape::Object => [Shape::Object, Shape::Array],
    };

    for shape in order {
        if let Some(value) = first_balanced_literal(raw, shape) {
            tracing::debug!(?shape, "Recovered JSON literal from surrounding text");
            return match shape {
                Shape::Array => Extraction::ArrayLiteral(value),
                Shape::Object => Extraction::ObjectLiteral(value),
            };
        }
    }

    tracing::debug!(raw_len = raw.len(), "No JSON found in model reply");
    Extraction::Empty
}

fn first_balanced_literal(raw: &str, shape: Shape) -> Option<Value> {
    let open = match shape {
        Shape::Array => b'[',
        Shape::Object => b'{',
    };
    let bytes = raw.as_bytes();

    bytes
        .iter()
        .enumerate()
        .filter(|&(_, &b)| b == open)
        .find_map(|(start, _)| {
            let end = balanced_end(&bytes[start..])?;
            serde_json::from_str(&raw[start..start + end]).ok()
        })
}

/// Length of the bracketed literal at the start of `bytes`, honouring string
/// literals and escapes. `None` when brackets mismatch or never close.
fn balanced_end(bytes: &[u8]) -> Option<usize> {
    let mut closers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'[' => closers.push(b']'),
            b'{' => closers.push(b'}'),
            b']' | b'}' => {
                if closers.pop() != Some(b) {
                    return None;
                }
                if closers.is_empty() {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
