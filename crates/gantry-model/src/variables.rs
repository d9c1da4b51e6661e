use serde::{Deserialize, Serialize};

/// A single job variable as delivered by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobVariable {
    pub key: String,
    #[serde(default)]
    pub value: String,
    /// Value must be written to a file and the variable set to its path.
    #[serde(default)]
    pub file: bool,
    /// Value must never show up in logs.
    #[serde(default)]
    pub masked: bool,
    /// Runner-internal; never exported to job scripts.
    #[serde(default)]
    pub internal: bool,
    /// Value is taken literally and never expanded.
    #[serde(default)]
    pub raw: bool,
}

impl JobVariable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            file: false,
            masked: false,
            internal: false,
            raw: false,
        }
    }

    pub fn file(mut self) -> Self {
        self.file = true;
        self
    }

    pub fn masked(mut self) -> Self {
        self.masked = true;
        self
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}

/// Ordered variable set of a job. Later entries override earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(pub Vec<JobVariable>);

impl Variables {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobVariable> {
        self.0.iter()
    }

    pub fn push(&mut self, var: JobVariable) {
        self.0.push(var);
    }

    /// Last variable named `key`.
    pub fn find(&self, key: &str) -> Option<&JobVariable> {
        self.0.iter().rev().find(|v| v.key == key)
    }

    /// Value of the last variable named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.find(key).map(|v| v.value.as_str())
    }

    /// Value of `key`, or `""` when undefined.
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Interpret `key` as a boolean (`1`/`true`/`yes`/`on`, `0`/`false`/`no`/`off`).
    ///
    /// Unset or unrecognized values yield `None`.
    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    /// Variables that scripts may see.
    pub fn public(&self) -> impl Iterator<Item = &JobVariable> {
        self.0.iter().filter(|v| !v.internal)
    }

    /// Expand `$NAME` and `${NAME}` references against this set.
    pub fn expand(&self, input: &str) -> String {
        expand_with(input, |name| self.get(name).map(str::to_string))
    }
}

/// Expand `$NAME` and `${NAME}` references using `lookup`.
///
/// Undefined names expand to the empty string; `$$` yields a literal `$`;
/// a `$` not followed by a name is kept as-is.
pub fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            let next = input[i..].find('$').map_or(input.len(), |p| i + p);
            out.push_str(&input[i..next]);
            i = next;
            continue;
        }

        match bytes.get(i + 1) {
            Some(b'$') => {
                out.push('$');
                i += 2;
            }
            Some(b'{') => match input[i + 2..].find('}') {
                Some(len) => {
                    let name = &input[i + 2..i + 2 + len];
                    out.push_str(&lookup(name).unwrap_or_default());
                    i += len + 3;
                }
                None => {
                    out.push_str(&input[i..]);
                    i = bytes.len();
                }
            },
            Some(c) if is_name_byte(*c) => {
                let len = bytes[i + 1..]
                    .iter()
                    .take_while(|c| is_name_byte(**c))
                    .count();
                out.push_str(&lookup(&input[i + 1..i + 1 + len]).unwrap_or_default());
                i += len + 1;
            }
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }
    out
}

fn is_name_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

impl FromIterator<JobVariable> for Variables {
    fn from_iter<T: IntoIterator<Item = JobVariable>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
