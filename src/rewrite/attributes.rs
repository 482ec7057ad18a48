//! Ordered HTML attribute map

/// One attribute of a start tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercase attribute name
    pub name: String,
    /// Decoded value; `None` for bare attributes such as `defer`
    pub value: Option<String>,
    /// Exact source bytes (`name="value"`), dropped once the value changes
    source: Option<Vec<u8>>,
}

/// Attributes of one start tag, in source order
///
/// Values are stored entity-decoded. The map remembers whether it was
/// changed so untouched tags can be emitted byte-for-byte; inside a changed
/// tag, attributes that were not touched still keep their source bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<Attribute>,
    modified: bool,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute as parsed from source; does not mark the map modified
    ///
    /// Duplicate names keep the first occurrence, as browsers do.
    pub fn push_parsed(&mut self, name: &str, value: Option<String>) {
        self.push_entry(name, value, None);
    }

    /// Like [`push_parsed`](Self::push_parsed), remembering the attribute's
    /// source bytes for re-emission
    pub fn push_source(&mut self, name: &str, value: Option<String>, source: &[u8]) {
        self.push_entry(name, value, Some(source.to_vec()));
    }

    fn push_entry(&mut self, name: &str, value: Option<String>, source: Option<Vec<u8>>) {
        let name = name.to_ascii_lowercase();
        if self.entries.iter().any(|a| a.name == name) {
            return;
        }
        self.entries.push(Attribute {
            name,
            value,
            source,
        });
    }

    /// Returns the value of `name`, if present and non-bare
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .and_then(|a| a.value.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Sets `name` to `value`, appending it if missing
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => {
                if existing.value.as_deref() != Some(value.as_str()) {
                    existing.value = Some(value);
                    existing.source = None;
                    self.modified = true;
                }
            }
            None => {
                self.entries.push(Attribute {
                    name: name.to_ascii_lowercase(),
                    value: Some(value),
                    source: None,
                });
                self.modified = true;
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))?;
        self.modified = true;
        self.entries.remove(index).value
    }

    /// True once any value was changed, added or removed
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the attributes as they appear inside a start tag,
    /// each preceded by a space
    ///
    /// Attributes with source bytes are copied verbatim, so text in a
    /// non-UTF-8 page survives the rewrite of a neighbouring attribute.
    pub fn write_html(&self, out: &mut Vec<u8>) {
        for attribute in &self.entries {
            out.push(b' ');
            if let Some(source) = &attribute.source {
                out.extend_from_slice(source);
                continue;
            }
            out.extend_from_slice(attribute.name.as_bytes());
            if let Some(value) = &attribute.value {
                out.extend_from_slice(b"=\"");
                out.extend_from_slice(escape_attribute(value).as_bytes());
                out.push(b'"');
            }
        }
    }
}

impl FromIterator<(String, Option<String>)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (name, value) in iter {
            attributes.push_parsed(&name, value);
        }
        attributes
    }
}

/// Escapes a value for a double-quoted attribute
pub(crate) fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decodes the character references that matter inside URL attributes
///
/// Named `&amp;`, `&quot;`, `&apos;`, `&lt;`, `&gt;` and numeric references
/// are decoded; anything else is kept literally.
pub(crate) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "lt" => Some('<'),
                "gt" => Some('>'),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
