use std::fmt;

pub const DELIMITER: char = ',';

/// Ordered, duplicate-free list of notification ids with a comma-joined text form.
///
/// The text form never has leading, trailing or doubled delimiters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdList {
    ids: Vec<i32>,
}

impl IdList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient parse: empty segments and non-numeric segments are dropped.
    pub fn parse(encoded: &str) -> Self {
        let mut list = Self::new();
        for segment in encoded.split(DELIMITER) {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match segment.parse::<i32>() {
                Ok(id) => {
                    list.insert(id);
                }
                Err(err) => {
                    tracing::warn!(segment, %err, "dropping unreadable scheduled id");
                }
            }
        }
        list
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn contains(&self, id: i32) -> bool {
        self.ids.contains(&id)
    }

    /// Returns `false` if the id was already present.
    pub fn insert(&mut self, id: i32) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Returns `false` if the id was not present.
    pub fn remove(&mut self, id: i32) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| *existing != id);
        self.ids.len() != before
    }

    pub fn ids(&self) -> &[i32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl fmt::Display for IdList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, id) in self.ids.iter().enumerate() {
            if idx > 0 {
                write!(f, "{DELIMITER}")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

/// Removes `id` from a joined id string, keeping the other ids in order.
pub fn remove_from_encoded(encoded: &str, id: i32) -> String {
    let mut list = IdList::parse(encoded);
    list.remove(id);
    list.encode()
}
