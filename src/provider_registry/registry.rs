use std::collections::HashMap;

/// Assigns each known model name a dense `0..len()` index so a `ModelMask`
/// bitset can track per-Auth model support. Panics on construction if more
/// than 64 models are registered, since `ModelMask` is a `u64` bitset.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    name_to_index: HashMap<String, usize>,
    index_to_name: Vec<String>,
}

impl ModelRegistry {
    pub fn new(names: &[String]) -> Self {
        assert!(
            names.len() <= 64,
            "ModelRegistry supports at most 64 models, got {}",
            names.len()
        );
        let mut name_to_index = HashMap::with_capacity(names.len());
        let mut index_to_name = Vec::with_capacity(names.len());
        for name in names {
            if name_to_index.contains_key(name) {
                continue;
            }
            name_to_index.insert(name.clone(), index_to_name.len());
            index_to_name.push(name.clone());
        }
        Self {
            name_to_index,
            index_to_name,
        }
    }

    pub fn get_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn get_name(&self, index: usize) -> &str {
        &self.index_to_name[index]
    }

    pub fn len(&self) -> usize {
        self.index_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_name.is_empty()
    }

    /// Appends a new model, returning its index. A model already present
    /// returns its existing index rather than being duplicated, since
    /// reload-time extension may observe the same alias more than once.
    pub fn insert(&mut self, name: &str) -> Option<usize> {
        if let Some(&index) = self.name_to_index.get(name) {
            return Some(index);
        }
        if self.index_to_name.len() >= 64 {
            return None;
        }
        let index = self.index_to_name.len();
        self.name_to_index.insert(name.to_string(), index);
        self.index_to_name.push(name.to_string());
        Some(index)
    }
}
