use std::collections::HashSet;

/// Selected asset ids (local ids, not remote ids), kept in selection order.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the id if absent, remove it if present. Returns whether it is
    /// selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.members.remove(id) {
            self.order.retain(|x| x != id);
            false
        } else {
            self.members.insert(id.to_string());
            self.order.push(id.to_string());
            true
        }
    }

    pub fn select_all<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            if self.members.insert(id.clone()) {
                self.order.push(id);
            }
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Keep only ids for which `exists` holds
    pub fn retain(&mut self, exists: impl Fn(&str) -> bool) {
        self.order.retain(|id| exists(id));
        self.members = self.order.iter().cloned().collect();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }
}
