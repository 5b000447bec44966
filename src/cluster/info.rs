//! Parsed `CLUSTER INFO` output.

/// Key/value fields of a `CLUSTER INFO` reply, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterInfo {
    fields: Vec<(String, String)>,
}

impl ClusterInfo {
    /// Parses `field:value` lines; other lines are ignored.
    pub fn parse(text: &str) -> Self {
        let fields = text
            .lines()
            .filter_map(|line| line.trim().split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Self { fields }
    }

    /// Raw value of a field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.as_str())
    }

    /// `cluster_state` (`ok` or `fail`).
    pub fn state(&self) -> Option<&str> {
        self.get("cluster_state")
    }

    /// True when the cluster reports `cluster_state:ok`.
    pub fn is_ok(&self) -> bool {
        self.state() == Some("ok")
    }

    /// `cluster_known_nodes`
    pub fn known_nodes(&self) -> Option<u64> {
        self.number("cluster_known_nodes")
    }

    /// `cluster_size`, the number of masters serving slots.
    pub fn size(&self) -> Option<u64> {
        self.number("cluster_size")
    }

    /// `cluster_slots_assigned`
    pub fn slots_assigned(&self) -> Option<u64> {
        self.number("cluster_slots_assigned")
    }

    /// Number of parsed fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no field could be parsed.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// One-line summary used as a step detail.
    pub fn summary(&self) -> String {
        let mut parts = Vec::with_capacity(4);
        if let Some(state) = self.state() {
            parts.push(format!("state={state}"));
        }
        if let Some(n) = self.known_nodes() {
            parts.push(format!("known_nodes={n}"));
        }
        if let Some(n) = self.size() {
            parts.push(format!("size={n}"));
        }
        if let Some(n) = self.slots_assigned() {
            parts.push(format!("slots_assigned={n}"));
        }
        if parts.is_empty() {
            format!("{} fields", self.len())
        } else {
            parts.join(" ")
        }
    }

    fn number(&self, field: &str) -> Option<u64> {
        self.get(field)?.parse().ok()
    }
}
