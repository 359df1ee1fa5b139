use serde::{Deserialize, Serialize};

/// Every recovered condition met while building a manifest, counted so the
/// output itself shows how much of the log was trusted.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    // replay
    pub total_lines: usize,
    pub applied_records: usize,
    pub malformed_lines: usize,
    pub unapplied_records: usize,
    pub session_records: usize,
    pub auto_stubbed_entities: usize,
    pub replaced_stubs: usize,
    pub invalid_entities: usize,
    // boundaries
    pub completion_markers: usize,
    pub collapsed_duplicate_markers: usize,
    pub markers_without_summary: usize,
    pub boundaries_missing_timestamp: usize,
    // activity
    pub entities_missing_timestamp: usize,
    pub tool_calls_without_id: usize,
    pub file_calls_without_path: usize,
    pub unrecoverable_commands: usize,
    pub indeterminate_terminal_calls: usize,
    // operation log
    pub unresolved_operations: usize,
}

impl Diagnostics {
    pub fn recovered_conditions(&self) -> usize {
        self.malformed_lines
            + self.unapplied_records
            + self.auto_stubbed_entities
            + self.replaced_stubs
            + self.invalid_entities
            + self.markers_without_summary
            + self.boundaries_missing_timestamp
            + self.entities_missing_timestamp
            + self.tool_calls_without_id
            + self.file_calls_without_path
            + self.unrecoverable_commands
            + self.unresolved_operations
    }

    pub fn is_clean(&self) -> bool {
        self.recovered_conditions() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_until_anything_is_recovered() {
        let mut diagnostics = Diagnostics {
            total_lines: 10,
            applied_records: 9,
            ..Diagnostics::default()
        };
        assert!(diagnostics.is_clean());

        diagnostics.malformed_lines = 1;
        diagnostics.unrecoverable_commands = 2;
        assert_eq!(diagnostics.recovered_conditions(), 3);
        assert!(!diagnostics.is_clean());
    }
}
