//! Rejects updates that address table cells, header cells, or rows individually.
//!
//! The remote API only replaces tables atomically; partial edits corrupt structure.

use crate::error::{NoteError, NoteResult};
use crate::model::UpdateCommand;

/// Target scopes reserved for table substructure.
pub const TABLE_SUBSTRUCTURE_PREFIXES: [&str; 3] = ["td:", "th:", "tr:"];

/// Whether `target` addresses a table cell, header cell, or row.
#[must_use]
pub fn is_table_substructure(target: &str) -> bool {
    let target = target.trim_start();
    TABLE_SUBSTRUCTURE_PREFIXES.iter().any(|prefix| {
        target
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

/// Reject `commands` if any of them targets table substructure.
///
/// # Errors
///
/// Returns [`NoteError::TableTargets`] listing every offending target in order.
pub fn check_table_targets(commands: &[UpdateCommand]) -> NoteResult<()> {
    let targets = commands
        .iter()
        .filter(|command| is_table_substructure(&command.target))
        .map(|command| command.target.clone())
        .collect::<Vec<_>>();
    if targets.is_empty() {
        Ok(())
    } else {
        Err(NoteError::TableTargets { targets })
    }
}
