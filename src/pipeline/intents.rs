use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

/// First required intent the officer does not hold, in declaration
/// order. `None` means all checks passed.
pub fn missing_intent<'a>(
    required: &'a [&'a str],
    granted: &HashMap<String, bool>,
) -> Option<&'a str> {
    required
        .iter()
        .copied()
        .find(|intent| !granted.get(*intent).copied().unwrap_or(false))
}

/// Load the officer's per-force grants once and check every required
/// intent against them.
pub async fn check_intents(
    state: &Arc<AppState>,
    force: &str,
    nif: i64,
    required: &[&str],
) -> Result<(), ApiError> {
    use sqlx::Row;

    if required.is_empty() {
        return Ok(());
    }

    let rows = state
        .registry
        .query(
            force,
            "SELECT intent, enabled FROM officer_intents WHERE officer = ?",
            nif,
        )
        .await?;

    let mut granted = HashMap::with_capacity(rows.len());
    for row in &rows {
        let intent: String = row.try_get("intent").map_err(ApiError::from)?;
        let enabled: bool = row.try_get("enabled").map_err(ApiError::from)?;
        granted.insert(intent, enabled);
    }

    if let Some(intent) = missing_intent(required, &granted) {
        tracing::debug!("officer {} missing intent '{}'", nif, intent);
        return Err(ApiError::forbidden("Não tens permissão para efetuar esta ação."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grants(pairs: &[(&str, bool)]) -> HashMap<String, bool> {
        pairs.iter().map(|(n, e)| (n.to_string(), *e)).collect()
    }

    #[test]
    fn all_required_intents_must_be_enabled() {
        let granted = grants(&[("a", true), ("b", false)]);
        assert_eq!(missing_intent(&["a", "b"], &granted), Some("b"));
        assert_eq!(missing_intent(&["a"], &granted), None);
    }

    #[test]
    fn undeclared_intent_counts_as_missing() {
        let granted = grants(&[("a", true)]);
        assert_eq!(missing_intent(&["a", "c"], &granted), Some("c"));
    }

    #[test]
    fn check_short_circuits_on_first_missing() {
        let granted = grants(&[("a", false), ("b", false)]);
        assert_eq!(missing_intent(&["a", "b"], &granted), Some("a"));
    }

    #[test]
    fn empty_requirements_always_pass() {
        assert_eq!(missing_intent(&[], &grants(&[])), None);
    }
}
