pub mod accounts;
pub mod activity;
pub mod announcements;
pub mod evaluations;
pub mod events;
pub mod justifications;
pub mod officers;
pub mod patrols;
pub mod util;

use serde::Serialize;
use sqlx::mysql::MySqlRow;
use sqlx::FromRow;

use crate::error::ApiError;
use crate::pipeline::Officer;

/// Decode a result set into typed rows.
pub fn rows_to<T>(rows: &[MySqlRow]) -> Result<Vec<T>, ApiError>
where
    T: for<'r> FromRow<'r, MySqlRow>,
{
    rows.iter()
        .map(|row| T::from_row(row).map_err(ApiError::from))
        .collect()
}

/// Decode typed rows straight into a JSON array.
pub fn rows_to_json<T>(rows: &[MySqlRow]) -> Result<serde_json::Value, ApiError>
where
    T: for<'r> FromRow<'r, MySqlRow> + Serialize,
{
    let typed = rows_to::<T>(rows)?;
    serde_json::to_value(typed)
        .map_err(|e| ApiError::internal(format!("failed to serialize response rows: {}", e)))
}

/// Supervisory-rank rule: the acting officer's patent must be
/// numerically lower (more senior) than the target's.
pub fn check_supervises(actor: &Officer, target_patent: i64) -> Result<(), ApiError> {
    if actor.patent < target_patent {
        Ok(())
    } else {
        Err(ApiError::forbidden("Não tens autoridade sobre este efetivo."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn officer(patent: i64) -> Officer {
        Officer {
            nif: 111222333,
            name: "Teste".to_string(),
            patent,
            status: 1,
            callsign: None,
        }
    }

    #[test]
    fn lower_patent_supervises_higher() {
        assert!(check_supervises(&officer(2), 5).is_ok());
    }

    #[test]
    fn higher_patent_cannot_edit_more_senior_officer() {
        // patent 5 acting on patent 3: lower number is more senior
        let err = check_supervises(&officer(5), 3).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn equal_patent_is_rejected() {
        assert!(check_supervises(&officer(4), 4).is_err());
    }
}
