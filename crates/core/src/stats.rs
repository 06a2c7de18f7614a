//! Organisation-level patient counts.

use crate::auth::{authorize, Access, User};
use crate::constants::VIEW_PATIENT_LIST_PERMISSION;
use crate::RosterResult;
use api_shared::dto;
use roster_types::{Choice, Gender};
use rusqlite::{params, Connection};

/// Counts over every patient of `organization_id`, regardless of active or intake state.
///
/// `by_gender` lists each declared gender code, zero counts included; stored codes outside the
/// declared set only contribute to the totals.
pub fn compute_stats(conn: &Connection, organization_id: Option<i64>) -> RosterResult<dto::PatientStats> {
    let mut stats = dto::PatientStats {
        by_gender: Gender::ALL
            .iter()
            .map(|g| (g.code().to_string(), 0))
            .collect(),
        ..Default::default()
    };
    let Some(org) = organization_id else {
        return Ok(stats);
    };

    let (total, active, with_care_team): (i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(p.is_active), 0),
                COALESCE(SUM(EXISTS (SELECT 1 FROM patient_care_team ct WHERE ct.patient_id = p.id)), 0)
         FROM patients p WHERE p.organization_id = ?1",
        params![org],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    stats.total = to_count(total);
    stats.active = to_count(active);
    stats.inactive = stats.total.saturating_sub(stats.active);
    stats.with_care_team = to_count(with_care_team);

    let mut stmt = conn.prepare(
        "SELECT p.gender, COUNT(*) FROM patients p
         WHERE p.organization_id = ?1 AND p.gender IS NOT NULL
         GROUP BY p.gender",
    )?;
    let rows = stmt.query_map(params![org], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (code, count) = row?;
        if let Some(slot) = stats.by_gender.get_mut(&code) {
            *slot = to_count(count);
        }
    }

    Ok(stats)
}

fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or_default()
}

/// Stats endpoint body, behind the list permission.
pub fn patient_stats(
    conn: &Connection,
    user: Option<&User>,
) -> RosterResult<Access<dto::PatientStatsRes>> {
    let Access::Granted(user) = authorize(user, VIEW_PATIENT_LIST_PERMISSION) else {
        return Ok(Access::Denied);
    };
    let stats = compute_stats(conn, user.organization_id)?;
    tracing::debug!(user = %user.username, total = stats.total, "patient stats");
    Ok(Access::Granted(dto::PatientStatsRes { stats }))
}
