//! Patient query planning.
//!
//! [`PatientQuery`] composes one organisation-scoped `SELECT` over `patients` with:
//!
//! - joined organisation and category columns (one row per patient, no fan-out),
//! - optional correlated-subquery annotations for the newest intake admission date and the newest
//!   referral note (newest by `created_on`, ties broken by id),
//! - caller-supplied restrictions (filters) and ordering,
//! - a bulk prefetch pass that attaches care-team members and primary insurance rows to each
//!   fetched record with one `IN (...)` query per relation and chunk of ids.
//!
//! SQL fragments passed to [`PatientQuery::push_condition`] and [`PatientQuery::order_by`] come
//! from code (filters and column descriptors); user-supplied values only travel as bound
//! parameters.

use crate::models::{CareTeamMember, Insurance, Organization, PatientCategory, PatientRecord};
use crate::store::repeat_vars;
use crate::RosterResult;
use roster_types::{Choice, InsuranceType};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::collections::HashMap;

/// Ids per prefetch statement, kept below SQLite's bound-parameter limit.
const PREFETCH_CHUNK: usize = 500;

const LATEST_ADMISSION_SQL: &str = "(SELECT i.date_of_admission FROM intakes i \
     WHERE i.patient_id = p.id ORDER BY i.created_on DESC, i.id DESC LIMIT 1)";

const LATEST_REFERRAL_NOTE_SQL: &str = "(SELECT n.note FROM referral_notes n \
     WHERE n.patient_id = p.id ORDER BY n.created_on DESC, n.id DESC LIMIT 1)";

/// Order expression for the primary insurance provider of `p`.
pub const PRIMARY_PROVIDER_SQL: &str = "(SELECT ins.provider FROM insurances ins \
     WHERE ins.patient_id = p.id AND ins.insurance_type = 'primary' ORDER BY ins.id LIMIT 1)";

/// One `ORDER BY` term.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderTerm {
    pub expr: &'static str,
    pub descending: bool,
}

/// `LIMIT`/`OFFSET` window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct PatientQuery {
    conditions: Vec<String>,
    params: Vec<Value>,
    order: Vec<OrderTerm>,
    annotate_latest: bool,
    prefetch_care_team: bool,
    prefetch_primary_insurance: bool,
}

impl PatientQuery {
    /// Patients owned by `organization_id`.
    ///
    /// A missing organisation matches nothing; patients without an organisation are never
    /// visible.
    pub fn for_organization(organization_id: Option<i64>) -> Self {
        let mut query = Self {
            conditions: Vec::new(),
            params: Vec::new(),
            order: Vec::new(),
            annotate_latest: false,
            prefetch_care_team: false,
            prefetch_primary_insurance: false,
        };
        match organization_id {
            Some(id) => query.push_condition("p.organization_id = ?", [Value::Integer(id)]),
            None => query.push_condition("0", []),
        }
        query
    }

    /// Restrict to active patients whose intake is complete.
    pub fn active_intake_complete(mut self) -> Self {
        self.push_condition("p.is_active = 1 AND p.intake_complete = 1", []);
        self
    }

    /// Attach the latest admission date and latest referral note to every row.
    pub fn annotate_latest(mut self) -> Self {
        self.annotate_latest = true;
        self
    }

    pub fn prefetch_care_team(mut self) -> Self {
        self.prefetch_care_team = true;
        self
    }

    /// Attach primary-type insurance rows as `primary_insurance_list`.
    pub fn prefetch_primary_insurance(mut self) -> Self {
        self.prefetch_primary_insurance = true;
        self
    }

    /// Adds a restriction. `sql` uses `?` placeholders matched positionally by `params`.
    pub fn push_condition<I>(&mut self, sql: impl Into<String>, params: I)
    where
        I: IntoIterator<Item = Value>,
    {
        self.conditions.push(format!("({})", sql.into()));
        self.params.extend(params);
    }

    /// Replaces the ordering. Patient id is always appended as the final tiebreaker.
    pub fn order_by(&mut self, terms: Vec<OrderTerm>) {
        self.order = terms;
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// NULLs sort as the largest value: last ascending, first descending.
    fn order_clause(&self) -> String {
        let mut terms: Vec<String> = self
            .order
            .iter()
            .map(|t| {
                if t.descending {
                    format!("{} DESC NULLS FIRST", t.expr)
                } else {
                    format!("{} ASC NULLS LAST", t.expr)
                }
            })
            .collect();
        let tiebreak_desc = self.order.first().is_some_and(|t| t.descending);
        terms.push(if tiebreak_desc { "p.id DESC" } else { "p.id ASC" }.to_string());
        format!(" ORDER BY {}", terms.join(", "))
    }

    fn select_sql(&self, window: Option<Window>) -> String {
        let (admission, note) = if self.annotate_latest {
            (LATEST_ADMISSION_SQL, LATEST_REFERRAL_NOTE_SQL)
        } else {
            ("NULL", "NULL")
        };

        let mut sql = format!(
            "SELECT p.id, p.first_name, p.middle_name, p.last_name, p.mrn, p.birth_date, p.gender, \
             p.phone_number, p.city, p.state, p.zipcode, p.program, \
             p.is_active, p.intake_complete, p.is_evv_ready, \
             o.id, o.name, c.id, c.name, \
             {admission} AS latest_date_of_admission, \
             {note} AS latest_referral_note \
             FROM patients p \
             LEFT JOIN organizations o ON o.id = p.organization_id \
             LEFT JOIN patient_categories c ON c.id = p.patient_category_id{}{}",
            self.where_clause(),
            self.order_clause(),
        );
        if let Some(w) = window {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", w.limit, w.offset));
        }
        sql
    }

    /// Number of patients matching the restrictions.
    pub fn count(&self, conn: &Connection) -> RosterResult<usize> {
        let sql = format!(
            "SELECT COUNT(*) FROM patients p \
             LEFT JOIN patient_categories c ON c.id = p.patient_category_id{}",
            self.where_clause()
        );
        let count: i64 = conn.query_row(&sql, params_from_iter(self.params.iter()), |row| {
            row.get(0)
        })?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Fetches matching patients (optionally windowed) and runs the configured prefetches.
    pub fn fetch(&self, conn: &Connection, window: Option<Window>) -> RosterResult<Vec<PatientRecord>> {
        let sql = self.select_sql(window);
        tracing::debug!(%sql, "patient query");

        let mut stmt = conn.prepare(&sql)?;
        let mut records = stmt
            .query_map(params_from_iter(self.params.iter()), record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        if self.prefetch_care_team {
            attach_care_teams(conn, &mut records)?;
        }
        if self.prefetch_primary_insurance {
            attach_primary_insurance(conn, &mut records)?;
        }

        Ok(records)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PatientRecord> {
    let organization = match (row.get::<_, Option<i64>>(15)?, row.get::<_, Option<String>>(16)?) {
        (Some(id), Some(name)) => Some(Organization { id, name }),
        _ => None,
    };
    let category = match (row.get::<_, Option<i64>>(17)?, row.get::<_, Option<String>>(18)?) {
        (Some(id), Some(name)) => Some(PatientCategory { id, name }),
        _ => None,
    };

    Ok(PatientRecord {
        id: row.get(0)?,
        first_name: row.get(1)?,
        middle_name: row.get(2)?,
        last_name: row.get(3)?,
        mrn: row.get(4)?,
        birth_date: row.get(5)?,
        gender: row.get(6)?,
        phone_number: row.get(7)?,
        city: row.get(8)?,
        state: row.get(9)?,
        zipcode: row.get(10)?,
        program: row.get(11)?,
        is_active: row.get(12)?,
        intake_complete: row.get(13)?,
        is_evv_ready: row.get(14)?,
        organization,
        category,
        latest_date_of_admission: row.get(19)?,
        latest_referral_note: row.get(20)?,
        care_team: Vec::new(),
        primary_insurance_list: Vec::new(),
    })
}

fn index_by_id(records: &[PatientRecord]) -> HashMap<i64, usize> {
    records
        .iter()
        .enumerate()
        .map(|(idx, r)| (r.id, idx))
        .collect()
}

fn attach_care_teams(conn: &Connection, records: &mut [PatientRecord]) -> RosterResult<()> {
    let positions = index_by_id(records);
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();

    for chunk in ids.chunks(PREFETCH_CHUNK) {
        let sql = format!(
            "SELECT ct.patient_id, u.id, u.username FROM patient_care_team ct \
             JOIN users u ON u.id = ct.user_id \
             WHERE ct.patient_id IN ({}) ORDER BY ct.patient_id, u.id",
            repeat_vars(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                CareTeamMember {
                    user_id: row.get(1)?,
                    username: row.get(2)?,
                },
            ))
        })?;
        for row in rows {
            let (patient_id, member) = row?;
            if let Some(&idx) = positions.get(&patient_id) {
                records[idx].care_team.push(member);
            }
        }
    }
    Ok(())
}

fn attach_primary_insurance(conn: &Connection, records: &mut [PatientRecord]) -> RosterResult<()> {
    let positions = index_by_id(records);
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    let primary = InsuranceType::Primary.code();

    for chunk in ids.chunks(PREFETCH_CHUNK) {
        let sql = format!(
            "SELECT id, patient_id, provider, id_number FROM insurances \
             WHERE insurance_type = ? AND patient_id IN ({}) ORDER BY patient_id, id",
            repeat_vars(chunk.len())
        );
        let mut bound: Vec<Value> = Vec::with_capacity(chunk.len() + 1);
        bound.push(Value::Text(primary.to_string()));
        bound.extend(chunk.iter().map(|id| Value::Integer(*id)));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bound.iter()), |row| {
            Ok(Insurance {
                id: row.get(0)?,
                patient_id: row.get(1)?,
                insurance_type: InsuranceType::Primary,
                provider: row.get(2)?,
                id_number: row.get(3)?,
            })
        })?;
        for row in rows {
            let insurance = row?;
            if let Some(&idx) = positions.get(&insurance.patient_id) {
                records[idx].primary_insurance_list.push(insurance);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{self, NewPatient};
    use crate::Store;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn patient(org: i64, first: &str, last: &str) -> NewPatient {
        NewPatient {
            organization_id: Some(org),
            first_name: first.into(),
            last_name: last.into(),
            ..Default::default()
        }
    }

    #[test]
    fn scopes_to_organization_and_never_matches_missing_org() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                let north = seed::insert_organization(conn, "North")?;
                let south = seed::insert_organization(conn, "South")?;
                seed::insert_patient(conn, &patient(north, "A", "One"))?;
                seed::insert_patient(conn, &patient(south, "B", "Two"))?;
                seed::insert_patient(conn, &NewPatient::default())?;

                let rows = PatientQuery::for_organization(Some(north)).fetch(conn, None)?;
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].organization.as_ref().map(|o| o.id), Some(north));

                assert_eq!(PatientQuery::for_organization(None).count(conn)?, 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn active_intake_complete_excludes_pending_and_inactive() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                let org = seed::insert_organization(conn, "North")?;
                seed::insert_patient(conn, &patient(org, "Ok", "Patient"))?;
                seed::insert_patient(
                    conn,
                    &NewPatient {
                        intake_complete: false,
                        ..patient(org, "Pending", "Intake")
                    },
                )?;
                seed::insert_patient(
                    conn,
                    &NewPatient {
                        is_active: false,
                        ..patient(org, "Gone", "Away")
                    },
                )?;

                let query = PatientQuery::for_organization(Some(org)).active_intake_complete();
                assert_eq!(query.count(conn)?, 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn latest_annotations_pick_newest_by_creation_time() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                let org = seed::insert_organization(conn, "North")?;
                let with_history = seed::insert_patient(conn, &patient(org, "A", "A"))?;
                seed::insert_patient(conn, &patient(org, "B", "B"))?;

                let early = date(2024, 1, 1).and_hms_opt(8, 0, 0).unwrap();
                let late = date(2024, 5, 1).and_hms_opt(8, 0, 0).unwrap();
                // Inserted newest-first so id order disagrees with creation order.
                seed::insert_intake(conn, with_history, Some(date(2024, 5, 2)), late)?;
                seed::insert_intake(conn, with_history, Some(date(2023, 12, 30)), early)?;
                seed::insert_referral_note(conn, with_history, "new note", late)?;
                seed::insert_referral_note(conn, with_history, "old note", early)?;

                let rows = PatientQuery::for_organization(Some(org))
                    .annotate_latest()
                    .fetch(conn, None)?;
                let a = rows.iter().find(|r| r.id == with_history).unwrap();
                assert_eq!(a.latest_date_of_admission, Some(date(2024, 5, 2)));
                assert_eq!(a.latest_referral_note.as_deref(), Some("new note"));

                let b = rows.iter().find(|r| r.id != with_history).unwrap();
                assert_eq!(b.latest_date_of_admission, None);
                assert_eq!(b.latest_referral_note, None);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn prefetch_attaches_only_primary_insurance_and_care_team() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                let org = seed::insert_organization(conn, "North")?;
                let covered = seed::insert_patient(conn, &patient(org, "A", "A"))?;
                let bare = seed::insert_patient(conn, &patient(org, "B", "B"))?;
                seed::insert_insurance(conn, covered, InsuranceType::Secondary, "Backup", None)?;
                seed::insert_insurance(conn, covered, InsuranceType::Primary, "Medicaid", Some("X1"))?;
                let nurse = seed::insert_user(
                    conn,
                    &seed::NewUser {
                        username: "nurse".into(),
                        ..Default::default()
                    },
                )?;
                seed::add_care_team_member(conn, covered, nurse)?;

                let rows = PatientQuery::for_organization(Some(org))
                    .prefetch_care_team()
                    .prefetch_primary_insurance()
                    .fetch(conn, None)?;
                let a = rows.iter().find(|r| r.id == covered).unwrap();
                assert_eq!(a.primary_insurance_list.len(), 1);
                assert_eq!(a.primary_insurance().map(|i| i.provider.as_str()), Some("Medicaid"));
                assert!(a.has_care_team_member(nurse));

                let b = rows.iter().find(|r| r.id == bare).unwrap();
                assert!(b.primary_insurance().is_none());
                assert!(b.care_team.is_empty());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn window_and_order_are_applied() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                let org = seed::insert_organization(conn, "North")?;
                for last in ["Cole", "Abbot", "Baker"] {
                    seed::insert_patient(conn, &patient(org, "X", last))?;
                }
                let mut query = PatientQuery::for_organization(Some(org));
                query.order_by(vec![OrderTerm {
                    expr: "p.last_name",
                    descending: true,
                }]);
                let rows = query.fetch(conn, Some(Window { limit: 2, offset: 1 }))?;
                let names: Vec<_> = rows.iter().map(|r| r.last_name.as_str()).collect();
                assert_eq!(names, vec!["Baker", "Abbot"]);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn missing_admission_dates_sort_last_ascending() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                let org = seed::insert_organization(conn, "North")?;
                let created = date(2024, 1, 1).and_hms_opt(8, 0, 0).unwrap();
                let spring = seed::insert_patient(conn, &patient(org, "A", "Spring"))?;
                let none = seed::insert_patient(conn, &patient(org, "B", "None"))?;
                let winter = seed::insert_patient(conn, &patient(org, "C", "Winter"))?;
                seed::insert_intake(conn, spring, Some(date(2024, 5, 1)), created)?;
                seed::insert_intake(conn, winter, Some(date(2024, 1, 1)), created)?;

                let sorted = |descending| -> RosterResult<Vec<i64>> {
                    let mut query = PatientQuery::for_organization(Some(org)).annotate_latest();
                    query.order_by(vec![OrderTerm {
                        expr: "latest_date_of_admission",
                        descending,
                    }]);
                    Ok(query.fetch(conn, None)?.into_iter().map(|p| p.id).collect())
                };
                assert_eq!(sorted(false)?, vec![winter, spring, none]);
                assert_eq!(sorted(true)?, vec![none, spring, winter]);
                Ok(())
            })
            .unwrap();
    }
}
