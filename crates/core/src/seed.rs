//! Insert helpers for populating a roster database.
//!
//! The listing views never write. These helpers exist for the CLI `seed-demo` command and for
//! test fixtures.

use crate::RosterResult;
use chrono::{NaiveDate, NaiveDateTime};
use roster_types::{Choice, InsuranceType};
use rusqlite::{params, Connection};

#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub organization_id: Option<i64>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub api_key: Option<String>,
}

impl Default for NewUser {
    fn default() -> Self {
        Self {
            username: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            organization_id: None,
            is_active: true,
            is_superuser: false,
            api_key: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewPatient {
    pub organization_id: Option<i64>,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub mrn: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub phone_number: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub program: Option<String>,
    pub patient_category_id: Option<i64>,
    pub is_active: bool,
    pub intake_complete: bool,
    pub is_evv_ready: bool,
}

impl Default for NewPatient {
    fn default() -> Self {
        Self {
            organization_id: None,
            first_name: String::new(),
            middle_name: None,
            last_name: String::new(),
            mrn: None,
            birth_date: None,
            gender: None,
            phone_number: None,
            city: None,
            state: None,
            zipcode: None,
            program: None,
            patient_category_id: None,
            is_active: true,
            intake_complete: true,
            is_evv_ready: false,
        }
    }
}

pub fn insert_organization(conn: &Connection, name: &str) -> RosterResult<i64> {
    conn.execute("INSERT INTO organizations (name) VALUES (?1)", [name])?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_category(conn: &Connection, name: &str) -> RosterResult<i64> {
    conn.execute("INSERT INTO patient_categories (name) VALUES (?1)", [name])?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_user(conn: &Connection, user: &NewUser) -> RosterResult<i64> {
    conn.execute(
        "INSERT INTO users (username, first_name, last_name, organization_id, is_active, is_superuser, api_key)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.username,
            user.first_name,
            user.last_name,
            user.organization_id,
            user.is_active,
            user.is_superuser,
            user.api_key,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn grant_permission(conn: &Connection, user_id: i64, codename: &str) -> RosterResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_permissions (user_id, codename) VALUES (?1, ?2)",
        params![user_id, codename],
    )?;
    Ok(())
}

pub fn insert_patient(conn: &Connection, patient: &NewPatient) -> RosterResult<i64> {
    conn.execute(
        "INSERT INTO patients (
            organization_id, first_name, middle_name, last_name, mrn, birth_date, gender,
            phone_number, city, state, zipcode, program, patient_category_id,
            is_active, intake_complete, is_evv_ready
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            patient.organization_id,
            patient.first_name,
            patient.middle_name,
            patient.last_name,
            patient.mrn,
            patient.birth_date,
            patient.gender,
            patient.phone_number,
            patient.city,
            patient.state,
            patient.zipcode,
            patient.program,
            patient.patient_category_id,
            patient.is_active,
            patient.intake_complete,
            patient.is_evv_ready,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn add_care_team_member(conn: &Connection, patient_id: i64, user_id: i64) -> RosterResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO patient_care_team (patient_id, user_id) VALUES (?1, ?2)",
        params![patient_id, user_id],
    )?;
    Ok(())
}

pub fn insert_insurance(
    conn: &Connection,
    patient_id: i64,
    insurance_type: InsuranceType,
    provider: &str,
    id_number: Option<&str>,
) -> RosterResult<i64> {
    conn.execute(
        "INSERT INTO insurances (patient_id, insurance_type, provider, id_number)
         VALUES (?1, ?2, ?3, ?4)",
        params![patient_id, insurance_type.code(), provider, id_number],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_intake(
    conn: &Connection,
    patient_id: i64,
    date_of_admission: Option<NaiveDate>,
    created_on: NaiveDateTime,
) -> RosterResult<i64> {
    conn.execute(
        "INSERT INTO intakes (patient_id, date_of_admission, created_on) VALUES (?1, ?2, ?3)",
        params![patient_id, date_of_admission, created_on],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_referral_note(
    conn: &Connection,
    patient_id: i64,
    note: &str,
    created_on: NaiveDateTime,
) -> RosterResult<i64> {
    conn.execute(
        "INSERT INTO referral_notes (patient_id, note, created_on) VALUES (?1, ?2, ?3)",
        params![patient_id, note, created_on],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Identifiers created by [`seed_demo`].
#[derive(Debug)]
pub struct DemoSeed {
    pub organization_id: i64,
    pub api_key: String,
    pub patient_ids: Vec<i64>,
}

/// Populates a small demo organisation with one permitted coordinator and a handful of
/// patients covering the interesting listing cases (no insurance, no category, care team,
/// inactive, intake pending).
pub fn seed_demo(conn: &Connection, api_key: &str) -> RosterResult<DemoSeed> {
    let organization_id = insert_organization(conn, "Demo Home Care")?;
    let other_org = insert_organization(conn, "Elsewhere Agency")?;
    let category = insert_category(conn, "Long Term")?;

    let coordinator = insert_user(
        conn,
        &NewUser {
            username: "coordinator".into(),
            first_name: "Casey".into(),
            last_name: "Jordan".into(),
            organization_id: Some(organization_id),
            api_key: Some(api_key.to_string()),
            ..Default::default()
        },
    )?;
    grant_permission(conn, coordinator, crate::constants::VIEW_PATIENT_LIST_PERMISSION)?;

    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
    let at = |y, m, d| date(y, m, d).and_then(|d| d.and_hms_opt(9, 0, 0));

    let rows = [
        ("Mary", "Smith", "M-1001", "F", Some(category), true, true),
        ("John", "Smithson", "M-1002", "M", None, true, true),
        ("Rosa", "Alvarez", "M-1003", "F", Some(category), true, false),
        ("Omar", "Haddad", "M-1004", "M", None, false, true),
        ("Kim", "Lee", "M-1005", "O", Some(category), true, true),
    ];

    let mut patient_ids = Vec::with_capacity(rows.len());
    for (first, last, mrn, gender, category_id, is_active, intake_complete) in rows {
        let id = insert_patient(
            conn,
            &NewPatient {
                organization_id: Some(organization_id),
                first_name: first.into(),
                last_name: last.into(),
                mrn: Some(mrn.into()),
                birth_date: date(1950, 3, 14),
                gender: Some(gender.into()),
                city: Some("Albany".into()),
                state: Some("NY".into()),
                zipcode: Some("12207".into()),
                program: Some("CDPAP".into()),
                patient_category_id: category_id,
                is_active,
                intake_complete,
                ..Default::default()
            },
        )?;
        patient_ids.push(id);
    }

    insert_insurance(conn, patient_ids[0], InsuranceType::Primary, "Medicaid", Some("MC-1"))?;
    insert_insurance(conn, patient_ids[0], InsuranceType::Secondary, "Medicare", None)?;
    add_care_team_member(conn, patient_ids[0], coordinator)?;
    if let (Some(first), Some(second)) = (at(2024, 1, 5), at(2024, 6, 1)) {
        insert_intake(conn, patient_ids[0], date(2024, 1, 8), first)?;
        insert_intake(conn, patient_ids[0], date(2024, 6, 3), second)?;
        insert_referral_note(conn, patient_ids[1], "Referred by county office", second)?;
    }

    insert_patient(
        conn,
        &NewPatient {
            organization_id: Some(other_org),
            first_name: "Hidden".into(),
            last_name: "Smith".into(),
            ..Default::default()
        },
    )?;

    tracing::info!(organization_id, patients = patient_ids.len(), "seeded demo roster");

    Ok(DemoSeed {
        organization_id,
        api_key: api_key.to_string(),
        patient_ids,
    })
}
