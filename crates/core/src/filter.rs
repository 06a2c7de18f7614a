//! Patient filter sets.
//!
//! Raw query-string values are bound into a typed filter first ([`PatientFilter::bind`]); binding
//! either succeeds or reports a per-field error map. A bound filter then restricts a
//! [`PatientQuery`]. Absent or blank values impose no restriction.
//!
//! Two sets exist: the full [`PatientFilter`] and the [`CompactPatientFilter`], which only knows
//! `name` and `is_active`.

use crate::query::PatientQuery;
use crate::RosterResult;
use chrono::NaiveDate;
use roster_types::{Choice, Gender, NonEmptyText, Program};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Raw filter values as received from the request.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PatientFilterParams {
    pub name: Option<String>,
    pub mrn: Option<String>,
    pub birth_date_after: Option<String>,
    pub birth_date_before: Option<String>,
    pub gender: Option<String>,
    pub is_active: Option<String>,
    pub patient_category: Option<String>,
    pub phone_number: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub has_care_team: Option<String>,
    pub program: Option<String>,
}

impl PatientFilterParams {
    /// Non-blank supplied values keyed by parameter name, for echoing back to the form.
    pub fn supplied(&self) -> BTreeMap<String, String> {
        [
            ("name", &self.name),
            ("mrn", &self.mrn),
            ("birth_date_after", &self.birth_date_after),
            ("birth_date_before", &self.birth_date_before),
            ("gender", &self.gender),
            ("is_active", &self.is_active),
            ("patient_category", &self.patient_category),
            ("phone_number", &self.phone_number),
            ("city", &self.city),
            ("state", &self.state),
            ("zipcode", &self.zipcode),
            ("has_care_team", &self.has_care_team),
            ("program", &self.program),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            NonEmptyText::optional(value.as_deref()).map(|v| (key.to_string(), v.to_string()))
        })
        .collect()
    }
}

/// Per-field validation messages of a filter that failed to bind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterErrors(pub BTreeMap<String, String>);

impl FilterErrors {
    fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A bound filter that can restrict a patient query.
pub trait FilterSet {
    fn apply(&self, query: &mut PatientQuery);
}

#[derive(Clone, Debug, Default)]
pub struct PatientFilter {
    pub name: Option<NonEmptyText>,
    pub mrn: Option<NonEmptyText>,
    pub birth_date_after: Option<NaiveDate>,
    pub birth_date_before: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub is_active: Option<bool>,
    pub patient_category: Option<i64>,
    pub phone_number: Option<NonEmptyText>,
    pub city: Option<NonEmptyText>,
    pub state: Option<NonEmptyText>,
    pub zipcode: Option<NonEmptyText>,
    pub has_care_team: Option<bool>,
    pub program: Option<Program>,
}

impl PatientFilter {
    /// Validates raw values. Category ids are checked against `patient_categories`.
    pub fn bind(
        params: &PatientFilterParams,
        conn: &Connection,
    ) -> RosterResult<Result<Self, FilterErrors>> {
        let mut errors = FilterErrors::default();

        let birth_date_after = parse_date(&params.birth_date_after, "birth_date_after", &mut errors);
        let birth_date_before =
            parse_date(&params.birth_date_before, "birth_date_before", &mut errors);
        let gender = parse_choice::<Gender>(&params.gender, "gender", &mut errors);
        let program = parse_choice::<Program>(&params.program, "program", &mut errors);
        let is_active = parse_bool(&params.is_active, "is_active", &mut errors);
        let has_care_team = parse_bool(&params.has_care_team, "has_care_team", &mut errors);

        let patient_category = match NonEmptyText::optional(params.patient_category.as_deref()) {
            None => None,
            Some(raw) => {
                let id = raw.as_str().parse::<i64>().ok();
                let known = match id {
                    Some(id) => category_exists(conn, id)?,
                    None => false,
                };
                if !known {
                    errors.add(
                        "patient_category",
                        "Select a valid choice. That choice is not one of the available choices.",
                    );
                }
                id.filter(|_| known)
            }
        };

        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        Ok(Ok(Self {
            name: NonEmptyText::optional(params.name.as_deref()),
            mrn: NonEmptyText::optional(params.mrn.as_deref()),
            birth_date_after,
            birth_date_before,
            gender,
            is_active,
            patient_category,
            phone_number: NonEmptyText::optional(params.phone_number.as_deref()),
            city: NonEmptyText::optional(params.city.as_deref()),
            state: NonEmptyText::optional(params.state.as_deref()),
            zipcode: NonEmptyText::optional(params.zipcode.as_deref()),
            has_care_team,
            program,
        }))
    }
}

impl FilterSet for PatientFilter {
    fn apply(&self, query: &mut PatientQuery) {
        if let Some(name) = &self.name {
            filter_name(query, name);
        }
        icontains(query, "p.mrn", self.mrn.as_ref());
        if let Some(after) = self.birth_date_after {
            query.push_condition("p.birth_date >= ?", [Value::Text(after.to_string())]);
        }
        if let Some(before) = self.birth_date_before {
            query.push_condition("p.birth_date <= ?", [Value::Text(before.to_string())]);
        }
        if let Some(gender) = self.gender {
            query.push_condition("p.gender = ?", [Value::Text(gender.code().to_string())]);
        }
        if let Some(active) = self.is_active {
            filter_active(query, active);
        }
        if let Some(category) = self.patient_category {
            query.push_condition("p.patient_category_id = ?", [Value::Integer(category)]);
        }
        icontains(query, "p.phone_number", self.phone_number.as_ref());
        icontains(query, "p.city", self.city.as_ref());
        icontains(query, "p.state", self.state.as_ref());
        icontains(query, "p.zipcode", self.zipcode.as_ref());
        if let Some(has_team) = self.has_care_team {
            filter_has_care_team(query, has_team);
        }
        if let Some(program) = self.program {
            query.push_condition("p.program = ?", [Value::Text(program.code().to_string())]);
        }
    }
}

/// Name and active-flag filter for compact listings.
#[derive(Clone, Debug, Default)]
pub struct CompactPatientFilter {
    pub name: Option<NonEmptyText>,
    pub is_active: Option<bool>,
}

impl CompactPatientFilter {
    pub fn bind(params: &PatientFilterParams) -> Result<Self, FilterErrors> {
        let mut errors = FilterErrors::default();
        let is_active = parse_bool(&params.is_active, "is_active", &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            name: NonEmptyText::optional(params.name.as_deref()),
            is_active,
        })
    }
}

impl FilterSet for CompactPatientFilter {
    fn apply(&self, query: &mut PatientQuery) {
        if let Some(name) = &self.name {
            filter_name(query, name);
        }
        if let Some(active) = self.is_active {
            filter_active(query, active);
        }
    }
}

/// First-or-last name substring match, case-insensitive.
fn filter_name(query: &mut PatientQuery, value: &NonEmptyText) {
    let pattern = like_pattern(value.as_str());
    query.push_condition(
        "fold(p.first_name) LIKE ? ESCAPE '\\' OR fold(p.last_name) LIKE ? ESCAPE '\\'",
        [Value::Text(pattern.clone()), Value::Text(pattern)],
    );
}

fn filter_active(query: &mut PatientQuery, active: bool) {
    query.push_condition("p.is_active = ?", [Value::Integer(i64::from(active))]);
}

/// Existence check, so patients with several members still appear once.
fn filter_has_care_team(query: &mut PatientQuery, has_team: bool) {
    let exists = "EXISTS (SELECT 1 FROM patient_care_team ct WHERE ct.patient_id = p.id)";
    if has_team {
        query.push_condition(exists, []);
    } else {
        query.push_condition(format!("NOT {exists}"), []);
    }
}

fn icontains(query: &mut PatientQuery, column: &str, value: Option<&NonEmptyText>) {
    if let Some(value) = value {
        query.push_condition(
            format!("fold({column}) LIKE ? ESCAPE '\\'"),
            [Value::Text(like_pattern(value.as_str()))],
        );
    }
}

/// Lowercased `%value%` with LIKE metacharacters escaped, matched against `fold(column)`.
fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for ch in value.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn parse_bool(raw: &Option<String>, field: &str, errors: &mut FilterErrors) -> Option<bool> {
    let value = NonEmptyText::optional(raw.as_deref())?;
    match value.as_str().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            errors.add(field, "Enter a valid boolean.");
            None
        }
    }
}

fn parse_date(raw: &Option<String>, field: &str, errors: &mut FilterErrors) -> Option<NaiveDate> {
    let value = NonEmptyText::optional(raw.as_deref())?;
    match NaiveDate::parse_from_str(value.as_str(), "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(field, "Enter a valid date.");
            None
        }
    }
}

fn parse_choice<C: Choice>(raw: &Option<String>, field: &str, errors: &mut FilterErrors) -> Option<C> {
    let value = NonEmptyText::optional(raw.as_deref())?;
    let choice = C::from_code(value.as_str());
    if choice.is_none() {
        errors.add(
            field,
            format!(
                "Select a valid choice. {} is not one of the available choices.",
                value
            ),
        );
    }
    choice
}

fn category_exists(conn: &Connection, id: i64) -> RosterResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM patient_categories WHERE id = ?1",
            [id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{self, NewPatient, NewUser};
    use crate::Store;

    struct Fixture {
        store: Store,
        org: i64,
        category: i64,
    }

    fn fixture() -> Fixture {
        let store = Store::open_in_memory().unwrap();
        let (org, category) = store
            .with_conn(|conn| {
                let org = seed::insert_organization(conn, "North")?;
                let category = seed::insert_category(conn, "Long Term")?;
                Ok((org, category))
            })
            .unwrap();
        Fixture {
            store,
            org,
            category,
        }
    }

    fn add(fx: &Fixture, patient: NewPatient) -> i64 {
        fx.store
            .with_conn(|conn| {
                seed::insert_patient(
                    conn,
                    &NewPatient {
                        organization_id: Some(fx.org),
                        ..patient
                    },
                )
            })
            .unwrap()
    }

    fn named(first: &str, last: &str) -> NewPatient {
        NewPatient {
            first_name: first.into(),
            last_name: last.into(),
            ..Default::default()
        }
    }

    fn run(fx: &Fixture, params: PatientFilterParams) -> Vec<i64> {
        fx.store
            .with_conn(|conn| {
                let filter = PatientFilter::bind(&params, conn)?.expect("filter should bind");
                let mut query = PatientQuery::for_organization(Some(fx.org));
                filter.apply(&mut query);
                Ok(query.fetch(conn, None)?.into_iter().map(|p| p.id).collect())
            })
            .unwrap()
    }

    #[test]
    fn name_matches_first_or_last_case_insensitively() {
        let fx = fixture();
        let smith = add(&fx, named("Smith", "Jones"));
        let smithson = add(&fx, named("Anna", "Smithson"));
        add(&fx, named("Bob", "Brown"));

        let ids = run(
            &fx,
            PatientFilterParams {
                name: Some("smith".into()),
                ..Default::default()
            },
        );
        assert_eq!(ids, vec![smith, smithson]);
    }

    #[test]
    fn text_filters_fold_non_ascii_case() {
        let fx = fixture();
        let elodie = add(
            &fx,
            NewPatient {
                city: Some("ÅLESUND".into()),
                ..named("Élodie", "Ørsted")
            },
        );
        add(&fx, named("Elodie", "Orsted"));

        for name in ["élodie", "ØRSTED", "ÉLO"] {
            let ids = run(
                &fx,
                PatientFilterParams {
                    name: Some(name.into()),
                    ..Default::default()
                },
            );
            assert_eq!(ids, vec![elodie], "name={name}");
        }

        let ids = run(
            &fx,
            PatientFilterParams {
                city: Some("ålesund".into()),
                ..Default::default()
            },
        );
        assert_eq!(ids, vec![elodie]);
    }

    #[test]
    fn blank_values_are_pass_through() {
        let fx = fixture();
        add(&fx, named("A", "A"));
        add(&fx, named("B", "B"));

        let ids = run(
            &fx,
            PatientFilterParams {
                name: Some("   ".into()),
                gender: Some(String::new()),
                is_active: Some(String::new()),
                ..Default::default()
            },
        );
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn like_metacharacters_match_literally() {
        let fx = fixture();
        let literal = add(
            &fx,
            NewPatient {
                mrn: Some("AB_1".into()),
                ..named("A", "A")
            },
        );
        add(
            &fx,
            NewPatient {
                mrn: Some("ABX1".into()),
                ..named("B", "B")
            },
        );

        let ids = run(
            &fx,
            PatientFilterParams {
                mrn: Some("b_1".into()),
                ..Default::default()
            },
        );
        assert_eq!(ids, vec![literal]);
    }

    #[test]
    fn has_care_team_true_is_deduplicated_and_false_is_complement() {
        let fx = fixture();
        let crowded = add(&fx, named("Crowded", "Team"));
        let alone = add(&fx, named("No", "Team"));
        fx.store
            .with_conn(|conn| {
                for username in ["a", "b", "c"] {
                    let user = seed::insert_user(
                        conn,
                        &NewUser {
                            username: username.into(),
                            ..Default::default()
                        },
                    )?;
                    seed::add_care_team_member(conn, crowded, user)?;
                }
                Ok(())
            })
            .unwrap();

        let with_team = run(
            &fx,
            PatientFilterParams {
                has_care_team: Some("true".into()),
                ..Default::default()
            },
        );
        assert_eq!(with_team, vec![crowded]);

        let without_team = run(
            &fx,
            PatientFilterParams {
                has_care_team: Some("false".into()),
                ..Default::default()
            },
        );
        assert_eq!(without_team, vec![alone]);
    }

    #[test]
    fn birth_date_range_is_inclusive() {
        let fx = fixture();
        let born = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
        let early = add(
            &fx,
            NewPatient {
                birth_date: born(1940, 1, 1),
                ..named("E", "E")
            },
        );
        let edge = add(
            &fx,
            NewPatient {
                birth_date: born(1950, 6, 30),
                ..named("M", "M")
            },
        );
        add(
            &fx,
            NewPatient {
                birth_date: born(1990, 1, 1),
                ..named("L", "L")
            },
        );

        let ids = run(
            &fx,
            PatientFilterParams {
                birth_date_after: Some("1940-01-01".into()),
                birth_date_before: Some("1950-06-30".into()),
                ..Default::default()
            },
        );
        assert_eq!(ids, vec![early, edge]);
    }

    #[test]
    fn exact_choice_and_category_filters() {
        let fx = fixture();
        let target = add(
            &fx,
            NewPatient {
                gender: Some("F".into()),
                program: Some("LHCSA".into()),
                patient_category_id: Some(fx.category),
                ..named("T", "T")
            },
        );
        add(
            &fx,
            NewPatient {
                gender: Some("F".into()),
                program: Some("CDPAP".into()),
                ..named("O", "O")
            },
        );

        let ids = run(
            &fx,
            PatientFilterParams {
                gender: Some("F".into()),
                program: Some("LHCSA".into()),
                patient_category: Some(fx.category.to_string()),
                ..Default::default()
            },
        );
        assert_eq!(ids, vec![target]);
    }

    #[test]
    fn invalid_values_report_errors_per_field() {
        let fx = fixture();
        let errors = fx
            .store
            .with_conn(|conn| {
                let params = PatientFilterParams {
                    gender: Some("X".into()),
                    birth_date_after: Some("03/14/1950".into()),
                    is_active: Some("maybe".into()),
                    patient_category: Some("9999".into()),
                    ..Default::default()
                };
                Ok(PatientFilter::bind(&params, conn)?.unwrap_err())
            })
            .unwrap();

        let fields: Vec<_> = errors.0.keys().cloned().collect();
        assert_eq!(
            fields,
            vec!["birth_date_after", "gender", "is_active", "patient_category"]
        );
    }

    #[test]
    fn compact_filter_ignores_other_fields() {
        let fx = fixture();
        let active = add(&fx, named("Ann", "Active"));
        add(
            &fx,
            NewPatient {
                is_active: false,
                ..named("Ann", "Inactive")
            },
        );

        let params = PatientFilterParams {
            name: Some("ann".into()),
            is_active: Some("on".into()),
            gender: Some("not-a-choice".into()),
            ..Default::default()
        };
        let filter = CompactPatientFilter::bind(&params).unwrap();
        let ids: Vec<i64> = fx
            .store
            .with_conn(|conn| {
                let mut query = PatientQuery::for_organization(Some(fx.org));
                filter.apply(&mut query);
                Ok(query.fetch(conn, None)?.into_iter().map(|p| p.id).collect())
            })
            .unwrap();
        assert_eq!(ids, vec![active]);
    }

    #[test]
    fn supplied_echoes_only_non_blank_values() {
        let params = PatientFilterParams {
            name: Some(" smith ".into()),
            city: Some(String::new()),
            ..Default::default()
        };
        let supplied = params.supplied();
        assert_eq!(supplied.len(), 1);
        assert_eq!(supplied.get("name").map(String::as_str), Some("smith"));
    }
}
