//! Read-side patient records.
//!
//! A [`PatientRecord`] is one row of a patient query: the stored patient columns, the joined
//! organisation and category, the two "latest" annotations and the bulk-prefetched relations.

use chrono::NaiveDate;
use roster_types::{Choice, Gender, InsuranceType, Program};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Organization {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientCategory {
    pub id: i64,
    pub name: String,
}

/// Insurance coverage row, limited to the columns the listing needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Insurance {
    pub id: i64,
    pub patient_id: i64,
    pub insurance_type: InsuranceType,
    pub provider: String,
    pub id_number: Option<String>,
}

/// A staff user on a patient's care team.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CareTeamMember {
    pub user_id: i64,
    pub username: String,
}

#[derive(Clone, Debug, Default)]
pub struct PatientRecord {
    pub id: i64,
    pub organization: Option<Organization>,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub mrn: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Stored gender code; may hold a code outside the declared choices.
    pub gender: Option<String>,
    pub phone_number: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub program: Option<String>,
    pub category: Option<PatientCategory>,
    pub is_active: bool,
    pub intake_complete: bool,
    pub is_evv_ready: bool,

    /// Admission date of the most recently created intake.
    pub latest_date_of_admission: Option<NaiveDate>,
    /// Text of the most recently created referral note.
    pub latest_referral_note: Option<String>,

    pub care_team: Vec<CareTeamMember>,
    /// Primary-type insurance rows, ordered by id.
    pub primary_insurance_list: Vec<Insurance>,
}

impl PatientRecord {
    pub fn full_name(&self) -> String {
        let mut parts = vec![self.first_name.trim()];
        if let Some(middle) = self.middle_name.as_deref() {
            parts.push(middle.trim());
        }
        parts.push(self.last_name.trim());
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The patient's primary insurance, if one was prefetched.
    pub fn primary_insurance(&self) -> Option<&Insurance> {
        self.primary_insurance_list.first()
    }

    pub fn gender_display(&self) -> Option<String> {
        self.gender.as_deref().map(Gender::display_code)
    }

    pub fn program_display(&self) -> Option<String> {
        self.program.as_deref().map(Program::display_code)
    }

    pub fn has_care_team_member(&self, user_id: i64) -> bool {
        self.care_team.iter().any(|m| m.user_id == user_id)
    }
}
