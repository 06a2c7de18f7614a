//! Presentation helpers evaluated per row.

use crate::auth::User;
use crate::models::PatientRecord;

/// Whether `user` is on the patient's care team.
///
/// Anonymous and inactive users are never members. Uses the prefetched care-team list, so no
/// query is issued per row.
pub fn user_in_care_team(patient: &PatientRecord, user: Option<&User>) -> bool {
    match user {
        Some(user) if user.is_active => patient.has_care_team_member(user.id),
        _ => false,
    }
}
