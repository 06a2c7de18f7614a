//! Declared option sets for patient and insurance fields.
//!
//! Each set has a stable storage `code` and a human `label`. The order of [`Choice::ALL`] is the
//! declaration order, which is also the order used when every option must be reported (for
//! example zero-filled per-gender counts).

/// A closed set of `(code, label)` options.
pub trait Choice: Sized + Copy + 'static {
    /// Every declared option, in declaration order.
    const ALL: &'static [Self];

    /// Storage code written to the database and accepted in query strings.
    fn code(self) -> &'static str;

    /// Display label.
    fn label(self) -> &'static str;

    /// Looks up an option by its storage code (exact match).
    fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// Display label for a stored code, or the code itself when it is not declared.
    fn display_code(code: &str) -> String {
        Self::from_code(code)
            .map(|c| c.label().to_string())
            .unwrap_or_else(|| code.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Choice for Gender {
    const ALL: &'static [Self] = &[Gender::Male, Gender::Female, Gender::Other];

    fn code(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other => "O",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

/// Care program a patient is enrolled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    ConsumerDirected,
    LicensedHomeCare,
    PrivatePay,
}

impl Choice for Program {
    const ALL: &'static [Self] = &[
        Program::ConsumerDirected,
        Program::LicensedHomeCare,
        Program::PrivatePay,
    ];

    fn code(self) -> &'static str {
        match self {
            Program::ConsumerDirected => "CDPAP",
            Program::LicensedHomeCare => "LHCSA",
            Program::PrivatePay => "PRIVATE",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Program::ConsumerDirected => "Consumer Directed Personal Assistance",
            Program::LicensedHomeCare => "Licensed Home Care Services",
            Program::PrivatePay => "Private Pay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsuranceType {
    Primary,
    Secondary,
}

impl Choice for InsuranceType {
    const ALL: &'static [Self] = &[InsuranceType::Primary, InsuranceType::Secondary];

    fn code(self) -> &'static str {
        match self {
            InsuranceType::Primary => "primary",
            InsuranceType::Secondary => "secondary",
        }
    }

    fn label(self) -> &'static str {
        match self {
            InsuranceType::Primary => "Primary",
            InsuranceType::Secondary => "Secondary",
        }
    }
}
