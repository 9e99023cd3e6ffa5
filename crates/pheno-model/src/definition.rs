//! Phenotype definition types.

use std::fmt;

use crate::error::DefinitionError;
use crate::{Age, ConceptId};

// =============================================================================
// Categories and roles
// =============================================================================

/// Clinical domain of an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Category {
    /// Condition occurrence.
    Condition,
    /// Procedure occurrence.
    Procedure,
}

impl Category {
    /// Short suffix used in field names (`cond` / `proc`).
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Condition => "cond",
            Self::Procedure => "proc",
        }
    }

    /// Parses a category label (`condition`, `cond`, `procedure`, `proc`).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "condition" | "cond" => Some(Self::Condition),
            "procedure" | "proc" => Some(Self::Procedure),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condition => f.write_str("condition"),
            Self::Procedure => f.write_str("procedure"),
        }
    }
}

/// How an empty concept set is interpreted downstream.
///
/// Universe inclusion and every exclusion role treat an empty set as
/// "no constraint". Case-defining roles treat an empty set as "matches
/// nothing", so a phenotype without case concepts has no cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptySetPolicy {
    /// Empty set imposes no constraint.
    Unconstrained,
    /// Empty set matches no subject.
    MatchesNothing,
}

/// Stage of the classification a concept list participates in.
///
/// Each group pairs a condition role with a procedure role; the two are
/// always OR-combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleGroup {
    /// `universe.cond` / `universe.proc`.
    UniverseInclusion,
    /// `universe.excl.cond` / `universe.excl.proc`.
    UniverseExclusion,
    /// `case.cond` / `case.proc`.
    CaseDefinition,
    /// `case.excl.cond` / `case.excl.proc`.
    CaseExclusion,
    /// `ctrl.excl.cond` / `ctrl.excl.proc`.
    ControlExclusion,
}

impl RoleGroup {
    /// The condition and procedure roles of this group.
    pub fn roles(self) -> [ConceptRole; 2] {
        match self {
            Self::UniverseInclusion => [
                ConceptRole::UniverseCondition,
                ConceptRole::UniverseProcedure,
            ],
            Self::UniverseExclusion => [
                ConceptRole::UniverseExclusionCondition,
                ConceptRole::UniverseExclusionProcedure,
            ],
            Self::CaseDefinition => [ConceptRole::CaseCondition, ConceptRole::CaseProcedure],
            Self::CaseExclusion => [
                ConceptRole::CaseExclusionCondition,
                ConceptRole::CaseExclusionProcedure,
            ],
            Self::ControlExclusion => [
                ConceptRole::ControlExclusionCondition,
                ConceptRole::ControlExclusionProcedure,
            ],
        }
    }

    /// Interpretation of an empty set for this group.
    pub fn empty_policy(self) -> EmptySetPolicy {
        match self {
            Self::CaseDefinition => EmptySetPolicy::MatchesNothing,
            _ => EmptySetPolicy::Unconstrained,
        }
    }
}

/// One of the ten concept-list fields of a phenotype definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConceptRole {
    /// `universe.cond`
    UniverseCondition,
    /// `universe.proc`
    UniverseProcedure,
    /// `universe.excl.cond`
    UniverseExclusionCondition,
    /// `universe.excl.proc`
    UniverseExclusionProcedure,
    /// `case.cond`
    CaseCondition,
    /// `case.proc`
    CaseProcedure,
    /// `case.excl.cond`
    CaseExclusionCondition,
    /// `case.excl.proc`
    CaseExclusionProcedure,
    /// `ctrl.excl.cond`
    ControlExclusionCondition,
    /// `ctrl.excl.proc`
    ControlExclusionProcedure,
}

impl ConceptRole {
    /// All roles in field order.
    pub const ALL: [ConceptRole; 10] = [
        Self::UniverseCondition,
        Self::UniverseProcedure,
        Self::UniverseExclusionCondition,
        Self::UniverseExclusionProcedure,
        Self::CaseCondition,
        Self::CaseProcedure,
        Self::CaseExclusionCondition,
        Self::CaseExclusionProcedure,
        Self::ControlExclusionCondition,
        Self::ControlExclusionProcedure,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// The occurrence category this role matches against.
    pub fn category(self) -> Category {
        if self.index() % 2 == 0 {
            Category::Condition
        } else {
            Category::Procedure
        }
    }

    /// The classification stage this role belongs to.
    pub fn group(self) -> RoleGroup {
        match self {
            Self::UniverseCondition | Self::UniverseProcedure => RoleGroup::UniverseInclusion,
            Self::UniverseExclusionCondition | Self::UniverseExclusionProcedure => {
                RoleGroup::UniverseExclusion
            }
            Self::CaseCondition | Self::CaseProcedure => RoleGroup::CaseDefinition,
            Self::CaseExclusionCondition | Self::CaseExclusionProcedure => {
                RoleGroup::CaseExclusion
            }
            Self::ControlExclusionCondition | Self::ControlExclusionProcedure => {
                RoleGroup::ControlExclusion
            }
        }
    }

    /// Interpretation of an empty resolved set for this role.
    pub fn empty_policy(self) -> EmptySetPolicy {
        self.group().empty_policy()
    }

    /// Field name as used in definition sources (e.g. `case.excl.cond`).
    pub fn field_name(self) -> &'static str {
        match self {
            Self::UniverseCondition => "universe.cond",
            Self::UniverseProcedure => "universe.proc",
            Self::UniverseExclusionCondition => "universe.excl.cond",
            Self::UniverseExclusionProcedure => "universe.excl.proc",
            Self::CaseCondition => "case.cond",
            Self::CaseProcedure => "case.proc",
            Self::CaseExclusionCondition => "case.excl.cond",
            Self::CaseExclusionProcedure => "case.excl.proc",
            Self::ControlExclusionCondition => "ctrl.excl.cond",
            Self::ControlExclusionProcedure => "ctrl.excl.proc",
        }
    }

    /// Name of the ICD variant field, for condition roles only.
    pub fn icd_field_name(self) -> Option<&'static str> {
        match self {
            Self::UniverseCondition => Some("universe.cond.icd"),
            Self::UniverseExclusionCondition => Some("universe.excl.cond.icd"),
            Self::CaseCondition => Some("case.cond.icd"),
            Self::CaseExclusionCondition => Some("case.excl.cond.icd"),
            Self::ControlExclusionCondition => Some("ctrl.excl.cond.icd"),
            _ => None,
        }
    }

    /// Looks a role up by its field name.
    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.field_name() == name)
    }
}

impl fmt::Display for ConceptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

// =============================================================================
// Age bounds
// =============================================================================

/// Inclusive age window; `None` on either side means unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AgeBounds {
    /// Minimum age (inclusive).
    pub min: Option<Age>,
    /// Maximum age (inclusive).
    pub max: Option<Age>,
}

impl AgeBounds {
    /// Creates a new age window.
    pub fn new(min: Option<Age>, max: Option<Age>) -> Self {
        Self { min, max }
    }

    /// Returns true if neither bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Returns true if `age` lies within the window.
    pub fn contains(&self, age: Age) -> bool {
        self.min.map_or(true, |min| age >= min) && self.max.map_or(true, |max| age <= max)
    }

    fn validate(
        &self,
        scope: &'static str,
        fields: [&'static str; 2],
    ) -> Result<(), DefinitionError> {
        for (bound, field) in [(self.min, fields[0]), (self.max, fields[1])] {
            if let Some(value) = bound {
                if !value.is_finite() || value < 0.0 {
                    return Err(DefinitionError::InvalidAge { field, value });
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(DefinitionError::InvertedAgeBounds { scope, min, max });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Phenotype definition
// =============================================================================

/// A declarative phenotype definition.
///
/// Holds one concept list per [`ConceptRole`], ICD codes for the condition
/// roles, and the universe and case age windows. Immutable once built; use
/// [`PhenotypeDefinition::builder`] to construct one.
#[derive(Debug, Clone, PartialEq)]
pub struct PhenotypeDefinition {
    id: String,
    name: String,
    concepts: [Vec<ConceptId>; 10],
    icd_codes: [Vec<String>; 10],
    universe_age: AgeBounds,
    case_age: AgeBounds,
}

impl PhenotypeDefinition {
    /// Starts building a definition with the given id and display name.
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> PhenotypeDefinitionBuilder {
        PhenotypeDefinitionBuilder {
            definition: PhenotypeDefinition {
                id: id.into(),
                name: name.into(),
                concepts: Default::default(),
                icd_codes: Default::default(),
                universe_age: AgeBounds::default(),
                case_age: AgeBounds::default(),
            },
        }
    }

    /// Phenotype identifier (matrix column name).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable phenotype name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared OMOP concept IDs for a role.
    pub fn concept_ids(&self, role: ConceptRole) -> &[ConceptId] {
        &self.concepts[role.index()]
    }

    /// Declared ICD codes for a role (always empty for procedure roles of a
    /// valid definition).
    pub fn icd_codes(&self, role: ConceptRole) -> &[String] {
        &self.icd_codes[role.index()]
    }

    /// Returns true if the role declares neither concepts nor ICD codes.
    pub fn is_role_empty(&self, role: ConceptRole) -> bool {
        self.concept_ids(role).is_empty() && self.icd_codes(role).is_empty()
    }

    /// Universe age window.
    pub fn universe_age(&self) -> AgeBounds {
        self.universe_age
    }

    /// Case age window.
    pub fn case_age(&self) -> AgeBounds {
        self.case_age
    }

    /// Checks the definition for malformed or self-contradictory fields.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.id.trim().is_empty() {
            return Err(DefinitionError::MissingId);
        }
        for role in ConceptRole::ALL {
            if role.icd_field_name().is_none() && !self.icd_codes(role).is_empty() {
                return Err(DefinitionError::IcdNotSupported {
                    field: role.field_name(),
                });
            }
        }
        self.universe_age
            .validate("universe", ["universe.min.age", "universe.max.age"])?;
        self.case_age
            .validate("case", ["case.min.age", "case.max.age"])?;
        Ok(())
    }
}

/// Builder for [`PhenotypeDefinition`].
#[derive(Debug, Clone)]
pub struct PhenotypeDefinitionBuilder {
    definition: PhenotypeDefinition,
}

impl PhenotypeDefinitionBuilder {
    /// Sets the concept list for a role, replacing any previous list.
    pub fn concepts<I>(mut self, role: ConceptRole, ids: I) -> Self
    where
        I: IntoIterator<Item = ConceptId>,
    {
        self.definition.concepts[role.index()] = ids.into_iter().collect();
        self
    }

    /// Sets the ICD codes for a role, replacing any previous list.
    ///
    /// Codes attached to a role without an ICD variant are kept and reported
    /// by [`PhenotypeDefinition::validate`].
    pub fn icd_codes<I, S>(mut self, role: ConceptRole, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition.icd_codes[role.index()] = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the universe age window.
    pub fn universe_age(mut self, min: Option<Age>, max: Option<Age>) -> Self {
        self.definition.universe_age = AgeBounds::new(min, max);
        self
    }

    /// Sets the case age window.
    pub fn case_age(mut self, min: Option<Age>, max: Option<Age>) -> Self {
        self.definition.case_age = AgeBounds::new(min, max);
        self
    }

    /// Builds the definition. Validation is deferred to
    /// [`PhenotypeDefinition::validate`].
    pub fn build(self) -> PhenotypeDefinition {
        self.definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_categories_alternate() {
        assert_eq!(ConceptRole::UniverseCondition.category(), Category::Condition);
        assert_eq!(ConceptRole::UniverseProcedure.category(), Category::Procedure);
        assert_eq!(ConceptRole::CaseExclusionCondition.category(), Category::Condition);
        assert_eq!(ConceptRole::ControlExclusionProcedure.category(), Category::Procedure);
    }

    #[test]
    fn test_empty_policy_only_case_definition_matches_nothing() {
        for role in ConceptRole::ALL {
            let expected = match role {
                ConceptRole::CaseCondition | ConceptRole::CaseProcedure => {
                    EmptySetPolicy::MatchesNothing
                }
                _ => EmptySetPolicy::Unconstrained,
            };
            assert_eq!(role.empty_policy(), expected, "{role}");
        }
    }

    #[test]
    fn test_group_roles_round_trip() {
        for role in ConceptRole::ALL {
            assert!(role.group().roles().contains(&role));
        }
    }

    #[test]
    fn test_icd_variants_only_on_condition_roles() {
        for role in ConceptRole::ALL {
            if role.category() == Category::Procedure {
                assert!(role.icd_field_name().is_none());
            } else {
                assert!(role.icd_field_name().is_some());
            }
        }
    }

    #[test]
    fn test_field_name_lookup() {
        assert_eq!(
            ConceptRole::from_field_name("ctrl.excl.proc"),
            Some(ConceptRole::ControlExclusionProcedure)
        );
        assert_eq!(ConceptRole::from_field_name("case.min.age"), None);
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(Category::from_label("Condition"), Some(Category::Condition));
        assert_eq!(Category::from_label(" proc "), Some(Category::Procedure));
        assert_eq!(Category::from_label("drug"), None);
    }

    #[test]
    fn test_age_bounds_inclusive() {
        let bounds = AgeBounds::new(Some(18.0), Some(65.0));
        assert!(bounds.contains(18.0));
        assert!(bounds.contains(65.0));
        assert!(!bounds.contains(17.99));
        assert!(!bounds.contains(65.01));
    }

    #[test]
    fn test_age_bounds_open_sides() {
        assert!(AgeBounds::new(None, Some(40.0)).contains(0.0));
        assert!(AgeBounds::new(Some(40.0), None).contains(120.0));
        assert!(AgeBounds::default().is_unbounded());
    }

    #[test]
    fn test_builder_sets_fields() {
        let definition = PhenotypeDefinition::builder("ph1", "Test")
            .concepts(ConceptRole::CaseCondition, [100, 200])
            .icd_codes(ConceptRole::CaseCondition, ["A01"])
            .case_age(Some(30.0), Some(40.0))
            .build();

        assert_eq!(definition.id(), "ph1");
        assert_eq!(definition.name(), "Test");
        assert_eq!(definition.concept_ids(ConceptRole::CaseCondition), &[100, 200]);
        assert_eq!(definition.icd_codes(ConceptRole::CaseCondition), &["A01".to_string()]);
        assert!(definition.is_role_empty(ConceptRole::CaseProcedure));
        assert!(!definition.is_role_empty(ConceptRole::CaseCondition));
        assert_eq!(definition.case_age(), AgeBounds::new(Some(30.0), Some(40.0)));
        assert!(definition.universe_age().is_unbounded());
    }

    #[test]
    fn test_validate_rejects_missing_id() {
        let definition = PhenotypeDefinition::builder("  ", "Unnamed").build();
        assert_eq!(definition.validate(), Err(DefinitionError::MissingId));
    }

    #[test]
    fn test_validate_rejects_inverted_case_bounds() {
        let definition = PhenotypeDefinition::builder("ph1", "Test")
            .case_age(Some(65.0), Some(18.0))
            .build();
        assert!(matches!(
            definition.validate(),
            Err(DefinitionError::InvertedAgeBounds { scope: "case", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_universe_bounds() {
        let definition = PhenotypeDefinition::builder("ph1", "Test")
            .universe_age(Some(50.0), Some(20.0))
            .build();
        assert!(matches!(
            definition.validate(),
            Err(DefinitionError::InvertedAgeBounds { scope: "universe", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_negative_and_nan_ages() {
        let negative = PhenotypeDefinition::builder("ph1", "Test")
            .case_age(Some(-1.0), None)
            .build();
        assert!(matches!(
            negative.validate(),
            Err(DefinitionError::InvalidAge { field: "case.min.age", .. })
        ));

        let nan = PhenotypeDefinition::builder("ph1", "Test")
            .universe_age(None, Some(f64::NAN))
            .build();
        assert!(matches!(
            nan.validate(),
            Err(DefinitionError::InvalidAge { field: "universe.max.age", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_icd_on_procedure_role() {
        let definition = PhenotypeDefinition::builder("ph1", "Test")
            .icd_codes(ConceptRole::CaseProcedure, ["0DTJ4ZZ"])
            .build();
        assert_eq!(
            definition.validate(),
            Err(DefinitionError::IcdNotSupported {
                field: "case.proc"
            })
        );
    }

    #[test]
    fn test_validate_accepts_equal_bounds() {
        let definition = PhenotypeDefinition::builder("ph1", "Test")
            .case_age(Some(40.0), Some(40.0))
            .build();
        assert!(definition.validate().is_ok());
    }
}
