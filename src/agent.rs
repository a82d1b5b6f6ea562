//! Agent roles - the reasoning personas stages are bound to

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// An external tool an agent may invoke through the execution engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
    /// Tool name as the execution engine knows it
    pub name: String,
}

impl Capability {
    pub const WEB_SEARCH: &'static str = "web_search";
    pub const PAGE_SCRAPE: &'static str = "page_scrape";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn web_search() -> Self {
        Self::new(Self::WEB_SEARCH)
    }

    pub fn page_scrape() -> Self {
        Self::new(Self::PAGE_SCRAPE)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The fixed set of personas the family activity pipeline uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    DevelopmentSpecialist,
    CommunityNavigator,
    FamilyCoordinator,
    FinalDecisionMaker,
}

impl RoleKind {
    pub const ALL: [RoleKind; 4] = [
        RoleKind::DevelopmentSpecialist,
        RoleKind::CommunityNavigator,
        RoleKind::FamilyCoordinator,
        RoleKind::FinalDecisionMaker,
    ];
}

/// A named reasoning persona
///
/// Roles are immutable once built and shared by every stage that binds them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRole {
    /// Human-readable role name
    pub role_name: String,
    /// What the agent is trying to achieve
    pub goal: String,
    /// Context the agent reasons from
    pub backstory: String,
    /// Tools the agent may invoke
    capabilities: Vec<Arc<Capability>>,
}

impl AgentRole {
    pub fn new(
        role_name: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        capabilities: impl IntoIterator<Item = Arc<Capability>>,
    ) -> Self {
        let mut capabilities: Vec<Arc<Capability>> = capabilities.into_iter().collect();
        capabilities.sort();
        capabilities.dedup();

        Self {
            role_name: role_name.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            capabilities,
        }
    }

    pub fn capabilities(&self) -> &[Arc<Capability>] {
        &self.capabilities
    }

    /// Check whether the role may invoke the named tool
    pub fn can_use(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c.name == capability)
    }
}

/// Registry of the roles a pipeline can bind
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    roles: BTreeMap<RoleKind, Arc<AgentRole>>,
}

impl AgentRegistry {
    /// Build the standard family activity roles
    ///
    /// Research roles get search and scrape; the final decision maker only
    /// searches, since it works from what the earlier stages gathered.
    pub fn standard() -> Self {
        let search = Arc::new(Capability::web_search());
        let scrape = Arc::new(Capability::page_scrape());

        let research = || vec![Arc::clone(&search), Arc::clone(&scrape)];

        let mut roles = BTreeMap::new();

        roles.insert(
            RoleKind::DevelopmentSpecialist,
            Arc::new(AgentRole::new(
                "Child Development Specialist",
                "Provide developmental guidelines and evaluate activity suitability \
                 for different age groups and developmental stages",
                "As an expert in child development psychology and education, you provide \
                 the foundational assessment of what activities are developmentally \
                 appropriate and beneficial for children at different stages. Your \
                 recommendations guide the other agents in finding suitable activities \
                 that match children's developmental needs, interests, and abilities.",
                research(),
            )),
        );

        roles.insert(
            RoleKind::CommunityNavigator,
            Arc::new(AgentRole::new(
                "Local Community Navigator",
                "Identify and evaluate local opportunities that align with the \
                 developmental guidelines provided by the Child Development Specialist",
                "Working closely with the Child Development Specialist's recommendations, \
                 you maintain a comprehensive database of local venues, programs, and events. \
                 You filter and match these opportunities against the developmental criteria \
                 to create a curated list of age-appropriate local activities. Your knowledge \
                 of the community ecosystem helps translate developmental goals into concrete \
                 local opportunities.",
                research(),
            )),
        );

        roles.insert(
            RoleKind::FamilyCoordinator,
            Arc::new(AgentRole::new(
                "Family Activity Coordinator",
                "Create practical family activity plans by combining developmental insights \
                 and local opportunities into executable family experiences",
                "As the final planning specialist, you synthesize the developmental guidelines \
                 from the Child Development Specialist and the local opportunities from the \
                 Community Navigator to create concrete, practical family activity plans. You \
                 consider additional factors such as logistics, scheduling, budgeting, and \
                 family preferences to transform recommendations into actionable plans. Your \
                 expertise ensures that developmentally appropriate activities are implemented \
                 in a way that works for the whole family.",
                research(),
            )),
        );

        roles.insert(
            RoleKind::FinalDecisionMaker,
            Arc::new(AgentRole::new(
                "Final Decision Maker",
                "Evaluate and rank activity recommendations to make final, optimized \
                 selections that best match family preferences and constraints. Present your \
                 recommendations in clear, complete sentences that explain the reasoning behind \
                 each selection. Include all essential details such as location, date, and \
                 practical information integrated naturally into well-formed paragraphs. Each \
                 recommendation must be explained with proper context and full justification \
                 for why it was selected.",
                "As the ultimate decision authority, you analyze all recommendations and \
                 insights from the previous agents to make the final activity selections. Your \
                 expertise lies in balancing multiple factors including developmental value, \
                 practical feasibility, and family preferences to choose the most suitable \
                 activities. You excel at crafting detailed, well-reasoned recommendations that \
                 explain why each activity was selected and how it meets the family's needs. \
                 You communicate your decisions through clear, complete sentences that provide \
                 comprehensive context and justification. Your evaluations consider all \
                 criteria - educational value, convenience, cost, and family enjoyment - and \
                 present them in a coherent narrative that helps families understand exactly \
                 why each activity was chosen and what makes it an excellent fit for their \
                 specific situation.",
                vec![Arc::clone(&search)],
            )),
        );

        debug!(roles = roles.len(), "Built standard agent registry");

        Self { roles }
    }

    /// Get a role by kind
    pub fn get(&self, kind: RoleKind) -> Option<Arc<AgentRole>> {
        self.roles.get(&kind).cloned()
    }

    /// Replace or add a role
    pub fn with_role(mut self, kind: RoleKind, role: AgentRole) -> Self {
        self.roles.insert(kind, Arc::new(role));
        self
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_has_every_role() {
        let registry = AgentRegistry::standard();
        assert_eq!(registry.len(), 4);
        for kind in RoleKind::ALL {
            assert!(registry.get(kind).is_some(), "missing {kind:?}");
        }
    }

    #[test]
    fn test_final_decision_maker_is_narrower() {
        let registry = AgentRegistry::standard();
        let finalist = registry.get(RoleKind::FinalDecisionMaker).unwrap();
        assert!(finalist.can_use(Capability::WEB_SEARCH));
        assert!(!finalist.can_use(Capability::PAGE_SCRAPE));

        for kind in [
            RoleKind::DevelopmentSpecialist,
            RoleKind::CommunityNavigator,
            RoleKind::FamilyCoordinator,
        ] {
            let role = registry.get(kind).unwrap();
            assert!(role.can_use(Capability::WEB_SEARCH));
            assert!(role.can_use(Capability::PAGE_SCRAPE));
            assert!(role.capabilities().len() > finalist.capabilities().len());
        }
    }

    #[test]
    fn test_capabilities_are_shared() {
        let registry = AgentRegistry::standard();
        let a = registry.get(RoleKind::DevelopmentSpecialist).unwrap();
        let b = registry.get(RoleKind::FinalDecisionMaker).unwrap();
        let search_a = a.capabilities().iter().find(|c| c.name == Capability::WEB_SEARCH).unwrap();
        let search_b = b.capabilities().iter().find(|c| c.name == Capability::WEB_SEARCH).unwrap();
        assert!(Arc::ptr_eq(search_a, search_b));
    }

    #[test]
    fn test_roles_carry_full_prose() {
        let registry = AgentRegistry::standard();
        let navigator = registry.get(RoleKind::CommunityNavigator).unwrap();
        assert!(navigator.backstory.contains("comprehensive database of local venues"));
        assert!(navigator.backstory.contains("community ecosystem"));

        let coordinator = registry.get(RoleKind::FamilyCoordinator).unwrap();
        assert!(coordinator.backstory.starts_with("As the final planning specialist"));

        let finalist = registry.get(RoleKind::FinalDecisionMaker).unwrap();
        assert!(finalist.goal.contains("full justification"));
        assert!(finalist.backstory.contains("excellent fit for their specific situation"));
    }

    #[test]
    fn test_role_dedups_capabilities() {
        let search = Arc::new(Capability::web_search());
        let role = AgentRole::new("r", "g", "b", vec![search.clone(), search]);
        assert_eq!(role.capabilities().len(), 1);
    }

    #[test]
    fn test_with_role_overrides() {
        let registry = AgentRegistry::standard().with_role(
            RoleKind::FinalDecisionMaker,
            AgentRole::new("Judge", "pick", "picky", Vec::new()),
        );
        let role = registry.get(RoleKind::FinalDecisionMaker).unwrap();
        assert_eq!(role.role_name, "Judge");
        assert!(role.capabilities().is_empty());
    }
}
