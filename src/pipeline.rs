//! Pipeline assembly - the ordered chain of resolved stages

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::activity::ActivityRecord;
use crate::agent::{AgentRegistry, RoleKind};
use crate::context::{CountBounds, PipelineContext};
use crate::error::{BroodError, Result};
use crate::stage::{OutputSchema, StageSpec, StageTemplate};

pub const DISCOVERY: &str = "activity_discovery";
pub const LOCAL_MAPPING: &str = "local_mapping";
pub const SUITABILITY: &str = "suitability_evaluation";
pub const FINAL_SELECTION: &str = "final_selection";

const DISCOVERY_TEMPLATE: &str = "Research and identify developmentally appropriate activities \
for a {age}-year-old child interested in {learning_interests}. Focus on core developmental \
areas: cognitive, social, physical, and emotional growth. Consider activities suitable for \
{number_of_children} child(ren) and {number_of_adults} adults.";

const DISCOVERY_OUTPUT: &str = "Curated list of activities with developmental benefits and \
age-appropriate learning opportunities";

const LOCAL_MAPPING_TEMPLATE: &str = "Map the developmental activity recommendations from the \
previous stage to local opportunities in {city}, focusing on {neighborhood} and \
{preferred_areas}. Maximum distance: {max_distance} km. Consider:\n\
- Activities available on {search_date}\n\
- Price limit: {max_price_per_person}€ per person\n\
- Language: {language_options}\n\
- {?public_transport_accessible:Must be accessible by public transport|Car accessibility required}\
{?has_stroller:\n- Must be stroller-friendly}";

const LOCAL_MAPPING_OUTPUT: &str = "Matched list of local venues and programs that fulfill the \
developmental criteria, including current availability and seasonal opportunities";

const SUITABILITY_TEMPLATE: &str = "Evaluate the identified local activities for {search_date} \
between {available_times.start} and {available_times.end}. Consider:\n\
- Group composition: {number_of_children} child(ren), {number_of_adults} adults\n\
- Budget limit: {max_price_per_person}€ per person\n\
- Language requirements: {language_options}\
{?has_stroller:\n- Stroller accessibility needed}\n\
- {?public_transport_accessible:Public transport access required|Car parking needs}";

const SUITABILITY_OUTPUT: &str = "Comprehensive family-friendly assessment of each activity with \
practical implementation details and recommendations";

const FINAL_SELECTION_TEMPLATE: &str = "Select {min_locations}-{max_locations} best activities \
from the evaluated candidates that:\n\
- Are suitable for a {age}-year-old interested in {learning_interests}\n\
- Are located in {city}, preferably in {preferred_areas} or {neighborhood}\n\
- Are available on {search_date} between {available_times.start}-{available_times.end}\n\
- Cost less than {max_price_per_person}€ per person\n\
- Are within {max_distance} km\n\
- Are in {language_options}\n\
- {?public_transport_accessible:Have public transport access|Have parking available}\
{?has_stroller:\n- Are stroller-accessible}";

const FINAL_SELECTION_OUTPUT: &str = "A clear recommendation of {min_locations}-{max_locations} \
suitable activities, explaining why they match the child's age and learning interests, and \
noting any parent involvement requirements. Provide the final answer in complete sentences.";

/// Options that do not come from the request itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Where the validated activity list is written
    pub output_artifact: PathBuf,
    /// Forwarded to the execution engine with every stage
    pub verbose: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            output_artifact: PathBuf::from("final_recommendation.json"),
            verbose: true,
        }
    }
}

/// An ordered, fully resolved chain of stages
///
/// Immutable once built; safe to share between concurrent runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    stages: Vec<StageSpec>,
    bounds: CountBounds,
    verbose: bool,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Build the four-stage family activity pipeline
    pub fn family_activities(
        registry: &AgentRegistry,
        ctx: &PipelineContext,
        options: &PipelineOptions,
    ) -> Result<Self> {
        let role = |kind: RoleKind| {
            registry
                .get(kind)
                .ok_or_else(|| BroodError::Config(format!("registry has no {kind:?} role")))
        };

        let schema_hint = format!(
            "\nRespond with a JSON object holding an `activities` array. Every record must have \
             the fields: {}.",
            ActivityRecord::field_names().collect::<Vec<_>>().join(", ")
        );

        let pipeline = Self::builder()
            .verbose(options.verbose)
            .stage(StageTemplate::new(
                DISCOVERY,
                DISCOVERY_TEMPLATE,
                DISCOVERY_OUTPUT,
                role(RoleKind::DevelopmentSpecialist)?,
            )?)
            .stage(StageTemplate::new(
                LOCAL_MAPPING,
                LOCAL_MAPPING_TEMPLATE,
                LOCAL_MAPPING_OUTPUT,
                role(RoleKind::CommunityNavigator)?,
            )?)
            .stage(StageTemplate::new(
                SUITABILITY,
                SUITABILITY_TEMPLATE,
                SUITABILITY_OUTPUT,
                role(RoleKind::FamilyCoordinator)?,
            )?)
            .stage(
                StageTemplate::new(
                    FINAL_SELECTION,
                    &format!("{FINAL_SELECTION_TEMPLATE}{schema_hint}"),
                    FINAL_SELECTION_OUTPUT,
                    role(RoleKind::FinalDecisionMaker)?,
                )?
                .with_schema(OutputSchema::ActivityList)
                .with_artifact(options.output_artifact.clone()),
            )
            .build(ctx)?;

        info!(stages = pipeline.len(), "Built family activity pipeline");
        Ok(pipeline)
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// The stage whose output is validated and persisted
    pub fn final_stage(&self) -> &StageSpec {
        // Non-empty by construction.
        &self.stages[self.stages.len() - 1]
    }

    pub fn bounds(&self) -> CountBounds {
        self.bounds
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Builder for arbitrary stage chains
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    stages: Vec<StageTemplate>,
    verbose: bool,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            verbose: true,
        }
    }

    /// Append a stage; stages run in the order they are added
    pub fn stage(mut self, stage: StageTemplate) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve every stage against the context
    ///
    /// Fails on the first missing parameter, in stage order. The final stage
    /// must declare [`OutputSchema::ActivityList`] and no other stage may.
    pub fn build(self, ctx: &PipelineContext) -> Result<Pipeline> {
        let Some(last) = self.stages.last() else {
            return Err(BroodError::Config("pipeline needs at least one stage".into()));
        };
        if last.output_schema != Some(OutputSchema::ActivityList) {
            return Err(BroodError::Config(format!(
                "final stage `{}` must declare the {} schema",
                last.name,
                OutputSchema::ActivityList
            )));
        }
        if let Some(early) = self.stages[..self.stages.len() - 1]
            .iter()
            .find(|s| s.output_schema.is_some())
        {
            return Err(BroodError::Config(format!(
                "only the final stage may declare an output schema, `{}` does",
                early.name
            )));
        }

        let mut stages = Vec::with_capacity(self.stages.len());
        for template in &self.stages {
            let spec = template.resolve(ctx)?;
            debug!(stage = %spec.name, role = %spec.agent.role_name, "Resolved stage");
            stages.push(spec);
        }

        let bounds = ctx.count_bounds(&last.name)?;

        Ok(Pipeline {
            stages,
            bounds,
            verbose: self.verbose,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> PipelineContext {
        PipelineContext::from_value(json!({
            "city": "Munich",
            "neighborhood": "Giesing",
            "search_date": "2025-02-22",
            "age": 6,
            "learning_interests": ["nature", "animals"],
            "preferred_areas": ["Schwabing", "Maxvorstadt", "Neuhausen", "Thalkirchen"],
            "min_locations": 3,
            "max_locations": 3,
            "max_distance": 15,
            "max_price_per_person": 35,
            "available_times": { "start": "10:00", "end": "16:00" },
            "number_of_children": 1,
            "number_of_adults": 2,
            "has_stroller": true,
            "language_options": ["German"],
            "public_transport_accessible": true
        }))
        .unwrap()
    }

    fn build(ctx: &PipelineContext) -> Result<Pipeline> {
        Pipeline::family_activities(&AgentRegistry::standard(), ctx, &PipelineOptions::default())
    }

    #[test]
    fn test_four_stages_in_order() {
        let pipeline = build(&context()).unwrap();
        let names: Vec<_> = pipeline.stages().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![DISCOVERY, LOCAL_MAPPING, SUITABILITY, FINAL_SELECTION]);

        let roles: Vec<_> = pipeline.stages().iter().map(|s| s.agent.role_name.as_str()).collect();
        assert_eq!(
            roles,
            vec![
                "Child Development Specialist",
                "Local Community Navigator",
                "Family Activity Coordinator",
                "Final Decision Maker",
            ]
        );
    }

    #[test]
    fn test_only_final_stage_has_schema_and_artifact() {
        let pipeline = build(&context()).unwrap();
        for stage in &pipeline.stages()[..3] {
            assert!(stage.output_schema.is_none());
            assert!(stage.output_artifact.is_none());
        }
        let last = pipeline.final_stage();
        assert_eq!(last.output_schema, Some(OutputSchema::ActivityList));
        assert_eq!(last.output_artifact, Some(PathBuf::from("final_recommendation.json")));
        assert_eq!(pipeline.bounds(), CountBounds { min: 3, max: 3 });
    }

    #[test]
    fn test_instructions_fully_resolved() {
        let pipeline = build(&context()).unwrap();
        for stage in pipeline.stages() {
            assert!(!stage.description.contains('{'), "{}: {}", stage.name, stage.description);
            assert!(!stage.description.contains('}'));
            assert!(!stage.expected_output.contains('{'));
        }

        let discovery = pipeline.stage(DISCOVERY).unwrap();
        assert!(discovery.description.contains("6-year-old child interested in nature, animals"));

        let local = pipeline.stage(LOCAL_MAPPING).unwrap();
        assert!(local.description.contains("Schwabing, Maxvorstadt, Neuhausen, Thalkirchen"));
        assert!(local.description.contains("Must be accessible by public transport"));
        assert!(local.description.contains("Must be stroller-friendly"));

        let suitability = pipeline.stage(SUITABILITY).unwrap();
        assert!(suitability.description.contains("between 10:00 and 16:00"));

        let last = pipeline.final_stage();
        assert!(last.description.starts_with("Select 3-3 best activities"));
        assert!(last.description.contains("wheelchair_accessible"));
        assert!(last.expected_output.contains("3-3 suitable activities"));
    }

    #[test]
    fn test_flags_switch_clauses() {
        let ctx = context()
            .with("has_stroller", false)
            .with("public_transport_accessible", false);
        let pipeline = build(&ctx).unwrap();

        let local = &pipeline.stage(LOCAL_MAPPING).unwrap().description;
        assert!(local.contains("Car accessibility required"));
        assert!(!local.contains("stroller"));
        assert!(!local.ends_with("- "));

        let last = &pipeline.final_stage().description;
        assert!(last.contains("Have parking available"));
        assert!(!last.contains("stroller-accessible"));
    }

    #[test]
    fn test_missing_max_distance() {
        let err = build(&context().without("max_distance")).unwrap_err();
        match err {
            BroodError::MissingParameter { name, stage } => {
                assert_eq!(name, "max_distance");
                assert_eq!(stage, LOCAL_MAPPING);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_every_parameter_is_required() {
        let ctx = context();
        let names: Vec<String> = ctx.names().map(str::to_string).collect();
        for name in names {
            let result = build(&ctx.clone().without(&name));
            assert!(
                matches!(result, Err(BroodError::MissingParameter { name: ref n, .. }) if n.starts_with(name.as_str())),
                "removing {name} gave {result:?}"
            );
        }
    }

    #[test]
    fn test_build_is_idempotent() {
        let ctx = context();
        assert_eq!(build(&ctx).unwrap(), build(&ctx).unwrap());
    }

    #[test]
    fn test_custom_artifact_path() {
        let options = PipelineOptions {
            output_artifact: PathBuf::from("out/picks.json"),
            verbose: false,
        };
        let pipeline =
            Pipeline::family_activities(&AgentRegistry::standard(), &context(), &options).unwrap();
        assert_eq!(
            pipeline.final_stage().output_artifact,
            Some(PathBuf::from("out/picks.json"))
        );
        assert!(!pipeline.verbose());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: PipelineOptions = serde_json::from_str(r#"{"verbose": false}"#).unwrap();
        assert_eq!(options.output_artifact, PathBuf::from("final_recommendation.json"));
        assert!(!options.verbose);
    }

    #[test]
    fn test_builder_requires_final_schema() {
        let role = AgentRegistry::standard().get(RoleKind::FinalDecisionMaker).unwrap();
        let stage = StageTemplate::new("only", "go", "text", role).unwrap();
        let err = Pipeline::builder().stage(stage).build(&context()).unwrap_err();
        assert!(matches!(err, BroodError::Config(_)));

        assert!(matches!(
            Pipeline::builder().build(&context()),
            Err(BroodError::Config(_))
        ));
    }
}
