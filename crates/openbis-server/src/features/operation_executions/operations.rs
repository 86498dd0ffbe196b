//! Operations that can be batched into one execution
//!
//! Each operation wraps the command of a feature slice and runs through that
//! slice's `execute`, so a batch behaves exactly like the single calls made
//! one after another inside one transaction. Stored queries are not
//! batchable: they are checked against the query database registry, which
//! lives outside the transaction.

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::{
    auth::Session,
    error::ApiResult,
    features::{
        authorization_groups, data_sets, deletions, entity_types, experiments, external_dms, materials, persons,
        plugins, projects, property_types, role_assignments, samples, semantic_annotations, spaces, tags,
        vocabularies,
    },
};

macro_rules! operations {
    ($( $variant:ident($command:ty) => $run:expr ),+ $(,)?) => {
        /// One operation of a batch; serialized as `{"type": "CreateSpaces", ...command}`
        #[derive(Debug, Clone, Serialize, Deserialize)]
        #[serde(tag = "type")]
        pub enum Operation {
            $( $variant($command) ),+
        }

        impl Operation {
            /// Name shown in execution summaries, e.g. `CreateSpacesOperation`
            pub fn name(&self) -> &'static str {
                match self {
                    $( Operation::$variant(_) => concat!(stringify!($variant), "Operation") ),+
                }
            }

            /// Run the operation, returning its result as JSON
            pub async fn run(&self, conn: &mut SqliteConnection, session: &Session) -> ApiResult<serde_json::Value> {
                match self {
                    $( Operation::$variant(command) => Ok(serde_json::to_value($run(conn, session, command).await?)?) ),+
                }
            }
        }
    };
}

operations! {
    CreateSpaces(spaces::CreateSpacesCommand) => spaces::commands::create::execute,
    UpdateSpaces(spaces::UpdateSpacesCommand) => spaces::commands::update::execute,
    DeleteSpaces(spaces::DeleteSpacesCommand) => spaces::commands::delete::execute,
    CreateProjects(projects::CreateProjectsCommand) => projects::commands::create::execute,
    UpdateProjects(projects::UpdateProjectsCommand) => projects::commands::update::execute,
    DeleteProjects(projects::DeleteProjectsCommand) => projects::commands::delete::execute,
    CreateExperiments(experiments::CreateExperimentsCommand) => experiments::commands::create::execute,
    UpdateExperiments(experiments::UpdateExperimentsCommand) => experiments::commands::update::execute,
    DeleteExperiments(experiments::DeleteExperimentsCommand) => experiments::commands::delete::execute,
    CreateSamples(samples::CreateSamplesCommand) => samples::commands::create::execute,
    UpdateSamples(samples::UpdateSamplesCommand) => samples::commands::update::execute,
    DeleteSamples(samples::DeleteSamplesCommand) => samples::commands::delete::execute,
    CreateDataSets(data_sets::CreateDataSetsCommand) => data_sets::commands::create::execute,
    UpdateDataSets(data_sets::UpdateDataSetsCommand) => data_sets::commands::update::execute,
    DeleteDataSets(data_sets::DeleteDataSetsCommand) => data_sets::commands::delete::execute,
    CreateMaterials(materials::CreateMaterialsCommand) => materials::commands::create::execute,
    UpdateMaterials(materials::UpdateMaterialsCommand) => materials::commands::update::execute,
    DeleteMaterials(materials::DeleteMaterialsCommand) => materials::commands::delete::execute,
    CreateVocabularies(vocabularies::CreateVocabulariesCommand) => vocabularies::commands::create::execute,
    UpdateVocabularies(vocabularies::UpdateVocabulariesCommand) => vocabularies::commands::update::execute,
    DeleteVocabularies(vocabularies::DeleteVocabulariesCommand) => vocabularies::commands::delete::execute,
    CreateTags(tags::CreateTagsCommand) => tags::commands::create::execute,
    UpdateTags(tags::UpdateTagsCommand) => tags::commands::update::execute,
    DeleteTags(tags::DeleteTagsCommand) => tags::commands::delete::execute,
    CreateVocabularyTerms(vocabularies::CreateVocabularyTermsCommand) => vocabularies::commands::create_terms::execute,
    UpdateVocabularyTerms(vocabularies::UpdateVocabularyTermsCommand) => vocabularies::commands::update_terms::execute,
    DeleteVocabularyTerms(vocabularies::DeleteVocabularyTermsCommand) => vocabularies::commands::delete_terms::execute,
    CreateSampleTypes(entity_types::commands::CreateEntityTypesCommand<entity_types::SampleTypeAttributes>) =>
        entity_types::commands::create::execute::<entity_types::SampleTypes>,
    UpdateSampleTypes(entity_types::commands::UpdateEntityTypesCommand<entity_types::SampleTypeAttributes>) =>
        entity_types::commands::update::execute::<entity_types::SampleTypes>,
    DeleteSampleTypes(entity_types::commands::DeleteEntityTypesCommand) =>
        entity_types::commands::delete::execute::<entity_types::SampleTypes>,
    CreateExperimentTypes(entity_types::commands::CreateEntityTypesCommand<entity_types::NoAttributes>) =>
        entity_types::commands::create::execute::<entity_types::ExperimentTypes>,
    UpdateExperimentTypes(entity_types::commands::UpdateEntityTypesCommand<entity_types::NoAttributes>) =>
        entity_types::commands::update::execute::<entity_types::ExperimentTypes>,
    DeleteExperimentTypes(entity_types::commands::DeleteEntityTypesCommand) =>
        entity_types::commands::delete::execute::<entity_types::ExperimentTypes>,
    CreateDataSetTypes(entity_types::commands::CreateEntityTypesCommand<entity_types::DataSetTypeAttributes>) =>
        entity_types::commands::create::execute::<entity_types::DataSetTypes>,
    UpdateDataSetTypes(entity_types::commands::UpdateEntityTypesCommand<entity_types::DataSetTypeAttributes>) =>
        entity_types::commands::update::execute::<entity_types::DataSetTypes>,
    DeleteDataSetTypes(entity_types::commands::DeleteEntityTypesCommand) =>
        entity_types::commands::delete::execute::<entity_types::DataSetTypes>,
    CreateMaterialTypes(entity_types::commands::CreateEntityTypesCommand<entity_types::NoAttributes>) =>
        entity_types::commands::create::execute::<entity_types::MaterialTypes>,
    UpdateMaterialTypes(entity_types::commands::UpdateEntityTypesCommand<entity_types::NoAttributes>) =>
        entity_types::commands::update::execute::<entity_types::MaterialTypes>,
    DeleteMaterialTypes(entity_types::commands::DeleteEntityTypesCommand) =>
        entity_types::commands::delete::execute::<entity_types::MaterialTypes>,
    CreatePropertyTypes(property_types::CreatePropertyTypesCommand) => property_types::commands::create::execute,
    UpdatePropertyTypes(property_types::UpdatePropertyTypesCommand) => property_types::commands::update::execute,
    DeletePropertyTypes(property_types::DeletePropertyTypesCommand) => property_types::commands::delete::execute,
    CreatePlugins(plugins::CreatePluginsCommand) => plugins::commands::create::execute,
    UpdatePlugins(plugins::UpdatePluginsCommand) => plugins::commands::update::execute,
    DeletePlugins(plugins::DeletePluginsCommand) => plugins::commands::delete::execute,
    CreateExternalDms(external_dms::CreateExternalDmsCommand) => external_dms::commands::create::execute,
    UpdateExternalDms(external_dms::UpdateExternalDmsCommand) => external_dms::commands::update::execute,
    DeleteExternalDms(external_dms::DeleteExternalDmsCommand) => external_dms::commands::delete::execute,
    CreatePersons(persons::CreatePersonsCommand) => persons::commands::create::execute,
    UpdatePersons(persons::UpdatePersonsCommand) => persons::commands::update::execute,
    DeletePersons(persons::DeletePersonsCommand) => persons::commands::delete::execute,
    CreateRoleAssignments(role_assignments::CreateRoleAssignmentsCommand) => role_assignments::commands::create::execute,
    DeleteRoleAssignments(role_assignments::DeleteRoleAssignmentsCommand) => role_assignments::commands::delete::execute,
    CreateAuthorizationGroups(authorization_groups::CreateAuthorizationGroupsCommand) =>
        authorization_groups::commands::create::execute,
    UpdateAuthorizationGroups(authorization_groups::UpdateAuthorizationGroupsCommand) =>
        authorization_groups::commands::update::execute,
    DeleteAuthorizationGroups(authorization_groups::DeleteAuthorizationGroupsCommand) =>
        authorization_groups::commands::delete::execute,
    CreateSemanticAnnotations(semantic_annotations::CreateSemanticAnnotationsCommand) =>
        semantic_annotations::commands::create::execute,
    UpdateSemanticAnnotations(semantic_annotations::UpdateSemanticAnnotationsCommand) =>
        semantic_annotations::commands::update::execute,
    DeleteSemanticAnnotations(semantic_annotations::DeleteSemanticAnnotationsCommand) =>
        semantic_annotations::commands::delete::execute,
    ConfirmDeletions(deletions::ConfirmDeletionsCommand) => deletions::commands::confirm::execute,
    RevertDeletions(deletions::RevertDeletionsCommand) => deletions::commands::revert::execute,
}

impl Operation {
    /// One line description for the execution summary
    pub fn describe(&self) -> String {
        let size = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(fields)) => fields
                .values()
                .filter_map(|value| value.as_array().map(Vec::len))
                .max(),
            _ => None,
        };
        match size {
            Some(size) => format!("{} {} item(s)", self.name(), size),
            None => self.name().to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        entity_types::commands::EntityTypeCreation, persons::PersonCreation, shared::test_helpers::TestContext,
        spaces::SpaceCreation,
    };

    #[test]
    fn test_wire_shape_and_description() {
        let json = serde_json::json!({
            "type": "CreateSpaces",
            "creations": [{"code": "A"}, {"code": "B"}]
        });
        let operation: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(operation.name(), "CreateSpacesOperation");
        assert_eq!(operation.describe(), "CreateSpacesOperation 2 item(s)");

        let operation = Operation::CreateSpaces(spaces::CreateSpacesCommand {
            creations: vec![SpaceCreation {
                code: "C".into(),
                ..Default::default()
            }],
        });
        let back = serde_json::to_value(&operation).unwrap();
        assert_eq!(back["type"], "CreateSpaces");
        assert_eq!(back["creations"][0]["code"], "C");
    }

    #[tokio::test]
    async fn test_metadata_operations_share_one_transaction() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let batch: Vec<Operation> = vec![
            Operation::CreateSampleTypes(entity_types::commands::CreateEntityTypesCommand {
                creations: vec![EntityTypeCreation {
                    code: "BATCH_TYPE".into(),
                    ..Default::default()
                }],
            }),
            Operation::CreatePersons(persons::CreatePersonsCommand {
                creations: vec![PersonCreation::new("batch_user")],
            }),
            serde_json::from_value(serde_json::json!({
                "type": "CreateExternalDms",
                "creations": [{"code": "FS", "address": "host:/data", "address_type": "FILE_SYSTEM"}]
            }))
            .unwrap(),
            Operation::CreatePersons(persons::CreatePersonsCommand {
                creations: vec![PersonCreation::new("admin")],
            }),
        ];
        assert_eq!(batch[0].name(), "CreateSampleTypesOperation");
        assert_eq!(batch[2].name(), "CreateExternalDmsOperation");

        let mut tx = ctx.pool.begin().await.unwrap();
        for operation in &batch[..3] {
            operation.run(&mut tx, &admin).await.unwrap();
        }
        let err = batch[3].run(&mut tx, &admin).await.unwrap_err();
        assert_eq!(err.to_string(), "Person 'admin' already exists");
        tx.rollback().await.unwrap();

        assert_eq!(ctx.count("SELECT COUNT(*) FROM entity_types WHERE code = 'BATCH_TYPE'").await, 0);
        assert_eq!(ctx.count("SELECT COUNT(*) FROM persons WHERE user_id = 'batch_user'").await, 0);
        assert_eq!(ctx.count("SELECT COUNT(*) FROM external_dms").await, 0);
    }
}
