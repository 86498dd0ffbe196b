//! Property types: the typed, reusable attributes assigned to entity types

pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{CreatePropertyTypesCommand, DeletePropertyTypesCommand, PropertyTypeCreation, PropertyTypeUpdate, UpdatePropertyTypesCommand};
pub use queries::{GetPropertyTypesQuery, PropertyType, PropertyTypeFetchOptions, PropertyTypeSearchCriteria, SearchPropertyTypesQuery};
pub use routes::property_types_routes;
