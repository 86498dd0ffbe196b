//! Enumerations shared by the API surface and the persistence layer
//!
//! All of them are stored as TEXT columns and travel over the wire as the
//! same upper case names, so a single textual mapping is generated per enum.

use crate::error::CommonError;

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire and storage representation
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = CommonError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    _ => Err(CommonError::UnknownValue { kind: $kind, value: s.to_string() }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

text_enum! {
    /// Kinds of typed entities; each has its own entity type registry
    pub enum EntityKind : "entity kind" {
        Experiment => "EXPERIMENT",
        Sample => "SAMPLE",
        DataSet => "DATA_SET",
        Material => "MATERIAL",
    }
}

impl EntityKind {
    /// Human readable label used in messages
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Experiment => "Experiment",
            EntityKind::Sample => "Sample",
            EntityKind::DataSet => "Data set",
            EntityKind::Material => "Material",
        }
    }

    /// Table holding the instances of this kind
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Experiment => "experiments",
            EntityKind::Sample => "samples",
            EntityKind::DataSet => "data_sets",
            EntityKind::Material => "materials",
        }
    }
}

text_enum! {
    /// Data type of a property type
    pub enum DataType : "data type" {
        Varchar => "VARCHAR",
        MultilineVarchar => "MULTILINE_VARCHAR",
        Integer => "INTEGER",
        Real => "REAL",
        Boolean => "BOOLEAN",
        Timestamp => "TIMESTAMP",
        Date => "DATE",
        ControlledVocabulary => "CONTROLLEDVOCABULARY",
        Material => "MATERIAL",
        Hyperlink => "HYPERLINK",
        Xml => "XML",
    }
}

text_enum! {
    /// How an external data management system is addressed
    pub enum AddressType : "address type" {
        Openbis => "OPENBIS",
        Url => "URL",
        FileSystem => "FILE_SYSTEM",
    }
}

text_enum! {
    /// Roles that can be granted to persons or authorization groups
    pub enum Role : "role" {
        Observer => "OBSERVER",
        User => "USER",
        PowerUser => "POWER_USER",
        Admin => "ADMIN",
        EtlServer => "ETL_SERVER",
    }
}

impl Role {
    /// Privilege rank used for "at least" comparisons
    pub fn rank(&self) -> u8 {
        match self {
            Role::Observer => 1,
            Role::User => 2,
            Role::PowerUser | Role::EtlServer => 3,
            Role::Admin => 4,
        }
    }

    /// Whether this role grants at least the privileges of `required`
    pub fn covers(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

text_enum! {
    /// Scope of a role assignment
    pub enum RoleLevel : "role level" {
        Instance => "INSTANCE",
        Space => "SPACE",
        Project => "PROJECT",
    }
}

text_enum! {
    /// Plugin flavours; scripts are stored, never executed
    pub enum PluginType : "plugin type" {
        EntityValidation => "ENTITY_VALIDATION",
        DynamicProperty => "DYNAMIC_PROPERTY",
        ManagedProperty => "MANAGED_PROPERTY",
    }
}

text_enum! {
    /// Storage kind of a data set
    pub enum DataSetKind : "data set kind" {
        Physical => "PHYSICAL",
        Container => "CONTAINER",
        Link => "LINK",
    }
}

text_enum! {
    /// Category of a stored query
    pub enum QueryType : "query type" {
        Generic => "GENERIC",
        Experiment => "EXPERIMENT",
        Sample => "SAMPLE",
        DataSet => "DATA_SET",
        Material => "MATERIAL",
    }
}

text_enum! {
    /// Lifecycle of an operation execution
    pub enum OperationExecutionState : "operation execution state" {
        New => "NEW",
        Scheduled => "SCHEDULED",
        Running => "RUNNING",
        Finished => "FINISHED",
        Failed => "FAILED",
    }
}

text_enum! {
    /// Availability of an operation execution or one of its parts
    pub enum OperationExecutionAvailability : "operation execution availability" {
        Available => "AVAILABLE",
        DeletePending => "DELETE_PENDING",
        Deleted => "DELETED",
        TimeOutPending => "TIME_OUT_PENDING",
        TimedOut => "TIMED_OUT",
    }
}
