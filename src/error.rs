use thiserror::Error;

#[derive(Error, Debug)]
pub enum FhirRulesError {
    #[error("Invalid condition expression '{expression}': {message}")]
    InvalidCondition { expression: String, message: String },

    #[error("Invalid FHIR version: {version}")]
    InvalidFhirVersion { version: String },

    #[error("Catalog load error: {message}")]
    CatalogLoad { message: String },

    #[error("Type definition source error for '{type_name}': {message}")]
    DefinitionSource { type_name: String, message: String },

    #[error("Invalid rule: {message}")]
    InvalidRule { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FhirRulesError>;

impl FhirRulesError {
    pub fn invalid_condition<S: Into<String>>(expression: S, message: S) -> Self {
        Self::InvalidCondition {
            expression: expression.into(),
            message: message.into(),
        }
    }

    pub fn invalid_fhir_version<S: Into<String>>(version: S) -> Self {
        Self::InvalidFhirVersion {
            version: version.into(),
        }
    }

    pub fn catalog_load<S: Into<String>>(message: S) -> Self {
        Self::CatalogLoad {
            message: message.into(),
        }
    }

    pub fn definition_source<S: Into<String>>(type_name: S, message: S) -> Self {
        Self::DefinitionSource {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn invalid_rule<S: Into<String>>(message: S) -> Self {
        Self::InvalidRule {
            message: message.into(),
        }
    }
}
