use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("request envelope is not valid: {0}")]
    InvalidEnvelope(String),
    #[error("private key could not be loaded: {0}")]
    InvalidPrivateKey(String),
    #[error("symmetric key unwrap failed")]
    KeyUnwrapFailed,
    #[error("flow payload decryption failed")]
    DecryptFailed,
    #[error("decrypted flow payload is malformed: {0}")]
    MalformedPayload(String),
    #[error("response encryption failed")]
    EncryptFailed,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("flow definition `{flow_id}` not found for tenant `{tenant_id}`")]
    NotFound { tenant_id: String, flow_id: String },
    #[error("flow definition is malformed: {0}")]
    Malformed(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("option `{option_id}` submitted on screen `{screen}` is not in the navigate table")]
    UnknownOption { option_id: String, screen: String },
    #[error("flow token is missing or malformed: {0}")]
    MissingToken(String),
    #[error("screen `{0}` is not part of the flow graph")]
    UnknownScreen(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("key refresh required: {message}")]
    KeyRefreshRequired { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::KeyRefreshRequired { .. } => 421,
            Self::Internal { .. } => 500,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "The request could not be processed.",
            Self::KeyRefreshRequired { .. } => "The request could not be decrypted.",
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::KeyRefreshRequired { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl FlowError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::KeyRefreshRequired { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<FlowError> for InterfaceError {
    fn from(value: FlowError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            FlowError::Crypto(CryptoError::InvalidEnvelope(message)) => {
                Self::BadRequest { message, correlation_id }
            }
            FlowError::Crypto(error @ (CryptoError::KeyUnwrapFailed | CryptoError::DecryptFailed)) => {
                Self::KeyRefreshRequired { message: error.to_string(), correlation_id }
            }
            other => Self::Internal { message: other.to_string(), correlation_id },
        }
    }
}
