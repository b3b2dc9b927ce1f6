//! Immutable, process-wide data model for the HTTP schema and settings a
//! connector is driven by. Nothing in this crate performs IO: env
//! resolution is the only side effect, and it is a pure function call the
//! caller chooses when to invoke.

pub mod env_string;
pub mod scalar;
pub mod schema;
pub mod settings;
pub mod type_ref;
pub mod value;

pub use env_string::{EnvString, EnvStringError};
pub use scalar::{ScalarRepresentation, ScalarType};
pub use schema::{
    ArgumentSpec, AuthRequirement, EncodingRule, FieldHttpHints, FieldSpec, HttpMethod,
    HttpSchema, InlineServer, ObjectType, OperationInfo, ParamEncoding, ParamLocation, ParamStyle,
    RequestBody, RequestParameter, RequestSpec, RetryPolicy, RuntimeSettings, XmlHints,
};
pub use settings::{
    ApiKeyLocation, ArgumentPresetConfig, OAuthFlow, PresetValue, SecurityScheme, ServerConfig,
    Settings, TlsConfig, TlsVersion,
};
pub use type_ref::TypeRef;
pub use value::Value;
