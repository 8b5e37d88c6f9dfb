pub mod payload;
pub mod provider;

pub use crate::payload::{
    ingest_external_payload, ButtonParseError, IngestedPayload, MalformedPayloadError, ParsedField,
};
pub use crate::provider::{PushGateway, PushProvider, RegistrationListener};
