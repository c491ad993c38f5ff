pub mod provider;
pub mod providers;
pub mod types;

pub use provider::{CompletionProvider, CompletionRequest, ProviderError};
pub use providers::OpenRouterProvider;
pub use types::{
    Content, ContentPart, ImageUrl, Message, ModelDescriptor, Role, WireMessage, default_models,
};
