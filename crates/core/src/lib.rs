//! Shared data model and error channel for the agent framework: the
//! `Error`/`Result` type every public crate function returns, the `Schema`
//! type tools and providers describe parameters with, and the
//! `Conversation`/`Message`/`CompletionOptions` types the Agent Engine
//! passes between the Tool Registry and Provider Client.

pub mod completion;
pub mod error;
pub mod message;
pub mod schema;

pub use completion::{
    CompletionOptions, CompletionResult, FinishReason, ReasoningEffort, ToolChoice,
    ToolDeclaration, Usage,
};
pub use error::{Error, Result, ToolCallError};
pub use message::{Conversation, Message, Role, ToolCall};
pub use schema::{array, boolean, integer, nullable, number, object, string, ObjectProperty, Schema};
