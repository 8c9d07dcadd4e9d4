//! Concrete content stages.
//!
//! Model-backed stages share a blocking [`ChatGateway`]; they are declared
//! `External` and always run on the offload pool. Formatting stages are pure.

mod creative;
mod dedup;
mod gateway;
mod html;
mod llm;
mod seen;

pub use creative::CreativePicker;
pub use dedup::SemanticDuplicateFilter;
pub use gateway::{ChatGateway, ChatModel, Sampling};
pub use html::HtmlCleaner;
pub use llm::{PostWriter, RelevanceFilter, Summarizer, TranslationReviewer, Translator};
pub use seen::SeenFilter;
