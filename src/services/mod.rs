pub mod duplicates;
pub mod generator;
pub mod keywords;
pub mod library;
pub mod prompts;
pub mod providers;
pub mod queue;
pub mod rejections;
pub mod suggestions;
pub mod titles;

pub use duplicates::DuplicateDetector;
pub use generator::{GenerationRequest, SuggestionGenerator};
pub use library::MovieLibrary;
pub use queue::SuggestionQueue;
pub use rejections::{RejectionMemory, RejectionWriterHandle};
pub use suggestions::{RefillJobs, RefillWorkerHandle, SuggestionService, SuggestionSettings};
