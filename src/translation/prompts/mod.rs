/*!
 * Prompt construction for record translation.
 *
 * One shared template serves every backend; providers only decide how the
 * rendered text is packed into their request.
 */

pub mod templates;

// Re-export main types
pub use templates::{PromptTemplate, TranslationPromptBuilder};
