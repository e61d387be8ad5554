//! Prompt assembly.

use profesor_core::message::Message;

/// Build the message list for one chat turn.
///
/// `system_prompt` replaces the persona when the caller supplies one.
/// Empty `context` produces a plain question prompt.
pub fn build_messages(
    persona: &str,
    system_prompt: Option<&str>,
    context: &str,
    message: &str,
) -> Vec<Message> {
    let system = system_prompt
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(persona);

    vec![Message::system(system), Message::user(user_content(context, message))]
}

fn user_content(context: &str, message: &str) -> String {
    if context.trim().is_empty() {
        return format!("Answer the following question:\n\n{message}");
    }

    format!(
        "You have access to specialized tools and documentation.\n\n\
         Context from knowledge tools:\n{context}\n\n\
         User question: {message}\n\n\
         Please provide a comprehensive answer using the context provided above. \
         If the context is relevant, incorporate it into your response. \
         If not, answer based on your general knowledge."
    )
}
